//! Configuration loading and management.

use std::path::{Path, PathBuf};

use burnup_core::hierarchy::DEFAULT_MAX_WORKERS;
use burnup_core::{
    BucketScheme, ExtractionConfig, HistoryOptions, ProjectionConfig, TrackedFields, TypeMapping,
};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Deserializer, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of hierarchies extracted concurrently.
    pub max_workers: usize,

    /// Reporting bucket taxonomy.
    pub bucket_scheme: BucketScheme,

    /// Skip change-log fields the history replay does not recognize.
    pub suppress_unsupported_fields: bool,

    /// Item type of discovered roots when no `--id` is given. An empty
    /// string selects every parentless item.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub root_item_type: Option<String>,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            bucket_scheme: BucketScheme::default(),
            suppress_unsupported_fields: false,
            root_item_type: Some("Epic".to_string()),
            pretty: false,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (BURNUP_*)
        figment = figment.merge(Env::prefixed("BURNUP_"));

        figment.extract()
    }

    pub fn extraction(&self) -> ExtractionConfig {
        ExtractionConfig {
            max_workers: self.max_workers,
        }
    }

    pub fn projection(&self, fields: TrackedFields) -> ProjectionConfig {
        ProjectionConfig {
            fields,
            buckets: self.bucket_scheme,
        }
    }

    pub fn history(&self, types: TypeMapping) -> HistoryOptions {
        HistoryOptions {
            types,
            suppress_unsupported_fields: self.suppress_unsupported_fields,
            ..HistoryOptions::default()
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// Returns the platform-specific config directory for burnup.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("burnup"))
}
