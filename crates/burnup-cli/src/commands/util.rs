//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use burnup_core::{
    DataSource, ExtractionConfig, HierarchyResult, RootCriteria, TracingProgress,
    extract_hierarchies,
};

use crate::Config;

/// Uses the requested IDs, or discovers roots of the configured type.
pub fn resolve_roots<S: DataSource + ?Sized>(
    source: &S,
    ids: &[String],
    config: &Config,
) -> Result<Vec<String>> {
    if !ids.is_empty() {
        return Ok(ids.to_vec());
    }

    let criteria = RootCriteria {
        item_type: config.root_item_type.clone(),
    };
    let roots = source
        .discover_roots(&criteria)
        .with_context(|| format!("failed to discover roots in {}", source.name()))?;
    tracing::info!(roots = roots.len(), item_type = ?criteria.item_type, "discovered roots");
    Ok(roots)
}

/// Extracts every root, reporting each failure before failing the run.
///
/// With `full_chain` every cause is logged; otherwise the outer message and
/// the innermost cause.
pub fn extract<S: DataSource + ?Sized>(
    source: &S,
    roots: &[String],
    extraction: &ExtractionConfig,
    full_chain: bool,
) -> Result<Vec<HierarchyResult>> {
    let outcome = extract_hierarchies(source, roots, extraction, &TracingProgress)?;

    match outcome.into_hierarchies() {
        Ok(hierarchies) => Ok(hierarchies),
        Err(failed) => {
            let summary = failed.to_string();
            for (root_id, error) in failed.failures {
                let error = anyhow::Error::new(error);
                tracing::error!(
                    root_id = %root_id,
                    error = %describe(&error, full_chain),
                    "hierarchy extraction failed"
                );
            }
            anyhow::bail!(summary)
        }
    }
}

fn describe(error: &anyhow::Error, full_chain: bool) -> String {
    if full_chain {
        format!("{error:#}")
    } else if error.chain().nth(1).is_some() {
        format!("{error}: {}", error.root_cause())
    } else {
        error.to_string()
    }
}
