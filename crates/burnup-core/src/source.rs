//! The contract a tracking-tool adapter implements.

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::work_item::{WorkItem, WorkItemChange};

/// An error raised by a data source.
///
/// Network, authentication, and rate-limit failures are the adapter's
/// concern; the core only carries them through to diagnostics.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SourceError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// Names of the change-log fields that drive event projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFields {
    /// Field carrying an epic's size, if the tool models epic sizes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_size: Option<String>,
    /// Field carrying a feature's size.
    pub feature_size: String,
    /// Field carrying the normalized lifecycle state.
    pub state: String,
}

impl Default for TrackedFields {
    fn default() -> Self {
        Self {
            epic_size: Some("tee_shirt".to_string()),
            feature_size: "story_points".to_string(),
            state: "state".to_string(),
        }
    }
}

/// Selection criteria for root discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootCriteria {
    /// Only items of this type are roots; `None` selects every item without
    /// a parent.
    pub item_type: Option<String>,
}

/// A tracking tool exposing work items and their audit trails.
///
/// Implementations must be shareable across the extraction worker pool.
pub trait DataSource: Sync {
    /// Human-readable name of the source.
    fn name(&self) -> &str;

    /// Field names used when projecting events from this source's changes.
    fn tracked_fields(&self) -> TrackedFields;

    /// Returns the IDs of items that root a hierarchy.
    fn discover_roots(&self, criteria: &RootCriteria) -> Result<Vec<String>, SourceError>;

    /// Returns every descendant of `root_id`, flattened.
    fn enumerate_children(&self, root_id: &str) -> Result<Vec<String>, SourceError>;

    /// Fetches the current state of an item.
    ///
    /// `Ok(None)` means the item's type is intentionally not modeled.
    fn fetch_item(&self, work_item_id: &str) -> Result<Option<WorkItem>, SourceError>;

    /// Fetches an item's change history in any order.
    fn fetch_changes(&self, work_item: &WorkItem) -> Result<Vec<WorkItemChange>, SourceError>;
}
