//! A data source backed by a JSON export of a tracking tool.
//!
//! The document lists every work item with its current attributes, its
//! children, and its change log:
//!
//! ```json
//! {
//!   "name": "team-export",
//!   "fields": { "epic_size": "tee_shirt", "feature_size": "story_points", "state": "state" },
//!   "types": { "Epic": "tee_shirt", "Feature": "story_points", "Bug": null },
//!   "statuses": { "Resolved": "Closed" },
//!   "items": [
//!     {
//!       "id": "1", "title": "Checkout", "created": "2024-01-02T09:00:00Z",
//!       "status": "New", "type": "Epic", "estimate": "L", "children": ["2"],
//!       "changes": [
//!         { "timestamp": "2024-01-03T10:00:00Z", "field": "state", "new_value": "Active" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! State-field values in change logs are tool statuses and are normalized
//! through `statuses` before they reach the core.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use burnup_core::{
    DataSource, Estimate, RootCriteria, SourceError, State, TrackedFields, TypeMapping,
    TypeResolution, ValidationError, WorkItem, WorkItemChange,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    fields: TrackedFields,
    #[serde(default = "TypeMapping::standard")]
    types: TypeMapping,
    /// Merged over the default status mapping.
    #[serde(default)]
    statuses: HashMap<String, State>,
    items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct ItemRecord {
    id: String,
    title: String,
    created: DateTime<Utc>,
    status: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    estimate: Value,
    #[serde(default)]
    children: Vec<String>,
    #[serde(default)]
    changes: Vec<WorkItemChange>,
}

fn default_name() -> String {
    "file".to_string()
}

fn default_statuses() -> HashMap<String, State> {
    [
        ("New", State::New),
        ("Active", State::Active),
        ("Closed", State::Closed),
        ("Resolved", State::Closed),
        ("Removed", State::Removed),
    ]
    .into_iter()
    .map(|(status, state)| (status.to_string(), state))
    .collect()
}

/// A tracking-tool export loaded into memory.
#[derive(Debug)]
pub struct FileSource {
    name: String,
    fields: TrackedFields,
    types: TypeMapping,
    statuses: HashMap<String, State>,
    /// Item IDs in document order.
    order: Vec<String>,
    items: HashMap<String, ItemRecord>,
}

impl FileSource {
    /// Reads and parses an export file.
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid source file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let document: SourceDocument =
            serde_json::from_str(content).context("failed to parse source document")?;

        let mut statuses = default_statuses();
        statuses.extend(document.statuses);

        let mut order = Vec::with_capacity(document.items.len());
        let mut items = HashMap::with_capacity(document.items.len());
        for record in document.items {
            anyhow::ensure!(
                !items.contains_key(&record.id),
                "work item {} is listed more than once",
                record.id
            );
            order.push(record.id.clone());
            items.insert(record.id.clone(), record);
        }

        Ok(Self {
            name: document.name,
            fields: document.fields,
            types: document.types,
            statuses,
            order,
            items,
        })
    }

    /// Type mapping used by this source; also drives `type` changes during
    /// history replay.
    pub const fn types(&self) -> &TypeMapping {
        &self.types
    }

    fn record(&self, work_item_id: &str) -> Result<&ItemRecord, SourceError> {
        self.items
            .get(work_item_id)
            .ok_or_else(|| SourceError::new(format!("work item {work_item_id} does not exist")))
    }

    fn normalize_state(&self, value: &Value) -> Result<Value, SourceError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(status) => self
                .statuses
                .get(status)
                .map(|state| Value::String(state.as_str().to_string()))
                .ok_or_else(|| SourceError::new(format!("status '{status}' has no state mapping"))),
            other => Err(SourceError::new(format!("invalid status value: {other}"))),
        }
    }
}

impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn tracked_fields(&self) -> TrackedFields {
        self.fields.clone()
    }

    fn discover_roots(&self, criteria: &RootCriteria) -> Result<Vec<String>, SourceError> {
        let children: HashSet<&str> = self
            .items
            .values()
            .flat_map(|record| record.children.iter().map(String::as_str))
            .collect();

        Ok(self
            .order
            .iter()
            .filter(|id| !children.contains(id.as_str()))
            .filter(|id| {
                criteria
                    .item_type
                    .as_ref()
                    .is_none_or(|item_type| self.items[id.as_str()].item_type == *item_type)
            })
            .cloned()
            .collect())
    }

    fn enumerate_children(&self, root_id: &str) -> Result<Vec<String>, SourceError> {
        let mut descendants = Vec::new();
        let mut seen = HashSet::from([root_id.to_string()]);
        let mut stack: Vec<&str> = self
            .record(root_id)?
            .children
            .iter()
            .rev()
            .map(String::as_str)
            .collect();

        // Depth-first, children in listed order.
        while let Some(id) = stack.pop() {
            if !seen.insert(id.to_string()) {
                continue;
            }
            descendants.push(id.to_string());
            stack.extend(self.record(id)?.children.iter().rev().map(String::as_str));
        }

        Ok(descendants)
    }

    fn fetch_item(&self, work_item_id: &str) -> Result<Option<WorkItem>, SourceError> {
        let record = self.record(work_item_id)?;

        let kind = match self.types.resolve(&record.item_type) {
            TypeResolution::Modeled(kind) => kind,
            TypeResolution::Unmodeled => return Ok(None),
            TypeResolution::Unknown => {
                return Err(SourceError::new(format!(
                    "the work item type '{}' (id: {work_item_id}) is not a recognized work item type",
                    record.item_type
                )));
            }
        };

        let invalid = |e: ValidationError| SourceError::with_source(format!("invalid work item {work_item_id}"), e);
        let estimate = Estimate::from_value(kind, &record.estimate).map_err(invalid)?;

        WorkItem::new(
            record.id.clone(),
            record.title.clone(),
            record.created,
            record.status.clone(),
            record.item_type.clone(),
            estimate,
        )
        .map(Some)
        .map_err(invalid)
    }

    fn fetch_changes(&self, work_item: &WorkItem) -> Result<Vec<WorkItemChange>, SourceError> {
        let record = self.record(work_item.work_item_id())?;

        let mut changes = record
            .changes
            .iter()
            .map(|change| {
                if change.field != self.fields.state {
                    return Ok(change.clone());
                }
                Ok(WorkItemChange {
                    new_value: self.normalize_state(&change.new_value)?,
                    old_value: self.normalize_state(&change.old_value)?,
                    ..change.clone()
                })
            })
            .collect::<Result<Vec<_>, SourceError>>()?;

        // Most recent first, like the tracking tools' update feeds.
        changes.sort_by_key(|change| Reverse(change.timestamp));
        Ok(changes)
    }
}
