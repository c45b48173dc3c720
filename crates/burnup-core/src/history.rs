//! Daily state reconstruction.
//!
//! Replays a work item's change log oldest to newest and yields one snapshot
//! of the item per calendar day (UTC) on which at least one change landed.
//! The snapshot for a day reflects every change made up to the end of that
//! day, and from the second day on it is stamped with that day's midnight.
//!
//! Field names are dispatched through a [`FieldAppliers`] table so sources
//! with different field vocabularies can remap or disable the defaults.

use std::collections::HashMap;
use std::iter::FusedIterator;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::types::{TeeShirtSize, ValidationError, WorkItemKind};
use crate::work_item::{
    Estimate, TypeMapping, TypeResolution, WorkItem, WorkItemChange, sort_changes,
};

/// Errors raised while replaying a change log.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no changes to replay for work item {work_item_id}")]
    NoChanges { work_item_id: String },

    #[error("'{field}' is not a supported change field (work item {work_item_id})")]
    UnsupportedField { work_item_id: String, field: String },

    #[error("work item {work_item_id} is a {actual} item but a {expected} item was expected")]
    WrongVariant {
        work_item_id: String,
        expected: WorkItemKind,
        actual: WorkItemKind,
    },

    #[error("invalid value for '{field}' on work item {work_item_id}: expected {expected}, got {value}")]
    InvalidValue {
        work_item_id: String,
        field: String,
        expected: &'static str,
        value: Value,
    },

    #[error("work item {work_item_id} changed to unrecognized type '{item_type}'")]
    UnknownType {
        work_item_id: String,
        item_type: String,
    },

    #[error("invalid estimate on work item {work_item_id}")]
    Validation {
        work_item_id: String,
        #[source]
        source: ValidationError,
    },
}

/// Produces a new snapshot with one change applied.
pub type Applicator = fn(WorkItem, &WorkItemChange, &TypeMapping) -> Result<WorkItem, HistoryError>;

/// Field name to applicator table.
#[derive(Debug, Clone)]
pub struct FieldAppliers {
    appliers: HashMap<String, Applicator>,
}

impl Default for FieldAppliers {
    fn default() -> Self {
        Self::standard()
    }
}

impl FieldAppliers {
    /// A table that recognizes no fields.
    pub fn empty() -> Self {
        Self {
            appliers: HashMap::new(),
        }
    }

    /// The default field names.
    pub fn standard() -> Self {
        Self::empty()
            .with("title", apply::title)
            .with("timestamp", apply::timestamp)
            .with("status", apply::status)
            .with("type", apply::item_type)
            .with("story_points", apply::story_points)
            .with("tee_shirt", apply::tee_shirt)
            .with("days", apply::days)
            .with("hours", apply::hours)
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, applicator: Applicator) -> Self {
        self.appliers.insert(field.into(), applicator);
        self
    }

    #[must_use]
    pub fn without(mut self, field: &str) -> Self {
        self.appliers.remove(field);
        self
    }

    pub fn get(&self, field: &str) -> Option<Applicator> {
        self.appliers.get(field).copied()
    }
}

/// Options controlling a replay.
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    pub appliers: FieldAppliers,
    /// Resolves `type` changes to an estimation model.
    pub types: TypeMapping,
    /// Skip changes to fields missing from `appliers` instead of failing.
    pub suppress_unsupported_fields: bool,
}

/// Starting point of a replay.
#[derive(Debug, Clone)]
pub enum Seed {
    /// Only the ID is known; a placeholder is synthesized.
    Id(String),
    Item(WorkItem),
}

impl From<&str> for Seed {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for Seed {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<WorkItem> for Seed {
    fn from(item: WorkItem) -> Self {
        Self::Item(item)
    }
}

/// Replays `changes` from `seed`.
///
/// Changes are stably sorted by timestamp first. The returned iterator is
/// lazy and stops after the first error.
pub fn daily_history(
    seed: impl Into<Seed>,
    mut changes: Vec<WorkItemChange>,
    options: &HistoryOptions,
) -> Result<DailyHistory<'_>, HistoryError> {
    let seed = seed.into();
    sort_changes(&mut changes);

    let Some(first) = changes.first() else {
        let work_item_id = match seed {
            Seed::Id(id) => id,
            Seed::Item(item) => item.work_item_id().to_string(),
        };
        return Err(HistoryError::NoChanges { work_item_id });
    };

    let current_day = first.timestamp.date_naive();
    let item = match seed {
        Seed::Id(id) => WorkItem::placeholder(id, start_of_day(current_day)),
        Seed::Item(item) => item,
    };

    Ok(DailyHistory {
        changes: changes.into_iter(),
        pending: None,
        current: Some(item),
        current_day,
        options,
    })
}

/// Daily snapshots of one item, oldest first.
#[derive(Debug)]
pub struct DailyHistory<'a> {
    changes: std::vec::IntoIter<WorkItemChange>,
    /// First change of the day following the last yielded snapshot.
    pending: Option<WorkItemChange>,
    current: Option<WorkItem>,
    current_day: NaiveDate,
    options: &'a HistoryOptions,
}

impl DailyHistory<'_> {
    fn apply(&self, item: WorkItem, change: &WorkItemChange) -> Result<WorkItem, HistoryError> {
        match self.options.appliers.get(&change.field) {
            Some(applicator) => applicator(item, change, &self.options.types),
            None if self.options.suppress_unsupported_fields => {
                tracing::trace!(
                    work_item_id = item.work_item_id(),
                    field = %change.field,
                    "skipping unsupported field"
                );
                Ok(item)
            }
            None => Err(HistoryError::UnsupportedField {
                work_item_id: item.work_item_id().to_string(),
                field: change.field.clone(),
            }),
        }
    }
}

impl Iterator for DailyHistory<'_> {
    type Item = Result<WorkItem, HistoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut item = self.current.take()?;

        if let Some(change) = self.pending.take() {
            item = match self.apply(item, &change) {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
        }

        while let Some(change) = self.changes.next() {
            let day = change.timestamp.date_naive();
            if day != self.current_day {
                self.current_day = day;
                self.current = Some(item.clone().with_timestamp(start_of_day(day)));
                self.pending = Some(change);
                return Some(Ok(item));
            }

            item = match self.apply(item, &change) {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
        }

        Some(Ok(item))
    }
}

impl FusedIterator for DailyHistory<'_> {}

/// Midnight UTC at the start of `day`.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// The default applicators.
pub mod apply {
    use super::{
        DateTime, Estimate, HistoryError, TeeShirtSize, TypeMapping, TypeResolution, Utc, Value,
        WorkItem, WorkItemChange, WorkItemKind,
    };

    pub fn title(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        let title = string_value(&item, change)?;
        Ok(item.with_title(title))
    }

    pub fn timestamp(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        let timestamp = serde_json::from_value::<DateTime<Utc>>(change.new_value.clone())
            .map_err(|_| invalid(&item, change, "an ISO 8601 timestamp"))?;
        Ok(item.with_timestamp(timestamp))
    }

    pub fn status(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        let status = string_value(&item, change)?;
        Ok(item.with_status(status))
    }

    /// Switches the estimation model when the new type maps to a different
    /// one. Unmodeled types become plain items.
    pub fn item_type(
        item: WorkItem,
        change: &WorkItemChange,
        types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        let item_type = string_value(&item, change)?;
        let kind = match types.resolve(&item_type) {
            TypeResolution::Modeled(kind) => kind,
            TypeResolution::Unmodeled => WorkItemKind::Plain,
            TypeResolution::Unknown => {
                return Err(HistoryError::UnknownType {
                    work_item_id: item.work_item_id().to_string(),
                    item_type,
                });
            }
        };
        Ok(item.with_type(item_type, kind))
    }

    pub fn story_points(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        expect_kind(&item, WorkItemKind::StoryPoints)?;
        let story_points = match &change.new_value {
            Value::Null => None,
            value => Some(
                crate::work_item::integral(value)
                    .ok_or_else(|| invalid(&item, change, "a whole number"))?,
            ),
        };
        with_estimate(item, Estimate::StoryPoints { story_points })
    }

    pub fn tee_shirt(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        expect_kind(&item, WorkItemKind::TeeShirt)?;
        let tee_shirt = match &change.new_value {
            Value::Null => None,
            Value::String(s) => Some(
                s.parse::<TeeShirtSize>()
                    .map_err(|_| invalid(&item, change, "a tee-shirt size"))?,
            ),
            _ => return Err(invalid(&item, change, "a tee-shirt size")),
        };
        with_estimate(item, Estimate::TeeShirt { tee_shirt })
    }

    pub fn days(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        expect_kind(&item, WorkItemKind::Days)?;
        let days = number_value(&item, change)?;
        with_estimate(item, Estimate::Days { days })
    }

    pub fn hours(
        item: WorkItem,
        change: &WorkItemChange,
        _types: &TypeMapping,
    ) -> Result<WorkItem, HistoryError> {
        expect_kind(&item, WorkItemKind::Hours)?;
        let hours = number_value(&item, change)?;
        with_estimate(item, Estimate::Hours { hours })
    }

    fn expect_kind(item: &WorkItem, expected: WorkItemKind) -> Result<(), HistoryError> {
        if item.kind() == expected {
            Ok(())
        } else {
            Err(HistoryError::WrongVariant {
                work_item_id: item.work_item_id().to_string(),
                expected,
                actual: item.kind(),
            })
        }
    }

    fn with_estimate(item: WorkItem, estimate: Estimate) -> Result<WorkItem, HistoryError> {
        let work_item_id = item.work_item_id().to_string();
        item.with_estimate(estimate)
            .map_err(|source| HistoryError::Validation {
                work_item_id,
                source,
            })
    }

    fn string_value(item: &WorkItem, change: &WorkItemChange) -> Result<String, HistoryError> {
        change
            .new_value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| invalid(item, change, "a string"))
    }

    fn number_value(item: &WorkItem, change: &WorkItemChange) -> Result<Option<f64>, HistoryError> {
        match &change.new_value {
            Value::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid(item, change, "a number")),
        }
    }

    fn invalid(item: &WorkItem, change: &WorkItemChange, expected: &'static str) -> HistoryError {
        HistoryError::InvalidValue {
            work_item_id: item.work_item_id().to_string(),
            field: change.field.clone(),
            expected,
            value: change.new_value.clone(),
        }
    }
}
