//! Work items as reported by a tracking tool, and the changes made to them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{TeeShirtSize, ValidationError, WorkItemKind};

/// Minimum accepted story points.
const MIN_STORY_POINTS: u32 = 1;

/// Minimum accepted days or hours.
const MIN_DURATION: f64 = 1.0;

/// The estimation model of a work item and its current estimate.
///
/// Every variant other than `Plain` carries an optional estimate; `None`
/// means the item has not been estimated yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimate {
    Plain,
    StoryPoints { story_points: Option<u32> },
    TeeShirt { tee_shirt: Option<TeeShirtSize> },
    Days { days: Option<f64> },
    Hours { hours: Option<f64> },
}

impl Estimate {
    /// An unestimated value for the given kind.
    #[must_use]
    pub const fn empty(kind: WorkItemKind) -> Self {
        match kind {
            WorkItemKind::Plain => Self::Plain,
            WorkItemKind::StoryPoints => Self::StoryPoints { story_points: None },
            WorkItemKind::TeeShirt => Self::TeeShirt { tee_shirt: None },
            WorkItemKind::Days => Self::Days { days: None },
            WorkItemKind::Hours => Self::Hours { hours: None },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> WorkItemKind {
        match self {
            Self::Plain => WorkItemKind::Plain,
            Self::StoryPoints { .. } => WorkItemKind::StoryPoints,
            Self::TeeShirt { .. } => WorkItemKind::TeeShirt,
            Self::Days { .. } => WorkItemKind::Days,
            Self::Hours { .. } => WorkItemKind::Hours,
        }
    }

    /// Reads an estimate of `kind` from a loosely-typed value. `null` is
    /// unestimated.
    pub fn from_value(kind: WorkItemKind, value: &Value) -> Result<Self, ValidationError> {
        let invalid = |field: &'static str| ValidationError::InvalidValue {
            field,
            value: value.to_string(),
        };

        let estimate = match (kind, value) {
            (WorkItemKind::Plain, _) => Self::Plain,
            (_, Value::Null) => Self::empty(kind),
            (WorkItemKind::StoryPoints, value) => Self::StoryPoints {
                story_points: Some(integral(value).ok_or_else(|| invalid("story points"))?),
            },
            (WorkItemKind::TeeShirt, Value::String(s)) => Self::TeeShirt {
                tee_shirt: Some(s.parse()?),
            },
            (WorkItemKind::TeeShirt, _) => return Err(invalid("tee-shirt size")),
            (WorkItemKind::Days, value) => Self::Days {
                days: Some(value.as_f64().ok_or_else(|| invalid("days"))?),
            },
            (WorkItemKind::Hours, value) => Self::Hours {
                hours: Some(value.as_f64().ok_or_else(|| invalid("hours"))?),
            },
        };

        estimate.validate()?;
        Ok(estimate)
    }

    /// Checks numeric estimates against their variant's minimum.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match *self {
            Self::StoryPoints {
                story_points: Some(points),
            } if points < MIN_STORY_POINTS => Err(ValidationError::InvalidEstimate {
                field: "story points",
                value: f64::from(points),
                minimum: f64::from(MIN_STORY_POINTS),
            }),
            Self::Days { days: Some(value) } => validate_duration("days", value),
            Self::Hours { hours: Some(value) } => validate_duration("hours", value),
            _ => Ok(()),
        }
    }
}

fn validate_duration(field: &'static str, value: f64) -> Result<(), ValidationError> {
    // NaN fails the comparison and is rejected along with small values.
    if value >= MIN_DURATION {
        Ok(())
    } else {
        Err(ValidationError::InvalidEstimate {
            field,
            value,
            minimum: MIN_DURATION,
        })
    }
}

/// Accepts integers and integral floats (`3.0`) that fit in a `u32`.
pub(crate) fn integral(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&f) {
        return None;
    }
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "range and fraction checked above"
    )]
    let n = f as u32;
    Some(n)
}

/// An immutable snapshot of a work item.
///
/// Snapshots are never mutated; the `with_*` methods produce a new snapshot
/// with a single attribute changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    work_item_id: String,
    title: String,
    timestamp: DateTime<Utc>,
    status: String,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(flatten)]
    estimate: Estimate,
}

impl WorkItem {
    /// Creates a work item, rejecting estimates below their minimum.
    pub fn new(
        work_item_id: impl Into<String>,
        title: impl Into<String>,
        timestamp: DateTime<Utc>,
        status: impl Into<String>,
        item_type: impl Into<String>,
        estimate: Estimate,
    ) -> Result<Self, ValidationError> {
        estimate.validate()?;
        Ok(Self {
            work_item_id: work_item_id.into(),
            title: title.into(),
            timestamp,
            status: status.into(),
            item_type: item_type.into(),
            estimate,
        })
    }

    /// A plain item with empty title, status, and type.
    ///
    /// Used to seed reconstruction when only an ID is known.
    pub fn placeholder(work_item_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            work_item_id: work_item_id.into(),
            title: String::new(),
            timestamp,
            status: String::new(),
            item_type: String::new(),
            estimate: Estimate::Plain,
        }
    }

    pub fn work_item_id(&self) -> &str {
        &self.work_item_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub const fn estimate(&self) -> &Estimate {
        &self.estimate
    }

    pub const fn kind(&self) -> WorkItemKind {
        self.estimate.kind()
    }

    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }

    #[must_use]
    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, ..self }
    }

    #[must_use]
    pub fn with_status(self, status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..self
        }
    }

    /// Replaces the estimate, keeping every other attribute.
    pub fn with_estimate(self, estimate: Estimate) -> Result<Self, ValidationError> {
        estimate.validate()?;
        Ok(Self { estimate, ..self })
    }

    /// Records a new item type.
    ///
    /// When `kind` differs from the current estimation model the item is
    /// rebuilt as that model with an empty estimate; otherwise the estimate
    /// is kept.
    #[must_use]
    pub fn with_type(self, item_type: impl Into<String>, kind: WorkItemKind) -> Self {
        let estimate = if self.kind() == kind {
            self.estimate
        } else {
            Estimate::empty(kind)
        };

        Self {
            item_type: item_type.into(),
            estimate,
            ..self
        }
    }
}

/// A single field change recorded in a work item's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemChange {
    pub timestamp: DateTime<Utc>,
    pub field: String,
    #[serde(default)]
    pub new_value: Value,
    #[serde(default)]
    pub old_value: Value,
}

impl WorkItemChange {
    pub fn new(
        timestamp: DateTime<Utc>,
        field: impl Into<String>,
        new_value: impl Into<Value>,
        old_value: impl Into<Value>,
    ) -> Self {
        Self {
            timestamp,
            field: field.into(),
            new_value: new_value.into(),
            old_value: old_value.into(),
        }
    }
}

/// Sorts changes oldest to newest, keeping the original order of changes
/// that share a timestamp.
pub fn sort_changes(changes: &mut [WorkItemChange]) {
    changes.sort_by_key(|change| change.timestamp);
}

/// How a tracking tool's item type maps onto an estimation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeResolution {
    /// The type is modeled with the given estimation model.
    Modeled(WorkItemKind),
    /// The type is intentionally excluded from reporting.
    Unmodeled,
    /// The type is not present in the mapping.
    Unknown,
}

/// Item type name to estimation model mapping.
///
/// A `None` entry marks a type that is known but intentionally excluded
/// (bugs, for example).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeMapping(HashMap<String, Option<WorkItemKind>>);

impl TypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapping used by common agile process templates.
    pub fn standard() -> Self {
        let mut mapping = Self::new();
        mapping.insert("Bug", None);
        mapping.insert("Epic", Some(WorkItemKind::TeeShirt));
        mapping.insert("Feature", Some(WorkItemKind::StoryPoints));
        mapping.insert("Task", Some(WorkItemKind::Days));
        mapping.insert("User Story", Some(WorkItemKind::StoryPoints));
        mapping
    }

    pub fn insert(&mut self, item_type: impl Into<String>, kind: Option<WorkItemKind>) {
        self.0.insert(item_type.into(), kind);
    }

    pub fn resolve(&self, item_type: &str) -> TypeResolution {
        match self.0.get(item_type) {
            Some(Some(kind)) => TypeResolution::Modeled(*kind),
            Some(None) => TypeResolution::Unmodeled,
            None => TypeResolution::Unknown,
        }
    }
}
