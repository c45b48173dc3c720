//! Event projection: per-day burn-up counters across a forest of hierarchies.
//!
//! # Algorithm Summary
//!
//! 1. Organize: walk every root and child change log, keeping only size and
//!    state changes, and group them into one delta per `(day, item)`. Same-day
//!    deltas are combined with [`ItemDelta::merge`].
//! 2. Normalize: visit days in ascending order, folding each day's deltas into
//!    a running map of last-known item data. Items whose state becomes
//!    `Removed` leave the map. Every day's counters are then recomputed from
//!    the whole map, so each [`Event`] is cumulative rather than a diff.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hierarchy::{HierarchyItem, HierarchyResult};
use crate::source::TrackedFields;
use crate::types::{State, TeeShirtSize};

/// Errors raised while projecting events.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("invalid state for work item {work_item_id}: {value}")]
    InvalidState { work_item_id: String, value: Value },

    #[error("invalid size for work item {work_item_id}: {value}")]
    InvalidSize { work_item_id: String, value: Value },
}

/// How lifecycle states map onto reporting buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketScheme {
    /// `New`/`Estimated` count as created, `Pending` as pending.
    #[default]
    FourBucket,
    /// `New`, `Estimated`, and `Pending` all count as pending; `created`
    /// stays zero.
    ThreeBucket,
}

/// A reporting bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Created,
    Pending,
    Active,
    Completed,
}

impl BucketScheme {
    /// The bucket for `state`; `Removed` has none.
    pub const fn bucket(self, state: State) -> Option<Bucket> {
        match (self, state) {
            (Self::FourBucket, State::New | State::Estimated) => Some(Bucket::Created),
            (Self::ThreeBucket, State::New | State::Estimated) | (_, State::Pending) => {
                Some(Bucket::Pending)
            }
            (_, State::Active) => Some(Bucket::Active),
            (_, State::Closed) => Some(Bucket::Completed),
            (_, State::Removed) => None,
        }
    }
}

/// Per-bucket counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EventInfo<T> {
    pub created: T,
    pub pending: T,
    pub active: T,
    pub completed: T,
}

impl<T: AddAssign> EventInfo<T> {
    fn add(&mut self, bucket: Bucket, amount: T) {
        let slot = match bucket {
            Bucket::Created => &mut self.created,
            Bucket::Pending => &mut self.pending,
            Bucket::Active => &mut self.active,
            Bucket::Completed => &mut self.completed,
        };
        *slot += amount;
    }
}

/// An item's size as recorded by the size field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Size {
    Numeric(f64),
    TeeShirt(TeeShirtSize),
}

impl Size {
    /// Parses a loosely-typed change value. `null` is no size.
    fn from_value(value: &Value) -> Result<Option<Self>, ()> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_f64().map(|n| Some(Self::Numeric(n))).ok_or(()),
            Value::String(s) => s
                .parse::<TeeShirtSize>()
                .map(|size| Some(Self::TeeShirt(size)))
                .map_err(|_| ()),
            _ => Err(()),
        }
    }

    /// Amount added to size buckets. Tee-shirt sizes are not summable.
    const fn summable(self) -> f64 {
        match self {
            Self::Numeric(n) => n,
            Self::TeeShirt(_) => 0.0,
        }
    }
}

/// One item's change on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventChange {
    pub work_item_id: String,
    pub epic_id: String,
    pub size: Option<Size>,
    pub state: State,
}

/// Cumulative counters as of one day, plus that day's raw changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub date: NaiveDate,

    pub epics_estimated_num: EventInfo<u32>,
    pub epics_unestimated_num: EventInfo<u32>,

    pub features_estimated_num: EventInfo<u32>,
    pub features_unestimated_num: EventInfo<u32>,
    pub features_estimated_size: EventInfo<f64>,

    pub changes: Vec<EventChange>,
}

/// The projection output.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EventsReport {
    /// Work item ID to title.
    pub titles: BTreeMap<String, String>,
    /// One entry per day with at least one size or state change.
    pub events: BTreeMap<NaiveDate, Event>,
}

/// Configuration for event projection.
#[derive(Debug, Clone, Default)]
pub struct ProjectionConfig {
    pub fields: TrackedFields,
    pub buckets: BucketScheme,
}

/// Size and state of one item, as changed on one day or as last known.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ItemDelta {
    timestamp: DateTime<Utc>,
    epic_id: String,
    /// `None` when this is the epic itself.
    feature_id: Option<String>,
    size: Option<Size>,
    state: Option<State>,
}

impl ItemDelta {
    fn work_item_id(&self) -> &str {
        self.feature_id.as_deref().unwrap_or(&self.epic_id)
    }

    /// Takes each non-null field of `other` unless this delta holds a value
    /// with a strictly later timestamp.
    fn merge(&mut self, other: &Self) {
        let incoming_wins = other.timestamp >= self.timestamp;

        if other.size.is_some() && (self.size.is_none() || incoming_wins) {
            self.size = other.size;
        }
        if other.state.is_some() && (self.state.is_none() || incoming_wins) {
            self.state = other.state;
        }
        self.timestamp = self.timestamp.max(other.timestamp);
    }
}

type DailyDeltas = BTreeMap<NaiveDate, BTreeMap<String, ItemDelta>>;

/// Projects the extracted forest into a date-ordered burn-up series.
pub fn project_events(
    hierarchies: &[HierarchyResult],
    config: &ProjectionConfig,
) -> Result<EventsReport, ProjectionError> {
    let mut titles = BTreeMap::new();
    let mut daily = DailyDeltas::new();

    for hierarchy in hierarchies {
        let epic_id = hierarchy.root.work_item.work_item_id();

        organize_item(
            epic_id,
            &hierarchy.root,
            config,
            &mut titles,
            &mut daily,
        )?;
        for child in &hierarchy.children {
            organize_item(epic_id, child, config, &mut titles, &mut daily)?;
        }
    }

    tracing::debug!(
        items = titles.len(),
        days = daily.len(),
        "organized work item changes"
    );

    Ok(EventsReport {
        titles,
        events: normalize(daily, config.buckets),
    })
}

fn organize_item(
    epic_id: &str,
    item: &HierarchyItem,
    config: &ProjectionConfig,
    titles: &mut BTreeMap<String, String>,
    daily: &mut DailyDeltas,
) -> Result<(), ProjectionError> {
    let work_item_id = item.work_item.work_item_id();
    let is_epic = work_item_id == epic_id;

    titles
        .entry(work_item_id.to_string())
        .or_insert_with(|| item.work_item.title().to_string());

    let size_field = if is_epic {
        config.fields.epic_size.as_deref()
    } else {
        Some(config.fields.feature_size.as_str())
    };

    let mut changes: Vec<_> = item.changes.iter().collect();
    changes.sort_by_key(|change| change.timestamp);

    for change in changes {
        let (size, state) = if size_field == Some(change.field.as_str()) {
            let size = Size::from_value(&change.new_value).map_err(|()| {
                ProjectionError::InvalidSize {
                    work_item_id: work_item_id.to_string(),
                    value: change.new_value.clone(),
                }
            })?;
            (size, None)
        } else if change.field == config.fields.state {
            (None, parse_state(work_item_id, &change.new_value)?)
        } else {
            continue;
        };

        let delta = ItemDelta {
            timestamp: change.timestamp,
            epic_id: epic_id.to_string(),
            feature_id: (!is_epic).then(|| work_item_id.to_string()),
            size,
            state,
        };

        daily
            .entry(change.timestamp.date_naive())
            .or_default()
            .entry(work_item_id.to_string())
            .and_modify(|existing| existing.merge(&delta))
            .or_insert(delta);
    }

    Ok(())
}

fn parse_state(work_item_id: &str, value: &Value) -> Result<Option<State>, ProjectionError> {
    let invalid = || ProjectionError::InvalidState {
        work_item_id: work_item_id.to_string(),
        value: value.clone(),
    };

    match value {
        Value::Null => Ok(None),
        Value::String(s) => s.parse().map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn normalize(daily: DailyDeltas, buckets: BucketScheme) -> BTreeMap<NaiveDate, Event> {
    let mut tracked: BTreeMap<String, ItemDelta> = BTreeMap::new();
    let mut events = BTreeMap::new();

    for (date, deltas) in daily {
        let mut changes = Vec::with_capacity(deltas.len());

        for delta in deltas.into_values() {
            let work_item_id = delta.work_item_id().to_string();
            changes.push(EventChange {
                work_item_id: work_item_id.clone(),
                epic_id: delta.epic_id.clone(),
                size: delta.size,
                state: delta.state.unwrap_or_default(),
            });

            if delta.state == Some(State::Removed) {
                tracked.remove(&work_item_id);
                continue;
            }

            tracked
                .entry(work_item_id)
                .and_modify(|existing| existing.merge(&delta))
                .or_insert(delta);
        }

        // Features first, then the epic; ties by ID.
        changes.sort_by(|a, b| {
            (a.work_item_id == a.epic_id, &a.work_item_id)
                .cmp(&(b.work_item_id == b.epic_id, &b.work_item_id))
        });

        let mut event = Event {
            date,
            epics_estimated_num: EventInfo::default(),
            epics_unestimated_num: EventInfo::default(),
            features_estimated_num: EventInfo::default(),
            features_unestimated_num: EventInfo::default(),
            features_estimated_size: EventInfo::default(),
            changes,
        };

        for item in tracked.values() {
            let Some(bucket) = buckets.bucket(item.state.unwrap_or_default()) else {
                continue;
            };
            let is_epic = item.feature_id.is_none();

            match (is_epic, item.size) {
                (true, None) => event.epics_unestimated_num.add(bucket, 1),
                (true, Some(_)) => event.epics_estimated_num.add(bucket, 1),
                (false, None) => event.features_unestimated_num.add(bucket, 1),
                (false, Some(size)) => {
                    if let Size::TeeShirt(tee_shirt) = size {
                        tracing::debug!(
                            %date,
                            work_item_id = item.work_item_id(),
                            %tee_shirt,
                            "tee-shirt sized feature adds nothing to size totals"
                        );
                    }
                    event.features_estimated_num.add(bucket, 1);
                    event.features_estimated_size.add(bucket, size.summable());
                }
            }
        }

        tracing::trace!(%date, tracked = tracked.len(), "computed event");
        events.insert(date, event);
    }

    events
}
