//! Core domain logic for burn-up reporting.
//!
//! This crate contains the fundamental types and logic for:
//! - Extraction: fetching work-item hierarchies from a tracking tool in parallel
//! - History: replaying a change log into one snapshot per day
//! - Events: projecting many items' changes into per-day burn-up counters

pub mod events;
pub mod hierarchy;
pub mod history;
pub mod source;
mod types;
pub mod work_item;

pub use events::{
    BucketScheme, Event, EventChange, EventInfo, EventsReport, ProjectionConfig,
    ProjectionError, Size, project_events,
};
pub use hierarchy::{
    Extraction, ExtractionConfig, ExtractionError, ExtractionFailed, ExtractionProgress,
    HierarchyItem, HierarchyResult, NoProgress, RootOutcome, TracingProgress, WorkerPoolError,
    extract_hierarchies,
};
pub use history::{DailyHistory, FieldAppliers, HistoryError, HistoryOptions, Seed, daily_history};
pub use source::{DataSource, RootCriteria, SourceError, TrackedFields};
pub use types::{State, TeeShirtSize, ValidationError, WorkItemKind};
pub use work_item::{Estimate, TypeMapping, TypeResolution, WorkItem, WorkItemChange};
