//! Bounded-parallel extraction of work-item hierarchies.
//!
//! Each root ID becomes one task: enumerate the root's descendants, then fetch
//! the item and change history of the root and every descendant. Tasks run on
//! a dedicated worker pool and never affect each other; a failing root is
//! reported alongside the successful ones once every task has finished.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::source::{DataSource, SourceError};
use crate::work_item::{WorkItem, WorkItemChange};

/// Default number of extraction workers. Extraction is I/O bound.
pub const DEFAULT_MAX_WORKERS: usize = 20;

/// A work item together with its full change history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyItem {
    pub work_item: WorkItem,
    pub changes: Vec<WorkItemChange>,
}

/// A root item and every item beneath it, flattened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyResult {
    pub root: HierarchyItem,
    pub children: Vec<HierarchyItem>,
}

/// Why one root's extraction failed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to enumerate children of {root_id}")]
    ChildEnumeration {
        root_id: String,
        #[source]
        source: SourceError,
    },

    #[error("failed to fetch work item {work_item_id}")]
    ItemFetch {
        work_item_id: String,
        #[source]
        source: SourceError,
    },

    #[error("failed to fetch changes for work item {work_item_id}")]
    ChangeHistoryFetch {
        work_item_id: String,
        #[source]
        source: SourceError,
    },

    #[error("root work item {root_id} is of a type that is not modeled")]
    RootNotModeled { root_id: String },

    #[error("extraction of {root_id} panicked: {message}")]
    Panicked { root_id: String, message: String },
}

/// The worker pool could not be created.
#[derive(Debug, Error)]
#[error("failed to start {workers} extraction workers")]
pub struct WorkerPoolError {
    workers: usize,
    #[source]
    source: rayon::ThreadPoolBuildError,
}

/// Returned by [`Extraction::into_hierarchies`] when any root failed.
#[derive(Debug, Error)]
#[error("{} of {total} hierarchies failed to extract", failures.len())]
pub struct ExtractionFailed {
    pub failures: Vec<(String, ExtractionError)>,
    pub total: usize,
}

/// Configuration for hierarchy extraction.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Maximum number of roots extracted concurrently.
    /// Default: 20.
    pub max_workers: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Receives fine-grained progress from extraction tasks.
///
/// A task has `1 + descendants` steps: step 0 is the root, step `n` the
/// `n`th descendant. Called concurrently from worker threads.
pub trait ExtractionProgress: Sync {
    fn task_started(&self, _root_id: &str, _total_steps: usize) {}

    fn step(&self, _root_id: &str, _step: usize, _work_item_id: &str) {}

    fn task_finished(&self, _root_id: &str, _succeeded: bool) {}
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ExtractionProgress for NoProgress {}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ExtractionProgress for TracingProgress {
    fn task_started(&self, root_id: &str, total_steps: usize) {
        tracing::info!(root_id, total_steps, "extracting hierarchy");
    }

    fn step(&self, root_id: &str, step: usize, work_item_id: &str) {
        tracing::debug!(root_id, step, work_item_id, "extracting work item");
    }

    fn task_finished(&self, root_id: &str, succeeded: bool) {
        tracing::debug!(root_id, succeeded, "hierarchy extraction finished");
    }
}

/// The outcome of extracting one root.
#[derive(Debug)]
pub struct RootOutcome {
    pub root_id: String,
    pub result: Result<HierarchyResult, ExtractionError>,
}

/// Outcomes of every requested root, in request order.
#[derive(Debug)]
pub struct Extraction {
    outcomes: Vec<RootOutcome>,
}

impl Extraction {
    pub fn outcomes(&self) -> &[RootOutcome] {
        &self.outcomes
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ExtractionError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(e) => Some((outcome.root_id.as_str(), e)),
        })
    }

    /// Successful hierarchies, ignoring failed roots.
    pub fn successes(&self) -> impl Iterator<Item = &HierarchyResult> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
    }

    /// All hierarchies, or every failure if any root failed.
    pub fn into_hierarchies(self) -> Result<Vec<HierarchyResult>, ExtractionFailed> {
        let total = self.outcomes.len();
        let mut hierarchies = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for outcome in self.outcomes {
            match outcome.result {
                Ok(hierarchy) => hierarchies.push(hierarchy),
                Err(e) => failures.push((outcome.root_id, e)),
            }
        }

        if failures.is_empty() {
            Ok(hierarchies)
        } else {
            Err(ExtractionFailed { failures, total })
        }
    }
}

/// Extracts the hierarchy under each root ID.
///
/// Roots are processed concurrently on a pool of at most
/// `config.max_workers` threads. A root's failure, including a panic inside
/// the data source, is captured in its [`RootOutcome`] and never cancels
/// sibling tasks.
pub fn extract_hierarchies<S>(
    source: &S,
    root_ids: &[String],
    config: &ExtractionConfig,
    progress: &dyn ExtractionProgress,
) -> Result<Extraction, WorkerPoolError>
where
    S: DataSource + ?Sized,
{
    let workers = config.max_workers.clamp(1, root_ids.len().max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("burnup-extract-{i}"))
        .build()
        .map_err(|source| WorkerPoolError { workers, source })?;

    tracing::debug!(
        source = source.name(),
        roots = root_ids.len(),
        workers,
        "starting extraction"
    );

    let outcomes = pool.install(|| {
        root_ids
            .par_iter()
            .map(|root_id| {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    extract_root(source, root_id, progress)
                }))
                .unwrap_or_else(|payload| {
                    Err(ExtractionError::Panicked {
                        root_id: root_id.clone(),
                        message: panic_message(payload.as_ref()),
                    })
                });

                progress.task_finished(root_id, result.is_ok());
                RootOutcome {
                    root_id: root_id.clone(),
                    result,
                }
            })
            .collect::<Vec<_>>()
    });

    Ok(Extraction { outcomes })
}

fn extract_root<S>(
    source: &S,
    root_id: &str,
    progress: &dyn ExtractionProgress,
) -> Result<HierarchyResult, ExtractionError>
where
    S: DataSource + ?Sized,
{
    let child_ids =
        source
            .enumerate_children(root_id)
            .map_err(|source| ExtractionError::ChildEnumeration {
                root_id: root_id.to_string(),
                source,
            })?;

    progress.task_started(root_id, 1 + child_ids.len());

    progress.step(root_id, 0, root_id);
    let root = fetch_hierarchy_item(source, root_id)?.ok_or_else(|| {
        ExtractionError::RootNotModeled {
            root_id: root_id.to_string(),
        }
    })?;

    let mut children = Vec::with_capacity(child_ids.len());
    for (index, child_id) in child_ids.iter().enumerate() {
        progress.step(root_id, index + 1, child_id);

        match fetch_hierarchy_item(source, child_id)? {
            Some(child) => children.push(child),
            None => tracing::debug!(root_id, work_item_id = %child_id, "skipping unmodeled work item"),
        }
    }

    Ok(HierarchyResult { root, children })
}

fn fetch_hierarchy_item<S>(
    source: &S,
    work_item_id: &str,
) -> Result<Option<HierarchyItem>, ExtractionError>
where
    S: DataSource + ?Sized,
{
    let Some(work_item) =
        source
            .fetch_item(work_item_id)
            .map_err(|source| ExtractionError::ItemFetch {
                work_item_id: work_item_id.to_string(),
                source,
            })?
    else {
        return Ok(None);
    };

    let changes =
        source
            .fetch_changes(&work_item)
            .map_err(|source| ExtractionError::ChangeHistoryFetch {
                work_item_id: work_item_id.to_string(),
                source,
            })?;

    Ok(Some(HierarchyItem { work_item, changes }))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use crate::source::{RootCriteria, TrackedFields};
    use crate::work_item::Estimate;

    /// In-memory source: `children` maps roots to descendants; IDs listed in
    /// the failure sets error out at the corresponding call.
    #[derive(Default)]
    struct MemorySource {
        children: HashMap<String, Vec<String>>,
        unmodeled: Vec<String>,
        fail_children: Vec<String>,
        fail_item: Vec<String>,
        fail_changes: Vec<String>,
        panic_on: Vec<String>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MemorySource {
        fn with_roots(roots: &[(&str, &[&str])]) -> Self {
            Self {
                children: roots
                    .iter()
                    .map(|(root, kids)| {
                        (
                            (*root).to_string(),
                            kids.iter().map(ToString::to_string).collect(),
                        )
                    })
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl DataSource for MemorySource {
        fn name(&self) -> &str {
            "memory"
        }

        fn tracked_fields(&self) -> TrackedFields {
            TrackedFields::default()
        }

        fn discover_roots(&self, _criteria: &RootCriteria) -> Result<Vec<String>, SourceError> {
            let mut roots: Vec<String> = self.children.keys().cloned().collect();
            roots.sort();
            Ok(roots)
        }

        fn enumerate_children(&self, root_id: &str) -> Result<Vec<String>, SourceError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            assert!(
                !self.panic_on.iter().any(|id| id == root_id),
                "boom in {root_id}"
            );
            if self.fail_children.iter().any(|id| id == root_id) {
                return Err(SourceError::new("children unavailable"));
            }
            Ok(self.children.get(root_id).cloned().unwrap_or_default())
        }

        fn fetch_item(&self, work_item_id: &str) -> Result<Option<WorkItem>, SourceError> {
            if self.fail_item.iter().any(|id| id == work_item_id) {
                return Err(SourceError::new("item unavailable"));
            }
            if self.unmodeled.iter().any(|id| id == work_item_id) {
                return Ok(None);
            }
            let item = WorkItem::new(
                work_item_id,
                format!("Item {work_item_id}"),
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                "New",
                "Feature",
                Estimate::StoryPoints { story_points: None },
            )
            .map_err(|e| SourceError::with_source("invalid item", e))?;
            Ok(Some(item))
        }

        fn fetch_changes(&self, work_item: &WorkItem) -> Result<Vec<WorkItemChange>, SourceError> {
            if self.fail_changes.iter().any(|id| id == work_item.work_item_id()) {
                return Err(SourceError::new("history unavailable"));
            }
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        totals: Mutex<Vec<(String, usize)>>,
        steps: Mutex<Vec<(String, usize)>>,
        finished: Mutex<Vec<(String, bool)>>,
    }

    impl ExtractionProgress for RecordingProgress {
        fn task_started(&self, root_id: &str, total_steps: usize) {
            self.totals
                .lock()
                .unwrap()
                .push((root_id.to_string(), total_steps));
        }

        fn step(&self, root_id: &str, step: usize, _work_item_id: &str) {
            self.steps.lock().unwrap().push((root_id.to_string(), step));
        }

        fn task_finished(&self, root_id: &str, succeeded: bool) {
            self.finished
                .lock()
                .unwrap()
                .push((root_id.to_string(), succeeded));
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn extracts_root_and_descendants() {
        let source = MemorySource::with_roots(&[("E1", &["F1", "F2"])]);

        let extraction = extract_hierarchies(
            &source,
            &ids(&["E1"]),
            &ExtractionConfig::default(),
            &NoProgress,
        )
        .unwrap();

        assert!(extraction.is_success());
        let hierarchies = extraction.into_hierarchies().unwrap();
        assert_eq!(hierarchies.len(), 1);
        assert_eq!(hierarchies[0].root.work_item.work_item_id(), "E1");
        let children: Vec<&str> = hierarchies[0]
            .children
            .iter()
            .map(|child| child.work_item.work_item_id())
            .collect();
        assert_eq!(children, ["F1", "F2"]);
    }

    #[test]
    fn reports_one_plus_descendants_steps() {
        let source = MemorySource::with_roots(&[("E1", &["F1", "F2", "F3"])]);
        let progress = RecordingProgress::default();

        extract_hierarchies(
            &source,
            &ids(&["E1"]),
            &ExtractionConfig::default(),
            &progress,
        )
        .unwrap();

        assert_eq!(*progress.totals.lock().unwrap(), [("E1".to_string(), 4)]);
        let steps: Vec<usize> = progress.steps.lock().unwrap().iter().map(|s| s.1).collect();
        assert_eq!(steps, [0, 1, 2, 3]);
        assert_eq!(*progress.finished.lock().unwrap(), [("E1".to_string(), true)]);
    }

    #[test]
    fn failing_root_does_not_affect_siblings() {
        let mut source =
            MemorySource::with_roots(&[("E1", &["F1"]), ("E2", &["F2"]), ("E3", &["F3"])]);
        source.fail_changes = ids(&["F2"]);

        let extraction = extract_hierarchies(
            &source,
            &ids(&["E1", "E2", "E3"]),
            &ExtractionConfig::default(),
            &NoProgress,
        )
        .unwrap();

        assert!(!extraction.is_success());
        assert_eq!(extraction.successes().count(), 2);

        let failures: Vec<_> = extraction.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "E2");
        assert!(matches!(
            failures[0].1,
            ExtractionError::ChangeHistoryFetch { work_item_id, .. } if work_item_id == "F2"
        ));

        let err = extraction.into_hierarchies().unwrap_err();
        assert_eq!(err.to_string(), "1 of 3 hierarchies failed to extract");
    }

    #[test]
    fn outcomes_keep_request_order() {
        let source = MemorySource::with_roots(&[("A", &[]), ("B", &[]), ("C", &[]), ("D", &[])]);

        let extraction = extract_hierarchies(
            &source,
            &ids(&["D", "B", "A", "C"]),
            &ExtractionConfig { max_workers: 4 },
            &NoProgress,
        )
        .unwrap();

        let order: Vec<&str> = extraction
            .outcomes()
            .iter()
            .map(|o| o.root_id.as_str())
            .collect();
        assert_eq!(order, ["D", "B", "A", "C"]);
    }

    #[test]
    fn error_kinds_are_attributed() {
        let mut source = MemorySource::with_roots(&[("E1", &[]), ("E2", &["F2"]), ("E3", &[])]);
        source.fail_children = ids(&["E1"]);
        source.fail_item = ids(&["F2"]);
        source.unmodeled = ids(&["E3"]);

        let extraction = extract_hierarchies(
            &source,
            &ids(&["E1", "E2", "E3"]),
            &ExtractionConfig::default(),
            &NoProgress,
        )
        .unwrap();

        let outcomes = extraction.outcomes();
        assert!(matches!(
            outcomes[0].result,
            Err(ExtractionError::ChildEnumeration { .. })
        ));
        assert!(matches!(
            &outcomes[1].result,
            Err(ExtractionError::ItemFetch { work_item_id, .. }) if work_item_id == "F2"
        ));
        assert!(matches!(
            outcomes[2].result,
            Err(ExtractionError::RootNotModeled { .. })
        ));
    }

    #[test]
    fn unmodeled_children_are_skipped() {
        let mut source = MemorySource::with_roots(&[("E1", &["F1", "B1", "F2"])]);
        source.unmodeled = ids(&["B1"]);

        let hierarchies = extract_hierarchies(
            &source,
            &ids(&["E1"]),
            &ExtractionConfig::default(),
            &NoProgress,
        )
        .unwrap()
        .into_hierarchies()
        .unwrap();

        assert_eq!(hierarchies[0].children.len(), 2);
    }

    #[test]
    fn panicking_root_is_captured() {
        let mut source = MemorySource::with_roots(&[("E1", &[]), ("E2", &[])]);
        source.panic_on = ids(&["E1"]);

        let extraction = extract_hierarchies(
            &source,
            &ids(&["E1", "E2"]),
            &ExtractionConfig::default(),
            &NoProgress,
        )
        .unwrap();

        let outcomes = extraction.outcomes();
        assert!(matches!(
            &outcomes[0].result,
            Err(ExtractionError::Panicked { message, .. }) if message.contains("boom in E1")
        ));
        assert!(outcomes[1].result.is_ok());
    }

    #[test]
    fn concurrency_is_bounded_by_max_workers() {
        let roots: Vec<String> = (0..12).map(|i| format!("E{i}")).collect();
        let mut source = MemorySource::default();
        for root in &roots {
            source.children.insert(root.clone(), Vec::new());
        }
        source.delay = Some(Duration::from_millis(20));

        let extraction = extract_hierarchies(
            &source,
            &roots,
            &ExtractionConfig { max_workers: 3 },
            &NoProgress,
        )
        .unwrap();

        assert!(extraction.is_success());
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
    }
}
