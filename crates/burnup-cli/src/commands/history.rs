//! History command: print one item's daily snapshots.

use std::io::Write;

use anyhow::{Context, Result};
use burnup_core::history::apply;
use burnup_core::{DataSource, Seed, daily_history};

use crate::Config;
use crate::cli::HistoryArgs;
use crate::source::FileSource;

/// Writes one JSON snapshot per line, oldest first.
pub fn run<W: Write>(writer: &mut W, args: &HistoryArgs, config: &Config) -> Result<()> {
    let source = FileSource::open(&args.source)?;

    let item = source
        .fetch_item(&args.id)
        .with_context(|| format!("failed to fetch work item {}", args.id))?
        .with_context(|| format!("work item {} is of a type that is not modeled", args.id))?;
    let changes = source
        .fetch_changes(&item)
        .with_context(|| format!("failed to fetch changes for work item {}", args.id))?;

    // The source's state field carries normalized states.
    let mut options = config.history(source.types().clone());
    options.appliers = options
        .appliers
        .with(source.tracked_fields().state, apply::status);
    options.suppress_unsupported_fields |= args.suppress_unsupported_fields;

    let snapshots = daily_history(Seed::from(args.id.as_str()), changes, &options)?;
    for snapshot in snapshots {
        let snapshot = snapshot.with_context(|| format!("failed to replay work item {}", args.id))?;
        serde_json::to_writer(&mut *writer, &snapshot)?;
        writeln!(writer)?;
    }

    Ok(())
}
