//! Events command: extract, project, and write daily burn-up counters.

use std::io::Write;

use anyhow::{Context, Result};
use burnup_core::{DataSource, project_events};

use crate::Config;
use crate::cli::ExtractArgs;
use crate::commands::util;
use crate::output::write_json;
use crate::source::FileSource;

pub fn run<W: Write>(
    writer: &mut W,
    args: &ExtractArgs,
    config: &Config,
    full_chain: bool,
) -> Result<()> {
    let source = FileSource::open(&args.source)?;
    let roots = util::resolve_roots(&source, &args.ids, config)?;
    if roots.is_empty() {
        tracing::warn!(source = %args.source.display(), "no root work items found");
        writeln!(writer, "No root work items found in {}", args.source.display())?;
        return Ok(());
    }

    let mut extraction = config.extraction();
    if let Some(max_workers) = args.max_workers {
        extraction.max_workers = max_workers;
    }
    let hierarchies = util::extract(&source, &roots, &extraction, full_chain)?;

    let report = project_events(&hierarchies, &config.projection(source.tracked_fields()))
        .context("failed to project events")?;

    write_json(&args.output, &report, config.pretty)?;

    let span = match (report.events.keys().next(), report.events.keys().next_back()) {
        (Some(first), Some(last)) => format!(", {first} to {last}"),
        _ => String::new(),
    };
    writeln!(
        writer,
        "Projected {} days from {} hierarchies{span} to {}",
        report.events.len(),
        hierarchies.len(),
        args.output.display()
    )?;

    Ok(())
}
