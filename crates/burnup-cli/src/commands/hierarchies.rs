//! Hierarchies command: extract and write the hierarchy forest.

use std::io::Write;

use anyhow::Result;

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

    write_json(&args.output, &hierarchies, config.pretty)?;

    let items: usize = hierarchies.iter().map(|h| 1 + h.children.len()).sum();
    writeln!(
        writer,
        "Extracted {} hierarchies ({items} work items) to {}",
        hierarchies.len(),
        args.output.display()
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use serde_json::Value;

    const EXPORT: &str = include_str!("../../tests/fixtures/export.json");

    #[test]
    fn hierarchies_command_writes_forest() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("export.json");
        std::fs::write(&source, EXPORT).unwrap();

        let args = ExtractArgs {
            source,
            output: temp.path().join("out/hierarchies.json"),
            ids: Vec::new(),
            max_workers: Some(2),
        };
        let mut output = Vec::new();
        run(&mut output, &args, &Config::default(), false).unwrap();

        let summary = String::from_utf8(output)
            .unwrap()
            .replace(&temp.path().display().to_string(), "[TEMP]");
        assert_snapshot!(summary, @"Extracted 2 hierarchies (4 work items) to [TEMP]/out/hierarchies.json");

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&args.output).unwrap()).unwrap();
        let roots: Vec<&str> = written
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["root"]["work_item"]["work_item_id"].as_str().unwrap())
            .collect();
        assert_eq!(roots, ["1", "5"]);

        let children: Vec<&str> = written[0]["children"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["work_item"]["work_item_id"].as_str().unwrap())
            .collect();
        assert_eq!(children, ["2", "3"]);
    }

    #[test]
    fn no_discovered_roots_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("export.json");
        std::fs::write(&source, EXPORT).unwrap();

        let args = ExtractArgs {
            source,
            output: temp.path().join("hierarchies.json"),
            ids: Vec::new(),
            max_workers: None,
        };
        let config = Config {
            root_item_type: Some("Initiative".to_string()),
            ..Config::default()
        };
        let mut output = Vec::new();
        run(&mut output, &args, &config, false).unwrap();

        let summary = String::from_utf8(output)
            .unwrap()
            .replace(&temp.path().display().to_string(), "[TEMP]");
        assert_snapshot!(summary, @"No root work items found in [TEMP]/export.json");
        assert!(!args.output.exists());
    }

    #[test]
    fn failed_root_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("export.json");
        std::fs::write(&source, EXPORT).unwrap();

        let args = ExtractArgs {
            source,
            output: temp.path().join("hierarchies.json"),
            ids: vec!["1".to_string(), "404".to_string()],
            max_workers: None,
        };
        let err = run(&mut Vec::new(), &args, &Config::default(), false).unwrap_err();

        assert_eq!(err.to_string(), "1 of 2 hierarchies failed to extract");
        assert!(!args.output.exists());
    }
}
