//! Command handlers

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use control_index::progress::percent;
use control_index::{
    extract, Control, ControlFilter, ControlIndex, EmbeddingGenerator, Progress, SearchResult,
};

use crate::{Args, Command, IndexArgs};

/// Progress sink that reports through tracing
struct TracingProgress;

impl Progress for TracingProgress {
    fn progress(&mut self, current: usize, total: usize, message: &str) {
        tracing::info!("[{:5.1}%] {}", percent(current, total), message);
    }
}

pub fn run(args: Args) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Extract { xml, filter, json } => {
            run_extract(&xml, &filter.to_filter(), json, &mut out)
        }
        Command::Build { xml } => run_build(&xml, &args.index, &mut out),
        Command::Search { query, top_k, json } => {
            run_search(&query, top_k, json, &args.index, &mut out)
        }
        Command::Count => {
            let count = open_index(&args.index)?.count()?;
            writeln!(out, "{}", count)?;
            Ok(())
        }
    }
}

fn open_index(args: &IndexArgs) -> Result<ControlIndex> {
    let generator = EmbeddingGenerator::new(args.embedding_config())
        .context("Invalid embedding configuration")?;
    let index = ControlIndex::new(args.index_config(), generator)
        .context("Invalid index configuration")?;
    Ok(index)
}

fn run_extract(xml: &Path, filter: &ControlFilter, json: bool, out: &mut impl Write) -> Result<()> {
    let controls =
        extract(xml).with_context(|| format!("Failed to extract controls from {}", xml.display()))?;
    let matched = filter.apply(&controls);
    tracing::info!("{} of {} controls match", matched.len(), controls.len());

    if json {
        serde_json::to_writer_pretty(&mut *out, &matched)?;
        writeln!(out)?;
    } else {
        write_controls(&matched, out)?;
    }
    Ok(())
}

fn run_build(xml: &Path, args: &IndexArgs, out: &mut impl Write) -> Result<()> {
    tracing::info!("Loading controls from {}", xml.display());
    let controls =
        extract(xml).with_context(|| format!("Failed to extract controls from {}", xml.display()))?;
    tracing::info!("Loaded {} controls", controls.len());

    tracing::info!("Database path: {}", args.db.display());
    tracing::info!("Collection: {}", args.collection);
    tracing::info!("Model: {}", args.model);

    let mut index = open_index(args)?;
    index
        .rebuild(&controls, &mut TracingProgress)
        .context("Failed to build index")?;

    let count = index.count()?;
    writeln!(out, "Indexed {} controls ({} entries in collection)", controls.len(), count)?;
    Ok(())
}

fn run_search(
    query: &str,
    top_k: usize,
    json: bool,
    args: &IndexArgs,
    out: &mut impl Write,
) -> Result<()> {
    let mut index = open_index(args)?;
    let results = index.search(query, top_k).context("Search failed")?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &results)?;
        writeln!(out)?;
    } else {
        write_results(&results, out)?;
    }
    Ok(())
}

fn write_controls(controls: &[&Control], out: &mut impl Write) -> std::io::Result<()> {
    for control in controls {
        writeln!(out, "{}\t{}\t{}", control.identifier(), control.name(), control.uri())?;
    }
    Ok(())
}

fn write_results(results: &[SearchResult], out: &mut impl Write) -> std::io::Result<()> {
    if results.is_empty() {
        return writeln!(out, "No results");
    }
    for (rank, result) in results.iter().enumerate() {
        let name = result.metadata.get("name").map(String::as_str).unwrap_or("");
        writeln!(
            out,
            "{:>3}. {:.4}  {}  {}",
            rank + 1,
            result.distance,
            result.identifier(),
            name
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<document xmlns:d="http://v8.1c.ru/8.2/data/spreadsheet" xmlns:v8="http://v8.1c.ru/8.1/data/core">
  <d:rowsItem><d:row>
    <d:c><v8:item><v8:content>Идентификатор</v8:content></v8:item></d:c>
    <d:c><v8:item><v8:content>Наименование</v8:content></v8:item></d:c>
  </d:row></d:rowsItem>
  <d:rowsItem><d:row>
    <d:c><v8:item><v8:content>A1</v8:content></v8:item></d:c>
    <d:c><v8:item><v8:content>Alpha</v8:content></v8:item></d:c>
  </d:row></d:rowsItem>
  <d:rowsItem><d:row>
    <d:c><v8:item><v8:content>B2</v8:content></v8:item></d:c>
    <d:c><v8:item><v8:content>Beta</v8:content></v8:item></d:c>
  </d:row></d:rowsItem>
</document>"#;

    fn control(identifier: &str, name: &str) -> Control {
        Control::builder()
            .identifier(identifier)
            .name(name)
            .uri("http://x")
            .build()
            .unwrap()
    }

    #[test]
    fn test_write_controls_table() {
        let a = control("A1", "Alpha");
        let b = control("B2", "Beta");
        let mut out = Vec::new();
        write_controls(&[&a, &b], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "A1\tAlpha\thttp://x\nB2\tBeta\thttp://x\n"
        );
    }

    #[test]
    fn test_write_results() {
        let mut metadata = BTreeMap::new();
        metadata.insert("identifier".to_string(), "A1".to_string());
        metadata.insert("name".to_string(), "Alpha".to_string());
        let results = vec![SearchResult {
            id: "control_0_A1".to_string(),
            metadata,
            document: "Идентификатор: A1".to_string(),
            distance: 0.125,
        }];

        let mut out = Vec::new();
        write_results(&results, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "  1. 0.1250  A1  Alpha\n");

        let mut out = Vec::new();
        write_results(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No results\n");
    }

    #[test]
    fn test_extract_applies_filter() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Template.xml");
        std::fs::write(&path, EXPORT).unwrap();

        let mut out = Vec::new();
        run_extract(&path, &ControlFilter::default(), false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A1\tAlpha\t\nB2\tBeta\t\n");

        let filter = ControlFilter {
            identifier: "b2".to_string(),
            ..Default::default()
        };
        let mut out = Vec::new();
        run_extract(&path, &filter, true, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["identifier"], "B2");
        assert_eq!(items[0]["name"], "Beta");
    }

    #[test]
    fn test_extract_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut out = Vec::new();
        let err = run_extract(
            &dir.path().join("missing.xml"),
            &ControlFilter::default(),
            false,
            &mut out,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("Not found"));
    }
}
