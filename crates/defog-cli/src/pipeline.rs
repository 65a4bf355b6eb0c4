//! Core processing pipeline: load tree → run stages → serialize result.

use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use defog_core::json::to_json;
use defog_core::{Error, Result, run_stages};
use defog_rewrite::default_registry;

use crate::DefogOptions;
use crate::loader::{self, LoadedTree};

/// One input for the pipeline.
#[derive(Debug, Clone)]
pub enum Input {
    /// A JSON tree file the parser already produced.
    Tree(String),
    /// A source file requiring the external parser.
    Source(String),
}

impl Input {
    pub fn path(&self) -> &str {
        match self {
            Input::Tree(path) | Input::Source(path) => path,
        }
    }
}

/// The converged result for one input file.
#[derive(Debug)]
pub struct FileReport {
    pub path: String,
    pub encoding: Option<String>,
    pub iterations: u32,
    pub tree: serde_json::Value,
}

/// Run the full pipeline over one input.
pub fn process_input(opts: &DefogOptions, input: &Input) -> Result<FileReport> {
    let start = Instant::now();
    let LoadedTree { tree, encoding } = match input {
        Input::Tree(path) => loader::load_tree_file(path)?,
        Input::Source(path) => {
            let parser_cmd = opts.parser_cmd.as_deref().ok_or_else(|| {
                Error::config_invalid("source inputs require --parser-cmd")
                    .with_operation("pipeline::process_input")
            })?;
            loader::parse_source(parser_cmd, path)?
        }
    };

    let engine = opts.engine_options();
    let registry = default_registry(&engine);
    let walker = run_stages(tree, &engine.stages, &registry, &engine)?;

    info!(
        file = input.path(),
        iterations = walker.iterations(),
        seconds = start.elapsed().as_secs_f64(),
        "pipeline finished"
    );

    Ok(FileReport {
        path: input.path().to_string(),
        encoding,
        iterations: walker.iterations(),
        tree: to_json(&walker.tree()),
    })
}

/// Process every configured input. Independent files run in parallel, each
/// with its own tree, queue, and symbol table.
pub fn process_all(opts: &DefogOptions) -> Result<Vec<FileReport>> {
    let inputs: Vec<Input> = opts
        .trees
        .iter()
        .cloned()
        .map(Input::Tree)
        .chain(opts.files.iter().cloned().map(Input::Source))
        .collect();

    inputs
        .par_iter()
        .map(|input| process_input(opts, input))
        .collect()
}

/// Render reports as a JSON document: a single object for one input, an
/// array otherwise.
pub fn render_reports(reports: &[FileReport], pretty: bool) -> Result<String> {
    let values: Vec<serde_json::Value> = reports
        .iter()
        .map(|report| {
            serde_json::json!({
                "path": report.path,
                "encoding": report.encoding,
                "iterations": report.iterations,
                "tree": report.tree,
            })
        })
        .collect();
    let document = if values.len() == 1 {
        values.into_iter().next().expect("one report")
    } else {
        serde_json::Value::Array(values)
    };

    let rendered = if pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    };
    rendered.map_err(|err| {
        Error::new(
            defog_core::ErrorKind::DeserializationFailed,
            "failed to serialize reports",
        )
        .with_operation("pipeline::render_reports")
        .set_source(err)
    })
}
