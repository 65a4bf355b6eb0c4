//! Tree loading: either a JSON file the parser already produced, or a live
//! invocation of the external parser process.
//!
//! A missing, empty, or unparseable tree is a `ParseFailed` error; the
//! engine never starts on partial input.

use std::process::Command;

use tracing::debug;

use defog_core::json::from_json;
use defog_core::{Error, NodeRef, Result};

/// A tree ready for the pipeline, plus the source encoding the parser
/// reported at the root.
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: NodeRef,
    pub encoding: Option<String>,
}

/// Load an already-produced JSON tree from disk.
pub fn load_tree_file(path: &str) -> Result<LoadedTree> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::from(err)
            .with_operation("loader::load_tree_file")
            .with_context("path", path)
    })?;
    parse_payload(&raw, path)
}

/// Run the external parser over `path` and read the tree from its stdout.
///
/// The command string is split on whitespace; the source path is appended
/// as the final argument.
pub fn parse_source(parser_cmd: &str, path: &str) -> Result<LoadedTree> {
    let mut parts = parser_cmd.split_whitespace();
    let program = parts.next().ok_or_else(|| {
        Error::config_invalid("parser command is empty").with_operation("loader::parse_source")
    })?;

    let output = Command::new(program)
        .args(parts)
        .arg(path)
        .output()
        .map_err(|err| {
            Error::parse_failed(format!("failed to spawn parser '{program}'"))
                .with_operation("loader::parse_source")
                .with_context("file", path)
                .set_source(err)
        })?;

    if !output.status.success() {
        return Err(Error::parse_failed(format!(
            "parser exited with {}",
            output.status
        ))
        .with_operation("loader::parse_source")
        .with_context("file", path));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    parse_payload(&raw, path)
}

fn parse_payload(raw: &str, path: &str) -> Result<LoadedTree> {
    if raw.trim().is_empty() {
        return Err(Error::parse_failed("parser produced no tree")
            .with_operation("loader::parse_payload")
            .with_context("file", path));
    }

    let value: serde_json::Value = serde_json::from_str(raw).map_err(|err| {
        Error::parse_failed("tree payload is not valid json")
            .with_operation("loader::parse_payload")
            .with_context("file", path)
            .set_source(err)
    })?;

    if !value.is_object() {
        return Err(Error::parse_failed("tree root is not a mapping")
            .with_operation("loader::parse_payload")
            .with_context("file", path));
    }

    let encoding = value
        .get("encoding")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);
    if let Some(encoding) = &encoding {
        debug!(file = path, encoding, "tree loaded");
    }

    Ok(LoadedTree {
        tree: from_json(&value),
        encoding,
    })
}
