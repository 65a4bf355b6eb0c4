//! Shared CLI options for the defog binary.

use std::collections::HashSet;

use defog_core::{ConcatOrder, EngineOptions};

/// Options for running defog.
#[derive(Debug, Clone, Default)]
pub struct DefogOptions {
    /// Already-parsed JSON tree files.
    pub trees: Vec<String>,
    /// Source files to run the external parser over.
    pub files: Vec<String>,
    /// External parser command; receives the source path as its last
    /// argument and prints a JSON tree to stdout.
    pub parser_cmd: Option<String>,
    /// Write output here instead of stdout.
    pub output: Option<String>,
    /// Pretty-print the output JSON.
    pub pretty: bool,
    /// Ordered stage names; empty selects the default stage order.
    pub stages: Vec<String>,
    pub max_iterations: u32,
    pub max_queue_size: usize,
    pub debug_lines: Vec<u32>,
    /// Fold string concatenation in source order instead of the parser's
    /// inverted operand order.
    pub concat_source_order: bool,
}

impl DefogOptions {
    pub fn new() -> Self {
        Self {
            max_iterations: 500,
            max_queue_size: 10_000,
            ..Self::default()
        }
    }

    pub fn with_trees(mut self, trees: Vec<String>) -> Self {
        self.trees = trees;
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn with_parser_cmd(mut self, parser_cmd: Option<String>) -> Self {
        self.parser_cmd = parser_cmd;
        self
    }

    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Engine options corresponding to these CLI options.
    pub fn engine_options(&self) -> EngineOptions {
        let mut debug_lines: HashSet<u32> = defog_core::options::debug_lines_from_env();
        debug_lines.extend(&self.debug_lines);
        let concat_order = if self.concat_source_order {
            ConcatOrder::LeftThenRight
        } else {
            ConcatOrder::RightThenLeft
        };
        EngineOptions::new()
            .with_max_iterations(self.max_iterations)
            .with_max_queue_size(self.max_queue_size)
            .with_stages(self.stages.clone())
            .with_debug_lines(debug_lines)
            .with_concat_order(concat_order)
    }
}
