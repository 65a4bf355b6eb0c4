//! Engine configuration knobs.

use std::collections::HashSet;

/// Which operand supplies the leading text when folding `BinOp(add)` over
/// two strings. `RightThenLeft` mirrors the operand order the upstream
/// parser hands us; hosts whose parser keeps source order want
/// `LeftThenRight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatOrder {
    #[default]
    RightThenLeft,
    LeftThenRight,
}

/// Recognized engine options and their defaults.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Hard cap on traversal passes (`max-ast-iterations`).
    pub max_iterations: u32,
    /// Per-pass enqueue cap (`max-ast-queue-size`).
    pub max_queue_size: usize,
    /// Ordered stage names to run (`ast-stages`); empty means the default
    /// stage order.
    pub stages: Vec<String>,
    /// Lines that trigger a diagnostic break when visited (`debug-lines`).
    pub debug_lines: HashSet<u32>,
    /// Extra quiet passes after the tree stopped changing.
    pub convergence: u32,
    /// String-concatenation operand order for the rewrite stage.
    pub concat_order: ConcatOrder,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            max_queue_size: 10_000,
            stages: Vec::new(),
            debug_lines: debug_lines_from_env(),
            convergence: 1,
            concat_order: ConcatOrder::default(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_debug_lines(mut self, debug_lines: HashSet<u32>) -> Self {
        self.debug_lines = debug_lines;
        self
    }

    pub fn with_convergence(mut self, convergence: u32) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_concat_order(mut self, concat_order: ConcatOrder) -> Self {
        self.concat_order = concat_order;
        self
    }
}

/// Parse `DEFOG_DEBUG_LINES` (comma-separated line numbers) from the
/// environment. Unparseable entries are ignored.
pub fn debug_lines_from_env() -> HashSet<u32> {
    match std::env::var("DEFOG_DEBUG_LINES") {
        Ok(raw) => raw
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        Err(_) => HashSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_knobs() {
        let opts = EngineOptions::default();
        assert_eq!(opts.max_iterations, 500);
        assert_eq!(opts.max_queue_size, 10_000);
        assert!(opts.stages.is_empty());
        assert_eq!(opts.convergence, 1);
        assert_eq!(opts.concat_order, ConcatOrder::RightThenLeft);
    }

    #[test]
    fn builders_override_fields() {
        let opts = EngineOptions::new()
            .with_max_iterations(7)
            .with_max_queue_size(3)
            .with_convergence(0)
            .with_concat_order(ConcatOrder::LeftThenRight);
        assert_eq!(opts.max_iterations, 7);
        assert_eq!(opts.max_queue_size, 3);
        assert_eq!(opts.convergence, 0);
        assert_eq!(opts.concat_order, ConcatOrder::LeftThenRight);
    }
}
