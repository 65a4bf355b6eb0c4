//! defog command-line interface.
//!
pub mod loader;
pub mod options;
pub mod pipeline;

use defog_core::Result;

pub use loader::{LoadedTree, load_tree_file, parse_source};
pub use options::DefogOptions;
pub use pipeline::{FileReport, process_input};

/// Main entry point: process every input and render the reports as JSON.
pub fn run_main(opts: &DefogOptions) -> Result<Option<String>> {
    let reports = pipeline::process_all(opts)?;
    if reports.is_empty() {
        return Ok(None);
    }
    pipeline::render_reports(&reports, opts.pretty).map(Some)
}
