//! Terminal pass-through stage.
//!
//! Runs after the rewrite stage so downstream consumers receive a tree with
//! the `traversed` flag set. Analysis stages supplied by the host register
//! alongside it and typically run between `rewrite` and `readonly`.

use defog_core::{Context, Stage};

/// The `readonly` stage: visits every node, modifies nothing.
#[derive(Debug, Default)]
pub struct ReadonlyStage;

impl Stage for ReadonlyStage {
    fn name(&self) -> &'static str {
        "readonly"
    }

    fn visit_node(&mut self, _ctx: &Context) {}
}
