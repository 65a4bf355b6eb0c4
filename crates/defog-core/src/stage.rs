//! Stage registry and pipeline.
//!
//! Stages are discovered by name through a host-extensible registry and run
//! in order, each to convergence, each handing its tree to the next.
//! Unknown names fail before any traversal starts.

use std::collections::HashMap;

use defog_error::{Error, Result};
use tracing::debug;

use crate::node::NodeRef;
use crate::options::EngineOptions;
use crate::visit::{Stage, Walker};

/// Default stage order when `ast-stages` is not configured.
pub const DEFAULT_STAGES: &[&str] = &["convert", "rewrite", "readonly"];

type StageCtor = Box<dyn Fn() -> Box<dyn Stage>>;

/// Registry of stage constructors keyed by stage name.
#[derive(Default)]
pub struct StageRegistry {
    ctors: HashMap<String, StageCtor>,
}

impl StageRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Register a stage constructor under `name`. A later registration for
    /// the same name replaces the earlier one.
    pub fn register(&mut self, name: impl Into<String>, ctor: StageCtor) {
        self.ctors.insert(name.into(), ctor);
    }

    /// Construct a fresh stage instance by name.
    pub fn build(&self, name: &str) -> Option<Box<dyn Stage>> {
        self.ctors.get(name).map(|ctor| ctor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    /// All registered stage names.
    pub fn names(&self) -> Vec<&str> {
        self.ctors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}

/// Run the named stages over `tree` in order, each to convergence.
///
/// An empty `stages` list selects [`DEFAULT_STAGES`]. Every name is
/// resolved against the registry up front; an unknown name aborts before
/// the first traversal. Returns the walker of the last stage, which holds
/// the final tree and the `traversed` flag.
pub fn run_stages(
    tree: NodeRef,
    stages: &[String],
    registry: &StageRegistry,
    opts: &EngineOptions,
) -> Result<Walker> {
    let names: Vec<&str> = if stages.is_empty() {
        DEFAULT_STAGES.to_vec()
    } else {
        stages.iter().map(String::as_str).collect()
    };

    for name in &names {
        if !registry.contains(name) {
            return Err(Error::stage_not_found(*name).with_operation("stage::run_stages"));
        }
    }

    let mut tree = tree;
    let mut last: Option<Walker> = None;
    for name in names {
        let mut stage = registry
            .build(name)
            .expect("stage presence checked above");
        let mut walker = Walker::new(tree.clone(), opts.clone());
        walker.traverse(stage.as_mut());
        debug!(
            stage = name,
            iterations = walker.iterations(),
            "stage finished"
        );
        tree = walker.tree();
        last = Some(walker);
    }

    Ok(last.expect("stage list is never empty"))
}
