//! Convergent traversal driver.
//!
//! A [`Walker`] traverses the tree from the root in breadth-first order
//! using a FIFO queue of contexts, handing every node to the active
//! [`Stage`]. If any visit modified the tree, another pass is made, up to a
//! hard iteration cap. After a quiet pass a configurable number of extra
//! passes run as a safety margin for stages that modify the tree without
//! flagging it.
//!
//! Within one pass each node identity is processed at most once: rewrites
//! can alias earlier material back into the queue, and the processed set
//! keeps that from looping.

use std::collections::{HashSet, VecDeque};
use std::io::{BufRead, IsTerminal};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::context::{Context, PassFlags, Slot};
use crate::node::{AstKind, FieldSlot, NodeId, NodeRef};
use crate::options::EngineOptions;
use crate::scope::{ScopeId, SymbolTable};

/// One stage of the pipeline: a visitor variant driven to convergence by a
/// [`Walker`].
pub trait Stage {
    /// Stage name as used in the registry and `ast-stages`.
    fn name(&self) -> &'static str;

    /// Called at the start of every pass. `rebuild` is true on the first
    /// pass and after any pass that modified the tree; return a fresh
    /// symbol table to swap it in, or `None` to keep the current one.
    fn prepare_pass(&mut self, _root: &NodeRef, _rebuild: bool) -> Option<Rc<SymbolTable>> {
        None
    }

    /// Called once per pass with the root context, before the queue drains.
    fn init_visit(&mut self, _ctx: &Context) {}

    /// Visit one node. Replace or mutate it through the context.
    fn visit_node(&mut self, ctx: &Context);

    /// Called once after the final pass.
    fn post_analysis(&mut self, _walker: &mut Walker) {}
}

/// Descent plan for one node, captured under a short borrow.
enum Descent {
    Map(Vec<(String, NodeRef)>),
    Seq(Vec<NodeRef>),
    Fields(Vec<(FieldSlot, NodeRef)>),
    Leaf,
}

/// The visitor driver: owns the root handle, the pending queue, and the
/// convergence bookkeeping.
#[derive(Debug)]
pub struct Walker {
    root: Rc<std::cell::RefCell<NodeRef>>,
    queue: VecDeque<Context>,
    flags: Rc<PassFlags>,
    modified: bool,
    iteration: u32,
    convergence: u32,
    opts: EngineOptions,
    table: Option<Rc<SymbolTable>>,
    /// Set once the driver has run to completion on this tree.
    pub traversed: bool,
}

impl Walker {
    pub fn new(root: NodeRef, opts: EngineOptions) -> Self {
        let convergence = opts.convergence;
        Self {
            root: Rc::new(std::cell::RefCell::new(root)),
            queue: VecDeque::new(),
            flags: Rc::new(PassFlags::default()),
            modified: false,
            iteration: 0,
            convergence,
            opts,
            table: None,
            traversed: false,
        }
    }

    /// The current tree root. Replacing the root through a context rewires
    /// this handle.
    pub fn tree(&self) -> NodeRef {
        self.root.borrow().clone()
    }

    /// Passes run by the last `traverse` call.
    pub fn iterations(&self) -> u32 {
        self.iteration
    }

    /// The symbol table active for the current pass, if any stage supplied
    /// one.
    pub fn symbols(&self) -> Option<Rc<SymbolTable>> {
        self.table.clone()
    }

    /// Run `stage` over the tree until it converges, the convergence margin
    /// is spent, or the iteration cap trips.
    pub fn traverse(&mut self, stage: &mut dyn Stage) -> NodeRef {
        self.iteration = 0;
        self.modified = false;
        self.convergence = self.opts.convergence;

        while self.iteration == 0 || self.modified || self.convergence > 0 {
            self.queue.clear();
            let modified_last_pass = self.modified;
            if self.modified {
                // Reset the quiet-pass margin whenever the tree changed.
                self.convergence = self.opts.convergence;
            } else if self.convergence > 0 {
                self.convergence -= 1;
            }
            self.modified = false;
            self.flags.reset();

            if let Some(table) =
                stage.prepare_pass(&self.tree(), self.iteration == 0 || modified_last_pass)
            {
                self.table = Some(table);
            }

            let root_ctx = Context::root(self.root.clone(), self.flags.clone(), self.table.clone());
            stage.init_visit(&root_ctx);
            self.queue.push_back(root_ctx);

            let mut processed: HashSet<NodeId> = HashSet::new();
            while let Some(ctx) = self.queue.pop_front() {
                let id = ctx.node_id();
                // Processed identities are skipped so nodes that alias
                // themselves back into the queue cannot loop.
                if processed.contains(&id) {
                    continue;
                }
                self.process_context(stage, &ctx);
                processed.insert(id);
            }

            self.modified = self.flags.is_modified();
            self.iteration += 1;
            if self.iteration >= self.opts.max_iterations {
                warn!(
                    stage = stage.name(),
                    iterations = self.iteration,
                    "iteration cap hit before convergence, yielding current tree"
                );
                break;
            }
        }

        stage.post_analysis(self);
        self.traversed = true;
        debug!(
            stage = stage.name(),
            iterations = self.iteration,
            "tree visitor converged"
        );
        self.tree()
    }

    fn process_context(&mut self, stage: &mut dyn Stage, ctx: &Context) {
        stage.visit_node(ctx);
        if ctx.was_modified() {
            // The old node was swapped out; its replacement is visited on
            // the next pass, not this one.
            return;
        }

        self.maybe_debug_break(ctx);

        let node = ctx.node().clone();
        let descent = {
            let borrowed = node.borrow();
            match &borrowed.kind {
                AstKind::Mapping { entries } => Descent::Map(
                    entries
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ),
                AstKind::Sequence { items } => Descent::Seq(items.clone()),
                _ => {
                    let fields = borrowed.child_slots();
                    if fields.is_empty() {
                        Descent::Leaf
                    } else {
                        Descent::Fields(fields)
                    }
                }
            }
        };
        let scope = self.child_scope(ctx, &node);

        match descent {
            Descent::Map(entries) => {
                for (key, child) in entries {
                    let slot = Slot::Key {
                        parent: node.clone(),
                        key,
                    };
                    self.push(ctx.child(child, slot, scope));
                }
            }
            Descent::Seq(items) => {
                for (index, child) in items.into_iter().enumerate() {
                    let slot = Slot::Index {
                        parent: node.clone(),
                        index,
                    };
                    self.push(ctx.child(child, slot, scope));
                }
            }
            Descent::Fields(fields) => {
                for (field, child) in fields {
                    let slot = Slot::Field {
                        parent: node.clone(),
                        field,
                    };
                    self.push(ctx.child(child, slot, scope));
                }
            }
            Descent::Leaf => {}
        }
    }

    /// Enqueue a child context, dropping it with a warning when the
    /// per-pass cap is hit. Traversal continues but is under-approximate
    /// for the dropped subtree.
    fn push(&mut self, ctx: Context) {
        if self.queue.len() >= self.opts.max_queue_size {
            warn!("ast queue size exceeded, dropping traversal node");
            return;
        }
        self.queue.push_back(ctx);
    }

    /// Scope for children of `node`: the scope the node introduces if it
    /// owns one, otherwise the node's own scope.
    fn child_scope(&self, ctx: &Context, node: &NodeRef) -> ScopeId {
        if let Some(table) = &self.table {
            let id = node.borrow().id;
            if let Some(scope) = table.scope_of(id) {
                return scope;
            }
        }
        ctx.scope()
    }

    /// Diagnostic break on configured lines: log the visit and, when stdin
    /// is interactive, wait for Enter.
    fn maybe_debug_break(&self, ctx: &Context) {
        if self.opts.debug_lines.is_empty() {
            return;
        }
        let line = match ctx.node().borrow().line {
            Some(line) if self.opts.debug_lines.contains(&line) => line,
            _ => return,
        };
        let kind = ctx.node().borrow().kind_name();
        warn!(line, kind, "debug-lines break");
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            let mut buf = String::new();
            let _ = stdin.lock().read_line(&mut buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AstNode;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    /// Records visited node ids; never modifies.
    struct Recorder {
        seen: Vec<NodeId>,
    }

    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn visit_node(&mut self, ctx: &Context) {
            self.seen.push(ctx.node_id());
        }
    }

    fn mapping(pairs: Vec<(&str, NodeRef)>) -> NodeRef {
        let mut entries = IndexMap::new();
        for (k, v) in pairs {
            entries.insert(k.to_string(), v);
        }
        AstNode::mapping(entries).into_ref()
    }

    #[test]
    fn quiet_tree_converges_in_one_pass() {
        // The margin is consumed at the top of the first pass, so a tree
        // that never changes finishes after a single traversal.
        let tree = mapping(vec![("a", AstNode::str("x").into_ref())]);
        let mut walker = Walker::new(tree, EngineOptions::default());
        let mut stage = Recorder { seen: Vec::new() };
        walker.traverse(&mut stage);

        assert_eq!(walker.iterations(), 1);
        assert!(walker.traversed);
    }

    #[test]
    fn margin_adds_quiet_pass_after_modification() {
        // modified pass, quiet pass, margin pass
        let tree = mapping(vec![("k", AstNode::str("before").into_ref())]);
        let mut walker = Walker::new(tree, EngineOptions::default());
        walker.traverse(&mut OneShot { fired: false });
        assert_eq!(walker.iterations(), 3);
    }

    #[test]
    fn traversal_is_breadth_first_in_insertion_order() {
        let a = AstNode::str("a").into_ref();
        let b = mapping(vec![("deep", AstNode::str("d").into_ref())]);
        let tree = mapping(vec![("a", a.clone()), ("b", b.clone())]);

        let root_id = tree.borrow().id;
        let a_id = a.borrow().id;
        let b_id = b.borrow().id;
        let d_id = b.borrow().as_mapping().unwrap()["deep"].borrow().id;

        let opts = EngineOptions::default().with_convergence(0);
        let mut walker = Walker::new(tree, opts);
        let mut stage = Recorder { seen: Vec::new() };
        walker.traverse(&mut stage);

        assert_eq!(stage.seen, vec![root_id, a_id, b_id, d_id]);
    }

    #[test]
    fn shared_nodes_are_processed_once_per_pass() {
        let shared = AstNode::str("s").into_ref();
        let tree = mapping(vec![("a", shared.clone()), ("b", shared.clone())]);

        let opts = EngineOptions::default().with_convergence(0);
        let mut walker = Walker::new(tree, opts);
        let mut stage = Recorder { seen: Vec::new() };
        walker.traverse(&mut stage);

        let shared_id = shared.borrow().id;
        let count = stage.seen.iter().filter(|id| **id == shared_id).count();
        assert_eq!(count, 1, "cycle guard must skip aliased revisits");
    }

    /// Replaces the root with a fresh node every visit, never converging.
    struct Oscillator;

    impl Stage for Oscillator {
        fn name(&self) -> &'static str {
            "oscillator"
        }

        fn visit_node(&mut self, ctx: &Context) {
            if ctx.parent().is_none() {
                ctx.replace(AstNode::str("flip"));
            }
        }
    }

    #[test]
    fn oscillating_rewrite_stops_at_iteration_cap() {
        let tree = AstNode::str("flop").into_ref();
        let opts = EngineOptions::default().with_max_iterations(7);
        let mut walker = Walker::new(tree, opts);
        walker.traverse(&mut Oscillator);

        assert_eq!(walker.iterations(), 7);
        assert!(walker.traversed, "cap exit still yields a traversed tree");
    }

    #[test]
    fn queue_cap_drops_excess_children_without_crashing() {
        let items: Vec<NodeRef> = (0..100)
            .map(|i| AstNode::str(format!("s{i}")).into_ref())
            .collect();
        let tree = AstNode::sequence(items).into_ref();

        let opts = EngineOptions::default()
            .with_convergence(0)
            .with_max_queue_size(10);
        let mut walker = Walker::new(tree, opts);
        let mut stage = Recorder { seen: Vec::new() };
        walker.traverse(&mut stage);

        // Root plus at most max_queue_size children.
        assert!(stage.seen.len() <= 11);
        assert!(walker.traversed);
    }

    /// Swaps a mapping entry on the first pass only.
    struct OneShot {
        fired: bool,
    }

    impl Stage for OneShot {
        fn name(&self) -> &'static str {
            "one_shot"
        }

        fn visit_node(&mut self, ctx: &Context) {
            if self.fired {
                return;
            }
            if ctx.node().borrow().as_str_value() == Some("before") {
                self.fired = true;
                ctx.replace(AstNode::str("after"));
            }
        }
    }

    #[test]
    fn modified_pass_triggers_another_pass() {
        let tree = mapping(vec![("k", AstNode::str("before").into_ref())]);
        let opts = EngineOptions::default().with_convergence(0);
        let mut walker = Walker::new(tree.clone(), opts);
        walker.traverse(&mut OneShot { fired: false });

        // Pass 1 modifies, pass 2 is quiet.
        assert_eq!(walker.iterations(), 2);
        let node = tree.borrow();
        let entries = node.as_mapping().unwrap();
        assert_eq!(entries["k"].borrow().as_str_value(), Some("after"));
    }

    #[test]
    fn root_replacement_rewires_tree_handle() {
        let tree = AstNode::str("flop").into_ref();
        let opts = EngineOptions::default().with_max_iterations(2);
        let mut walker = Walker::new(tree, opts);
        walker.traverse(&mut Oscillator);
        assert_eq!(walker.tree().borrow().as_str_value(), Some("flip"));
    }
}
