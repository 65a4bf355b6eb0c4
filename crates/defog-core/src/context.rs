//! Per-visit context and the slot-bound replacement capability.
//!
//! Every dequeued node is handed to the active stage wrapped in a
//! [`Context`]: the node, its parent, a [`Slot`] describing the exact
//! position the node occupies, the pass-wide modification flag shared with
//! the driver, and a view of the symbol table as of the current scope.
//!
//! `replace` installs a new node into the slot and marks both the context
//! and the pass as modified; the driver then skips descent into the old
//! subtree for the rest of the pass. The new node becomes eligible on the
//! next pass.

use std::cell::Cell;
use std::rc::Rc;

use crate::node::{AstKind, AstNode, FieldSlot, NodeId, NodeRef};
use crate::scope::{ScopeId, SymbolTable};

/// Modification flag for one traversal pass, shared between the driver and
/// every context it creates.
#[derive(Debug, Default)]
pub struct PassFlags {
    modified: Cell<bool>,
}

impl PassFlags {
    pub fn set_modified(&self) {
        self.modified.set(true);
    }

    pub fn is_modified(&self) -> bool {
        self.modified.get()
    }

    pub fn reset(&self) {
        self.modified.set(false);
    }
}

/// Describes the position a node occupies inside its parent, and therefore
/// where a replacement must be installed.
#[derive(Debug, Clone)]
pub enum Slot {
    /// The engine's root handle.
    Root(Rc<std::cell::RefCell<NodeRef>>),
    /// A keyed entry of a raw mapping.
    Key { parent: NodeRef, key: String },
    /// An indexed element of a raw sequence.
    Index { parent: NodeRef, index: usize },
    /// A named child position of a typed variant.
    Field { parent: NodeRef, field: FieldSlot },
}

impl Slot {
    /// Install `new` at this slot. Returns false when the slot no longer
    /// exists (the parent was itself replaced or reshaped earlier in the
    /// pass); nothing is changed in that case.
    pub fn install(&self, new: NodeRef) -> bool {
        match self {
            Slot::Root(handle) => {
                *handle.borrow_mut() = new;
                true
            }
            Slot::Key { parent, key } => {
                let mut parent = parent.borrow_mut();
                match &mut parent.kind {
                    AstKind::Mapping { entries } if entries.contains_key(key) => {
                        entries.insert(key.clone(), new);
                        true
                    }
                    _ => false,
                }
            }
            Slot::Index { parent, index } => {
                let mut parent = parent.borrow_mut();
                match &mut parent.kind {
                    AstKind::Sequence { items } if *index < items.len() => {
                        items[*index] = new;
                        true
                    }
                    _ => false,
                }
            }
            Slot::Field { parent, field } => install_field(parent, field, new),
        }
    }
}

fn install_field(parent: &NodeRef, field: &FieldSlot, new: NodeRef) -> bool {
    let mut parent = parent.borrow_mut();
    match (&mut parent.kind, field) {
        (AstKind::Var { value, .. }, FieldSlot::VarValue) => {
            *value = Some(new);
            true
        }
        (AstKind::BinOp { left, .. }, FieldSlot::BinLeft) => {
            *left = new;
            true
        }
        (AstKind::BinOp { right, .. }, FieldSlot::BinRight) => {
            *right = new;
            true
        }
        (AstKind::Attribute { source, .. }, FieldSlot::AttrSource) => {
            *source = new;
            true
        }
        (AstKind::Call { func, .. }, FieldSlot::CallFunc) => {
            *func = new;
            true
        }
        (AstKind::Call { args, .. }, FieldSlot::CallArg(i)) if *i < args.len() => {
            args[*i] = new;
            true
        }
        (AstKind::Call { kwargs, .. }, FieldSlot::CallKeyword(key))
            if kwargs.contains_key(key) =>
        {
            kwargs.insert(key.clone(), new);
            true
        }
        (AstKind::Subscript { value, .. }, FieldSlot::SubValue) => {
            *value = new;
            true
        }
        (AstKind::Subscript { lower, .. }, FieldSlot::SubLower) => {
            *lower = Some(new);
            true
        }
        (AstKind::Subscript { upper, .. }, FieldSlot::SubUpper) => {
            *upper = Some(new);
            true
        }
        (AstKind::Subscript { step, .. }, FieldSlot::SubStep) => {
            *step = Some(new);
            true
        }
        (AstKind::FunctionDef { args, .. }, FieldSlot::FuncArg(i)) if *i < args.len() => {
            args[*i] = new;
            true
        }
        (AstKind::FunctionDef { body, .. }, FieldSlot::FuncBody(i)) if *i < body.len() => {
            body[*i] = new;
            true
        }
        (AstKind::ClassDef { bases, .. }, FieldSlot::ClassBase(i)) if *i < bases.len() => {
            bases[*i] = new;
            true
        }
        (AstKind::ClassDef { body, .. }, FieldSlot::ClassBody(i)) if *i < body.len() => {
            body[*i] = new;
            true
        }
        (AstKind::If { test, .. }, FieldSlot::IfTest) => {
            *test = new;
            true
        }
        (AstKind::If { body, .. }, FieldSlot::IfBody(i)) if *i < body.len() => {
            body[*i] = new;
            true
        }
        (AstKind::If { orelse, .. }, FieldSlot::IfElse(i)) if *i < orelse.len() => {
            orelse[*i] = new;
            true
        }
        (AstKind::Return { value }, FieldSlot::ReturnValue) => {
            *value = Some(new);
            true
        }
        _ => false,
    }
}

/// Per-visit record handed to stages.
#[derive(Debug)]
pub struct Context {
    node: NodeRef,
    parent: Option<NodeRef>,
    slot: Slot,
    flags: Rc<PassFlags>,
    modified: Cell<bool>,
    table: Option<Rc<SymbolTable>>,
    scope: ScopeId,
}

impl Context {
    /// The root context of a pass; its slot rewires the engine's root
    /// handle.
    pub fn root(
        handle: Rc<std::cell::RefCell<NodeRef>>,
        flags: Rc<PassFlags>,
        table: Option<Rc<SymbolTable>>,
    ) -> Self {
        let node = handle.borrow().clone();
        Self {
            node,
            parent: None,
            slot: Slot::Root(handle),
            flags,
            modified: Cell::new(false),
            table,
            scope: ScopeId::GLOBAL,
        }
    }

    /// A child context bound to the given slot of this context's node.
    pub fn child(&self, node: NodeRef, slot: Slot, scope: ScopeId) -> Self {
        Self {
            node,
            parent: Some(self.node.clone()),
            slot,
            flags: self.flags.clone(),
            modified: Cell::new(false),
            table: self.table.clone(),
            scope,
        }
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn node_id(&self) -> NodeId {
        self.node.borrow().id
    }

    pub fn parent(&self) -> Option<&NodeRef> {
        self.parent.as_ref()
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Whether a replacement happened through this context.
    pub fn was_modified(&self) -> bool {
        self.modified.get()
    }

    /// Swap the referenced slot to `new`. The replacement inherits the old
    /// node's line number when it carries none, and both the context and
    /// the pass are flagged modified. Returns the installed handle.
    pub fn replace(&self, new: AstNode) -> NodeRef {
        let line = new.line.or(self.node.borrow().line);
        let new_ref = new.with_line(line).into_ref();
        if self.slot.install(new_ref.clone()) {
            self.modified.set(true);
            self.flags.set_modified();
        } else {
            tracing::debug!("replacement slot vanished, leaving node untouched");
        }
        new_ref
    }

    /// Flag the pass as modified without replacing the node. Used by rules
    /// that rewrite a node's fields in place.
    pub fn touch(&self) {
        self.flags.set_modified();
    }

    /// Resolve a name through the symbol table as of this context's scope.
    pub fn lookup(&self, name: &str) -> Option<NodeRef> {
        self.table.as_ref()?.lookup(self.scope, name)
    }
}
