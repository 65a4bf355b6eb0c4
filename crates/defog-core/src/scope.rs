//! Scope management and symbol lookup.
//!
//! The symbol table (the rewriter's "stack") is a lexical tree of scopes:
//! the global scope at the root, one child scope per function or class body.
//! Bindings map a name to the node that defines it. The table never owns
//! AST nodes: bindings hold `Weak` references, so a definition detached by a
//! rewrite simply stops resolving.
//!
//! The table is built by the symbol collector before a rewrite pass and is
//! read-only while the pass runs; rules see a consistent view.

use std::collections::HashMap;
use std::rc::Weak;

use crate::interner::{InternPool, InternedStr};
use crate::node::{AstNode, NodeId, NodeRef};

/// Identifies a scope within one [`SymbolTable`]. Scope 0 is the global
/// scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

/// A single binding: a non-owning reference to the defining node.
#[derive(Debug, Clone)]
pub struct Binding {
    node: Weak<std::cell::RefCell<AstNode>>,
}

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    owner: Option<NodeId>,
    bindings: HashMap<InternedStr, Binding>,
}

/// Lexical mapping from name to defining node.
#[derive(Debug)]
pub struct SymbolTable {
    interner: InternPool,
    scopes: Vec<ScopeData>,
    by_owner: HashMap<NodeId, ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table holding only the empty global scope.
    pub fn new() -> Self {
        Self {
            interner: InternPool::new(),
            scopes: vec![ScopeData::default()],
            by_owner: HashMap::new(),
        }
    }

    /// Add a child scope under `parent`, optionally owned by the node that
    /// introduces it (a function or class definition).
    pub fn add_scope(&mut self, parent: ScopeId, owner: Option<NodeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            owner,
            bindings: HashMap::new(),
        });
        if let Some(owner) = owner {
            self.by_owner.insert(owner, id);
        }
        id
    }

    /// Bind `name` to its defining node in `scope`. A later binding for the
    /// same name shadows the earlier one.
    pub fn bind(&mut self, scope: ScopeId, name: &str, node: &NodeRef) {
        let key = self.interner.intern(name);
        let binding = Binding {
            node: std::rc::Rc::downgrade(node),
        };
        self.scopes[scope.0 as usize].bindings.insert(key, binding);
    }

    /// Look `name` up in `scope` and its enclosing scopes. Returns the
    /// defining node, or `None` when unbound or already detached from the
    /// tree.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<NodeRef> {
        let key = self.interner.get(name)?;
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = self.scopes.get(id.0 as usize)?;
            if let Some(binding) = data.bindings.get(&key) {
                return binding.node.upgrade();
            }
            current = data.parent;
        }
        None
    }

    /// The scope introduced by `owner`, if any.
    pub fn scope_of(&self, owner: NodeId) -> Option<ScopeId> {
        self.by_owner.get(&owner).copied()
    }

    /// Total number of scopes (global included).
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Number of bindings across all scopes.
    pub fn binding_count(&self) -> usize {
        self.scopes.iter().map(|s| s.bindings.len()).sum()
    }
}

/// Push/pop discipline over a [`SymbolTable`], used while collecting
/// symbols. The stack starts at the global scope.
#[derive(Debug)]
pub struct ScopeStack<'t> {
    table: &'t mut SymbolTable,
    stack: Vec<ScopeId>,
}

impl<'t> ScopeStack<'t> {
    pub fn new(table: &'t mut SymbolTable) -> Self {
        Self {
            table,
            stack: vec![ScopeId::GLOBAL],
        }
    }

    /// Current nesting depth; 1 means only the global scope is active.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost scope.
    #[inline]
    pub fn current(&self) -> ScopeId {
        *self.stack.last().expect("scope stack is never empty")
    }

    /// Enter a fresh scope owned by `owner` and make it current.
    pub fn push_scope(&mut self, owner: Option<NodeId>) -> ScopeId {
        let id = self.table.add_scope(self.current(), owner);
        self.stack.push(id);
        id
    }

    /// Leave the current scope. The global scope cannot be popped.
    pub fn pop_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Bind `name` in the current scope.
    pub fn bind(&mut self, name: &str, node: &NodeRef) {
        let scope = self.current();
        self.table.bind(scope, name, node);
    }
}
