//! Symbol collection: builds the lexical symbol table a rewrite pass
//! resolves names against.
//!
//! One recursive walk over the tree binds every definition the rules care
//! about: single-name assignments, function and class definitions, and
//! import aliases. Function and class bodies get their own scope. The walk
//! tracks visited identities because resolution rules alias subtrees, and
//! bounds its depth so pathological chains degrade instead of overflowing.

use std::collections::HashSet;

use tracing::debug;

use defog_core::{AstKind, NodeId, NodeRef, ScopeStack, SymbolTable};

const MAX_COLLECT_DEPTH: usize = 512;

/// Build a fresh symbol table for the tree rooted at `root`.
pub fn collect_symbols(root: &NodeRef) -> SymbolTable {
    let mut table = SymbolTable::new();
    {
        let mut scopes = ScopeStack::new(&mut table);
        let mut seen = HashSet::new();
        walk(root, &mut scopes, &mut seen, 0);
    }
    table
}

enum Plan {
    /// Bind the node under `name`, then walk the bound value.
    Definition { name: String, value: NodeRef },
    /// Bind the node under `name` and walk `children` in a fresh scope
    /// owned by `owner`.
    ScopeOwner {
        name: String,
        owner: NodeId,
        children: Vec<NodeRef>,
    },
    /// Bind the node under each alias; imports have no children.
    Aliases(Vec<String>),
    Children(Vec<NodeRef>),
}

fn walk(node: &NodeRef, scopes: &mut ScopeStack<'_>, seen: &mut HashSet<NodeId>, depth: usize) {
    if depth > MAX_COLLECT_DEPTH {
        debug!("symbol collection depth exhausted, skipping subtree");
        return;
    }

    let plan = {
        let borrowed = node.borrow();
        if !seen.insert(borrowed.id) {
            return;
        }
        match &borrowed.kind {
            AstKind::Var {
                name,
                value: Some(value),
            } => Plan::Definition {
                name: name.clone(),
                value: value.clone(),
            },
            AstKind::FunctionDef { name, args, body } => Plan::ScopeOwner {
                name: name.clone(),
                owner: borrowed.id,
                children: args.iter().chain(body).cloned().collect(),
            },
            AstKind::ClassDef { name, bases, body } => Plan::ScopeOwner {
                name: name.clone(),
                owner: borrowed.id,
                children: bases.iter().chain(body).cloned().collect(),
            },
            AstKind::Import { names } => Plan::Aliases(names.keys().cloned().collect()),
            AstKind::Mapping { entries } => {
                Plan::Children(entries.values().cloned().collect())
            }
            AstKind::Sequence { items } => Plan::Children(items.clone()),
            _ => Plan::Children(
                borrowed
                    .child_slots()
                    .into_iter()
                    .map(|(_, child)| child)
                    .collect(),
            ),
        }
    };

    match plan {
        Plan::Definition { name, value } => {
            scopes.bind(&name, node);
            walk(&value, scopes, seen, depth + 1);
        }
        Plan::ScopeOwner {
            name,
            owner,
            children,
        } => {
            scopes.bind(&name, node);
            scopes.push_scope(Some(owner));
            for child in children {
                walk(&child, scopes, seen, depth + 1);
            }
            scopes.pop_scope();
        }
        Plan::Aliases(aliases) => {
            for alias in aliases {
                scopes.bind(&alias, node);
            }
        }
        Plan::Children(children) => {
            for child in children {
                walk(&child, scopes, seen, depth + 1);
            }
        }
    }
}
