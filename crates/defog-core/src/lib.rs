//! Core engine for defog: the AST node universe, the traversal context with
//! its slot-bound replacement capability, the convergent visitor driver, the
//! lexical symbol table, and the stage pipeline.
//!
//! The crate is deliberately free of any rewrite semantics: stages implement
//! the [`Stage`] trait and are driven by a [`Walker`] until the tree reaches
//! a fixed point. The built-in stages live in `defog-rewrite`.

pub mod context;
pub mod interner;
pub mod json;
pub mod node;
pub mod options;
pub mod scope;
pub mod stage;
pub mod visit;

pub use context::{Context, PassFlags, Slot};
pub use defog_error::{Error, ErrorKind, Result};
pub use node::{AstKind, AstNode, AttrAction, BinOpKind, FieldSlot, NodeId, NodeRef};
pub use options::{ConcatOrder, EngineOptions};
pub use scope::{ScopeId, ScopeStack, SymbolTable};
pub use stage::{DEFAULT_STAGES, StageRegistry, run_stages};
pub use visit::{Stage, Walker};
