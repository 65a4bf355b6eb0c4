//! The AST node universe.
//!
//! Trees handed to the engine mix three top-level shapes: typed nodes
//! promoted by the conversion stage, raw key/value mappings straight out of
//! the external parser, and ordered sequences. All three live behind the
//! same [`AstNode`] wrapper so any slot in the tree can hold any of them.
//!
//! Nodes are shared as `Rc<RefCell<_>>`: rewrites swap whole slots through a
//! [`crate::Slot`] descriptor, and resolution rules deliberately alias a
//! definition's value node into the places that reference it. Identity for
//! the per-pass cycle guard comes from [`NodeId`], never from pointer values
//! (rewrites mint structurally equal subtrees, and a freed pointer can be
//! reused within a pass).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use strum_macros::{Display, EnumString};

/// Shared handle to a tree node.
pub type NodeRef = Rc<RefCell<AstNode>>;

/// Upper bound on dotted-name resolution depth. Aliased subtrees can form
/// reference chains (or, pathologically, cycles); resolution past this depth
/// yields `None` and the node is left as-is.
pub const MAX_NAME_DEPTH: u32 = 32;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Allocate the next monotonic id.
    pub fn allocate() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Binary operator tags, matching the lowercase tags the parser emits
/// (`add`, `sub`, ...) while also parsing the CPython class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum BinOpKind {
    #[strum(to_string = "add", serialize = "Add")]
    Add,
    #[strum(to_string = "sub", serialize = "Sub")]
    Sub,
    #[strum(to_string = "mult", serialize = "Mult", serialize = "mul")]
    Mult,
    #[strum(to_string = "div", serialize = "Div")]
    Div,
    #[strum(to_string = "floordiv", serialize = "FloorDiv")]
    FloorDiv,
    #[strum(to_string = "mod", serialize = "Mod")]
    Mod,
    #[strum(to_string = "pow", serialize = "Pow")]
    Pow,
    #[strum(to_string = "lshift", serialize = "LShift")]
    LShift,
    #[strum(to_string = "rshift", serialize = "RShift")]
    RShift,
    #[strum(to_string = "bitor", serialize = "BitOr")]
    BitOr,
    #[strum(to_string = "bitxor", serialize = "BitXor")]
    BitXor,
    #[strum(to_string = "bitand", serialize = "BitAnd")]
    BitAnd,
}

/// Whether an attribute access reads or writes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
pub enum AttrAction {
    #[default]
    Load,
    Store,
}

/// The tagged union of node shapes.
///
/// Typed variants carry their children as [`NodeRef`] slots; `Mapping` and
/// `Sequence` are the structural containers left over from the parser
/// output, matched by rules before the conversion stage has promoted them.
#[derive(Debug, Clone)]
pub enum AstKind {
    /// Textual literal.
    Str { value: String },
    /// Byte-string literal.
    Bytes { value: Vec<u8> },
    /// Integer literal.
    Num { value: i64 },
    /// Float literal. Kept only for parser-interface fidelity; no rule
    /// folds floats.
    Float { value: f64 },
    /// Boolean literal.
    Bool { value: bool },
    /// The `None` literal.
    Null,
    /// A name. `value: None` is a bare reference; `value: Some` is a
    /// definition binding the name to the value expression.
    Var {
        name: String,
        value: Option<NodeRef>,
    },
    BinOp {
        op: BinOpKind,
        left: NodeRef,
        right: NodeRef,
    },
    Attribute {
        source: NodeRef,
        attr: String,
        action: AttrAction,
        /// Pre-rewrite source, preserved for diagnostics when a resolution
        /// rule overwrites `source`.
        original: Option<NodeRef>,
    },
    Call {
        func: NodeRef,
        args: Vec<NodeRef>,
        kwargs: IndexMap<String, NodeRef>,
        /// Resolved fully qualified call target, if any rule produced one.
        full_name: Option<String>,
        /// Pre-rewrite callee, preserved when the callee slot is rewritten.
        original: Option<NodeRef>,
    },
    Subscript {
        value: NodeRef,
        lower: Option<NodeRef>,
        upper: Option<NodeRef>,
        step: Option<NodeRef>,
    },
    /// Import statement: local alias -> fully qualified name.
    Import { names: IndexMap<String, String> },
    FunctionDef {
        name: String,
        args: Vec<NodeRef>,
        body: Vec<NodeRef>,
    },
    ClassDef {
        name: String,
        bases: Vec<NodeRef>,
        body: Vec<NodeRef>,
    },
    If {
        test: NodeRef,
        body: Vec<NodeRef>,
        orelse: Vec<NodeRef>,
    },
    Return { value: Option<NodeRef> },
    /// Raw structural mapping; the `_type` key identifies the would-be
    /// typed variant.
    Mapping { entries: IndexMap<String, NodeRef> },
    /// Raw ordered sequence.
    Sequence { items: Vec<NodeRef> },
}

/// Names a child position inside a typed variant, so a replacement can be
/// bound to the exact slot the child occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSlot {
    VarValue,
    BinLeft,
    BinRight,
    AttrSource,
    CallFunc,
    CallArg(usize),
    CallKeyword(String),
    SubValue,
    SubLower,
    SubUpper,
    SubStep,
    FuncArg(usize),
    FuncBody(usize),
    ClassBase(usize),
    ClassBody(usize),
    IfTest,
    IfBody(usize),
    IfElse(usize),
    ReturnValue,
}

/// A tree node: stable identity, source line, and the shape payload.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub id: NodeId,
    pub line: Option<u32>,
    pub kind: AstKind,
}

impl AstNode {
    pub fn new(kind: AstKind) -> Self {
        Self {
            id: NodeId::allocate(),
            line: None,
            kind,
        }
    }

    pub fn with_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    /// Wrap this node into a shared handle.
    pub fn into_ref(self) -> NodeRef {
        Rc::new(RefCell::new(self))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(AstKind::Str {
            value: value.into(),
        })
    }

    pub fn bytes(value: Vec<u8>) -> Self {
        Self::new(AstKind::Bytes { value })
    }

    pub fn num(value: i64) -> Self {
        Self::new(AstKind::Num { value })
    }

    /// A bare name reference.
    pub fn var(name: impl Into<String>) -> Self {
        Self::new(AstKind::Var {
            name: name.into(),
            value: None,
        })
    }

    /// A name definition bound to a value expression.
    pub fn var_def(name: impl Into<String>, value: NodeRef) -> Self {
        Self::new(AstKind::Var {
            name: name.into(),
            value: Some(value),
        })
    }

    pub fn mapping(entries: IndexMap<String, NodeRef>) -> Self {
        Self::new(AstKind::Mapping { entries })
    }

    pub fn sequence(items: Vec<NodeRef>) -> Self {
        Self::new(AstKind::Sequence { items })
    }

    /// Short tag for logs and error context.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            AstKind::Str { .. } => "str",
            AstKind::Bytes { .. } => "bytes",
            AstKind::Num { .. } => "num",
            AstKind::Float { .. } => "float",
            AstKind::Bool { .. } => "bool",
            AstKind::Null => "null",
            AstKind::Var { .. } => "var",
            AstKind::BinOp { .. } => "binop",
            AstKind::Attribute { .. } => "attribute",
            AstKind::Call { .. } => "call",
            AstKind::Subscript { .. } => "subscript",
            AstKind::Import { .. } => "import",
            AstKind::FunctionDef { .. } => "functiondef",
            AstKind::ClassDef { .. } => "classdef",
            AstKind::If { .. } => "if",
            AstKind::Return { .. } => "return",
            AstKind::Mapping { .. } => "mapping",
            AstKind::Sequence { .. } => "sequence",
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, AstKind::Mapping { .. })
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, AstKind::Sequence { .. })
    }

    pub fn is_str(&self) -> bool {
        matches!(self.kind, AstKind::Str { .. })
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self.kind, AstKind::Bytes { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, AstKind::Call { .. })
    }

    /// Textual value, if this is a string literal.
    pub fn as_str_value(&self) -> Option<&str> {
        match &self.kind {
            AstKind::Str { value } => Some(value),
            _ => None,
        }
    }

    /// Integer value, if this is a number literal.
    pub fn as_num_value(&self) -> Option<i64> {
        match &self.kind {
            AstKind::Num { value } => Some(*value),
            _ => None,
        }
    }

    /// Mapping entries, if this is a raw mapping.
    pub fn as_mapping(&self) -> Option<&IndexMap<String, NodeRef>> {
        match &self.kind {
            AstKind::Mapping { entries } => Some(entries),
            _ => None,
        }
    }

    /// The `_type` discriminator of a raw mapping.
    pub fn map_type(&self) -> Option<String> {
        let entries = self.as_mapping()?;
        let tag = entries.get("_type")?;
        tag.borrow().as_str_value().map(str::to_owned)
    }

    /// Resolve the dotted name this node stands for, if any.
    ///
    /// A bare `Var` reference is its own name; a definition resolves through
    /// its bound value; attributes chain `source.attr`. Chains are bounded
    /// by [`MAX_NAME_DEPTH`].
    pub fn full_name(&self) -> Option<String> {
        self.full_name_bounded(MAX_NAME_DEPTH)
    }

    fn full_name_bounded(&self, depth: u32) -> Option<String> {
        if depth == 0 {
            tracing::debug!(node = self.kind_name(), "name resolution depth exhausted");
            return None;
        }
        match &self.kind {
            AstKind::Var { name, value: None } => Some(name.clone()),
            AstKind::Var {
                value: Some(value), ..
            } => value.borrow().full_name_bounded(depth - 1),
            AstKind::FunctionDef { name, .. } => Some(name.clone()),
            AstKind::ClassDef { name, .. } => Some(name.clone()),
            AstKind::Attribute { source, attr, .. } => {
                let base = source.borrow().full_name_bounded(depth - 1)?;
                Some(format!("{base}.{attr}"))
            }
            AstKind::Call { full_name, .. } => full_name.clone(),
            _ => None,
        }
    }

    /// Enumerate the child slots of a typed variant, in visit order.
    ///
    /// Mapping and sequence children are not enumerated here; the driver
    /// walks those containers directly. Back-links (`original`) are not
    /// children and are never descended into.
    pub fn child_slots(&self) -> Vec<(FieldSlot, NodeRef)> {
        let mut slots = Vec::new();
        match &self.kind {
            AstKind::Var {
                value: Some(value), ..
            } => {
                slots.push((FieldSlot::VarValue, value.clone()));
            }
            AstKind::BinOp { left, right, .. } => {
                slots.push((FieldSlot::BinLeft, left.clone()));
                slots.push((FieldSlot::BinRight, right.clone()));
            }
            AstKind::Attribute { source, .. } => {
                slots.push((FieldSlot::AttrSource, source.clone()));
            }
            AstKind::Call {
                func, args, kwargs, ..
            } => {
                slots.push((FieldSlot::CallFunc, func.clone()));
                for (i, arg) in args.iter().enumerate() {
                    slots.push((FieldSlot::CallArg(i), arg.clone()));
                }
                for (key, value) in kwargs {
                    slots.push((FieldSlot::CallKeyword(key.clone()), value.clone()));
                }
            }
            AstKind::Subscript {
                value,
                lower,
                upper,
                step,
            } => {
                slots.push((FieldSlot::SubValue, value.clone()));
                if let Some(lower) = lower {
                    slots.push((FieldSlot::SubLower, lower.clone()));
                }
                if let Some(upper) = upper {
                    slots.push((FieldSlot::SubUpper, upper.clone()));
                }
                if let Some(step) = step {
                    slots.push((FieldSlot::SubStep, step.clone()));
                }
            }
            AstKind::FunctionDef { args, body, .. } => {
                for (i, arg) in args.iter().enumerate() {
                    slots.push((FieldSlot::FuncArg(i), arg.clone()));
                }
                for (i, stmt) in body.iter().enumerate() {
                    slots.push((FieldSlot::FuncBody(i), stmt.clone()));
                }
            }
            AstKind::ClassDef { bases, body, .. } => {
                for (i, base) in bases.iter().enumerate() {
                    slots.push((FieldSlot::ClassBase(i), base.clone()));
                }
                for (i, stmt) in body.iter().enumerate() {
                    slots.push((FieldSlot::ClassBody(i), stmt.clone()));
                }
            }
            AstKind::If { test, body, orelse } => {
                slots.push((FieldSlot::IfTest, test.clone()));
                for (i, stmt) in body.iter().enumerate() {
                    slots.push((FieldSlot::IfBody(i), stmt.clone()));
                }
                for (i, stmt) in orelse.iter().enumerate() {
                    slots.push((FieldSlot::IfElse(i), stmt.clone()));
                }
            }
            AstKind::Return { value: Some(value) } => {
                slots.push((FieldSlot::ReturnValue, value.clone()));
            }
            _ => {}
        }
        slots
    }
}
