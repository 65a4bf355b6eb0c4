//! Conversion stage: promotes raw parser mappings into typed variants.
//!
//! The external inspector hands us nothing but mappings, sequences, and
//! scalars. This stage lifts every mapping whose `_type` it recognizes into
//! the corresponding typed node, converging over multiple passes so nested
//! constructs promote as their children become available. Mappings with an
//! unrecognized `_type` stay raw; rules may still match them.

use indexmap::IndexMap;
use tracing::trace;

use defog_core::{AstKind, AstNode, AttrAction, BinOpKind, Context, NodeRef, Stage};

/// The `convert` stage.
#[derive(Debug, Default)]
pub struct ConvertStage;

impl ConvertStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for ConvertStage {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn visit_node(&mut self, ctx: &Context) {
        let promoted = {
            let node = ctx.node().borrow();
            let Some(tag) = node.map_type() else { return };
            let entries = node.as_mapping().expect("map_type implies mapping");
            promote(&tag, entries)
        };
        if let Some(new) = promoted {
            trace!(kind = new.kind_name(), "promoted raw mapping");
            ctx.replace(new);
        }
    }
}

fn promote(tag: &str, entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    match tag {
        "Str" | "Constant" => promote_literal(entries),
        "Bytes" => promote_bytes(entries),
        "Num" => promote_num(entries),
        "Name" => promote_name(entries),
        "Assign" => promote_assign(entries),
        "BinOp" => promote_binop(entries),
        "Attribute" => promote_attribute(entries),
        "Call" => promote_call(entries),
        "Import" => promote_import(entries),
        "ImportFrom" => promote_import_from(entries),
        "FunctionDef" => promote_function(entries),
        "ClassDef" => promote_class(entries),
        "If" => promote_if(entries),
        "Return" => promote_return(entries),
        "Subscript" => promote_subscript(entries),
        _ => None,
    }
}

fn entry(entries: &IndexMap<String, NodeRef>, key: &str) -> Option<NodeRef> {
    entries.get(key).cloned()
}

fn entry_str(entries: &IndexMap<String, NodeRef>, key: &str) -> Option<String> {
    let child = entries.get(key)?;
    let child = child.borrow();
    child.as_str_value().map(str::to_owned)
}

/// `None` when the entry is absent or the parser emitted an explicit null.
fn optional_entry(entries: &IndexMap<String, NodeRef>, key: &str) -> Option<NodeRef> {
    let child = entries.get(key)?;
    if matches!(child.borrow().kind, AstKind::Null) {
        return None;
    }
    Some(child.clone())
}

fn sequence_items(entries: &IndexMap<String, NodeRef>, key: &str) -> Option<Vec<NodeRef>> {
    let child = entries.get(key)?;
    let child = child.borrow();
    match &child.kind {
        AstKind::Sequence { items } => Some(items.clone()),
        _ => None,
    }
}

fn promote_literal(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let value = entry(entries, "value")
        .or_else(|| entry(entries, "s"))
        .or_else(|| entry(entries, "n"))?;
    let value = value.borrow();
    match &value.kind {
        AstKind::Str { value } => Some(AstNode::str(value.clone())),
        AstKind::Num { value } => Some(AstNode::num(*value)),
        AstKind::Float { value } => Some(AstNode::new(AstKind::Float { value: *value })),
        AstKind::Bool { value } => Some(AstNode::new(AstKind::Bool { value: *value })),
        AstKind::Null => Some(AstNode::new(AstKind::Null)),
        _ => None,
    }
}

fn promote_bytes(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let value = entry(entries, "value").or_else(|| entry(entries, "s"))?;
    let value = value.borrow();
    match &value.kind {
        // The inspector emits byte strings either as an int array or as a
        // codepoint-per-byte string.
        AstKind::Sequence { items } => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let byte = item.borrow().as_num_value()?;
                bytes.push(u8::try_from(byte).ok()?);
            }
            Some(AstNode::bytes(bytes))
        }
        AstKind::Str { value } => Some(AstNode::bytes(str_to_bytes(value))),
        _ => None,
    }
}

fn str_to_bytes(s: &str) -> Vec<u8> {
    if s.chars().all(|c| (c as u32) <= 0xFF) {
        s.chars().map(|c| c as u32 as u8).collect()
    } else {
        s.as_bytes().to_vec()
    }
}

fn promote_num(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let value = entry(entries, "value").or_else(|| entry(entries, "n"))?;
    let value = value.borrow();
    match &value.kind {
        AstKind::Num { value } => Some(AstNode::num(*value)),
        AstKind::Float { value } => Some(AstNode::new(AstKind::Float { value: *value })),
        _ => None,
    }
}

fn promote_name(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let id = entry_str(entries, "id")?;
    Some(AstNode::var(id))
}

fn promote_assign(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let targets = sequence_items(entries, "targets")?;
    // Only single-name assignments become definitions; tuple unpacking and
    // attribute targets stay raw.
    if targets.len() != 1 {
        return None;
    }
    let name = {
        let target = targets[0].borrow();
        match &target.kind {
            AstKind::Var { name, value: None } => name.clone(),
            _ => return None,
        }
    };
    let value = entry(entries, "value")?;
    Some(AstNode::var_def(name, value))
}

fn promote_binop(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let op = {
        let op_node = entries.get("op")?;
        let op_node = op_node.borrow();
        let tag = op_node
            .map_type()
            .or_else(|| op_node.as_str_value().map(str::to_owned))?;
        tag.parse::<BinOpKind>().ok()?
    };
    let left = entry(entries, "left")?;
    let right = entry(entries, "right")?;
    Some(AstNode::new(AstKind::BinOp { op, left, right }))
}

fn promote_attribute(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let source = entry(entries, "value")?;
    let attr = entry_str(entries, "attr")?;
    let action = entries
        .get("ctx")
        .and_then(|ctx| ctx.borrow().map_type())
        .and_then(|tag| tag.parse::<AttrAction>().ok())
        .unwrap_or_default();
    Some(AstNode::new(AstKind::Attribute {
        source,
        attr,
        action,
        original: None,
    }))
}

fn promote_call(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let func = entry(entries, "func")?;
    let args = sequence_items(entries, "args").unwrap_or_default();
    let mut kwargs = IndexMap::new();
    if let Some(keywords) = sequence_items(entries, "keywords") {
        for keyword in keywords {
            let keyword = keyword.borrow();
            let fields = keyword.as_mapping()?;
            // A keyword without a name is a **kwargs splat; leave the call
            // raw rather than losing it.
            let arg = entry_str(fields, "arg")?;
            let value = entry(fields, "value")?;
            kwargs.insert(arg, value);
        }
    }
    Some(AstNode::new(AstKind::Call {
        func,
        args,
        kwargs,
        full_name: None,
        original: None,
    }))
}

fn import_aliases(entries: &IndexMap<String, NodeRef>) -> Option<Vec<(String, String)>> {
    let names = sequence_items(entries, "names")?;
    let mut aliases = Vec::with_capacity(names.len());
    for alias in names {
        let alias = alias.borrow();
        let fields = alias.as_mapping()?;
        let name = entry_str(fields, "name")?;
        let local = entry_str(fields, "asname").unwrap_or_else(|| name.clone());
        aliases.push((local, name));
    }
    Some(aliases)
}

fn promote_import(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let mut names = IndexMap::new();
    for (local, target) in import_aliases(entries)? {
        names.insert(local, target);
    }
    Some(AstNode::new(AstKind::Import { names }))
}

fn promote_import_from(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let module = entry_str(entries, "module")?;
    let mut names = IndexMap::new();
    for (local, target) in import_aliases(entries)? {
        names.insert(local, format!("{module}.{target}"));
    }
    Some(AstNode::new(AstKind::Import { names }))
}

fn promote_function(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let name = entry_str(entries, "name")?;
    let args = function_args(entries);
    let body = sequence_items(entries, "body").unwrap_or_default();
    Some(AstNode::new(AstKind::FunctionDef { name, args, body }))
}

/// `args` is an `arguments` object holding the positional list; tolerate a
/// plain sequence as well.
fn function_args(entries: &IndexMap<String, NodeRef>) -> Vec<NodeRef> {
    let Some(args) = entries.get("args") else {
        return Vec::new();
    };
    let args = args.borrow();
    match &args.kind {
        AstKind::Sequence { items } => items.clone(),
        AstKind::Mapping { entries } => sequence_items(entries, "args").unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn promote_class(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let name = entry_str(entries, "name")?;
    let bases = sequence_items(entries, "bases").unwrap_or_default();
    let body = sequence_items(entries, "body").unwrap_or_default();
    Some(AstNode::new(AstKind::ClassDef { name, bases, body }))
}

fn promote_if(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let test = entry(entries, "test")?;
    let body = sequence_items(entries, "body").unwrap_or_default();
    let orelse = sequence_items(entries, "orelse").unwrap_or_default();
    Some(AstNode::new(AstKind::If { test, body, orelse }))
}

fn promote_return(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let value = optional_entry(entries, "value");
    Some(AstNode::new(AstKind::Return { value }))
}

fn promote_subscript(entries: &IndexMap<String, NodeRef>) -> Option<AstNode> {
    let value = entry(entries, "value")?;
    let slice = entries.get("slice")?;
    let slice = slice.borrow();
    // Only explicit slices promote; plain-index subscripts stay raw and are
    // handled by the slice rule's raw path.
    if slice.map_type().as_deref() != Some("Slice") {
        return None;
    }
    let fields = slice.as_mapping()?;
    Some(AstNode::new(AstKind::Subscript {
        value,
        lower: optional_entry(fields, "lower"),
        upper: optional_entry(fields, "upper"),
        step: optional_entry(fields, "step"),
    }))
}
