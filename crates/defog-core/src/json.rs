//! Bridge between the external parser's JSON output and the node universe.
//!
//! The inspector process prints one JSON object per source file. Objects
//! become raw mappings (key order preserved), arrays become sequences, and
//! scalars become the matching literal nodes. An integral `lineno` key also
//! becomes the mapping's own line number so diagnostics work before the
//! conversion stage has promoted anything.

use indexmap::IndexMap;
use serde_json::Value;

use crate::node::{AstKind, AstNode, NodeRef};

/// Convert a parsed JSON value into a raw tree.
pub fn from_json(value: &Value) -> NodeRef {
    match value {
        Value::Null => AstNode::new(AstKind::Null).into_ref(),
        Value::Bool(b) => AstNode::new(AstKind::Bool { value: *b }).into_ref(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AstNode::num(i).into_ref()
            } else {
                AstNode::new(AstKind::Float {
                    value: n.as_f64().unwrap_or(f64::NAN),
                })
                .into_ref()
            }
        }
        Value::String(s) => AstNode::str(s.clone()).into_ref(),
        Value::Array(items) => {
            AstNode::sequence(items.iter().map(from_json).collect()).into_ref()
        }
        Value::Object(fields) => {
            let mut entries = IndexMap::new();
            for (key, child) in fields {
                entries.insert(key.clone(), from_json(child));
            }
            let line = fields
                .get("lineno")
                .and_then(Value::as_i64)
                .and_then(|l| u32::try_from(l).ok());
            AstNode::mapping(entries).with_line(line).into_ref()
        }
    }
}

/// Serialize a tree back to JSON for output.
///
/// Typed variants render as objects with a `_type` discriminator; raw
/// mappings and sequences render structurally; literal leaves render as
/// plain JSON scalars.
pub fn to_json(node: &NodeRef) -> Value {
    let node = node.borrow();
    match &node.kind {
        AstKind::Str { value } => Value::String(value.clone()),
        AstKind::Num { value } => Value::from(*value),
        AstKind::Float { value } => Value::from(*value),
        AstKind::Bool { value } => Value::Bool(*value),
        AstKind::Null => Value::Null,
        AstKind::Bytes { value } => serde_json::json!({
            "_type": "Bytes",
            "value": value,
        }),
        AstKind::Var { name, value } => serde_json::json!({
            "_type": "Var",
            "name": name,
            "value": value.as_ref().map(to_json),
        }),
        AstKind::BinOp { op, left, right } => serde_json::json!({
            "_type": "BinOp",
            "op": op.to_string(),
            "left": to_json(left),
            "right": to_json(right),
        }),
        AstKind::Attribute {
            source,
            attr,
            action,
            ..
        } => serde_json::json!({
            "_type": "Attribute",
            "source": to_json(source),
            "attr": attr,
            "action": action.to_string(),
        }),
        AstKind::Call {
            func,
            args,
            kwargs,
            full_name,
            ..
        } => {
            let kwargs: serde_json::Map<String, Value> = kwargs
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect();
            serde_json::json!({
                "_type": "Call",
                "func": to_json(func),
                "args": args.iter().map(to_json).collect::<Vec<_>>(),
                "kwargs": kwargs,
                "full_name": full_name,
            })
        }
        AstKind::Subscript {
            value,
            lower,
            upper,
            step,
        } => serde_json::json!({
            "_type": "Subscript",
            "value": to_json(value),
            "lower": lower.as_ref().map(to_json),
            "upper": upper.as_ref().map(to_json),
            "step": step.as_ref().map(to_json),
        }),
        AstKind::Import { names } => {
            let names: serde_json::Map<String, Value> = names
                .iter()
                .map(|(alias, target)| (alias.clone(), Value::String(target.clone())))
                .collect();
            serde_json::json!({ "_type": "Import", "names": names })
        }
        AstKind::FunctionDef { name, args, body } => serde_json::json!({
            "_type": "FunctionDef",
            "name": name,
            "args": args.iter().map(to_json).collect::<Vec<_>>(),
            "body": body.iter().map(to_json).collect::<Vec<_>>(),
        }),
        AstKind::ClassDef { name, bases, body } => serde_json::json!({
            "_type": "ClassDef",
            "name": name,
            "bases": bases.iter().map(to_json).collect::<Vec<_>>(),
            "body": body.iter().map(to_json).collect::<Vec<_>>(),
        }),
        AstKind::If { test, body, orelse } => serde_json::json!({
            "_type": "If",
            "test": to_json(test),
            "body": body.iter().map(to_json).collect::<Vec<_>>(),
            "orelse": orelse.iter().map(to_json).collect::<Vec<_>>(),
        }),
        AstKind::Return { value } => serde_json::json!({
            "_type": "Return",
            "value": value.as_ref().map(to_json),
        }),
        AstKind::Mapping { entries } => {
            let fields: serde_json::Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect();
            Value::Object(fields)
        }
        AstKind::Sequence { items } => {
            Value::Array(items.iter().map(to_json).collect())
        }
    }
}
