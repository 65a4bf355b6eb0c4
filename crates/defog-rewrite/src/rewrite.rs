//! The deobfuscation rewrite stage.
//!
//! Rules are tried in a fixed order for every visited node; the first rule
//! that applies wins the visit. Every rule is opportunistic: any condition
//! it cannot handle means "not applicable", never an aborted traversal. A
//! rule that swaps the node out calls `replace`; a rule that edits fields
//! in place calls `touch` so the driver schedules another pass.

use std::rc::Rc;

use tracing::trace;

use defog_core::{
    AstKind, AstNode, BinOpKind, ConcatOrder, Context, NodeRef, Stage, SymbolTable,
};

use crate::codecs::{self, Codec, Decoded};
use crate::collect::collect_symbols;

/// The `rewrite` stage.
pub struct RewriteStage {
    concat_order: ConcatOrder,
    table: Option<Rc<SymbolTable>>,
}

type Rule = fn(&RewriteStage, &Context) -> bool;

impl RewriteStage {
    /// Rules in application order; first match short-circuits the visit.
    const RULES: [(&'static str, Rule); 6] = [
        ("binop", Self::fold_binop),
        ("resolve_variable", Self::resolve_attribute),
        ("string_slice", Self::eval_subscript),
        ("inline_decode", Self::inline_decode),
        ("rewrite_function_call", Self::rewrite_call_target),
        ("replace_string", Self::fold_replace),
    ];

    pub fn new(concat_order: ConcatOrder) -> Self {
        Self {
            concat_order,
            table: None,
        }
    }

    /// Fold `BinOp(add)` over two string literals into one literal.
    fn fold_binop(&self, ctx: &Context) -> bool {
        let folded = {
            let node = ctx.node().borrow();
            let AstKind::BinOp { op, left, right } = &node.kind else {
                return false;
            };
            if *op != BinOpKind::Add {
                return false;
            }
            let left = left.borrow();
            let right = right.borrow();
            let (Some(left), Some(right)) = (left.as_str_value(), right.as_str_value()) else {
                return false;
            };
            match self.concat_order {
                ConcatOrder::RightThenLeft => format!("{right}{left}"),
                ConcatOrder::LeftThenRight => format!("{left}{right}"),
            }
        };
        ctx.replace(AstNode::str(folded));
        true
    }

    /// Materialize an attribute's source from the symbol table, so later
    /// rules can pattern-match on the literal. `x.decode("base64")` becomes
    /// `"aGk=".decode("base64")` once `x`'s definition is known.
    fn resolve_attribute(&self, ctx: &Context) -> bool {
        let (source_name, node_line) = {
            let node = ctx.node().borrow();
            let AstKind::Attribute { source, .. } = &node.kind else {
                return false;
            };
            let source = source.borrow();
            let AstKind::Var { name, value: None } = &source.kind else {
                return false;
            };
            (name.clone(), node.line)
        };

        let Some(target) = ctx.lookup(&source_name) else {
            return false;
        };
        // A definition on the same line is the statement defining this very
        // expression; resolving it would just chase our own tail.
        let target_line = target.borrow().line;
        if target_line.is_some() && target_line == node_line {
            return false;
        }

        // A variable definition contributes its bound value; any other
        // definition node stands in for itself.
        let bound_value = {
            let target = target.borrow();
            match &target.kind {
                AstKind::Var {
                    value: Some(value), ..
                } => Some(value.clone()),
                _ => None,
            }
        };
        let replacement = bound_value.unwrap_or_else(|| target.clone());

        {
            let mut node = ctx.node().borrow_mut();
            let AstKind::Attribute {
                source, original, ..
            } = &mut node.kind
            else {
                return false;
            };
            *original = Some(source.clone());
            *source = replacement;
        }
        trace!(name = %source_name, "resolved attribute source");
        ctx.touch();
        true
    }

    /// Evaluate a string subscript. Matches both the raw parser mapping
    /// (`_type == "Subscript"`) and the promoted variant. Bounds default to
    /// `0`, `len`, `1` when absent or holding no number.
    fn eval_subscript(&self, ctx: &Context) -> bool {
        let (text, lower, upper, step) = {
            let node = ctx.node().borrow();
            match &node.kind {
                AstKind::Mapping { entries } => {
                    if node.map_type().as_deref() != Some("Subscript") {
                        return false;
                    }
                    let Some(value) = entries.get("value") else {
                        return false;
                    };
                    let Some(text) = value.borrow().as_str_value().map(str::to_owned) else {
                        return false;
                    };
                    let (lower, upper, step) = match entries.get("slice") {
                        Some(slice) => {
                            let slice = slice.borrow();
                            match slice.as_mapping() {
                                Some(fields) => (
                                    num_entry(fields.get("lower")),
                                    num_entry(fields.get("upper")),
                                    num_entry(fields.get("step")),
                                ),
                                None => (None, None, None),
                            }
                        }
                        None => (None, None, None),
                    };
                    (text, lower, upper, step)
                }
                AstKind::Subscript {
                    value,
                    lower,
                    upper,
                    step,
                } => {
                    let Some(text) = value.borrow().as_str_value().map(str::to_owned) else {
                        return false;
                    };
                    (
                        text,
                        num_entry(lower.as_ref()),
                        num_entry(upper.as_ref()),
                        num_entry(step.as_ref()),
                    )
                }
                _ => return false,
            }
        };

        let chars: Vec<char> = text.chars().collect();
        let lower = lower.unwrap_or(0);
        let upper = upper.unwrap_or(chars.len() as i64);
        let step = step.unwrap_or(1);
        let Some(sliced) = py_slice(&chars, lower, upper, step) else {
            return false;
        };
        ctx.replace(AstNode::str(sliced));
        true
    }

    /// Evaluate `literal.decode(codec, ...)` calls in place.
    fn inline_decode(&self, ctx: &Context) -> bool {
        let (data, args) = {
            let node = ctx.node().borrow();
            let AstKind::Call { func, args, .. } = &node.kind else {
                return false;
            };
            let func = func.borrow();
            let AstKind::Attribute { source, attr, .. } = &func.kind else {
                return false;
            };
            if attr != "decode" {
                return false;
            }
            let source = source.borrow();
            let data = match &source.kind {
                AstKind::Str { value } => value.clone().into_bytes(),
                AstKind::Bytes { value } => value.clone(),
                _ => return false,
            };
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                let arg = arg.borrow();
                let Some(value) = arg.as_str_value() else {
                    return false;
                };
                arg_values.push(value.to_owned());
            }
            (data, arg_values)
        };

        let codec = match args.first() {
            Some(name) => match Codec::by_name(name) {
                Some(codec) => codec,
                None => return false,
            },
            None => Codec::Utf8,
        };
        let errors = args.get(1).map(String::as_str);

        match codecs::decode(codec, &data, errors) {
            Ok(Decoded::Text(text)) => {
                trace!(%codec, "inlined decode to string");
                ctx.replace(AstNode::str(text));
                true
            }
            Ok(Decoded::Binary(bytes)) => {
                trace!(%codec, "inlined decode to bytes");
                ctx.replace(AstNode::bytes(bytes));
                true
            }
            Err(_) => false,
        }
    }

    /// Resolve what a call actually targets: materialize import aliases,
    /// propagate variable bindings into the resolved name, and swap bare
    /// callees for their definitions.
    fn rewrite_call_target(&self, ctx: &Context) -> bool {
        {
            let node = ctx.node().borrow();
            if !node.is_call() {
                return false;
            }
        }

        if self.materialize_import_alias(ctx) {
            return true;
        }
        if self.propagate_callee_name(ctx) {
            return true;
        }
        self.substitute_callee(ctx)
    }

    /// `Call` whose callee already is an import node but whose name was
    /// never resolved: look the original bare name up in the alias map.
    fn materialize_import_alias(&self, ctx: &Context) -> bool {
        let qualified = {
            let node = ctx.node().borrow();
            let AstKind::Call {
                func,
                full_name,
                original,
                ..
            } = &node.kind
            else {
                return false;
            };
            if full_name.is_some() {
                return false;
            }
            let func = func.borrow();
            let AstKind::Import { names } = &func.kind else {
                return false;
            };
            let Some(original) = original else {
                return false;
            };
            let original = original.borrow();
            let AstKind::Var { name, value: None } = &original.kind else {
                return false;
            };
            match names.get(name) {
                Some(qualified) => qualified.clone(),
                None => return false,
            }
        };

        let mut node = ctx.node().borrow_mut();
        if let AstKind::Call { full_name, .. } = &mut node.kind {
            *full_name = Some(qualified);
        }
        drop(node);
        ctx.touch();
        true
    }

    /// Update the call's resolved name from the symbol table binding of its
    /// callee.
    fn propagate_callee_name(&self, ctx: &Context) -> bool {
        let (key, call_line, current) = {
            let node = ctx.node().borrow();
            let AstKind::Call {
                func, full_name, ..
            } = &node.kind
            else {
                return false;
            };
            let func = func.borrow();
            let key = match &func.kind {
                // The callee was already swapped for its definition; chase
                // the resolved name instead.
                AstKind::Var { value: Some(_), .. } => full_name.clone(),
                AstKind::Var { name, value: None } => Some(name.clone()),
                _ => None,
            };
            (key, node.line, full_name.clone())
        };
        let Some(key) = key else {
            return false;
        };
        let Some(target) = ctx.lookup(&key) else {
            return false;
        };

        let (resolved, target_line) = {
            let target = target.borrow();
            let resolved = match &target.kind {
                AstKind::Import { names } => names.get(&key).cloned(),
                _ => target.full_name(),
            };
            (resolved, target.line)
        };
        let Some(resolved) = resolved else {
            return false;
        };
        if current.as_deref() == Some(resolved.as_str()) {
            return false;
        }
        if target_line.is_some() && target_line == call_line {
            return false;
        }

        let mut node = ctx.node().borrow_mut();
        if let AstKind::Call { full_name, .. } = &mut node.kind {
            *full_name = Some(resolved.clone());
        }
        drop(node);
        trace!(full_name = %resolved, "propagated call target name");
        ctx.touch();
        true
    }

    /// Swap a bare-name callee for the node the name is bound to, keeping
    /// the bare name in the back-link.
    fn substitute_callee(&self, ctx: &Context) -> bool {
        let name = {
            let node = ctx.node().borrow();
            let AstKind::Call { func, .. } = &node.kind else {
                return false;
            };
            let func = func.borrow();
            match &func.kind {
                AstKind::Var { name, value: None } => name.clone(),
                _ => return false,
            }
        };
        let Some(target) = ctx.lookup(&name) else {
            return false;
        };

        {
            let mut node = ctx.node().borrow_mut();
            let AstKind::Call { func, original, .. } = &mut node.kind else {
                return false;
            };
            *original = Some(func.clone());
            *func = target;
        }
        trace!(name = %name, "substituted bare callee with its definition");
        ctx.touch();
        true
    }

    /// Fold `"literal".replace("a", "b")` into the replaced literal.
    /// Exactly two positional string arguments; anything extra defeats the
    /// rule.
    fn fold_replace(&self, ctx: &Context) -> bool {
        let folded = {
            let node = ctx.node().borrow();
            let AstKind::Call {
                func, args, kwargs, ..
            } = &node.kind
            else {
                return false;
            };
            if args.len() != 2 || !kwargs.is_empty() {
                return false;
            }
            let func = func.borrow();
            let AstKind::Attribute { source, attr, .. } = &func.kind else {
                return false;
            };
            if attr != "replace" {
                return false;
            }
            let source = source.borrow();
            let Some(subject) = source.as_str_value() else {
                return false;
            };
            let from = args[0].borrow();
            let to = args[1].borrow();
            let (Some(from), Some(to)) = (from.as_str_value(), to.as_str_value()) else {
                return false;
            };
            subject.replace(from, to)
        };
        ctx.replace(AstNode::str(folded));
        true
    }
}

impl Stage for RewriteStage {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    /// Refresh the symbol table on the first pass and after any pass that
    /// changed the tree; rewrites can introduce or retarget definitions.
    fn prepare_pass(&mut self, root: &NodeRef, rebuild: bool) -> Option<Rc<SymbolTable>> {
        if rebuild || self.table.is_none() {
            let table = Rc::new(collect_symbols(root));
            self.table = Some(table.clone());
            Some(table)
        } else {
            None
        }
    }

    fn visit_node(&mut self, ctx: &Context) {
        for (name, rule) in Self::RULES {
            if rule(self, ctx) {
                trace!(rule = name, "rule applied");
                return;
            }
        }
    }
}

/// Extract an integer from an optional slice bound; non-numbers count as
/// absent.
fn num_entry(node: Option<&NodeRef>) -> Option<i64> {
    node.and_then(|n| n.borrow().as_num_value())
}

/// Python slicing over chars with explicit bounds: negative indices count
/// from the end, a negative step walks backwards, and out-of-range bounds
/// clamp. A zero step never applies.
fn py_slice(chars: &[char], lower: i64, upper: i64, step: i64) -> Option<String> {
    if step == 0 {
        return None;
    }
    let len = chars.len() as i64;
    let mut out = String::new();
    if step > 0 {
        let start = clamp_index(lower, len, 0, len);
        let stop = clamp_index(upper, len, 0, len);
        let mut i = start;
        while i < stop {
            out.push(chars[i as usize]);
            i += step;
        }
    } else {
        let start = clamp_index(lower, len, -1, len - 1);
        let stop = clamp_index(upper, len, -1, len - 1);
        let mut i = start;
        while i > stop {
            out.push(chars[i as usize]);
            i += step;
        }
    }
    Some(out)
}

fn clamp_index(index: i64, len: i64, lo: i64, hi: i64) -> i64 {
    let index = if index < 0 { index + len } else { index };
    index.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use defog_core::{EngineOptions, Walker};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn rewrite(tree: NodeRef) -> NodeRef {
        rewrite_with(tree, EngineOptions::default())
    }

    fn rewrite_with(tree: NodeRef, opts: EngineOptions) -> NodeRef {
        let concat_order = opts.concat_order;
        let mut walker = Walker::new(tree, opts);
        walker.traverse(&mut RewriteStage::new(concat_order))
    }

    fn binop_add(left: &str, right: &str) -> NodeRef {
        AstNode::new(AstKind::BinOp {
            op: "add".parse().unwrap(),
            left: AstNode::str(left).into_ref(),
            right: AstNode::str(right).into_ref(),
        })
        .into_ref()
    }

    fn attribute(source: NodeRef, attr: &str) -> NodeRef {
        AstNode::new(AstKind::Attribute {
            source,
            attr: attr.to_string(),
            action: Default::default(),
            original: None,
        })
        .into_ref()
    }

    fn call(func: NodeRef, args: Vec<NodeRef>) -> NodeRef {
        AstNode::new(AstKind::Call {
            func,
            args,
            kwargs: IndexMap::new(),
            full_name: None,
            original: None,
        })
        .into_ref()
    }

    #[test]
    fn add_folds_right_then_left_by_default() {
        let tree = rewrite(binop_add("ab", "cd"));
        assert_eq!(tree.borrow().as_str_value(), Some("cdab"));
    }

    #[test]
    fn add_folds_left_then_right_when_configured() {
        let opts = EngineOptions::default().with_concat_order(ConcatOrder::LeftThenRight);
        let tree = rewrite_with(binop_add("ab", "cd"), opts);
        assert_eq!(tree.borrow().as_str_value(), Some("abcd"));
    }

    #[test]
    fn non_add_and_non_string_binops_are_left_alone() {
        let tree = AstNode::new(AstKind::BinOp {
            op: "sub".parse().unwrap(),
            left: AstNode::str("a").into_ref(),
            right: AstNode::str("b").into_ref(),
        })
        .into_ref();
        let out = rewrite(tree);
        assert!(matches!(out.borrow().kind, AstKind::BinOp { .. }));

        let tree = AstNode::new(AstKind::BinOp {
            op: "add".parse().unwrap(),
            left: AstNode::num(1).into_ref(),
            right: AstNode::num(2).into_ref(),
        })
        .into_ref();
        let out = rewrite(tree);
        assert!(matches!(out.borrow().kind, AstKind::BinOp { .. }));
    }

    #[test]
    fn decode_call_replaces_with_decoded_bytes() {
        let tree = call(
            attribute(AstNode::bytes(b"aGVsbG8=".to_vec()).into_ref(), "decode"),
            vec![AstNode::str("base64").into_ref()],
        );
        let out = rewrite(tree);
        match &out.borrow().kind {
            AstKind::Bytes { value } => assert_eq!(value, b"hello"),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[test]
    fn decode_preserves_call_line_number() {
        let tree = call(
            attribute(AstNode::bytes(b"aGk=".to_vec()).into_ref(), "decode"),
            vec![AstNode::str("base64").into_ref()],
        );
        tree.borrow_mut().line = Some(17);
        let out = rewrite(tree);
        assert_eq!(out.borrow().line, Some(17));
    }

    #[test]
    fn unknown_codec_is_a_no_op() {
        let tree = call(
            attribute(AstNode::str("payload").into_ref(), "decode"),
            vec![AstNode::str("base85").into_ref()],
        );
        let out = rewrite(tree);
        assert!(out.borrow().is_call());
    }

    #[test]
    fn malformed_codec_input_is_a_no_op() {
        let tree = call(
            attribute(AstNode::str("!!!not-base64!!!").into_ref(), "decode"),
            vec![AstNode::str("base64").into_ref()],
        );
        let out = rewrite(tree);
        assert!(out.borrow().is_call());
    }

    #[test]
    fn raw_subscript_mapping_slices_string() {
        let mut slice = IndexMap::new();
        slice.insert("lower".to_string(), AstNode::num(1).into_ref());
        slice.insert("upper".to_string(), AstNode::num(5).into_ref());
        slice.insert("step".to_string(), AstNode::num(2).into_ref());

        let mut entries = IndexMap::new();
        entries.insert("_type".to_string(), AstNode::str("Subscript").into_ref());
        entries.insert("value".to_string(), AstNode::str("abcdef").into_ref());
        entries.insert(
            "slice".to_string(),
            AstNode::mapping(slice).into_ref(),
        );

        let out = rewrite(AstNode::mapping(entries).into_ref());
        assert_eq!(out.borrow().as_str_value(), Some("bd"));
    }

    #[test]
    fn subscript_defaults_cover_missing_bounds() {
        let mut entries = IndexMap::new();
        entries.insert("_type".to_string(), AstNode::str("Subscript").into_ref());
        entries.insert("value".to_string(), AstNode::str("abcdef").into_ref());
        entries.insert(
            "slice".to_string(),
            AstNode::mapping(IndexMap::new()).into_ref(),
        );

        let out = rewrite(AstNode::mapping(entries).into_ref());
        assert_eq!(out.borrow().as_str_value(), Some("abcdef"));
    }

    #[test]
    fn typed_subscript_slices_with_negative_step() {
        let tree = AstNode::new(AstKind::Subscript {
            value: AstNode::str("abcdef").into_ref(),
            lower: Some(AstNode::num(5).into_ref()),
            upper: Some(AstNode::num(0).into_ref()),
            step: Some(AstNode::num(-1).into_ref()),
        })
        .into_ref();
        let out = rewrite(tree);
        assert_eq!(out.borrow().as_str_value(), Some("fedcb"));
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let tree = AstNode::new(AstKind::Subscript {
            value: AstNode::str("abcdef").into_ref(),
            lower: Some(AstNode::num(-4).into_ref()),
            upper: Some(AstNode::num(-1).into_ref()),
            step: None,
        })
        .into_ref();
        let out = rewrite(tree);
        assert_eq!(out.borrow().as_str_value(), Some("cde"));
    }

    #[test]
    fn zero_step_defeats_the_slice_rule() {
        let tree = AstNode::new(AstKind::Subscript {
            value: AstNode::str("abcdef").into_ref(),
            lower: None,
            upper: None,
            step: Some(AstNode::num(0).into_ref()),
        })
        .into_ref();
        let out = rewrite(tree);
        assert!(matches!(out.borrow().kind, AstKind::Subscript { .. }));
    }

    #[test]
    fn replace_call_folds_to_literal() {
        let tree = call(
            attribute(AstNode::str("banana").into_ref(), "replace"),
            vec![
                AstNode::str("a").into_ref(),
                AstNode::str("o").into_ref(),
            ],
        );
        let out = rewrite(tree);
        assert_eq!(out.borrow().as_str_value(), Some("bonono"));
    }

    #[test]
    fn extra_replace_arguments_defeat_the_fold() {
        let tree = call(
            attribute(AstNode::str("banana").into_ref(), "replace"),
            vec![
                AstNode::str("a").into_ref(),
                AstNode::str("o").into_ref(),
                AstNode::num(1).into_ref(),
            ],
        );
        let out = rewrite(tree);
        assert!(out.borrow().is_call());
    }

    #[test]
    fn keyword_arguments_defeat_the_fold() {
        let mut kwargs = IndexMap::new();
        kwargs.insert("count".to_string(), AstNode::num(1).into_ref());
        let tree = AstNode::new(AstKind::Call {
            func: attribute(AstNode::str("banana").into_ref(), "replace"),
            args: vec![
                AstNode::str("a").into_ref(),
                AstNode::str("o").into_ref(),
            ],
            kwargs,
            full_name: None,
            original: None,
        })
        .into_ref();
        let out = rewrite(tree);
        assert!(out.borrow().is_call());
    }

    #[test]
    fn variable_resolution_enables_inline_decode() {
        // x = "aGk="   (line 1)
        // x.decode("base64")   (line 2)
        let def = AstNode::var_def("x", AstNode::str("aGk=").into_ref())
            .with_line(Some(1))
            .into_ref();
        let usage = call(
            attribute(AstNode::var("x").into_ref(), "decode"),
            vec![AstNode::str("base64").into_ref()],
        );
        usage.borrow_mut().line = Some(2);
        if let AstKind::Call { func, .. } = &usage.borrow().kind {
            func.borrow_mut().line = Some(2);
        }

        let tree = AstNode::sequence(vec![def, usage]).into_ref();
        let out = rewrite(tree);
        match &out.borrow().kind {
            AstKind::Sequence { items } => match &items[1].borrow().kind {
                AstKind::Bytes { value } => assert_eq!(value, b"hi"),
                other => panic!("expected decoded bytes, got {other:?}"),
            },
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn same_line_definition_is_not_resolved() {
        let def = AstNode::var_def("x", AstNode::str("aGk=").into_ref())
            .with_line(Some(1))
            .into_ref();
        let usage = call(
            attribute(AstNode::var("x").into_ref(), "decode"),
            vec![AstNode::str("base64").into_ref()],
        );
        usage.borrow_mut().line = Some(1);
        if let AstKind::Call { func, .. } = &usage.borrow().kind {
            func.borrow_mut().line = Some(1);
        }

        let tree = AstNode::sequence(vec![def, usage]).into_ref();
        let out = rewrite(tree);
        match &out.borrow().kind {
            AstKind::Sequence { items } => {
                assert!(items[1].borrow().is_call(), "same-line lookup must not fire");
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn call_alias_resolves_name_and_callee() {
        // y = open   (line 1)
        // y("f")     (line 2)
        let open_ref = AstNode::var("open").with_line(Some(1)).into_ref();
        let def = AstNode::var_def("y", open_ref)
            .with_line(Some(1))
            .into_ref();
        let def_id = def.borrow().id;
        let usage = call(
            AstNode::var("y").with_line(Some(2)).into_ref(),
            vec![AstNode::str("f").into_ref()],
        );
        usage.borrow_mut().line = Some(2);

        let tree = AstNode::sequence(vec![def, usage.clone()]).into_ref();
        rewrite(tree);

        let node = usage.borrow();
        match &node.kind {
            AstKind::Call {
                func,
                full_name,
                original,
                ..
            } => {
                assert_eq!(full_name.as_deref(), Some("open"));
                assert_eq!(func.borrow().id, def_id, "callee references the definition");
                let original = original.as_ref().expect("bare name preserved");
                assert!(matches!(
                    &original.borrow().kind,
                    AstKind::Var { name, value: None } if name == "y"
                ));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn rewrite_is_idempotent_on_quiescent_trees() {
        let tree = rewrite(binop_add("ab", "cd"));
        let first = tree.borrow().as_str_value().unwrap().to_string();
        let again = rewrite(tree.clone());
        assert_eq!(again.borrow().as_str_value(), Some(first.as_str()));
    }

    #[test]
    fn chained_replace_folds_to_fixed_point() {
        // "banana".replace("a", "o").replace("o", "u") => "bununu"
        let inner = call(
            attribute(AstNode::str("banana").into_ref(), "replace"),
            vec![
                AstNode::str("a").into_ref(),
                AstNode::str("o").into_ref(),
            ],
        );
        let outer = call(
            attribute(inner, "replace"),
            vec![
                AstNode::str("o").into_ref(),
                AstNode::str("u").into_ref(),
            ],
        );
        let out = rewrite(outer);
        assert_eq!(out.borrow().as_str_value(), Some("bununu"));
    }
}
