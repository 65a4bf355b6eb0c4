//! End-to-end pipeline scenarios: JSON parser output in, converged tree out.

use defog_core::json::from_json;
use defog_core::{AstKind, EngineOptions, NodeRef, run_stages};
use defog_rewrite::default_registry;
use pretty_assertions::assert_eq;

fn run(value: serde_json::Value) -> NodeRef {
    run_with(value, EngineOptions::default())
}

fn run_with(value: serde_json::Value, opts: EngineOptions) -> NodeRef {
    let tree = from_json(&value);
    let registry = default_registry(&opts);
    let walker = run_stages(tree, &[], &registry, &opts).expect("pipeline runs");
    assert!(walker.traversed);
    walker.tree()
}

fn module(body: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "_type": "Module",
        "encoding": "utf-8",
        "body": body,
    })
}

fn body_item(tree: &NodeRef, index: usize) -> NodeRef {
    let tree = tree.borrow();
    let entries = tree.as_mapping().expect("module stays a raw mapping");
    let body = entries["body"].clone();
    let body = body.borrow();
    match &body.kind {
        AstKind::Sequence { items } => items[index].clone(),
        other => panic!("expected body sequence, got {other:?}"),
    }
}

#[test]
fn string_concatenation_folds_right_then_left() {
    let tree = run(module(vec![serde_json::json!({
        "_type": "BinOp",
        "op": {"_type": "Add"},
        "left": {"_type": "Constant", "value": "ab", "lineno": 1},
        "right": {"_type": "Constant", "value": "cd", "lineno": 1},
        "lineno": 1
    })]));
    let folded = body_item(&tree, 0);
    assert_eq!(folded.borrow().as_str_value(), Some("cdab"));
}

#[test]
fn codec_decode_call_becomes_bytes() {
    let tree = run(module(vec![serde_json::json!({
        "_type": "Call",
        "func": {
            "_type": "Attribute",
            "value": {"_type": "Bytes", "value": [97, 71, 86, 115, 98, 71, 56, 61]},
            "attr": "decode",
            "ctx": {"_type": "Load"},
            "lineno": 1
        },
        "args": [{"_type": "Constant", "value": "base64", "lineno": 1}],
        "keywords": [],
        "lineno": 1
    })]));
    let decoded = body_item(&tree, 0);
    match &decoded.borrow().kind {
        AstKind::Bytes { value } => assert_eq!(value, b"hello"),
        other => panic!("expected bytes, got {other:?}"),
    }
}

#[test]
fn string_slice_via_raw_mapping() {
    // The parser-shaped subscript with an explicit lower/upper/step mapping;
    // fed through the pipeline it must fold to the sliced literal.
    let tree = run(module(vec![serde_json::json!({
        "_type": "Subscript",
        "value": {"_type": "Constant", "value": "abcdef", "lineno": 1},
        "slice": {
            "_type": "Slice",
            "lower": {"_type": "Constant", "value": 1, "lineno": 1},
            "upper": {"_type": "Constant", "value": 5, "lineno": 1},
            "step": {"_type": "Constant", "value": 2, "lineno": 1}
        },
        "lineno": 1
    })]));
    let sliced = body_item(&tree, 0);
    assert_eq!(sliced.borrow().as_str_value(), Some("bd"));
}

#[test]
fn variable_propagates_into_decode() {
    // x = "aGk="
    // x.decode("base64")
    let tree = run(module(vec![
        serde_json::json!({
            "_type": "Assign",
            "targets": [{"_type": "Name", "id": "x", "lineno": 1}],
            "value": {"_type": "Constant", "value": "aGk=", "lineno": 1},
            "lineno": 1
        }),
        serde_json::json!({
            "_type": "Call",
            "func": {
                "_type": "Attribute",
                "value": {"_type": "Name", "id": "x", "lineno": 2},
                "attr": "decode",
                "ctx": {"_type": "Load"},
                "lineno": 2
            },
            "args": [{"_type": "Constant", "value": "base64", "lineno": 2}],
            "keywords": [],
            "lineno": 2
        }),
    ]));
    let decoded = body_item(&tree, 1);
    match &decoded.borrow().kind {
        AstKind::Bytes { value } => assert_eq!(value, b"hi"),
        other => panic!("expected decoded bytes, got {other:?}"),
    }
}

#[test]
fn call_target_alias_resolves_to_definition() {
    // y = open
    // y("f")
    let tree = run(module(vec![
        serde_json::json!({
            "_type": "Assign",
            "targets": [{"_type": "Name", "id": "y", "lineno": 1}],
            "value": {"_type": "Name", "id": "open", "lineno": 1},
            "lineno": 1
        }),
        serde_json::json!({
            "_type": "Call",
            "func": {"_type": "Name", "id": "y", "lineno": 2},
            "args": [{"_type": "Constant", "value": "f", "lineno": 2}],
            "keywords": [],
            "lineno": 2
        }),
    ]));
    let definition = body_item(&tree, 0);
    let call = body_item(&tree, 1);
    match &call.borrow().kind {
        AstKind::Call {
            func,
            full_name,
            original,
            ..
        } => {
            assert_eq!(full_name.as_deref(), Some("open"));
            assert_eq!(
                func.borrow().id,
                definition.borrow().id,
                "callee must reference the original definition"
            );
            assert!(original.is_some(), "bare callee preserved as back-link");
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn replace_call_folds_to_literal() {
    let tree = run(module(vec![serde_json::json!({
        "_type": "Call",
        "func": {
            "_type": "Attribute",
            "value": {"_type": "Constant", "value": "banana", "lineno": 1},
            "attr": "replace",
            "ctx": {"_type": "Load"},
            "lineno": 1
        },
        "args": [
            {"_type": "Constant", "value": "a", "lineno": 1},
            {"_type": "Constant", "value": "o", "lineno": 1}
        ],
        "keywords": [],
        "lineno": 1
    })]));
    let folded = body_item(&tree, 0);
    assert_eq!(folded.borrow().as_str_value(), Some("bonono"));
}

#[test]
fn import_alias_call_resolves_qualified_name() {
    // from os import open as op
    // op("f")
    let tree = run(module(vec![
        serde_json::json!({
            "_type": "ImportFrom",
            "module": "os",
            "names": [{"name": "open", "asname": "op"}],
            "lineno": 1
        }),
        serde_json::json!({
            "_type": "Call",
            "func": {"_type": "Name", "id": "op", "lineno": 2},
            "args": [{"_type": "Constant", "value": "f", "lineno": 2}],
            "keywords": [],
            "lineno": 2
        }),
    ]));
    let call = body_item(&tree, 1);
    match &call.borrow().kind {
        AstKind::Call {
            func, full_name, ..
        } => {
            assert_eq!(full_name.as_deref(), Some("os.open"));
            assert!(matches!(func.borrow().kind, AstKind::Import { .. }));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn nested_obfuscation_converges_to_fixed_point() {
    // ("=Gk" + "a")[::-1] style chains built from folds:
    // BinOp(add, "cd", "ab") -> "abcd", then sliced [0:2] -> "ab"
    let tree = run(module(vec![serde_json::json!({
        "_type": "Subscript",
        "value": {
            "_type": "BinOp",
            "op": {"_type": "Add"},
            "left": {"_type": "Constant", "value": "cd", "lineno": 1},
            "right": {"_type": "Constant", "value": "ab", "lineno": 1},
            "lineno": 1
        },
        "slice": {
            "_type": "Slice",
            "lower": {"_type": "Constant", "value": 0, "lineno": 1},
            "upper": {"_type": "Constant", "value": 2, "lineno": 1},
            "step": null
        },
        "lineno": 1
    })]));
    let folded = body_item(&tree, 0);
    assert_eq!(folded.borrow().as_str_value(), Some("ab"));
}

#[test]
fn unknown_stage_is_rejected_before_traversal() {
    let opts = EngineOptions::default();
    let registry = default_registry(&opts);
    let tree = from_json(&module(vec![]));
    let err = run_stages(
        tree,
        &["convert".to_string(), "taint_analysis".to_string()],
        &registry,
        &opts,
    )
    .unwrap_err();
    assert_eq!(err.kind(), defog_core::ErrorKind::StageNotFound);
}

#[test]
fn queue_cap_yields_partial_rewrite_without_crashing() {
    // A module far wider than the queue cap: traversal drops subtrees but
    // still terminates and yields a tree.
    let wide: Vec<serde_json::Value> = (0..64)
        .map(|i| {
            serde_json::json!({
                "_type": "BinOp",
                "op": {"_type": "Add"},
                "left": {"_type": "Constant", "value": format!("l{i}")},
                "right": {"_type": "Constant", "value": format!("r{i}")}
            })
        })
        .collect();
    let opts = EngineOptions::default().with_max_queue_size(8);
    let tree = run_with(module(wide), opts);
    assert!(tree.borrow().is_mapping());
}

#[test]
fn iteration_cap_bounds_runaway_trees() {
    let opts = EngineOptions::default().with_max_iterations(2);
    let tree = run_with(
        module(vec![serde_json::json!({
            "_type": "BinOp",
            "op": {"_type": "Add"},
            "left": {"_type": "Constant", "value": "ab"},
            "right": {"_type": "Constant", "value": "cd"}
        })]),
        opts,
    );
    // Two convert passes cannot finish promotion plus folding, but the
    // engine must still yield a tree rather than fail.
    assert!(tree.borrow().is_mapping());
}

#[test]
fn replace_folding_composes_across_passes() {
    // s.replace(a, b).replace(c, d) folds to the same literal whether the
    // inner fold lands one pass or two before the outer one.
    let tree = run(module(vec![serde_json::json!({
        "_type": "Call",
        "func": {
            "_type": "Attribute",
            "value": {
                "_type": "Call",
                "func": {
                    "_type": "Attribute",
                    "value": {"_type": "Constant", "value": "banana", "lineno": 1},
                    "attr": "replace",
                    "ctx": {"_type": "Load"},
                    "lineno": 1
                },
                "args": [
                    {"_type": "Constant", "value": "a", "lineno": 1},
                    {"_type": "Constant", "value": "o", "lineno": 1}
                ],
                "keywords": [],
                "lineno": 1
            },
            "attr": "replace",
            "ctx": {"_type": "Load"},
            "lineno": 1
        },
        "args": [
            {"_type": "Constant", "value": "o", "lineno": 1},
            {"_type": "Constant", "value": "u", "lineno": 1}
        ],
        "keywords": [],
        "lineno": 1
    })]));
    let folded = body_item(&tree, 0);
    assert_eq!(folded.borrow().as_str_value(), Some("bununu"));
}

#[test]
fn rot13_decode_of_encoded_text_restores_original() {
    // Decoding is an involution for rot13: applying the codec to already
    // rot13'd text yields the plain text.
    let tree = run(module(vec![serde_json::json!({
        "_type": "Call",
        "func": {
            "_type": "Attribute",
            "value": {"_type": "Constant", "value": "nggnpx ng qnja", "lineno": 1},
            "attr": "decode",
            "ctx": {"_type": "Load"},
            "lineno": 1
        },
        "args": [{"_type": "Constant", "value": "rot13", "lineno": 1}],
        "keywords": [],
        "lineno": 1
    })]));
    let decoded = body_item(&tree, 0);
    assert_eq!(decoded.borrow().as_str_value(), Some("attack at dawn"));
}

#[test]
fn line_numbers_survive_folding() {
    let tree = run(module(vec![serde_json::json!({
        "_type": "BinOp",
        "op": {"_type": "Add"},
        "left": {"_type": "Constant", "value": "x", "lineno": 9},
        "right": {"_type": "Constant", "value": "y", "lineno": 9},
        "lineno": 9
    })]));
    let folded = body_item(&tree, 0);
    assert_eq!(folded.borrow().line, Some(9));
}
