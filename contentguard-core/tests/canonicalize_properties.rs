use contentguard_core::content::RawNode;
use contentguard_core::interceptor::canonicalize::{canonicalize, render_quiz_answers, CanonicalNode};
use proptest::prelude::*;
use serde_json::json;

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("question".to_string()),
        Just("prompt".to_string()),
        Just("answers".to_string()),
        Just("text".to_string()),
        Just("isCorrect".to_string()),
        "[a-z]{1,6}",
    ]
}

fn arb_raw() -> impl Strategy<Value = RawNode> {
    let leaf = prop_oneof![
        Just(RawNode::Undefined),
        Just(RawNode::Null),
        any::<bool>().prop_map(RawNode::Bool),
        any::<i64>().prop_map(RawNode::from),
        "[ -~]{0,12}".prop_map(RawNode::Text),
        "[a-z]{1,8}".prop_map(RawNode::Function),
        "[a-z]{1,8}".prop_map(RawNode::Symbol),
    ];
    leaf.prop_recursive(6, 64, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(RawNode::List),
            prop::collection::btree_map(arb_key(), inner, 0..4).prop_map(RawNode::Map),
        ]
    })
}

fn depth(node: &CanonicalNode) -> usize {
    match node {
        CanonicalNode::Text(_) => 0,
        CanonicalNode::List(items) => 1 + items.iter().map(|k| depth(&k.node)).max().unwrap_or(0),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any input yields a tree of strings that serializes cleanly.
    #[test]
    fn prop_canonicalize_is_total(raw in arb_raw()) {
        let out = canonicalize(&raw);
        prop_assert!(serde_json::to_string(&out).is_ok());
        for leaf in out.leaves() {
            prop_assert!(!leaf.contains("[object "), "leaked coercion text: {}", leaf);
        }
    }

    /// Canonical output canonicalizes to itself.
    #[test]
    fn prop_canonicalize_is_idempotent(raw in arb_raw()) {
        let once = canonicalize(&raw);
        let twice = canonicalize(&RawNode::from(once.clone()));
        prop_assert_eq!(once, twice);
    }

    /// List positions are keyed "0", "1", ... at every level.
    #[test]
    fn prop_list_keys_are_positional(items in prop::collection::vec(arb_raw(), 0..6)) {
        let out = canonicalize(&RawNode::List(items.clone()));
        match out {
            CanonicalNode::List(keyed) => {
                prop_assert_eq!(keyed.len(), items.len());
                for (i, k) in keyed.iter().enumerate() {
                    prop_assert_eq!(k.key.clone(), i.to_string());
                }
            }
            CanonicalNode::Text(_) => prop_assert!(false, "a list must stay a list"),
        }
    }

    #[test]
    fn prop_text_passes_through(s in "\\PC{0,32}") {
        prop_assert_eq!(canonicalize(&RawNode::Text(s.clone())), CanonicalNode::Text(s));
    }

    #[test]
    fn prop_quiz_answers_one_string_per_element(items in prop::collection::vec(arb_raw(), 0..6)) {
        let answers = render_quiz_answers(&RawNode::List(items.clone()));
        prop_assert_eq!(answers.len(), items.len());
    }
}

#[test]
fn deep_nesting_is_cut_off() {
    let mut raw = json!("bottom");
    for _ in 0..500 {
        raw = json!([raw]);
    }
    let out = canonicalize(&RawNode::from(raw));
    assert!(depth(&out) <= 65);
    assert!(out.leaves().contains(&"[Content too deeply nested]"));
}

#[test]
fn deep_unknown_map_falls_back_to_placeholder() {
    let mut raw = json!({"leaf": 1});
    for _ in 0..200 {
        raw = json!({"wrap": raw});
    }
    assert_eq!(
        canonicalize(&RawNode::from(raw)),
        CanonicalNode::text("[Unrenderable content]")
    );
}

#[test]
fn documented_examples() {
    assert_eq!(
        canonicalize(&RawNode::from(json!({"question": "Q", "answers": ["A", "B"]}))),
        CanonicalNode::text("Q"),
        "answers are dropped when a question is present"
    );
    assert_eq!(canonicalize(&RawNode::from(json!({"text": "foo"}))), CanonicalNode::text("foo"));
    assert_eq!(
        render_quiz_answers(&RawNode::from(json!([{"text": "x"}, "y"]))),
        vec!["x".to_string(), "y".to_string()]
    );
    assert_eq!(
        canonicalize(&RawNode::Function("onClick".into())),
        CanonicalNode::text("[Function]")
    );
}
