//! Shape classification for raw content.
//!
//! Every raw value is classified exactly once into a [`ContentShape`]; the
//! canonicalizer then matches on the shape exhaustively. Which map layouts map
//! to which shape is decided by the ordered rules in a [`SanitizationPolicy`].

use std::borrow::Cow;
use std::fmt;

use super::raw::{RawMap, RawNode};

pub const QUESTION_KEYS: &[&str] = &["question", "prompt"];
pub const ANSWERS_KEY: &str = "answers";
pub const TEXT_KEY: &str = "text";
pub const CORRECT_FLAG_KEYS: &[&str] = &["isCorrect", "is_correct", "correct"];

#[derive(Debug, Clone, PartialEq)]
pub enum ContentShape<'a> {
    /// `null` / `undefined`.
    Absent,
    /// A string, number or boolean, already rendered to text.
    PlainText(Cow<'a, str>),
    Sequence(&'a [RawNode]),
    /// `{question|prompt, answers}`.
    QuestionWithAnswers {
        prompt: &'a RawNode,
        answers: &'a RawNode,
    },
    /// A map whose only key is `answers`.
    AnswersOnly(&'a RawNode),
    /// `{text, isCorrect?}`.
    AnswerWithFlag {
        text: &'a RawNode,
        is_correct: Option<bool>,
    },
    Callable(&'a str),
    /// Anything no rule recognised, including symbols.
    Unknown(&'a RawNode),
}

impl ContentShape<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            ContentShape::Absent => "absent",
            ContentShape::PlainText(_) => "plain_text",
            ContentShape::Sequence(_) => "sequence",
            ContentShape::QuestionWithAnswers { .. } => "question_with_answers",
            ContentShape::AnswersOnly(_) => "answers_only",
            ContentShape::AnswerWithFlag { .. } => "answer_with_flag",
            ContentShape::Callable(_) => "callable",
            ContentShape::Unknown(_) => "unknown",
        }
    }
}

/// One entry of the policy: if `predicate` accepts a map, `extract` decides its shape.
#[derive(Clone, Copy)]
pub struct ShapeRule {
    pub name: &'static str,
    pub predicate: fn(&RawMap) -> bool,
    pub extract: fn(&RawMap) -> ContentShape<'_>,
}

impl fmt::Debug for ShapeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeRule").field("name", &self.name).finish()
    }
}

/// Ordered, immutable rule list. First matching rule wins.
#[derive(Debug, Clone)]
pub struct SanitizationPolicy {
    rules: Vec<ShapeRule>,
}

impl Default for SanitizationPolicy {
    fn default() -> Self {
        Self::new(vec![
            QUESTION_WITH_ANSWERS_RULE,
            ANSWERS_ONLY_RULE,
            ANSWER_WITH_TEXT_RULE,
        ])
    }
}

impl SanitizationPolicy {
    pub fn new(rules: Vec<ShapeRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ShapeRule] {
        &self.rules
    }

    /// Classifies `node`. Maps go through the rule list; everything else is
    /// decided by its variant alone.
    pub fn classify<'a>(&self, node: &'a RawNode) -> ContentShape<'a> {
        match node {
            RawNode::Undefined | RawNode::Null => ContentShape::Absent,
            RawNode::Text(s) => ContentShape::PlainText(Cow::Borrowed(s.as_str())),
            RawNode::Number(n) => ContentShape::PlainText(Cow::Owned(n.to_string())),
            RawNode::Bool(b) => ContentShape::PlainText(Cow::Borrowed(if *b {
                "true"
            } else {
                "false"
            })),
            RawNode::List(items) => ContentShape::Sequence(items),
            RawNode::Function(name) => ContentShape::Callable(name),
            RawNode::Symbol(_) => ContentShape::Unknown(node),
            RawNode::Map(map) => self
                .rules
                .iter()
                .find(|rule| (rule.predicate)(map))
                .map(|rule| (rule.extract)(map))
                .unwrap_or(ContentShape::Unknown(node)),
        }
    }
}

pub fn question_prompt(map: &RawMap) -> Option<&RawNode> {
    QUESTION_KEYS.iter().find_map(|k| map.get(*k))
}

pub fn correct_flag(map: &RawMap) -> Option<bool> {
    CORRECT_FLAG_KEYS.iter().find_map(|k| match map.get(*k) {
        Some(RawNode::Bool(b)) => Some(*b),
        _ => None,
    })
}

pub const QUESTION_WITH_ANSWERS_RULE: ShapeRule = ShapeRule {
    name: "question_with_answers",
    predicate: has_question_and_answers,
    extract: extract_question_with_answers,
};

pub const ANSWERS_ONLY_RULE: ShapeRule = ShapeRule {
    name: "answers_only",
    predicate: has_only_answers,
    extract: extract_answers_only,
};

pub const ANSWER_WITH_TEXT_RULE: ShapeRule = ShapeRule {
    name: "answer_with_text",
    predicate: has_text,
    extract: extract_answer_with_flag,
};

fn has_question_and_answers(map: &RawMap) -> bool {
    question_prompt(map).is_some() && map.contains_key(ANSWERS_KEY)
}

fn has_only_answers(map: &RawMap) -> bool {
    map.len() == 1 && map.contains_key(ANSWERS_KEY)
}

fn has_text(map: &RawMap) -> bool {
    map.contains_key(TEXT_KEY)
}

// Extractors only run after their predicate matched, so the lookups below hit.
// They still degrade to `Absent` fields instead of panicking if reused elsewhere.

static MISSING: RawNode = RawNode::Undefined;

fn extract_question_with_answers(map: &RawMap) -> ContentShape<'_> {
    ContentShape::QuestionWithAnswers {
        prompt: question_prompt(map).unwrap_or(&MISSING),
        answers: map.get(ANSWERS_KEY).unwrap_or(&MISSING),
    }
}

fn extract_answers_only(map: &RawMap) -> ContentShape<'_> {
    ContentShape::AnswersOnly(map.get(ANSWERS_KEY).unwrap_or(&MISSING))
}

fn extract_answer_with_flag(map: &RawMap) -> ContentShape<'_> {
    ContentShape::AnswerWithFlag {
        text: map.get(TEXT_KEY).unwrap_or(&MISSING),
        is_correct: correct_flag(map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_json(value: serde_json::Value) -> &'static str {
        let node = RawNode::from(value);
        SanitizationPolicy::default().classify(&node).name()
    }

    #[test]
    fn test_primitives_and_absent() {
        assert_eq!(classify_json(json!(null)), "absent");
        assert_eq!(classify_json(json!("hi")), "plain_text");
        assert_eq!(classify_json(json!(4.5)), "plain_text");
        assert_eq!(classify_json(json!([1, 2])), "sequence");
    }

    #[test]
    fn test_rule_order_question_beats_text() {
        // Has both a question/answers pair and a text key: first rule wins.
        assert_eq!(
            classify_json(json!({"question": "Q", "answers": [], "text": "t"})),
            "question_with_answers"
        );
        assert_eq!(
            classify_json(json!({"prompt": "Q", "answers": []})),
            "question_with_answers"
        );
    }

    #[test]
    fn test_answers_only_requires_single_key() {
        assert_eq!(classify_json(json!({"answers": ["a"]})), "answers_only");
        assert_eq!(classify_json(json!({"answers": ["a"], "extra": 1})), "unknown");
    }

    #[test]
    fn test_answer_with_flag_reads_correctness() {
        let node = RawNode::from(json!({"text": "A", "isCorrect": true}));
        match SanitizationPolicy::default().classify(&node) {
            ContentShape::AnswerWithFlag { text, is_correct } => {
                assert_eq!(text, &RawNode::text("A"));
                assert_eq!(is_correct, Some(true));
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_symbol_and_function() {
        let policy = SanitizationPolicy::default();
        assert_eq!(policy.classify(&RawNode::Symbol("s".into())).name(), "unknown");
        assert_eq!(
            policy.classify(&RawNode::Function("render".into())),
            ContentShape::Callable("render")
        );
    }

    #[test]
    fn test_empty_policy_leaves_maps_unknown() {
        let policy = SanitizationPolicy::new(vec![]);
        let node = RawNode::from(json!({"text": "A"}));
        assert_eq!(policy.classify(&node).name(), "unknown");
    }
}
