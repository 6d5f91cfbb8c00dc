//! Canonicalizer: raw content of any shape -> a safely displayable node.
//!
//! Total by construction: every [`ContentShape`] has an arm, recursion is
//! depth-bounded, and fallback serialization errors resolve to a fixed
//! placeholder. Output is always `Text` or a keyed `List` of canonical nodes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::content::shape::TEXT_KEY;
use crate::content::{ContentShape, RawNode, SanitizationPolicy};
use crate::monitoring::diagnostics::preview;

pub const DEFAULT_MAX_DEPTH: usize = 64;
/// Largest accepted `max_depth`; deeper recursion risks the thread's stack.
pub const MAX_DEPTH_LIMIT: usize = 1024;

// ============================================================================
// Canonical output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum CanonicalNode {
    Text(String),
    List(Vec<KeyedNode>),
}

/// A list element with a stable positional identity for list rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyedNode {
    pub key: String,
    pub node: CanonicalNode,
}

impl CanonicalNode {
    pub fn text(s: impl Into<String>) -> Self {
        CanonicalNode::Text(s.into())
    }

    /// Wraps `nodes` with positional keys `"0"`, `"1"`, ...
    pub fn keyed<I: IntoIterator<Item = CanonicalNode>>(nodes: I) -> Self {
        CanonicalNode::List(
            nodes
                .into_iter()
                .enumerate()
                .map(|(i, node)| KeyedNode {
                    key: i.to_string(),
                    node,
                })
                .collect(),
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CanonicalNode::Text(s) => Some(s),
            CanonicalNode::List(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CanonicalNode::Text(s) => s.is_empty(),
            CanonicalNode::List(items) => items.iter().all(|k| k.node.is_empty()),
        }
    }

    /// Leaf texts in depth-first order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            CanonicalNode::Text(s) => out.push(s),
            CanonicalNode::List(items) => {
                for item in items {
                    item.node.collect_leaves(out);
                }
            }
        }
    }

    /// Joins non-empty leaves with `sep`.
    pub fn flatten(&self, sep: &str) -> String {
        self.leaves()
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Fixed strings substituted when a value cannot be displayed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placeholders {
    pub function: String,
    pub unrenderable: String,
    /// Shown for an `{answers}` wrapper whose payload is not a list.
    pub answers_label: String,
    pub too_deep: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            function: "[Function]".to_string(),
            unrenderable: "[Unrenderable content]".to_string(),
            answers_label: "Answers".to_string(),
            too_deep: "[Content too deeply nested]".to_string(),
        }
    }
}

// ============================================================================
// Canonicalizer
// ============================================================================

#[derive(Debug, Clone)]
pub struct Canonicalizer {
    policy: Arc<SanitizationPolicy>,
    placeholders: Arc<Placeholders>,
    max_depth: usize,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(SanitizationPolicy::default())
    }
}

impl Canonicalizer {
    pub fn new(policy: SanitizationPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            placeholders: Arc::new(Placeholders::default()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_placeholders(mut self, placeholders: Placeholders) -> Self {
        self.placeholders = Arc::new(placeholders);
        self
    }

    /// A zero depth is bumped to one so top-level lists still render.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(1, MAX_DEPTH_LIMIT);
        self
    }

    pub fn policy(&self) -> &SanitizationPolicy {
        &self.policy
    }

    pub fn placeholders(&self) -> &Placeholders {
        &self.placeholders
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn canonicalize(&self, node: &RawNode) -> CanonicalNode {
        self.walk(node, 0)
    }

    /// Answer lists only: non-list input yields an empty list, every element
    /// becomes one display string.
    pub fn render_quiz_answers(&self, node: &RawNode) -> Vec<String> {
        match node.as_list() {
            Some(items) => items.iter().map(|item| self.answer_text(item)).collect(),
            None => {
                if !node.is_nullish() {
                    debug!(
                        event = "answers_not_a_list",
                        kind = node.kind(),
                        raw = %preview(node),
                    );
                }
                Vec::new()
            }
        }
    }

    fn answer_text(&self, item: &RawNode) -> String {
        let canonical = match item.as_map().and_then(|m| m.get(TEXT_KEY)) {
            Some(text) => self.walk(text, 1),
            None => self.walk(item, 1),
        };
        canonical.flatten(", ")
    }

    fn walk(&self, node: &RawNode, depth: usize) -> CanonicalNode {
        if depth > self.max_depth {
            warn!(
                event = "canonicalize_depth_exceeded",
                max_depth = self.max_depth,
                kind = node.kind(),
                raw = %preview(node),
            );
            return CanonicalNode::text(&self.placeholders.too_deep);
        }

        match self.policy.classify(node) {
            ContentShape::Absent => CanonicalNode::text(""),
            ContentShape::PlainText(s) => CanonicalNode::Text(s.into_owned()),
            ContentShape::Sequence(items) => self.keyed_list(items, depth),
            ContentShape::QuestionWithAnswers { prompt, answers } => {
                // The answers are dropped here. Callers that need them go
                // through the presentation guard, which reads them separately.
                debug!(
                    event = "question_with_answers_collapsed",
                    dropped_answers = answers.kind(),
                    raw = %preview(node),
                );
                self.walk(prompt, depth + 1)
            }
            ContentShape::AnswersOnly(answers) => match answers.as_list() {
                Some(items) => {
                    debug!(event = "answers_wrapper_unwrapped", raw = %preview(node));
                    self.keyed_list(items, depth)
                }
                None => {
                    warn!(
                        event = "answers_wrapper_not_a_list",
                        kind = answers.kind(),
                        raw = %preview(node),
                    );
                    CanonicalNode::text(&self.placeholders.answers_label)
                }
            },
            ContentShape::AnswerWithFlag { text, .. } => {
                debug!(event = "text_field_extracted", raw = %preview(node));
                self.walk(text, depth + 1)
            }
            ContentShape::Callable(name) => {
                warn!(event = "function_in_content", name = %name);
                CanonicalNode::text(&self.placeholders.function)
            }
            ContentShape::Unknown(raw) => self.serialize_fallback(raw),
        }
    }

    fn keyed_list(&self, items: &[RawNode], depth: usize) -> CanonicalNode {
        CanonicalNode::keyed(items.iter().map(|item| self.walk(item, depth + 1)))
    }

    fn serialize_fallback(&self, node: &RawNode) -> CanonicalNode {
        match serde_json::to_string(&node.bounded(self.max_depth)) {
            Ok(serialized) => {
                warn!(
                    event = "unrecognized_content_serialized",
                    kind = node.kind(),
                    raw = %preview(node),
                );
                CanonicalNode::Text(serialized)
            }
            Err(err) => {
                warn!(
                    event = "unrecognized_content_unserializable",
                    kind = node.kind(),
                    err = %err,
                    raw = %preview(node),
                );
                CanonicalNode::text(&self.placeholders.unrenderable)
            }
        }
    }
}

static DEFAULT_CANONICALIZER: Lazy<Canonicalizer> = Lazy::new(Canonicalizer::default);

/// Canonicalizes with the process-wide default policy.
pub fn canonicalize(node: &RawNode) -> CanonicalNode {
    DEFAULT_CANONICALIZER.canonicalize(node)
}

/// [`Canonicalizer::render_quiz_answers`] with the process-wide default policy.
pub fn render_quiz_answers(node: &RawNode) -> Vec<String> {
    DEFAULT_CANONICALIZER.render_quiz_answers(node)
}
