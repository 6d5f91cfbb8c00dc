//! Presentation guard: canonicalizes the known content fields of a quiz or
//! question record into a shadow copy before a view ever sees it.
//!
//! Only the fields views actually display are walked; the rest of the record
//! is ignored. If the shadow copy cannot be built the view still runs, with
//! empty content carrying a short notice for the user. A view that panics is
//! logged here and left to the enclosing boundary.

use serde::Serialize;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::warn;

use super::boundary::DEFAULT_FALLBACK_MESSAGE;
use super::canonicalize::{CanonicalNode, Canonicalizer};
use crate::content::shape::{correct_flag, question_prompt, ANSWERS_KEY, TEXT_KEY};
use crate::content::RawNode;
use crate::monitoring::diagnostics::preview;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("expected a content record, found {found}")]
    NotARecord { found: &'static str },
    #[error("field `{field}` has unexpected type {found}")]
    MalformedField {
        field: &'static str,
        found: &'static str,
    },
    #[error("shadow copy construction panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, GuardError>;

const TITLE_KEY: &str = "title";
const DESCRIPTION_KEY: &str = "description";
const QUESTIONS_KEY: &str = "questions";
const EXPLANATION_KEY: &str = "explanation";
const DISPLAY_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardedQuestion {
    /// Positional identity within the quiz.
    pub key: String,
    pub prompt: CanonicalNode,
    pub answers: Vec<String>,
    /// Indices into `answers` flagged correct by the source record.
    pub correct_answers: Vec<usize>,
    pub explanation: String,
    /// Set when the record could not be read and this is substitute content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Default for GuardedQuestion {
    fn default() -> Self {
        Self {
            key: "0".to_string(),
            prompt: CanonicalNode::text(""),
            answers: Vec::new(),
            correct_answers: Vec::new(),
            explanation: String::new(),
            notice: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GuardedQuiz {
    pub title: String,
    pub description: String,
    pub questions: Vec<GuardedQuestion>,
    /// Set when the record could not be read and this is substitute content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Empty content handed to a view in place of a record that failed to build.
pub trait Substitute {
    fn substitute(notice: &str) -> Self;
}

impl Substitute for GuardedQuiz {
    fn substitute(notice: &str) -> Self {
        Self {
            notice: Some(notice.to_string()),
            ..Self::default()
        }
    }
}

impl Substitute for GuardedQuestion {
    fn substitute(notice: &str) -> Self {
        Self {
            notice: Some(notice.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PresentationGuard {
    canonicalizer: Canonicalizer,
    notice: String,
}

impl Default for PresentationGuard {
    fn default() -> Self {
        Self::new(Canonicalizer::default())
    }
}

impl PresentationGuard {
    pub fn new(canonicalizer: Canonicalizer) -> Self {
        Self {
            canonicalizer,
            notice: DEFAULT_FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Message shown to the user in place of content that could not be read.
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = notice.into();
        self
    }

    pub fn notice(&self) -> &str {
        &self.notice
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Runs `view` with a canonical shadow copy of the quiz record.
    pub fn with_quiz<R>(&self, raw: &RawNode, view: impl FnOnce(&GuardedQuiz) -> R) -> R {
        let quiz = self.contain("quiz", raw, || self.shadow_quiz(raw));
        present("quiz", &quiz, view)
    }

    /// Runs `view` with a canonical shadow copy of a single question record.
    pub fn with_question<R>(&self, raw: &RawNode, view: impl FnOnce(&GuardedQuestion) -> R) -> R {
        let question = self.contain("question", raw, || self.shadow_question(raw, 0));
        present("question", &question, view)
    }

    pub fn shadow_quiz(&self, raw: &RawNode) -> Result<GuardedQuiz> {
        let map = raw.as_map().ok_or(GuardError::NotARecord { found: raw.kind() })?;
        let questions = match map.get(QUESTIONS_KEY) {
            None | Some(RawNode::Null) | Some(RawNode::Undefined) => Vec::new(),
            Some(RawNode::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.shadow_question(item, i))
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(GuardError::MalformedField {
                    field: QUESTIONS_KEY,
                    found: other.kind(),
                })
            }
        };

        Ok(GuardedQuiz {
            title: self.display_text(raw.get(TITLE_KEY)),
            description: self.display_text(raw.get(DESCRIPTION_KEY)),
            questions,
            notice: None,
        })
    }

    /// Builds one question. Non-record entries (a bare string, say) become
    /// prompt-only questions.
    pub fn shadow_question(&self, raw: &RawNode, index: usize) -> Result<GuardedQuestion> {
        let key = index.to_string();
        let Some(map) = raw.as_map() else {
            return Ok(GuardedQuestion {
                key,
                prompt: self.canonicalizer.canonicalize(raw),
                ..GuardedQuestion::default()
            });
        };

        let prompt = match (question_prompt(map), map.get(TEXT_KEY)) {
            (Some(p), _) => self.canonicalizer.canonicalize(p),
            (None, Some(text)) => {
                warn!(event = "question_prompt_from_text", raw = %preview(raw));
                self.canonicalizer.canonicalize(text)
            }
            (None, None) => {
                warn!(event = "question_prompt_missing", raw = %preview(raw));
                CanonicalNode::text("")
            }
        };
        let answers_raw = raw.get(ANSWERS_KEY);
        let answers = self.canonicalizer.render_quiz_answers(answers_raw);
        let correct_answers = answers_raw
            .as_list()
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| item.as_map().and_then(correct_flag) == Some(true))
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();

        Ok(GuardedQuestion {
            key,
            prompt,
            answers,
            correct_answers,
            explanation: self.display_text(raw.get(EXPLANATION_KEY)),
            notice: None,
        })
    }

    fn display_text(&self, node: &RawNode) -> String {
        self.canonicalizer.canonicalize(node).flatten(DISPLAY_SEPARATOR)
    }

    /// Shadow construction runs in its own failure scope: errors and panics
    /// both end in logged substitute content.
    fn contain<T: Substitute>(
        &self,
        record: &'static str,
        raw: &RawNode,
        build: impl FnOnce() -> Result<T>,
    ) -> T {
        let outcome = catch_unwind(AssertUnwindSafe(build)).unwrap_or(Err(GuardError::Panicked));
        match outcome {
            Ok(shadow) => shadow,
            Err(err) => {
                warn!(
                    event = "guard_shadow_copy_failed",
                    record,
                    err = %err,
                    raw = %preview(raw),
                );
                T::substitute(&self.notice)
            }
        }
    }
}

/// Runs the view over the shadow copy. A panic is logged with the record kind
/// and then continues to the enclosing boundary, which owns view failures.
fn present<T, R>(record: &'static str, shadow: &T, view: impl FnOnce(&T) -> R) -> R {
    match catch_unwind(AssertUnwindSafe(|| view(shadow))) {
        Ok(out) => out,
        Err(payload) => {
            warn!(event = "guard_view_failed", record);
            resume_unwind(payload)
        }
    }
}
