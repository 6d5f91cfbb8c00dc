use std::num::NonZeroUsize;
use std::sync::Arc;

use super::boundary::{ContainmentBoundary, RenderOutcome};
use super::canonicalize::{CanonicalNode, Canonicalizer};
use super::guard::{GuardedQuestion, GuardedQuiz, PresentationGuard};
use super::memo::MemoizedCanonicalizer;
use super::runtime_patch::{self, InstallOutcome};
use crate::config::pipeline_config::{ConfigError, PipelineConfig};
use crate::content::{RawNode, SanitizationPolicy};
use crate::monitoring::mutation_watcher::{MutationWatcher, WatcherHandle};
use crate::render::live_tree::LiveTree;
use crate::render::runtime::RenderRuntime;
use crate::render::views::ContentView;

/// Single entry point wiring the layers together from one config.
pub struct ContentPipeline<'rt> {
    config: PipelineConfig,
    guard: PresentationGuard,
    memo: MemoizedCanonicalizer,
    runtime: &'rt RenderRuntime,
}

impl ContentPipeline<'static> {
    /// Pipeline over the process-wide runtime.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        Self::with_runtime(config, RenderRuntime::global())
    }
}

impl<'rt> ContentPipeline<'rt> {
    pub fn with_runtime(config: PipelineConfig, runtime: &'rt RenderRuntime) -> Result<Self, ConfigError> {
        config.validate()?;
        let canonicalizer = Canonicalizer::new(SanitizationPolicy::default())
            .with_placeholders(config.placeholders.clone())
            .with_max_depth(config.max_depth);
        let capacity = NonZeroUsize::new(config.memo_capacity)
            .ok_or_else(|| ConfigError::Invalid("memo_capacity must be at least 1".into()))?;

        Ok(Self {
            guard: PresentationGuard::new(canonicalizer.clone())
                .with_notice(config.boundary.fallback_message.clone()),
            memo: MemoizedCanonicalizer::new(canonicalizer, capacity),
            runtime,
            config,
        })
    }

    /// Process-start hook. Installs the interception layer if configured;
    /// safe to call any number of times.
    pub fn bootstrap(&self) -> Option<InstallOutcome> {
        self.config.intercept_runtime.then(|| {
            runtime_patch::install_with(self.runtime, self.guard.canonicalizer().clone())
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn guard(&self) -> &PresentationGuard {
        &self.guard
    }

    pub fn runtime(&self) -> &'rt RenderRuntime {
        self.runtime
    }

    /// Memoized canonicalization for standalone values.
    pub fn canonicalize(&self, raw: &RawNode) -> CanonicalNode {
        self.memo.canonicalize(raw)
    }

    pub fn render_quiz_answers(&self, raw: &RawNode) -> Vec<String> {
        self.guard.canonicalizer().render_quiz_answers(raw)
    }

    /// A fresh boundary carrying the configured fallback message.
    pub fn mount(&self, name: &str) -> ContainmentBoundary {
        ContainmentBoundary::new(name).with_message(self.config.boundary.fallback_message.clone())
    }

    pub fn render_quiz<V>(&self, boundary: &mut ContainmentBoundary, raw: &RawNode, view: &V) -> RenderOutcome
    where
        V: ContentView<GuardedQuiz> + ?Sized,
    {
        boundary.render(|| self.guard.with_quiz(raw, |quiz| view.render(quiz, self.runtime)))
    }

    pub fn render_question<V>(
        &self,
        boundary: &mut ContainmentBoundary,
        raw: &RawNode,
        view: &V,
    ) -> RenderOutcome
    where
        V: ContentView<GuardedQuestion> + ?Sized,
    {
        boundary.render(|| self.guard.with_question(raw, |q| view.render(q, self.runtime)))
    }

    /// Starts the validation-message watcher with the configured settings.
    /// Returns `None` outside a tokio runtime or if the tree is already watched.
    pub fn spawn_watcher(&self, tree: &Arc<LiveTree>) -> Option<WatcherHandle> {
        MutationWatcher::spawn(tree, self.config.watcher.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::node::{NodeProps, OutputNode, RenderError};
    use crate::render::views::QuizView;
    use serde_json::json;

    #[test]
    fn test_render_quiz_end_to_end() {
        let rt = RenderRuntime::new();
        let pipeline = ContentPipeline::with_runtime(PipelineConfig::default(), &rt).unwrap();
        let raw = RawNode::from(json!({
            "title": "T",
            "questions": [{"question": "Q", "answers": ["a", {"text": "b", "isCorrect": true}]}]
        }));
        let mut boundary = pipeline.mount("quiz");
        let outcome = pipeline.render_quiz(&mut boundary, &raw, &QuizView);
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.node().find_by_class("answer-correct")[0].text_content(), "b");
    }

    #[test]
    fn test_render_failure_uses_configured_message() {
        let rt = RenderRuntime::new();
        let mut config = PipelineConfig::default();
        config.boundary.fallback_message = "Quiz unavailable.".into();
        let pipeline = ContentPipeline::with_runtime(config, &rt).unwrap();

        let failing = |_: &GuardedQuiz, _: &RenderRuntime| -> Result<OutputNode, RenderError> {
            Err(RenderError::View("broken".into()))
        };
        let mut boundary = pipeline.mount("quiz");
        let outcome = pipeline.render_quiz(&mut boundary, &RawNode::Null, &failing);
        assert!(outcome.is_fallback());
        assert!(outcome.node().text_content().starts_with("Quiz unavailable."));
    }

    #[test]
    fn test_view_panicking_on_real_content_fails_the_boundary() {
        let rt = RenderRuntime::new();
        let pipeline = ContentPipeline::with_runtime(PipelineConfig::default(), &rt).unwrap();
        let picky = |quiz: &GuardedQuiz, rt: &RenderRuntime| -> Result<OutputNode, RenderError> {
            if quiz.title == "boom" {
                panic!("view cannot handle this title");
            }
            QuizView.render(quiz, rt)
        };

        let mut boundary = pipeline.mount("quiz");
        let raw = RawNode::from(json!({"title": "boom", "questions": []}));
        let outcome = pipeline.render_quiz(&mut boundary, &raw, &picky);
        assert!(outcome.is_fallback());
        assert!(boundary.is_failed());
    }

    #[test]
    fn test_malformed_quiz_shows_configured_notice() {
        let rt = RenderRuntime::new();
        let mut config = PipelineConfig::default();
        config.boundary.fallback_message = "Quiz unavailable.".into();
        let pipeline = ContentPipeline::with_runtime(config, &rt).unwrap();

        let mut boundary = pipeline.mount("quiz");
        let raw = RawNode::from(json!({"title": "T", "questions": "bad"}));
        let outcome = pipeline.render_quiz(&mut boundary, &raw, &QuizView);
        assert!(!outcome.is_fallback());
        assert_eq!(
            outcome.node().find_by_class("content-notice")[0].text_content(),
            "Quiz unavailable."
        );
    }

    #[test]
    fn test_bootstrap_respects_config_and_is_idempotent() {
        let rt = RenderRuntime::new();
        let pipeline = ContentPipeline::with_runtime(PipelineConfig::default(), &rt).unwrap();
        assert_eq!(pipeline.bootstrap(), Some(InstallOutcome::Installed));
        assert_eq!(pipeline.bootstrap(), Some(InstallOutcome::AlreadyInstalled));

        let rt2 = RenderRuntime::new();
        let config = PipelineConfig {
            intercept_runtime: false,
            ..PipelineConfig::default()
        };
        let off = ContentPipeline::with_runtime(config, &rt2).unwrap();
        assert_eq!(off.bootstrap(), None);
        assert!(!runtime_patch::is_installed(&rt2));
        // Host still rejects composites without the net.
        assert!(rt2
            .create_node("p", NodeProps::new(), vec![RawNode::from(json!({"a": 1})).into()])
            .is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let rt = RenderRuntime::new();
        let config = PipelineConfig {
            max_depth: 0,
            ..PipelineConfig::default()
        };
        assert!(ContentPipeline::with_runtime(config, &rt).is_err());
    }
}
