//! Containment boundary around a rendered subtree.
//!
//! Each render attempt yields an explicit [`RenderOutcome`]. The first failure
//! (an `Err` from the child or a panic inside it) moves the boundary to
//! `Failed`, which is terminal: the child is never run again by this instance.
//! Recovery means dropping the boundary and mounting a new one.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

use crate::render::node::{NodeProps, OutputNode, RenderError};

pub const DEFAULT_FALLBACK_MESSAGE: &str = "Something went wrong while displaying this content.";
pub const FALLBACK_CLASS: &str = "content-boundary-fallback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryState {
    Healthy,
    /// `reason` is for logs and diagnostics only; it never reaches output.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered(OutputNode),
    Fallback(OutputNode),
}

impl RenderOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, RenderOutcome::Fallback(_))
    }

    pub fn node(&self) -> &OutputNode {
        match self {
            RenderOutcome::Rendered(node) | RenderOutcome::Fallback(node) => node,
        }
    }

    pub fn into_node(self) -> OutputNode {
        match self {
            RenderOutcome::Rendered(node) | RenderOutcome::Fallback(node) => node,
        }
    }
}

type FallbackView = Box<dyn Fn() -> OutputNode + Send + Sync>;

pub struct ContainmentBoundary {
    name: String,
    state: BoundaryState,
    message: String,
    fallback_view: Option<FallbackView>,
}

impl fmt::Debug for ContainmentBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainmentBoundary")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("has_fallback_view", &self.fallback_view.is_some())
            .finish()
    }
}

impl ContainmentBoundary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: BoundaryState::Healthy,
            message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            fallback_view: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Caller-supplied view rendered under the fallback message.
    pub fn with_fallback_view(
        mut self,
        view: impl Fn() -> OutputNode + Send + Sync + 'static,
    ) -> Self {
        self.fallback_view = Some(Box::new(view));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, BoundaryState::Failed { .. })
    }

    pub fn render<F>(&mut self, child: F) -> RenderOutcome
    where
        F: FnOnce() -> Result<OutputNode, RenderError>,
    {
        if self.is_failed() {
            return RenderOutcome::Fallback(self.fallback());
        }

        let reason = match catch_unwind(AssertUnwindSafe(child)) {
            Ok(Ok(node)) => return RenderOutcome::Rendered(node),
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
        };

        error!(
            event = "boundary_render_failed",
            boundary = %self.name,
            reason = %reason,
        );
        info!(event = "boundary_state_changed", boundary = %self.name, state = "failed");
        self.state = BoundaryState::Failed { reason };
        RenderOutcome::Fallback(self.fallback())
    }

    fn fallback(&self) -> OutputNode {
        let mut children = vec![OutputNode::element(
            "p",
            NodeProps::new().class("content-boundary-message"),
            vec![OutputNode::text(&self.message)],
        )];
        if let Some(view) = &self.fallback_view {
            // The fallback view is caller code too; a panic there leaves only the message.
            if let Ok(node) = catch_unwind(AssertUnwindSafe(|| view())) {
                children.push(node);
            }
        }
        OutputNode::element("div", NodeProps::new().class(FALLBACK_CLASS), children)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_node() -> OutputNode {
        OutputNode::element("p", NodeProps::new(), vec![OutputNode::text("fine")])
    }

    #[test]
    fn test_healthy_renders_child() {
        let mut b = ContainmentBoundary::new("quiz");
        let outcome = b.render(|| Ok(ok_node()));
        assert_eq!(outcome, RenderOutcome::Rendered(ok_node()));
        assert_eq!(b.state(), &BoundaryState::Healthy);
    }

    #[test]
    fn test_error_moves_to_failed_without_leaking_reason() {
        let mut b = ContainmentBoundary::new("quiz");
        let outcome = b.render(|| Err(RenderError::View("secret {\"a\":1}".into())));
        assert!(outcome.is_fallback());
        assert!(b.is_failed());
        let text = outcome.node().text_content();
        assert_eq!(text, DEFAULT_FALLBACK_MESSAGE);
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_panic_is_contained() {
        let mut b = ContainmentBoundary::new("quiz");
        let outcome = b.render(|| -> Result<OutputNode, RenderError> { panic!("boom") });
        assert!(outcome.is_fallback());
        match b.state() {
            BoundaryState::Failed { reason } => assert!(reason.contains("boom")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut b = ContainmentBoundary::new("quiz");
        b.render(|| Err(RenderError::View("x".into())));
        let mut called = false;
        let outcome = b.render(|| {
            called = true;
            Ok(ok_node())
        });
        assert!(!called);
        assert!(outcome.is_fallback());
    }

    #[test]
    fn test_fallback_view_and_message() {
        let mut b = ContainmentBoundary::new("quiz")
            .with_message("Quiz unavailable.")
            .with_fallback_view(|| OutputNode::text("Try again later"));
        let node = b.render(|| Err(RenderError::View("x".into()))).into_node();
        assert!(node.has_class(FALLBACK_CLASS));
        assert_eq!(node.text_content(), "Quiz unavailable.Try again later");
    }

    #[test]
    fn test_remount_recovers() {
        let mut b = ContainmentBoundary::new("quiz");
        b.render(|| Err(RenderError::View("x".into())));
        assert!(b.is_failed());
        let mut fresh = ContainmentBoundary::new(b.name().to_string());
        assert!(!fresh.render(|| Ok(ok_node())).is_fallback());
    }
}
