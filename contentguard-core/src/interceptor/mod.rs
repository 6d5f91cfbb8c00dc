pub mod boundary;
pub mod canonicalize;
pub mod guard;
pub mod memo;
pub mod pipeline;
pub mod runtime_patch;

pub use boundary::{BoundaryState, ContainmentBoundary, RenderOutcome};
pub use canonicalize::{canonicalize, render_quiz_answers, CanonicalNode, Canonicalizer, KeyedNode, Placeholders};
pub use guard::{GuardError, GuardedQuestion, GuardedQuiz, PresentationGuard, Substitute};
pub use memo::MemoizedCanonicalizer;
pub use pipeline::ContentPipeline;
pub use runtime_patch::{install, install_with, is_installed, uninstall, InstallOutcome, UninstallOutcome};
