pub mod config;
pub mod content;
pub mod interceptor;
pub mod monitoring;
pub mod render;

pub use content::{RawNode, SanitizationPolicy};
pub use interceptor::{
    CanonicalNode, Canonicalizer, ContainmentBoundary, ContentPipeline, PresentationGuard, RenderOutcome,
};
pub use render::{LiveTree, OutputNode, RenderRuntime};
