//! In-process rendering runtime: output nodes, the two output primitives, the
//! live output tree, and typed views over guarded content.

pub mod live_tree;
pub mod node;
pub mod runtime;
pub mod views;

pub use live_tree::{LiveTree, NodeId, TreeMutation};
pub use node::{Child, NodeProps, OutputNode, RenderError};
pub use runtime::{Primitives, RenderRuntime};
pub use views::{ContentView, QuestionView, QuizView};
