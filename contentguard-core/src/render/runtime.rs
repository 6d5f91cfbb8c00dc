//! The rendering runtime and its two output primitives.
//!
//! Everything that produces output goes through `create_node` (build an element
//! from a tag and a child list) or `materialize_text` (turn a value into a text
//! node). Both live behind a lock as shared function references so the
//! interception layer can swap them and later put the originals back.
//!
//! The host primitives mimic a loosely typed UI runtime: composite children are
//! rejected outright, and text materialization coerces composites to
//! `[object Object]`-style strings.

use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use super::node::{Child, NodeProps, OutputNode, RenderError, Result};
use crate::content::RawNode;
use crate::interceptor::runtime_patch::InterceptionSlot;

pub type CreateNodeFn =
    Arc<dyn Fn(&str, NodeProps, Vec<Child>) -> Result<OutputNode> + Send + Sync>;
pub type MaterializeTextFn = Arc<dyn Fn(RawNode) -> OutputNode + Send + Sync>;

#[derive(Clone)]
pub struct Primitives {
    pub create_node: CreateNodeFn,
    pub materialize_text: MaterializeTextFn,
}

impl Primitives {
    /// The unpatched host primitives.
    pub fn host() -> Self {
        Self {
            create_node: Arc::new(host_create_node),
            materialize_text: Arc::new(host_materialize_text),
        }
    }

    /// Reference identity, not behavioral equality.
    pub fn same_as(&self, other: &Primitives) -> bool {
        Arc::ptr_eq(&self.create_node, &other.create_node)
            && Arc::ptr_eq(&self.materialize_text, &other.materialize_text)
    }
}

impl fmt::Debug for Primitives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitives")
            .field("create_node", &Arc::as_ptr(&self.create_node).cast::<()>())
            .field("materialize_text", &Arc::as_ptr(&self.materialize_text).cast::<()>())
            .finish()
    }
}

pub struct RenderRuntime {
    primitives: RwLock<Primitives>,
    pub(crate) interception: InterceptionSlot,
}

impl Default for RenderRuntime {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_RUNTIME: Lazy<RenderRuntime> = Lazy::new(RenderRuntime::new);

impl RenderRuntime {
    pub fn new() -> Self {
        Self {
            primitives: RwLock::new(Primitives::host()),
            interception: InterceptionSlot::default(),
        }
    }

    /// The process-wide runtime shared by every view in the host application.
    pub fn global() -> &'static RenderRuntime {
        &GLOBAL_RUNTIME
    }

    /// Snapshot of the currently active primitive references.
    pub fn primitives(&self) -> Primitives {
        self.primitives
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the active primitives, returning the previous ones.
    pub(crate) fn swap_primitives(&self, next: Primitives) -> Primitives {
        let mut guard = self
            .primitives
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    pub fn create_node(
        &self,
        tag: &str,
        props: NodeProps,
        children: Vec<Child>,
    ) -> Result<OutputNode> {
        // Clone the reference out so the lock is not held while user code runs.
        let create = self.primitives().create_node;
        create(tag, props, children)
    }

    pub fn materialize_text(&self, value: impl Into<RawNode>) -> OutputNode {
        let materialize = self.primitives().materialize_text;
        materialize(value.into())
    }
}

fn valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 64
        && tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        && tag.as_bytes()[0].is_ascii_alphabetic()
}

fn host_create_node(tag: &str, props: NodeProps, children: Vec<Child>) -> Result<OutputNode> {
    if !valid_tag(tag) {
        return Err(RenderError::InvalidTag(tag.to_string()));
    }
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        push_child(tag, child, &mut out)?;
    }
    Ok(OutputNode::element(tag, props, out))
}

fn push_child(tag: &str, child: Child, out: &mut Vec<OutputNode>) -> Result<()> {
    match child {
        Child::Node(node) => out.push(node),
        Child::Value(value) => push_value(tag, value, out)?,
    }
    Ok(())
}

fn push_value(tag: &str, value: RawNode, out: &mut Vec<OutputNode>) -> Result<()> {
    match value {
        // Nullish and boolean children render nothing.
        RawNode::Undefined | RawNode::Null | RawNode::Bool(_) => {}
        RawNode::Text(s) => out.push(OutputNode::Text(s)),
        RawNode::Number(n) => out.push(OutputNode::Text(n.to_string())),
        RawNode::List(items) => {
            for item in items {
                push_value(tag, item, out)?;
            }
        }
        composite @ (RawNode::Map(_) | RawNode::Function(_) | RawNode::Symbol(_)) => {
            return Err(RenderError::InvalidChild {
                tag: tag.to_string(),
                kind: composite.kind(),
            });
        }
    }
    Ok(())
}

fn host_materialize_text(value: RawNode) -> OutputNode {
    OutputNode::Text(value.coerce_to_string())
}
