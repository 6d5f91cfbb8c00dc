//! The live output tree: rendered nodes after they have been mounted.
//!
//! Nodes live in an arena addressed by [`NodeId`]. Structural and text changes
//! are announced on a broadcast channel so observers can react after the fact.
//! Observers that fall behind lose events; nothing is replayed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

use super::node::{NodeProps, OutputNode};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} is a text node and cannot have children")]
    NotAnElement(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
}

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeMutation {
    /// A subtree rooted at this node was appended.
    Inserted(NodeId),
    /// The text of this text node was replaced.
    TextChanged(NodeId),
}

#[derive(Debug, Clone)]
enum LiveKind {
    Element { tag: String, props: NodeProps },
    Text(String),
}

#[derive(Debug, Clone)]
struct LiveNode {
    parent: Option<NodeId>,
    kind: LiveKind,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<LiveNode>,
}

impl Arena {
    fn get(&self, id: NodeId) -> Result<&LiveNode> {
        self.nodes.get(id.0).ok_or(TreeError::UnknownNode(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut LiveNode> {
        self.nodes.get_mut(id.0).ok_or(TreeError::UnknownNode(id))
    }

    fn mount(&mut self, parent: NodeId, node: OutputNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (kind, children) = match node {
            OutputNode::Text(s) => (LiveKind::Text(s), Vec::new()),
            OutputNode::Element {
                tag,
                props,
                children,
            } => (LiveKind::Element { tag, props }, children),
        };
        self.nodes.push(LiveNode {
            parent: Some(parent),
            kind,
            children: Vec::new(),
        });
        let child_ids: Vec<NodeId> = children
            .into_iter()
            .map(|child| self.mount(id, child))
            .collect();
        self.nodes[id.0].children = child_ids;
        id
    }

    fn snapshot(&self, id: NodeId) -> Result<OutputNode> {
        let node = self.get(id)?;
        Ok(match &node.kind {
            LiveKind::Text(s) => OutputNode::Text(s.clone()),
            LiveKind::Element { tag, props } => OutputNode::Element {
                tag: tag.clone(),
                props: props.clone(),
                children: node
                    .children
                    .iter()
                    .map(|c| self.snapshot(*c))
                    .collect::<Result<Vec<_>>>()?,
            },
        })
    }
}

pub struct LiveTree {
    arena: Mutex<Arena>,
    events: broadcast::Sender<TreeMutation>,
    watched: AtomicBool,
}

impl Default for LiveTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTree {
    pub const ROOT_TAG: &'static str = "body";

    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let root = LiveNode {
            parent: None,
            kind: LiveKind::Element {
                tag: Self::ROOT_TAG.to_string(),
                props: NodeProps::default(),
            },
            children: Vec::new(),
        };
        Self {
            arena: Mutex::new(Arena { nodes: vec![root] }),
            events,
            watched: AtomicBool::new(false),
        }
    }

    fn arena(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeMutation> {
        self.events.subscribe()
    }

    /// Mounts `node` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, node: OutputNode) -> Result<NodeId> {
        let id = {
            let mut arena = self.arena();
            if matches!(arena.get(parent)?.kind, LiveKind::Text(_)) {
                return Err(TreeError::NotAnElement(parent));
            }
            let id = arena.mount(parent, node);
            arena.get_mut(parent)?.children.push(id);
            id
        };
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(TreeMutation::Inserted(id));
        Ok(id)
    }

    /// Replaces the text of a text node and announces it.
    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> Result<()> {
        self.write_text(node, text.into())?;
        let _ = self.events.send(TreeMutation::TextChanged(node));
        Ok(())
    }

    /// Replaces text without announcing it, but only if `matches` accepts the
    /// current text. Check and write happen under one lock, so a concurrent
    /// `set_text` is never overwritten. Returns the replaced text, or `None`
    /// if nothing changed. Used by observers correcting content, so their own
    /// writes do not feed back into them.
    pub(crate) fn rewrite_text_if(
        &self,
        node: NodeId,
        matches: impl FnOnce(&str) -> bool,
        text: String,
    ) -> Result<Option<String>> {
        let mut arena = self.arena();
        match &mut arena.get_mut(node)?.kind {
            LiveKind::Text(s) => Ok(matches(s).then(|| std::mem::replace(s, text))),
            LiveKind::Element { .. } => Err(TreeError::NotText(node)),
        }
    }

    fn write_text(&self, node: NodeId, text: String) -> Result<()> {
        let mut arena = self.arena();
        match &mut arena.get_mut(node)?.kind {
            LiveKind::Text(s) => {
                *s = text;
                Ok(())
            }
            LiveKind::Element { .. } => Err(TreeError::NotText(node)),
        }
    }

    pub fn text_of(&self, node: NodeId) -> Option<String> {
        match &self.arena().get(node).ok()?.kind {
            LiveKind::Text(s) => Some(s.clone()),
            LiveKind::Element { .. } => None,
        }
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.arena().get(node).ok()?.parent
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.arena()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        match self.arena().get(node).map(|n| &n.kind) {
            Ok(LiveKind::Element { props, .. }) => props.classes.iter().any(|c| c == class),
            _ => false,
        }
    }

    /// True if `node` or any ancestor carries `class`.
    pub fn within_class(&self, node: NodeId, class: &str) -> bool {
        let arena = self.arena();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let Ok(live) = arena.get(id) else {
                return false;
            };
            if let LiveKind::Element { props, .. } = &live.kind {
                if props.classes.iter().any(|c| c == class) {
                    return true;
                }
            }
            cursor = live.parent;
        }
        false
    }

    /// Text nodes in the subtree of `node`, document order.
    pub fn text_nodes_under(&self, node: NodeId) -> Vec<NodeId> {
        let arena = self.arena();
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Ok(live) = arena.get(id) else { continue };
            match &live.kind {
                LiveKind::Text(_) => out.push(id),
                LiveKind::Element { .. } => stack.extend(live.children.iter().rev().copied()),
            }
        }
        out
    }

    /// Elements in the subtree of `node` (itself included) carrying `class`.
    pub fn elements_with_class(&self, node: NodeId, class: &str) -> Vec<NodeId> {
        let arena = self.arena();
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Ok(live) = arena.get(id) else { continue };
            if let LiveKind::Element { props, .. } = &live.kind {
                if props.classes.iter().any(|c| c == class) {
                    out.push(id);
                }
                stack.extend(live.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn snapshot(&self, node: NodeId) -> Result<OutputNode> {
        self.arena().snapshot(node)
    }

    pub fn to_markup(&self) -> String {
        self.snapshot(self.root())
            .map(|n| n.to_markup())
            .unwrap_or_default()
    }

    /// Marks the tree as observed. Returns false if it already was.
    pub(crate) fn claim_watch(&self) -> bool {
        self.watched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_watch(&self) {
        self.watched.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(text: &str) -> OutputNode {
        OutputNode::element(
            "div",
            NodeProps::new().class("marker"),
            vec![OutputNode::element("span", NodeProps::new(), vec![OutputNode::text(text)])],
        )
    }

    #[test]
    fn test_append_and_snapshot_round_trip() {
        let tree = LiveTree::new();
        let node = marker("hello");
        let id = tree.append(tree.root(), node.clone()).unwrap();
        assert_eq!(tree.snapshot(id).unwrap(), node);
        assert_eq!(tree.parent_of(id), Some(tree.root()));
        assert_eq!(tree.to_markup(), "<body><div class=\"marker\"><span>hello</span></div></body>");
    }

    #[test]
    fn test_append_announces_insertion() {
        let tree = LiveTree::new();
        let mut rx = tree.subscribe();
        let id = tree.append(tree.root(), OutputNode::text("x")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), TreeMutation::Inserted(id));
    }

    #[test]
    fn test_text_nodes_and_ancestry() {
        let tree = LiveTree::new();
        let id = tree.append(tree.root(), marker("a")).unwrap();
        let texts = tree.text_nodes_under(id);
        assert_eq!(texts.len(), 1);
        assert!(tree.within_class(texts[0], "marker"));
        assert!(!tree.within_class(tree.root(), "marker"));
        assert_eq!(tree.elements_with_class(tree.root(), "marker"), vec![id]);
    }

    #[test]
    fn test_set_text_rules() {
        let tree = LiveTree::new();
        let id = tree.append(tree.root(), marker("a")).unwrap();
        let text = tree.text_nodes_under(id)[0];
        tree.set_text(text, "b").unwrap();
        assert_eq!(tree.text_of(text).as_deref(), Some("b"));
        assert_eq!(tree.set_text(id, "x"), Err(TreeError::NotText(id)));
        assert_eq!(
            tree.append(text, OutputNode::text("y")),
            Err(TreeError::NotAnElement(text))
        );
    }

    #[test]
    fn test_rewrite_text_if_checks_current_text() {
        let tree = LiveTree::new();
        let id = tree.append(tree.root(), marker("[object Object]")).unwrap();
        let text = tree.text_nodes_under(id)[0];
        let mut events = tree.subscribe();

        let old = tree
            .rewrite_text_if(text, |t| t.starts_with("[object"), "fixed".into())
            .unwrap();
        assert_eq!(old.as_deref(), Some("[object Object]"));
        assert_eq!(tree.text_of(text).as_deref(), Some("fixed"));
        assert!(events.try_recv().is_err());

        // Text that no longer matches is left alone.
        tree.set_text(text, "user edit").unwrap();
        let old = tree
            .rewrite_text_if(text, |t| t.starts_with("[object"), "fixed".into())
            .unwrap();
        assert_eq!(old, None);
        assert_eq!(tree.text_of(text).as_deref(), Some("user edit"));

        assert_eq!(
            tree.rewrite_text_if(id, |_| true, "x".into()),
            Err(TreeError::NotText(id))
        );
    }

    #[test]
    fn test_claim_watch_once() {
        let tree = LiveTree::new();
        assert!(tree.claim_watch());
        assert!(!tree.claim_watch());
        tree.release_watch();
        assert!(tree.claim_watch());
    }
}
