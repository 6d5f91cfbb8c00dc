use std::fmt::Write as _;
use thiserror::Error;
use v_htmlescape::escape;

use crate::content::RawNode;
use crate::interceptor::canonicalize::CanonicalNode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("objects are not valid as a child of <{tag}> (found {kind})")]
    InvalidChild { tag: String, kind: &'static str },
    #[error("invalid tag name: {0:?}")]
    InvalidTag(String),
    #[error("view failed: {0}")]
    View(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProps {
    pub key: Option<String>,
    pub classes: Vec<String>,
}

impl NodeProps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// A node of rendered output. Text here is final display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputNode {
    Element {
        tag: String,
        props: NodeProps,
        children: Vec<OutputNode>,
    },
    Text(String),
}

impl OutputNode {
    pub fn text(s: impl Into<String>) -> Self {
        OutputNode::Text(s.into())
    }

    pub fn element(tag: impl Into<String>, props: NodeProps, children: Vec<OutputNode>) -> Self {
        OutputNode::Element {
            tag: tag.into(),
            props,
            children,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            OutputNode::Element { tag, .. } => Some(tag),
            OutputNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[OutputNode] {
        match self {
            OutputNode::Element { children, .. } => children,
            OutputNode::Text(_) => &[],
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        match self {
            OutputNode::Element { props, .. } => props.classes.iter().any(|c| c == class),
            OutputNode::Text(_) => false,
        }
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            OutputNode::Text(s) => out.push_str(s),
            OutputNode::Element { children, .. } => {
                for child in children {
                    child.push_text(out);
                }
            }
        }
    }

    /// All elements in the subtree (self included) carrying `class`, in document order.
    pub fn find_by_class<'a>(&'a self, class: &str) -> Vec<&'a OutputNode> {
        let mut found = Vec::new();
        self.collect_by_class(class, &mut found);
        found
    }

    fn collect_by_class<'a>(&'a self, class: &str, found: &mut Vec<&'a OutputNode>) {
        if self.has_class(class) {
            found.push(self);
        }
        for child in self.children() {
            child.collect_by_class(class, found);
        }
    }

    /// HTML rendering with all text escaped.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            OutputNode::Text(s) => {
                let _ = write!(out, "{}", escape(s));
            }
            OutputNode::Element {
                tag,
                props,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                if !props.classes.is_empty() {
                    let _ = write!(out, " class=\"{}\"", escape(&props.classes.join(" ")));
                }
                out.push('>');
                for child in children {
                    child.write_markup(out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

/// An argument handed to the node-construction primitive: either an already
/// built node or a loose value that still has to be turned into text.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(OutputNode),
    Value(RawNode),
}

impl From<OutputNode> for Child {
    fn from(node: OutputNode) -> Self {
        Child::Node(node)
    }
}

impl From<RawNode> for Child {
    fn from(value: RawNode) -> Self {
        Child::Value(value)
    }
}

impl From<CanonicalNode> for Child {
    fn from(node: CanonicalNode) -> Self {
        Child::Value(RawNode::from(node))
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Child::Value(RawNode::text(s))
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Child::Value(RawNode::Text(s))
    }
}
