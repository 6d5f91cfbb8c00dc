//! Raw content as it arrives from the content store.
//!
//! Nothing about a `RawNode` is trusted. The store speaks JSON, but records
//! that went through client-side editors can also carry values JSON cannot
//! represent (functions, symbols, `undefined`), so those get variants too.

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::interceptor::canonicalize::CanonicalNode;

/// Keys are ordered so that any serialization of a map is stable.
pub type RawMap = BTreeMap<String, RawNode>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawNode {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<RawNode>),
    Map(RawMap),
    /// A callable value; only its name survives ingestion.
    Function(String),
    /// An opaque symbol with its description.
    Symbol(String),
}

impl RawNode {
    pub fn text(s: impl Into<String>) -> Self {
        RawNode::Text(s.into())
    }

    /// Builds a map node from `(key, value)` pairs. Later duplicates win.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, RawNode)>,
    {
        RawNode::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, RawNode::Null | RawNode::Undefined)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, RawNode::Bool(_) | RawNode::Number(_) | RawNode::Text(_))
    }

    /// A composite is anything that is not nullish, not a list, and not a primitive.
    /// These are the values a renderer cannot display directly.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            RawNode::Map(_) | RawNode::Function(_) | RawNode::Symbol(_)
        )
    }

    pub fn as_map(&self) -> Option<&RawMap> {
        match self {
            RawNode::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RawNode]> {
        match self {
            RawNode::List(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a key on a map node; `Undefined` for anything else, the way a
    /// property read on a non-object behaves.
    pub fn get(&self, key: &str) -> &RawNode {
        static UNDEFINED: RawNode = RawNode::Undefined;
        self.as_map().and_then(|m| m.get(key)).unwrap_or(&UNDEFINED)
    }

    /// Short type label used in errors and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RawNode::Undefined => "undefined",
            RawNode::Null => "null",
            RawNode::Bool(_) => "boolean",
            RawNode::Number(_) => "number",
            RawNode::Text(_) => "string",
            RawNode::List(_) => "array",
            RawNode::Map(_) => "object",
            RawNode::Function(_) => "function",
            RawNode::Symbol(_) => "symbol",
        }
    }

    /// Coerces the value to text the way a loosely typed host does when it is
    /// handed something it cannot display. Composites become `[object X]`.
    pub fn coerce_to_string(&self) -> String {
        match self {
            RawNode::Undefined => "undefined".to_string(),
            RawNode::Null => "null".to_string(),
            RawNode::Bool(b) => b.to_string(),
            RawNode::Number(n) => n.to_string(),
            RawNode::Text(s) => s.clone(),
            RawNode::List(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.coerce_to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            RawNode::Map(_) => "[object Object]".to_string(),
            RawNode::Function(_) => "[object Function]".to_string(),
            RawNode::Symbol(_) => "[object Symbol]".to_string(),
        }
    }

    fn is_unserializable(&self) -> bool {
        matches!(self, RawNode::Function(_) | RawNode::Symbol(_) | RawNode::Undefined)
    }

    /// Serialization view bounded to `max_depth` levels of nesting.
    pub fn bounded(&self, max_depth: usize) -> Bounded<'_> {
        Bounded {
            node: self,
            remaining: max_depth,
        }
    }
}

impl From<serde_json::Value> for RawNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawNode::Null,
            Value::Bool(b) => RawNode::Bool(b),
            Value::Number(n) => RawNode::Number(n),
            Value::String(s) => RawNode::Text(s),
            Value::Array(items) => RawNode::List(items.into_iter().map(RawNode::from).collect()),
            Value::Object(map) => {
                RawNode::Map(map.into_iter().map(|(k, v)| (k, RawNode::from(v))).collect())
            }
        }
    }
}

impl From<&str> for RawNode {
    fn from(s: &str) -> Self {
        RawNode::Text(s.to_string())
    }
}

impl From<String> for RawNode {
    fn from(s: String) -> Self {
        RawNode::Text(s)
    }
}

impl From<bool> for RawNode {
    fn from(b: bool) -> Self {
        RawNode::Bool(b)
    }
}

impl From<i64> for RawNode {
    fn from(n: i64) -> Self {
        RawNode::Number(n.into())
    }
}

impl From<Vec<RawNode>> for RawNode {
    fn from(items: Vec<RawNode>) -> Self {
        RawNode::List(items)
    }
}

/// Canonical output is itself valid raw input; canonicalizing it again is a no-op.
impl From<CanonicalNode> for RawNode {
    fn from(node: CanonicalNode) -> Self {
        match node {
            CanonicalNode::Text(s) => RawNode::Text(s),
            CanonicalNode::List(items) => {
                RawNode::List(items.into_iter().map(|k| RawNode::from(k.node)).collect())
            }
        }
    }
}

impl fmt::Display for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.coerce_to_string())
    }
}

/// Depth-bounded JSON serialization of a [`RawNode`].
///
/// Fails (rather than guessing) on functions, symbols, and nesting past the bound.
pub struct Bounded<'a> {
    node: &'a RawNode,
    remaining: usize,
}

impl Serialize for Bounded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.node {
            RawNode::Undefined | RawNode::Null => serializer.serialize_unit(),
            RawNode::Bool(b) => serializer.serialize_bool(*b),
            RawNode::Number(n) => n.serialize(serializer),
            RawNode::Text(s) => serializer.serialize_str(s),
            RawNode::Function(name) => Err(S::Error::custom(format!(
                "function `{name}` is not serializable"
            ))),
            RawNode::Symbol(_) => Err(S::Error::custom("symbol is not serializable")),
            RawNode::List(_) | RawNode::Map(_) if self.remaining == 0 => {
                Err(S::Error::custom("nesting exceeds serialization bound"))
            }
            // Nested values JSON cannot carry become null in lists and are
            // left out of maps; only a bare function or symbol is an error.
            RawNode::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    if item.is_unserializable() {
                        seq.serialize_element(&())?;
                    } else {
                        seq.serialize_element(&item.bounded(self.remaining - 1))?;
                    }
                }
                seq.end()
            }
            RawNode::Map(map) => {
                let kept = map.values().filter(|v| !v.is_unserializable()).count();
                let mut out = serializer.serialize_map(Some(kept))?;
                for (k, v) in map.iter().filter(|(_, v)| !v.is_unserializable()) {
                    out.serialize_entry(k, &v.bounded(self.remaining - 1))?;
                }
                out.end()
            }
        }
    }
}
