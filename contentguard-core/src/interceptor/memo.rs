//! Memoized canonicalization keyed by content identity.
//!
//! Canonical nodes are recomputed on every render pass; for large quizzes that
//! re-render often, results are cached under a blake3 hash of the raw value's
//! structure. The hash covers variant tags as well as contents, so `"1"` and
//! `1` do not collide.

use dashmap::DashMap;
use std::num::NonZeroUsize;
use tracing::debug;

use super::canonicalize::{CanonicalNode, Canonicalizer};
use crate::content::RawNode;

pub const DEFAULT_MEMO_CAPACITY: usize = 4_096;

pub type ContentId = [u8; 32];

pub struct MemoizedCanonicalizer {
    inner: Canonicalizer,
    cache: DashMap<ContentId, CanonicalNode>,
    capacity: NonZeroUsize,
}

impl MemoizedCanonicalizer {
    pub fn new(inner: Canonicalizer, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            capacity,
        }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn canonicalize(&self, node: &RawNode) -> CanonicalNode {
        let id = content_id(node);
        if let Some(hit) = self.cache.get(&id) {
            return hit.clone();
        }

        let out = self.inner.canonicalize(node);
        if self.cache.len() >= self.capacity.get() {
            debug!(
                event = "canonical_cache_reset",
                capacity = self.capacity.get()
            );
            self.cache.clear();
        }
        self.cache.insert(id, out.clone());
        out
    }
}

/// Structural hash of a raw value.
pub fn content_id(node: &RawNode) -> ContentId {
    let mut hasher = blake3::Hasher::new();
    hash_node(node, &mut hasher);
    *hasher.finalize().as_bytes()
}

fn hash_node(node: &RawNode, hasher: &mut blake3::Hasher) {
    // Length-prefix every string so concatenations cannot collide.
    fn put_str(hasher: &mut blake3::Hasher, s: &str) {
        hasher.update(&(s.len() as u64).to_le_bytes());
        hasher.update(s.as_bytes());
    }

    match node {
        RawNode::Undefined => {
            hasher.update(b"u");
        }
        RawNode::Null => {
            hasher.update(b"n");
        }
        RawNode::Bool(b) => {
            hasher.update(if *b { b"bt" } else { b"bf" });
        }
        RawNode::Number(n) => {
            hasher.update(b"#");
            put_str(hasher, &n.to_string());
        }
        RawNode::Text(s) => {
            hasher.update(b"s");
            put_str(hasher, s);
        }
        RawNode::Function(name) => {
            hasher.update(b"f");
            put_str(hasher, name);
        }
        RawNode::Symbol(desc) => {
            hasher.update(b"y");
            put_str(hasher, desc);
        }
        RawNode::List(items) => {
            hasher.update(b"[");
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                hash_node(item, hasher);
            }
        }
        RawNode::Map(map) => {
            hasher.update(b"{");
            hasher.update(&(map.len() as u64).to_le_bytes());
            for (k, v) in map {
                put_str(hasher, k);
                hash_node(v, hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memo(capacity: usize) -> MemoizedCanonicalizer {
        MemoizedCanonicalizer::new(
            Canonicalizer::default(),
            NonZeroUsize::new(capacity).unwrap(),
        )
    }

    #[test]
    fn test_content_id_distinguishes_types() {
        assert_ne!(
            content_id(&RawNode::text("1")),
            content_id(&RawNode::from(1))
        );
        assert_ne!(
            content_id(&RawNode::from(json!(["ab"]))),
            content_id(&RawNode::from(json!(["a", "b"])))
        );
    }

    #[test]
    fn test_content_id_is_structural() {
        let a = RawNode::from(json!({"text": "x", "isCorrect": true}));
        let b = RawNode::from(json!({"isCorrect": true, "text": "x"}));
        assert_eq!(content_id(&a), content_id(&b));
    }

    #[test]
    fn test_memoized_matches_plain() {
        let m = memo(16);
        let raw = RawNode::from(json!({"question": "Q", "answers": ["a"]}));
        let first = m.canonicalize(&raw);
        let second = m.canonicalize(&raw);
        assert_eq!(first, second);
        assert_eq!(first, Canonicalizer::default().canonicalize(&raw));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_capacity_resets_cache() {
        let m = memo(2);
        m.canonicalize(&RawNode::text("a"));
        m.canonicalize(&RawNode::text("b"));
        assert_eq!(m.len(), 2);
        m.canonicalize(&RawNode::text("c"));
        assert_eq!(m.len(), 1);
    }
}
