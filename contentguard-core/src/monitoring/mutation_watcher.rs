//! Final cleanup pass over the live output tree.
//!
//! Form validation messages are rendered by a third-party component that
//! stringifies whatever it is given. When that is an object, users see
//! `[object Object]` or raw JSON under a form field. The watcher listens for
//! insertions and text changes, and rewrites such text inside the validation
//! marker to a fixed message.
//!
//! Best-effort by contract: it starts after a delay, events it misses are not
//! replayed, and there is no ordering guarantee against the render that
//! produced the text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::diagnostics::truncate_chars;
use crate::render::live_tree::{LiveTree, NodeId, TreeMutation};

pub const DEFAULT_MARKER_CLASS: &str = "ant-form-item-explain-error";
pub const DEFAULT_REPLACEMENT: &str = "Please check this field.";
pub const DEFAULT_START_DELAY: Duration = Duration::from_millis(500);

static STRINGIFIED_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{.*\}|\[object [A-Za-z]+\]").expect("static regex is valid")
});

/// True for text that looks like an object leaked through string conversion.
pub fn looks_like_stringified_object(text: &str) -> bool {
    STRINGIFIED_OBJECT.is_match(text)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub marker_class: String,
    pub replacement: String,
    #[serde(with = "millis")]
    pub start_delay: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
            start_delay: DEFAULT_START_DELAY,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

pub struct WatcherHandle {
    ready: watch::Receiver<bool>,
    corrections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
    tree: Weak<LiveTree>,
}

impl WatcherHandle {
    /// Resolves once the watcher is subscribed to the tree.
    pub async fn ready(&mut self) {
        // The sender only goes away if the task ended; nothing left to wait for then.
        let _ = self.ready.wait_for(|ready| *ready).await;
    }

    /// Number of text nodes rewritten so far.
    pub fn corrections(&self) -> usize {
        self.corrections.load(Ordering::Relaxed)
    }

    /// Stops observing and frees the tree for another watcher.
    pub fn stop(self) {
        self.task.abort();
        if let Some(tree) = self.tree.upgrade() {
            tree.release_watch();
        }
    }
}

pub struct MutationWatcher;

impl MutationWatcher {
    /// Spawns the watcher on the current tokio runtime.
    ///
    /// Returns `None` if there is no runtime on this thread or the tree
    /// already has a watcher. The tree is only claimed once a runtime is found.
    pub fn spawn(tree: &Arc<LiveTree>, config: WatcherConfig) -> Option<WatcherHandle> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(event = "mutation_watcher_no_runtime");
            return None;
        };
        if !tree.claim_watch() {
            debug!(event = "mutation_watcher_already_installed");
            return None;
        }

        let (ready_tx, ready_rx) = watch::channel(false);
        let corrections = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(tree);
        let task = runtime.spawn(run(weak.clone(), config, ready_tx, corrections.clone()));

        Some(WatcherHandle {
            ready: ready_rx,
            corrections,
            task,
            tree: weak,
        })
    }
}

async fn run(
    tree: Weak<LiveTree>,
    config: WatcherConfig,
    ready: watch::Sender<bool>,
    corrections: Arc<AtomicUsize>,
) {
    tokio::time::sleep(config.start_delay).await;

    let mut events = match tree.upgrade() {
        Some(t) => t.subscribe(),
        None => return,
    };
    let _ = ready.send(true);
    info!(event = "mutation_watcher_started", marker = %config.marker_class);

    loop {
        match events.recv().await {
            Ok(mutation) => {
                let Some(tree) = tree.upgrade() else { break };
                let fixed = correct(&tree, mutation, &config);
                corrections.fetch_add(fixed, Ordering::Relaxed);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(event = "mutation_watcher_lagged", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Applies the correction pass to one mutation. Returns how many text nodes changed.
fn correct(tree: &LiveTree, mutation: TreeMutation, config: &WatcherConfig) -> usize {
    let marker = config.marker_class.as_str();
    let candidates = match mutation {
        TreeMutation::Inserted(id) if tree.within_class(id, marker) => tree.text_nodes_under(id),
        TreeMutation::Inserted(id) => tree
            .elements_with_class(id, marker)
            .into_iter()
            .flat_map(|el| tree.text_nodes_under(el))
            .collect(),
        TreeMutation::TextChanged(id) if tree.within_class(id, marker) => vec![id],
        TreeMutation::TextChanged(_) => Vec::new(),
    };

    candidates
        .into_iter()
        .filter(|id| rewrite_if_stringified(tree, *id, config))
        .count()
}

fn rewrite_if_stringified(tree: &LiveTree, id: NodeId, config: &WatcherConfig) -> bool {
    match tree.rewrite_text_if(id, looks_like_stringified_object, config.replacement.clone()) {
        Ok(Some(text)) => {
            warn!(
                event = "validation_message_rewritten",
                node = ?id,
                raw = %truncate_chars(&text, 160),
            );
            true
        }
        Ok(None) => false,
        Err(err) => {
            debug!(event = "validation_message_rewrite_failed", err = %err);
            false
        }
    }
}
