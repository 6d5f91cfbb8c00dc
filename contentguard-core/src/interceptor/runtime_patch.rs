//! Last-resort interception of the rendering runtime's output primitives.
//!
//! `install` wraps `create_node` and `materialize_text` so that any stray
//! composite argument (a map, function or symbol handed straight to the
//! runtime) is canonicalized before the original primitive sees it. This is a
//! net for callers that bypass the presentation guard, not a replacement for it.
//!
//! Lifecycle per runtime: one patch layer at most. The "installed" marker is an
//! atomic for the fast path; the saved originals sit behind a mutex that also
//! serializes concurrent install/uninstall attempts.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::canonicalize::{CanonicalNode, Canonicalizer};
use crate::content::RawNode;
use crate::monitoring::diagnostics::preview;
use crate::render::node::{Child, NodeProps};
use crate::render::runtime::{CreateNodeFn, MaterializeTextFn, Primitives, RenderRuntime};

#[derive(Debug, Default)]
pub struct InterceptionSlot {
    installed: AtomicBool,
    saved: Mutex<Option<Primitives>>,
}

impl InterceptionSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Primitives>> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Restored,
    NotInstalled,
}

/// Separator used when a canonical list has to become a single text node.
pub const TEXT_LIST_SEPARATOR: &str = ", ";

pub fn install(runtime: &RenderRuntime) -> InstallOutcome {
    install_with(runtime, Canonicalizer::default())
}

pub fn install_with(runtime: &RenderRuntime, canonicalizer: Canonicalizer) -> InstallOutcome {
    let slot = &runtime.interception;
    if slot.installed.load(Ordering::Acquire) {
        return InstallOutcome::AlreadyInstalled;
    }

    let mut saved = slot.lock();
    // Another thread may have won the race between the load and the lock.
    if saved.is_some() {
        return InstallOutcome::AlreadyInstalled;
    }

    let original = runtime.primitives();
    runtime.swap_primitives(patched(&original, Arc::new(canonicalizer)));
    *saved = Some(original);
    slot.installed.store(true, Ordering::Release);

    info!(event = "runtime_interception_installed");
    InstallOutcome::Installed
}

/// Restores the exact primitive references saved by `install`.
pub fn uninstall(runtime: &RenderRuntime) -> UninstallOutcome {
    let slot = &runtime.interception;
    let mut saved = slot.lock();
    match saved.take() {
        Some(original) => {
            runtime.swap_primitives(original);
            slot.installed.store(false, Ordering::Release);
            info!(event = "runtime_interception_removed");
            UninstallOutcome::Restored
        }
        None => UninstallOutcome::NotInstalled,
    }
}

pub fn is_installed(runtime: &RenderRuntime) -> bool {
    runtime.interception.installed.load(Ordering::Acquire)
}

fn patched(original: &Primitives, canonicalizer: Arc<Canonicalizer>) -> Primitives {
    let create = original.create_node.clone();
    let for_nodes = canonicalizer.clone();
    let create_node: CreateNodeFn = Arc::new(move |tag: &str, props: NodeProps, children: Vec<Child>| {
        let children = children
            .into_iter()
            .map(|child| match child {
                Child::Value(value) if value.is_composite() => {
                    Child::Value(intercept(&for_nodes, value, "create_node", |c| {
                        RawNode::from(c)
                    }))
                }
                other => other,
            })
            .collect();
        create(tag, props, children)
    });

    let materialize = original.materialize_text.clone();
    let materialize_text: MaterializeTextFn = Arc::new(move |value: RawNode| {
        let value = if value.is_composite() {
            intercept(&canonicalizer, value, "materialize_text", |c| {
                RawNode::Text(c.flatten(TEXT_LIST_SEPARATOR))
            })
        } else {
            value
        };
        materialize(value)
    });

    Primitives {
        create_node,
        materialize_text,
    }
}

/// Canonicalizes `value` and converts the result with `into_raw`. Fails open:
/// if anything in here panics, the untouched value goes to the original primitive.
fn intercept(
    canonicalizer: &Canonicalizer,
    value: RawNode,
    primitive: &'static str,
    into_raw: fn(CanonicalNode) -> RawNode,
) -> RawNode {
    match catch_unwind(AssertUnwindSafe(|| into_raw(canonicalizer.canonicalize(&value)))) {
        Ok(replacement) => {
            debug!(
                event = "stray_composite_intercepted",
                primitive,
                raw = %preview(&value),
            );
            replacement
        }
        Err(_) => {
            warn!(
                event = "runtime_interception_failed_open",
                primitive,
                kind = value.kind(),
            );
            value
        }
    }
}
