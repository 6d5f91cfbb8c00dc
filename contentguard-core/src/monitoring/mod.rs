pub mod diagnostics;
pub mod mutation_watcher;

pub use mutation_watcher::{MutationWatcher, WatcherConfig, WatcherHandle};
