// src/plugin/mod.rs
// =============================================================================
// The plugin engine: everything a check needs to run against a crawl.
//
// Submodules:
// - queue: bounded-concurrency async task queue with an idle signal
// - hooks: the Checker trait and the types its hooks receive
// - engine: the Plugin itself (page dispatcher, work-item gate, counters)
// - progress: passed/failed/skipped counters and the events we broadcast
// - render: the one-line status string
// =============================================================================

mod engine;
mod hooks;
mod progress;
mod queue;
mod render;

pub use engine::{HostContext, Plugin, PluginConfig};
pub use hooks::{CheckContext, Checker, Helpers, LinkRef, WorkItem};
pub use progress::{PluginEvent, Progress};
pub use queue::DEFAULT_CONCURRENCY;
pub use render::status_line;
