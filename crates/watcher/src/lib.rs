#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Normalized filesystem event watching
//!
//! This crate turns noisy, platform-specific change notifications into a
//! stream of semantic events — `create`, `change`, `remove`, `replace` —
//! delivered to per-watch callbacks:
//!
//! - Per-path debouncing collapses notification bursts into one decision
//!   point per logical operation
//! - Existence probes, not raw codes, decide what actually happened
//! - Identity tracking distinguishes rename-over-target from in-place
//!   modification
//! - Exclusion rules drop editor and VCS noise before it costs anything
//!
//! # Example
//!
//! ```no_run
//! use vigil_watcher::{WatchRegistry, WatcherConfig};
//! use std::path::Path;
//!
//! # async fn example() -> vigil_core::Result<()> {
//! let registry = WatchRegistry::new(WatcherConfig::default());
//!
//! let handle = registry
//!     .watch(Path::new("/path/to/project"), &[], |event| {
//!         println!("{} {:?}", event.kind, event.affected_path);
//!     })
//!     .await?;
//!
//! // ... later
//! registry.unwatch(&handle);
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod classifier;
mod config;
mod debouncer;
mod events;
mod filter;
mod registry;
mod source;

// Public exports - minimal API surface
pub use config::WatcherConfig;
pub use events::{SemanticEvent, SemanticKind};
pub use filter::ExclusionFilter;
pub use registry::{EventCallback, WatchHandle, WatchRegistry};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::WatcherConfig;
    pub use crate::events::{SemanticEvent, SemanticKind};
    pub use crate::registry::{WatchHandle, WatchRegistry};
}
