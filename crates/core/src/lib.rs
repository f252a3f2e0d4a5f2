//! Core types for the vigil file watching system
//!
//! This crate provides the foundational abstractions shared across the
//! vigil workspace:
//!
//! - **Error handling**: the unified error taxonomy and `Result` alias
//!
//! Everything watcher-specific lives in `vigil-watcher`; this crate stays
//! dependency-light so downstream consumers can name our error types without
//! pulling in the watching machinery.

pub mod error;

pub use error::{Error, Result};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
}
