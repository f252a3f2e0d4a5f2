//! Configuration types for the file watcher
//!
//! Immutable configuration controlling the debounce window, probe retry
//! behavior, and the baseline exclusion rules applied to every watch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration for the watch registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Debounce window in milliseconds (default: 75ms)
    ///
    /// Raw notifications for a path arriving within this window of each
    /// other are coalesced into a single classification cycle. The window
    /// extends on each arrival; classification runs once the path has been
    /// quiet for a full window.
    pub debounce_ms: u64,
    /// Delay before retrying a failed existence probe, in milliseconds
    /// (default: 20ms). A probe is retried at most once per cycle.
    pub probe_retry_delay_ms: u64,
    /// Maximum number of raw notifications buffered per subscription
    /// (default: 4096)
    pub max_queue_size: usize,
    /// Whether existence probes follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Exclusion rules applied to every watch, in addition to the rules
    /// passed at registration
    pub base_exclusions: Vec<String>,
}

impl WatcherConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from builder
    pub fn builder() -> WatcherConfigBuilder {
        WatcherConfigBuilder::default()
    }

    /// Get the debounce window duration
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Get the probe retry delay duration
    pub fn probe_retry_delay(&self) -> Duration {
        Duration::from_millis(self.probe_retry_delay_ms)
    }

    /// Baseline exclusion rules for files no caller wants events about
    ///
    /// These prevent editor save choreography and VCS bookkeeping from
    /// saturating the debouncer during heavy activity.
    pub fn default_base_exclusions() -> Vec<String> {
        vec![
            // Editor temporary files
            "*.tmp".to_string(),
            "*.swp".to_string(),
            "*.swo".to_string(),
            "*~".to_string(),
            "*.bak".to_string(),
            "#*#".to_string(), // Emacs auto-save files
            ".#*".to_string(), // Emacs lock files
            // OS-specific files
            ".DS_Store".to_string(),
            "Thumbs.db".to_string(),
            // Version control internals
            ".git/**".to_string(),
            ".hg/**".to_string(),
            ".svn/**".to_string(),
        ]
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 75,
            probe_retry_delay_ms: 20,
            max_queue_size: 4096,
            follow_symlinks: false,
            base_exclusions: Self::default_base_exclusions(),
        }
    }
}

/// Builder for WatcherConfig
#[derive(Debug, Default)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set debounce window in milliseconds
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms;
        self
    }

    /// Set probe retry delay in milliseconds
    pub fn probe_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.probe_retry_delay_ms = ms;
        self
    }

    /// Set maximum notification queue size per subscription
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.config.max_queue_size = size;
        self
    }

    /// Set whether probes follow symlinks
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.config.follow_symlinks = follow;
        self
    }

    /// Replace the baseline exclusion rules
    pub fn base_exclusions(mut self, rules: Vec<String>) -> Self {
        self.config.base_exclusions = rules;
        self
    }

    /// Add a baseline exclusion rule
    pub fn add_base_exclusion(mut self, rule: String) -> Self {
        self.config.base_exclusions.push(rule);
        self
    }

    /// Build the configuration
    pub fn build(self) -> WatcherConfig {
        self.config
    }
}
