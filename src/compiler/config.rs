//! Configuration for the compiler pipeline.
//!
//! This module provides configuration types for controlling the pass
//! pipeline, including iteration limits, inlining, and the load/store
//! elimination pass.

/// Configuration for load/store elimination.
///
/// The defaults enable every elimination; turning a switch off only removes
/// opportunities, it never makes the pass less safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LseConfig {
    /// Delete stores that are overwritten or never observed (default: true).
    ///
    /// When disabled, only redundant stores (writing the value the location
    /// already holds) are removed.
    pub enable_store_elimination: bool,

    /// Delete monitor operations on objects that never escape (default: true).
    pub enable_monitor_elimination: bool,

    /// Maximum number of heap locations tracked per block (default: 256).
    ///
    /// When a block state grows past this bound all values are forgotten and
    /// all pending stores are kept.
    pub max_tracked_locations: usize,
}

impl Default for LseConfig {
    fn default() -> Self {
        Self {
            enable_store_elimination: true,
            enable_monitor_elimination: true,
            max_tracked_locations: 256,
        }
    }
}

/// Configuration for the pass scheduler.
///
/// Controls iteration limits, inlining and the per-pass settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum iterations of the whole pipeline (default: 5).
    pub max_iterations: usize,

    /// Number of stable iterations before stopping (default: 1).
    pub stable_iterations: usize,

    /// Maximum iterations per phase before moving on (default: 10).
    pub max_phase_iterations: usize,

    /// Enable method inlining (default: true).
    pub enable_inlining: bool,

    /// Maximum instruction count for inlining candidates (default: 20).
    pub inline_threshold: usize,

    /// Enable dead code elimination after each phase (default: true).
    pub enable_dead_code_elimination: bool,

    /// Load/store elimination settings.
    pub lse: LseConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            stable_iterations: 1,
            max_phase_iterations: 10,
            enable_inlining: true,
            inline_threshold: 20,
            enable_dead_code_elimination: true,
            lse: LseConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration that runs only load/store elimination.
    #[must_use]
    pub fn lse_only() -> Self {
        Self {
            enable_inlining: false,
            enable_dead_code_elimination: false,
            ..Self::default()
        }
    }

    /// Replaces the load/store elimination settings.
    #[must_use]
    pub fn with_lse(mut self, lse: LseConfig) -> Self {
        self.lse = lse;
        self
    }

    /// Sets the inlining threshold.
    #[must_use]
    pub fn with_inline_threshold(mut self, threshold: usize) -> Self {
        self.inline_threshold = threshold;
        self
    }
}
