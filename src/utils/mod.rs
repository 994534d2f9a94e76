//! Shared utilities used across the analysis and compiler layers.

pub mod graph;
