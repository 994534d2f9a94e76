//! Built-in SSA optimization passes.
//!
//! Each pass operates on one method in SSA form and records what it changed
//! in an [`EventLog`](crate::compiler::EventLog).
//!
//! # Pipeline Phases
//!
//! The [`PassScheduler`](crate::compiler::PassScheduler) runs passes in
//! phases. Within each phase, passes run until no pass reports a change, and
//! each phase is followed by normalization.
//!
//! ## Phase 1: Inlining
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`InliningPass`] | Inlines small single-block methods, wrapping synchronized bodies in monitors |
//!
//! ## Phase 2: Memory Optimization
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`LoadStoreEliminationPass`] | Forwards known heap values, removes dead stores and thread-local monitors |
//!
//! ## Normalization
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`DeadCodeEliminationPass`] | Removes unused definitions, non-volatile loads and trivial phis |

mod deadcode;
mod inlining;
mod lse;

pub use deadcode::DeadCodeEliminationPass;
pub use inlining::InliningPass;
pub use lse::{
    eliminate, merge_states, BlockState, LoadStoreEliminationPass, LseOutcome, MergeRequest,
    MonitorPairRecord, PendingStore, PhiMaterializer, ValueState,
};
