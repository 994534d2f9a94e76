//! Compiler infrastructure for SSA-based memory optimizations.
//!
//! This module provides the layer between the IR and analyses in
//! [`crate::analysis`] and the user:
//!
//! - [`crate::analysis`] - SSA form, heap locations, escape and barrier analysis
//! - [`compiler`](self) - SSA passes, the pass pipeline and the IR checker
//! - [`crate::emulation`] - Reference interpreter for checking optimized code
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared per-run state               │
//! │    ├─ SSA functions           (per-method SSA, no-inline set,    │
//! │    ├─ Phase snapshots          monitor records)                  │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler               2-phase fixpoint execution          │
//! │    ├─ Phase 1: Inline         (small method inlining)            │
//! │    └─ Phase 2: Optimize       (load/store elimination)           │
//! │    Each phase: run → normalize → repeat until stable             │
//! │                                                                  │
//! │  SsaPass trait               Interface for all passes            │
//! │    ├─ run_on_method()         Per-method transformation          │
//! │    ├─ initialize()            One-time setup before pipeline     │
//! │    └─ finalize()              Cleanup after pipeline completes   │
//! │                                                                  │
//! │  Checker                     CHECK directives on snapshots       │
//! │  EventLog                    Change tracking and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use lsekit::{
//!     analysis::{FieldFlags, SsaFunctionBuilder},
//!     compiler::{compile, PipelineConfig},
//!     CompilationUnit, MethodFlags,
//! };
//!
//! let mut unit = CompilationUnit::new();
//! let class = unit.add_class("TestClass");
//! let i = unit.add_field(class, "i", FieldFlags::empty());
//! let body = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let obj = f.arg(0);
//!     f.block(0, |b| {
//!         let one = b.const_i32(1);
//!         b.store_field(obj, i, one);
//!         let v = b.load_field(obj, i);
//!         b.ret_val(v);
//!     });
//! });
//! unit.add_method("Main.test", MethodFlags::STATIC, body);
//!
//! let result = compile(unit, &PipelineConfig::default()).unwrap();
//! assert_eq!(result.stats.loads_eliminated, 1);
//! result
//!     .checker()
//!     .run_script(
//!         "CHECK-START: Main.test load_store_elimination (after)\n\
//!          CHECK-NOT: InstanceFieldGet",
//!     )
//!     .unwrap();
//! ```

mod checker;
mod config;
mod context;
mod events;
mod pass;
pub mod passes;
mod scheduler;

pub use checker::{parse_script, render, CheckBlock, Checker, Directive};
pub use config::{LseConfig, PipelineConfig};
pub use context::CompilerContext;
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use pass::SsaPass;
pub use passes::{DeadCodeEliminationPass, InliningPass, LoadStoreEliminationPass};
pub use scheduler::PassScheduler;

use std::sync::Arc;

use log::info;

use crate::{analysis::SsaFunction, unit::CompilationUnit, Result};

/// The outcome of running the pipeline over a compilation unit.
pub struct CompilationResult {
    /// The context after the pipeline ran, holding the optimized SSA,
    /// the snapshots and the event log.
    pub context: CompilerContext,
    /// Pipeline iterations performed.
    pub iterations: usize,
    /// Counters derived from the event log.
    pub stats: DerivedStats,
}

impl CompilationResult {
    /// Returns the optimized body of the method called `name`.
    #[must_use]
    pub fn ssa(&self, name: &str) -> Option<SsaFunction> {
        let token = self.context.unit.method_by_name(name)?.token;
        self.context.with_ssa(token, Clone::clone)
    }

    /// Returns a checker over the recorded snapshots.
    #[must_use]
    pub fn checker(&self) -> Checker<'_> {
        Checker::new(&self.context)
    }
}

/// Runs the configured pipeline over every method of `unit`.
///
/// # Errors
///
/// Returns an error only if a pass fails to initialize or finalize. A pass
/// failing on a single method leaves that method unoptimized.
pub fn compile(unit: CompilationUnit, config: &PipelineConfig) -> Result<CompilationResult> {
    let context = CompilerContext::new(Arc::new(unit));
    let mut scheduler = PassScheduler::with_config(config);
    let iterations = scheduler.run_pipeline(&context)?;

    let stats = DerivedStats::from_log(&context.events)
        .with_time(context.elapsed())
        .with_iterations(iterations);
    info!("compiled {} methods: {}", context.method_count(), stats);

    Ok(CompilationResult {
        context,
        iterations,
        stats,
    })
}
