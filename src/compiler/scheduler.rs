//! Pass scheduler for orchestrating SSA pass execution.
//!
//! The `PassScheduler` manages the execution of SSA passes using a 2-phase
//! pipeline. Each phase runs to fixpoint with normalization after each
//! structural change.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    compiler::{
        config::PipelineConfig,
        context::CompilerContext,
        events::EventKind,
        pass::SsaPass,
        passes::{DeadCodeEliminationPass, InliningPass, LoadStoreEliminationPass},
    },
    Result,
};

/// Orchestrates SSA pass execution in a phased pipeline.
///
/// The scheduler runs passes in a 2-phase pipeline:
///
/// 1. **Inlining**: small callees are inlined + normalize
/// 2. **Optimization**: load/store elimination + normalize
///
/// Each phase runs to fixpoint (until no more changes) before proceeding.
/// The entire pipeline is then repeated until global fixpoint or max iterations.
///
/// A pass that fails on a method leaves that method exactly as it was before
/// the pass ran; the failure is recorded as a [`EventKind::PassFallback`]
/// event and compilation continues. A pipeline that is still changing when
/// it runs out of iterations records a [`EventKind::Warning`].
#[allow(clippy::struct_field_names)]
pub struct PassScheduler {
    /// Maximum iterations for the entire pipeline.
    max_iterations: usize,
    /// Number of stable iterations before stopping.
    stable_iterations: usize,
    /// Maximum iterations for a single phase before moving on.
    max_phase_iterations: usize,
    /// Phase 1: Inlining.
    pub inline: Vec<Box<dyn SsaPass>>,
    /// Phase 2: Optimization (load/store elimination).
    pub optimize: Vec<Box<dyn SsaPass>>,
    /// Normalization passes (DCE).
    /// Run after each phase to clean up before the next.
    pub normalize: Vec<Box<dyn SsaPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(5, 1, 10)
    }
}

impl PassScheduler {
    /// Creates a new scheduler with the specified iteration limits and no passes.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum iterations for the entire pipeline before stopping.
    /// * `stable_iterations` - Stop early if no changes for this many iterations.
    /// * `max_phase_iterations` - Maximum iterations for a single phase before moving on.
    #[must_use]
    pub fn new(
        max_iterations: usize,
        stable_iterations: usize,
        max_phase_iterations: usize,
    ) -> Self {
        Self {
            max_iterations,
            stable_iterations,
            max_phase_iterations,
            inline: Vec::new(),
            optimize: Vec::new(),
            normalize: Vec::new(),
        }
    }

    /// Creates a scheduler populated with the passes enabled by `config`.
    #[must_use]
    pub fn with_config(config: &PipelineConfig) -> Self {
        let mut scheduler = Self::new(
            config.max_iterations,
            config.stable_iterations,
            config.max_phase_iterations,
        );
        if config.enable_inlining {
            scheduler
                .inline
                .push(Box::new(InliningPass::new(config.inline_threshold)));
        }
        scheduler
            .optimize
            .push(Box::new(LoadStoreEliminationPass::new(config.lse.clone())));
        if config.enable_dead_code_elimination {
            scheduler.normalize.push(Box::new(DeadCodeEliminationPass::new()));
        }
        scheduler
    }

    /// Runs normalization passes until no more changes occur.
    ///
    /// # Returns
    ///
    /// `true` if any changes were made during this phase, `false` otherwise.
    fn normalize_to_fixpoint(
        ctx: &CompilerContext,
        passes: &mut [Box<dyn SsaPass>],
        max_phase_iterations: usize,
    ) -> Result<bool> {
        let mut any_changed = false;

        for _ in 0..max_phase_iterations {
            let changed = Self::run_passes_once(ctx, passes)?;

            if !changed {
                break;
            }

            any_changed = true;
        }

        Ok(any_changed)
    }

    /// Runs a phase to fixpoint: execute phase passes, then normalize until stable.
    ///
    /// # Returns
    ///
    /// `true` if any changes were made during this phase, `false` otherwise.
    fn phase_to_fixpoint(
        ctx: &CompilerContext,
        phase_passes: &mut [Box<dyn SsaPass>],
        normalize_passes: &mut [Box<dyn SsaPass>],
        max_phase_iterations: usize,
    ) -> Result<bool> {
        if phase_passes.is_empty() {
            return Ok(false);
        }

        let mut phase_changed = false;

        for _ in 0..max_phase_iterations {
            let pass_changed = Self::run_passes_once(ctx, phase_passes)?;
            if !pass_changed {
                break;
            }

            phase_changed = true;

            // Removing dead loads can expose new forwarding opportunities
            if !normalize_passes.is_empty() {
                Self::normalize_to_fixpoint(ctx, normalize_passes, max_phase_iterations)?;
            }
        }

        Ok(phase_changed)
    }

    /// Runs all passes once over all methods.
    ///
    /// Returns `true` if any pass made changes, `false` otherwise.
    ///
    /// Per-method passes are executed in parallel using rayon. Each method's SSA
    /// is removed from the context while its pass runs, so passes never observe
    /// a half-rewritten body of another method.
    fn run_passes_once(ctx: &CompilerContext, passes: &mut [Box<dyn SsaPass>]) -> Result<bool> {
        let any_changed = AtomicBool::new(false);

        for pass in passes.iter_mut() {
            pass.initialize(ctx)?;
        }

        let methods = ctx.all_methods();

        for pass in passes.iter() {
            debug!("running '{}' over {} methods", pass.name(), methods.len());

            methods.par_iter().for_each(|&method_token| {
                if !pass.should_run(method_token, ctx) {
                    return;
                }

                let Some((_, mut ssa)) = ctx.ssa_functions.remove(&method_token) else {
                    return;
                };

                ctx.snapshot_before(method_token, pass.name(), &ssa);
                let original = ssa.clone();

                let result = pass.run_on_method(&mut ssa, method_token, ctx);

                let changed = match result {
                    Ok(changed) => changed,
                    Err(e) => {
                        warn!(
                            "pass '{}' failed on {}, keeping original body: {}",
                            pass.name(),
                            ctx.method_name(method_token),
                            e
                        );
                        ctx.events
                            .record(EventKind::PassFallback)
                            .method(method_token)
                            .pass(pass.name())
                            .message(e.to_string());
                        ssa = original;
                        false
                    }
                };

                ctx.snapshot_after(method_token, pass.name(), &ssa);
                ctx.ssa_functions.insert(method_token, ssa);

                if changed {
                    any_changed.store(true, Ordering::Relaxed);
                    ctx.processed_methods.insert(method_token);
                }
            });
        }

        for pass in passes.iter_mut() {
            pass.finalize(ctx)?;
        }

        Ok(any_changed.load(Ordering::Relaxed))
    }

    /// Runs the complete pipeline.
    ///
    /// # Returns
    ///
    /// The number of iterations completed. Events are accumulated in `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pass fails to initialize or finalize. Failures
    /// on individual methods are not errors.
    pub fn run_pipeline(&mut self, ctx: &CompilerContext) -> Result<usize> {
        let mut stable_count = 0;
        let mut iterations = 0;
        let mut settled = false;
        let max_phase = self.max_phase_iterations;

        for iteration in 0..self.max_iterations {
            iterations = iteration + 1;
            let mut iteration_changed = false;

            if Self::phase_to_fixpoint(ctx, &mut self.inline, &mut self.normalize, max_phase)? {
                iteration_changed = true;
            }

            if Self::phase_to_fixpoint(ctx, &mut self.optimize, &mut self.normalize, max_phase)? {
                iteration_changed = true;
            }

            debug!(
                "pipeline iteration {} finished, changed: {}",
                iterations, iteration_changed
            );

            if iteration_changed {
                stable_count = 0;
            } else {
                stable_count += 1;
                if stable_count >= self.stable_iterations {
                    settled = true;
                    break;
                }
            }
        }

        if !settled {
            let message =
                format!("pipeline stopped after {iterations} iterations without settling");
            warn!("{message}");
            ctx.events.warn(message);
        }

        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        analysis::{SsaFunction, SsaFunctionBuilder, Token},
        compiler::{
            context::CompilerContext, pass::SsaPass, EventKind, PassScheduler, PipelineConfig,
        },
        unit::{CompilationUnit, MethodFlags},
        Error, Result,
    };

    struct TestPass {
        name: &'static str,
        changes_to_make: usize,
    }

    impl TestPass {
        fn new(name: &'static str, changes: usize) -> Self {
            Self {
                name,
                changes_to_make: changes,
            }
        }
    }

    impl SsaPass for TestPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run_on_method(
            &self,
            _ssa: &mut SsaFunction,
            method_token: Token,
            ctx: &CompilerContext,
        ) -> Result<bool> {
            for i in 0..self.changes_to_make {
                ctx.events
                    .record(EventKind::InstructionRemoved)
                    .at(method_token, i)
                    .message("test");
            }
            Ok(false)
        }
    }

    struct FailingPass;

    impl SsaPass for FailingPass {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run_on_method(
            &self,
            ssa: &mut SsaFunction,
            _method_token: Token,
            _ctx: &CompilerContext,
        ) -> Result<bool> {
            ssa.remove_instruction(0, 0);
            Err(Error::Error("broken".into()))
        }
    }

    struct ChurningPass;

    impl SsaPass for ChurningPass {
        fn name(&self) -> &'static str {
            "churning"
        }

        fn run_on_method(
            &self,
            _ssa: &mut SsaFunction,
            _method_token: Token,
            _ctx: &CompilerContext,
        ) -> Result<bool> {
            Ok(true)
        }
    }

    fn context() -> (CompilerContext, Token) {
        let mut unit = CompilationUnit::new();
        let body = SsaFunctionBuilder::new(0).build_with(|f| {
            f.block(0, |b| {
                let one = b.const_i32(1);
                b.ret_val(one);
            });
        });
        let method = unit.add_method("Main.one", MethodFlags::STATIC, body);
        (CompilerContext::new(Arc::new(unit)), method.token())
    }

    #[test]
    fn test_scheduler_iteration_limits() {
        let scheduler = PassScheduler::new(10, 3, 5);
        assert_eq!(scheduler.max_iterations, 10);
        assert_eq!(scheduler.stable_iterations, 3);
        assert_eq!(scheduler.max_phase_iterations, 5);
    }

    #[test]
    fn test_with_config_populates_phases() {
        let scheduler = PassScheduler::with_config(&PipelineConfig::default());
        assert_eq!(scheduler.inline.len(), 1);
        assert_eq!(scheduler.optimize[0].name(), "load_store_elimination");
        assert_eq!(scheduler.normalize.len(), 1);

        let lse_only = PassScheduler::with_config(&PipelineConfig::lse_only());
        assert!(lse_only.inline.is_empty());
        assert!(lse_only.normalize.is_empty());
    }

    #[test]
    fn test_unchanged_pipeline_is_stable() {
        let (ctx, method) = context();
        let mut scheduler = PassScheduler::new(5, 1, 5);
        scheduler.optimize.push(Box::new(TestPass::new("noop", 2)));
        let iterations = scheduler.run_pipeline(&ctx);
        assert_eq!(iterations.ok(), Some(1));
        assert_eq!(ctx.events.count_kind(EventKind::InstructionRemoved), 2);
        assert!(ctx.with_snapshot(method, "noop (before)", |_| ()).is_some());
        assert!(ctx.with_snapshot(method, "noop (after)", |_| ()).is_some());
        assert!(ctx.processed_methods.is_empty());
    }

    #[test]
    fn test_failing_pass_restores_method() {
        let (ctx, method) = context();
        let before = ctx.with_ssa(method, Clone::clone);
        let mut scheduler = PassScheduler::new(2, 1, 2);
        scheduler.optimize.push(Box::new(FailingPass));
        assert!(scheduler.run_pipeline(&ctx).is_ok());
        assert_eq!(ctx.with_ssa(method, Clone::clone), before);
        assert!(ctx.events.has(EventKind::PassFallback));
    }

    #[test]
    fn test_unsettled_pipeline_warns() {
        let (ctx, _) = context();
        let mut scheduler = PassScheduler::new(3, 1, 2);
        scheduler.optimize.push(Box::new(ChurningPass));
        assert_eq!(scheduler.run_pipeline(&ctx).ok(), Some(3));
        assert_eq!(ctx.events.count_kind(EventKind::Warning), 1);
        assert_eq!(ctx.events.transformations().count(), 0);
    }

    #[test]
    fn test_settled_pipeline_does_not_warn() {
        let (ctx, _) = context();
        let mut scheduler = PassScheduler::new(3, 1, 2);
        scheduler.optimize.push(Box::new(TestPass::new("noop", 0)));
        assert!(scheduler.run_pipeline(&ctx).is_ok());
        assert!(!ctx.events.has(EventKind::Warning));
    }
}
