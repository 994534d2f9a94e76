//! Dead code elimination pass.
//!
//! This pass cleans up what inlining and load/store elimination leave behind:
//!
//! 1. **Dead instruction elimination**: Remove side-effect free instructions whose results are unused
//! 2. **Dead load elimination**: Remove unused loads of non-volatile fields and elements
//! 3. **Dead allocation elimination**: Remove allocations whose reference is never used
//! 4. **Trivial phi elimination**: Remove phi nodes with only one unique operand
//! 5. **Dead phi elimination**: Remove phi nodes whose results are never used
//!
//! Volatile loads are never removed: they order memory even when their value
//! is discarded.

use crate::{
    analysis::{SsaFunction, SsaOp, SsaVarId, Token},
    compiler::{pass::SsaPass, CompilerContext, EventKind, EventLog},
    Result,
};

/// Maximum iterations for the fixed-point algorithm to prevent infinite loops.
const MAX_ITERATIONS: usize = 100;

/// Dead code elimination pass.
///
/// Uses an iterative algorithm to handle cascading dead code.
pub struct DeadCodeEliminationPass;

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if `op` may be deleted when its result is unused.
    fn is_removable(op: &SsaOp) -> bool {
        match op {
            SsaOp::LoadField { field, .. } | SsaOp::LoadStaticField { field, .. } => {
                !field.is_volatile()
            }
            SsaOp::LoadElement { .. } | SsaOp::NewObj { .. } | SsaOp::NewArr { .. } => true,
            other => other.is_pure() && !matches!(other, SsaOp::Nop),
        }
    }

    /// Runs one round of removals, returning the number of changes.
    fn run_iteration(ssa: &mut SsaFunction, method: Token, changes: &EventLog) -> usize {
        let mut count = 0;

        for block_idx in 0..ssa.block_count() {
            let trivial: Vec<(SsaVarId, SsaVarId)> = ssa
                .block(block_idx)
                .map(|block| {
                    block
                        .phi_nodes()
                        .iter()
                        .filter_map(|phi| phi.trivial_value().map(|value| (phi.result(), value)))
                        .collect()
                })
                .unwrap_or_default();

            for (result, value) in trivial {
                if let Some(block) = ssa.block_mut(block_idx) {
                    block.phi_nodes_mut().retain(|phi| phi.result() != result);
                }
                ssa.replace_uses(result, value);
                changes
                    .record(EventKind::PhiSimplified)
                    .at(method, block_idx)
                    .message(format!("{result} = {value}"));
                count += 1;
            }
        }

        let uses = ssa.count_uses();
        let unused = |var: &SsaVarId| uses.get(var).copied().unwrap_or(0) == 0;

        for block_idx in 0..ssa.block_count() {
            let Some(block) = ssa.block_mut(block_idx) else {
                continue;
            };

            let before = block.phi_count();
            block.phi_nodes_mut().retain(|phi| !unused(&phi.result()));
            let dead_phis = before - block.phi_count();
            if dead_phis > 0 {
                changes
                    .record(EventKind::InstructionRemoved)
                    .at(method, block_idx)
                    .message(format!("{dead_phis} unused phi nodes"));
                count += dead_phis;
            }

            for instr in block.instructions_mut() {
                let op = instr.op();
                let Some(dest) = op.dest() else {
                    continue;
                };
                if unused(&dest) && Self::is_removable(op) {
                    changes
                        .record(EventKind::InstructionRemoved)
                        .at(method, block_idx)
                        .message(op.to_string());
                    instr.set_op(SsaOp::Nop);
                    count += 1;
                }
            }
        }

        count
    }
}

impl SsaPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead_code_elimination"
    }

    fn description(&self) -> &'static str {
        "Eliminates unused definitions, loads and trivial phis"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method_token: Token,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let changes = EventLog::new();

        for _ in 0..MAX_ITERATIONS {
            if Self::run_iteration(ssa, method_token, &changes) == 0 {
                break;
            }
        }
        let stripped = ssa.canonicalize();

        let changed = !changes.is_empty() || stripped > 0;
        if changed {
            ctx.events.merge(&changes);
        }
        Ok(changed)
    }
}
