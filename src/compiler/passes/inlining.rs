//! Small method inlining pass.
//!
//! This pass replaces calls to small, single-block methods with a copy of the
//! callee body. Its main purpose is to let load/store elimination see through
//! setters and synchronized helpers: once the call that received a freshly
//! allocated object is gone, escape analysis can prove the object private
//! and the heap accesses and monitors in the copied body become removable.
//!
//! # Inlining Criteria
//!
//! A call is inlined if:
//! 1. The callee has a body in the compilation unit
//! 2. The callee is not marked no-inline and is not the caller itself
//! 3. The callee is a single block ending in a return
//! 4. The callee is small enough (instruction count <= threshold)
//! 5. The callee does not call itself
//! 6. Argument count and return shape match the call site
//!
//! # Synchronized Callees
//!
//! The body of a synchronized instance method is wrapped in a monitor
//! enter/exit pair on the receiver, which is exactly the synchronization the
//! call performed implicitly. Static synchronized methods lock their class
//! object, which has no SSA value, so they are never inlined.
//!
//! Callee bodies are always taken from the compilation unit, never from the
//! partially optimized SSA of the callee, so the result does not depend on
//! the order in which methods are processed.

use std::collections::HashMap;

use crate::{
    analysis::{DefSite, SsaFunction, SsaInstruction, SsaOp, SsaVarId, Token, VariableOrigin},
    compiler::{pass::SsaPass, CompilerContext, EventKind, EventLog},
    unit::{MethodDef, MethodFlags},
    Error, Result,
};

/// A candidate call site for inlining.
#[derive(Debug, Clone)]
struct InlineCandidate {
    /// Block index containing the call
    block_idx: usize,
    /// Instruction index within the block
    instr_idx: usize,
    /// Token of the method being called
    callee_token: Token,
    /// Destination of the call result
    dest: Option<SsaVarId>,
    /// Call arguments
    args: Vec<SsaVarId>,
}

/// Method-specific context for inlining operations.
struct InliningContext<'a> {
    /// Reference to the pass configuration (for thresholds, etc.)
    pass: &'a InliningPass,
    /// The caller's SSA being modified
    caller_ssa: &'a mut SsaFunction,
    /// Token of the method being processed
    caller_token: Token,
    /// The compiler context holding the unit
    ctx: &'a CompilerContext,
    /// Event log for recording changes
    changes: EventLog,
}

impl<'a> InliningContext<'a> {
    fn new(
        pass: &'a InliningPass,
        caller_ssa: &'a mut SsaFunction,
        caller_token: Token,
        ctx: &'a CompilerContext,
    ) -> Self {
        Self {
            pass,
            caller_ssa,
            caller_token,
            ctx,
            changes: EventLog::new(),
        }
    }

    /// Returns the callee definition if it can be inlined at all.
    fn inline_target(&self, callee_token: Token) -> Option<&'a MethodDef> {
        if callee_token == self.caller_token || self.ctx.no_inline.contains(&callee_token) {
            return None;
        }
        let callee = self.ctx.unit.method(callee_token)?;
        if callee
            .flags
            .contains(MethodFlags::SYNCHRONIZED | MethodFlags::STATIC)
        {
            return None;
        }
        let body = callee.body.as_ref()?;

        if body.block_count() != 1 || body.instruction_count() > self.pass.inline_threshold {
            return None;
        }
        let block = body.block(0)?;
        if !matches!(
            block.terminator().map(SsaInstruction::op),
            Some(SsaOp::Return { .. })
        ) {
            return None;
        }
        let recursive = block.instructions().iter().any(|instr| {
            matches!(instr.op(), SsaOp::Call { method, .. } if method.token() == callee_token)
        });
        if recursive {
            return None;
        }
        Some(callee)
    }

    /// Finds all call sites that can be inlined, in program order.
    fn find_candidates(&self) -> Vec<InlineCandidate> {
        let mut candidates = Vec::new();
        for (block_idx, instr_idx, instr) in self.caller_ssa.iter_instructions() {
            let SsaOp::Call { dest, method, args } = instr.op() else {
                continue;
            };
            let Some(callee) = self.inline_target(method.token()) else {
                continue;
            };
            let Some(body) = callee.body.as_ref() else {
                continue;
            };
            if body.num_args() != args.len() {
                continue;
            }
            let returns_value = matches!(
                body.block(0).and_then(|b| b.terminator()).map(SsaInstruction::op),
                Some(SsaOp::Return { value: Some(_) })
            );
            if dest.is_some() && !returns_value {
                continue;
            }
            candidates.push(InlineCandidate {
                block_idx,
                instr_idx,
                callee_token: method.token(),
                dest: *dest,
                args: args.clone(),
            });
        }
        candidates
    }

    /// Replaces the call at `candidate` with the callee body.
    fn inline_full(&mut self, candidate: &InlineCandidate) -> bool {
        let ctx = self.ctx;
        let Some(callee) = ctx.unit.method(candidate.callee_token) else {
            return false;
        };
        let Some(callee_ssa) = callee.body.as_ref() else {
            return false;
        };
        let Some(callee_block) = callee_ssa.block(0) else {
            return false;
        };

        // Map callee parameters to call arguments
        let mut var_remap: HashMap<SsaVarId, SsaVarId> = HashMap::new();
        for (param_idx, &arg_var) in candidate.args.iter().enumerate() {
            if let Some(param_var) = callee_ssa.argument(param_idx) {
                var_remap.insert(param_var, arg_var);
            }
        }

        // Collect instructions to inline (excluding return)
        let mut inlined_ops: Vec<SsaOp> = Vec::new();
        let mut return_value: Option<SsaVarId> = None;

        for instr in callee_block.instructions() {
            match instr.op() {
                SsaOp::Return { value } => return_value = *value,
                SsaOp::Nop => {}
                op => {
                    let remapped = self.remap_op(op, &mut var_remap, candidate.callee_token);
                    inlined_ops.push(remapped);
                }
            }
        }

        if callee.is_synchronized() {
            let Some(receiver) = candidate.args.first().copied() else {
                return false;
            };
            inlined_ops.insert(0, SsaOp::MonitorEnter { object: receiver });
            inlined_ops.push(SsaOp::MonitorExit { object: receiver });
        }

        let Some(block) = self.caller_ssa.block_mut(candidate.block_idx) else {
            return false;
        };
        let instructions = block.instructions_mut();
        if candidate.instr_idx >= instructions.len() {
            return false;
        }
        instructions.splice(
            candidate.instr_idx..=candidate.instr_idx,
            inlined_ops.into_iter().map(SsaInstruction::synthetic),
        );

        // Handle return value
        if let (Some(dest_var), Some(ret_var)) = (candidate.dest, return_value) {
            let remapped_ret = var_remap.get(&ret_var).copied().unwrap_or(ret_var);
            if dest_var != remapped_ret {
                self.caller_ssa.replace_uses(dest_var, remapped_ret);
            }
        }

        ctx.mark_inlined(candidate.callee_token);
        self.changes
            .record(EventKind::MethodInlined)
            .at(self.caller_token, candidate.block_idx)
            .message(format!("inlined {}", callee.name));
        true
    }

    /// Clones `op` with every callee variable renamed to a caller variable.
    fn remap_op(
        &mut self,
        op: &SsaOp,
        var_remap: &mut HashMap<SsaVarId, SsaVarId>,
        callee_token: Token,
    ) -> SsaOp {
        let mut cloned = op.clone();

        cloned.map_uses(|used| self.get_or_create_var(used, var_remap, callee_token));

        if let Some(dest) = op.dest() {
            let new_dest = self.get_or_create_var(dest, var_remap, callee_token);
            cloned.set_dest(new_dest);
        }

        cloned
    }

    /// Gets the remapped variable or creates a new one in the caller.
    fn get_or_create_var(
        &mut self,
        var: SsaVarId,
        var_remap: &mut HashMap<SsaVarId, SsaVarId>,
        callee_token: Token,
    ) -> SsaVarId {
        if let Some(&remapped) = var_remap.get(&var) {
            return remapped;
        }
        let new_id = self
            .caller_ssa
            .create_variable(VariableOrigin::Inlined(callee_token.value()), DefSite::entry());
        var_remap.insert(var, new_id);
        new_id
    }
}

/// Pass that inlines small methods at their call sites.
#[derive(Debug)]
pub struct InliningPass {
    /// Maximum instruction count of an inlined callee.
    inline_threshold: usize,
}

impl Default for InliningPass {
    fn default() -> Self {
        Self::new(20)
    }
}

impl InliningPass {
    /// Creates a new inlining pass with the given size threshold.
    #[must_use]
    pub fn new(inline_threshold: usize) -> Self {
        Self { inline_threshold }
    }

    /// Returns the size threshold.
    #[must_use]
    pub fn inline_threshold(&self) -> usize {
        self.inline_threshold
    }
}

impl SsaPass for InliningPass {
    fn name(&self) -> &'static str {
        "inliner"
    }

    fn description(&self) -> &'static str {
        "Inlines small single-block methods"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method_token: Token,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let mut inline_ctx = InliningContext::new(self, ssa, method_token, ctx);

        let candidates = inline_ctx.find_candidates();
        if candidates.is_empty() {
            return Ok(false);
        }

        // Process candidates in reverse order to maintain valid indices
        let mut changed = false;
        for candidate in candidates.iter().rev() {
            changed |= inline_ctx.inline_full(candidate);
        }

        let changes = inline_ctx.changes;
        if changed {
            ssa.validate().map_err(|e| Error::PassFailed {
                pass: "inliner",
                message: e.to_string(),
            })?;
            ctx.events.merge(&changes);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        analysis::{FieldFlags, SsaFunctionBuilder},
        unit::CompilationUnit,
    };

    fn setter_unit(flags: MethodFlags) -> (CompilationUnit, Token, Token) {
        let mut unit = CompilationUnit::new();
        let class = unit.add_class("Main");
        let field = unit.add_field(class, "j", FieldFlags::empty());

        let setter_body = SsaFunctionBuilder::new(2).build_with(|f| {
            let this = f.arg(0);
            let value = f.arg(1);
            f.block(0, |b| {
                b.store_field(this, field, value);
                let v = b.load_field(this, field);
                b.ret_val(v);
            });
        });
        let setter = unit.add_method("Main.set", flags, setter_body);

        let caller_body = SsaFunctionBuilder::new(0).build_with(|f| {
            f.block(0, |b| {
                let obj = b.new_obj(class);
                let one = b.const_i32(1);
                let result = b.call(setter, &[obj, one]);
                b.ret_val(result);
            });
        });
        let caller = unit.add_method("Main.run", MethodFlags::STATIC, caller_body);
        (unit, setter.token(), caller.token())
    }

    fn run(unit: CompilationUnit, caller: Token) -> (CompilerContext, Result<bool>) {
        let ctx = CompilerContext::new(Arc::new(unit));
        let mut ssa = ctx.take_ssa(caller).expect("caller has a body");
        let result = InliningPass::default().run_on_method(&mut ssa, caller, &ctx);
        ctx.set_ssa(caller, ssa);
        (ctx, result)
    }

    #[test]
    fn test_inline_setter() {
        let (unit, setter, caller) = setter_unit(MethodFlags::empty());
        let (ctx, result) = run(unit, caller);
        assert_eq!(result.ok(), Some(true));
        assert!(ctx.was_inlined(setter));
        assert!(ctx.events.has(EventKind::MethodInlined));

        let ops: Vec<SsaOp> = ctx
            .with_ssa(caller, |ssa| {
                ssa.iter_instructions().map(|(_, _, i)| i.op().clone()).collect()
            })
            .unwrap_or_default();
        assert!(!ops.iter().any(|op| matches!(op, SsaOp::Call { .. })));
        assert!(ops.iter().any(|op| matches!(op, SsaOp::StoreField { .. })));
        assert_eq!(ctx.with_ssa(caller, SsaFunction::is_valid), Some(true));
    }

    #[test]
    fn test_synchronized_setter_gets_monitors() {
        let (unit, _, caller) = setter_unit(MethodFlags::SYNCHRONIZED);
        let (ctx, result) = run(unit, caller);
        assert_eq!(result.ok(), Some(true));
        let monitors = ctx
            .with_ssa(caller, |ssa| {
                ssa.iter_instructions()
                    .filter(|(_, _, i)| {
                        matches!(i.op(), SsaOp::MonitorEnter { .. } | SsaOp::MonitorExit { .. })
                    })
                    .count()
            })
            .unwrap_or(0);
        assert_eq!(monitors, 2);
    }

    #[test]
    fn test_no_inline_respected() {
        let (unit, _, caller) = setter_unit(MethodFlags::NO_INLINE);
        let (ctx, result) = run(unit, caller);
        assert_eq!(result.ok(), Some(false));
        assert!(ctx.inlined_methods.is_empty());
    }

    #[test]
    fn test_threshold_respected() {
        let (unit, _, caller) = setter_unit(MethodFlags::empty());
        let ctx = CompilerContext::new(Arc::new(unit));
        let mut ssa = ctx.take_ssa(caller).expect("caller has a body");
        let result = InliningPass::new(1).run_on_method(&mut ssa, caller, &ctx);
        assert_eq!(result.ok(), Some(false));
    }
}
