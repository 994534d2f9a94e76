//! Load/store elimination.
//!
//! Removes heap loads whose value is already known, stores that are
//! redundant or never observed, and monitor operations on objects that never
//! escape the method, while respecting the memory-ordering constraints of
//! volatile accesses, monitors and fences.
//!
//! # Architecture
//!
//! - `state` - The value-state lattice and per-block heap state
//! - `merge` - Joining predecessor states and inserting phis
//! - `driver` - The reverse-postorder walk that rewrites the function
//!
//! # Memory Ordering
//!
//! | Operation on an escaping object | Pending stores | Known values |
//! |---------------------------------|----------------|--------------|
//! | volatile load, monitor enter    | kept           | forgotten    |
//! | volatile store, monitor exit    | kept           | survive      |
//! | fence, call                     | kept           | forgotten    |
//!
//! A value that survives a release still forwards loads, but storing it again
//! after the release is not treated as redundant.
//!
//! The same operations on a singleton object order nothing: its volatile
//! fields are treated as plain fields and its monitor operations are deleted.
//!
//! # Example
//!
//! ```rust
//! use lsekit::analysis::{FieldFlags, FieldRef, SsaFunctionBuilder, Token};
//! use lsekit::compiler::{EventLog, LseConfig, passes::eliminate};
//!
//! let field = FieldRef::new(Token::from_parts(Token::FIELD, 1), FieldFlags::empty());
//! let mut ssa = SsaFunctionBuilder::new(1).build_with(|f| {
//!     let obj = f.arg(0);
//!     f.block(0, |b| {
//!         let one = b.const_i32(1);
//!         b.store_field(obj, field, one);
//!         let v = b.load_field(obj, field);
//!         b.ret_val(v);
//!     });
//! });
//!
//! let events = EventLog::new();
//! let method = Token::from_parts(Token::METHOD, 1);
//! let outcome = eliminate(&mut ssa, method, &LseConfig::default(), &events).unwrap();
//! assert_eq!(outcome.loads_eliminated, 1);
//! assert_eq!(outcome.stores_eliminated, 0);
//! ```

mod driver;
mod merge;
mod state;

pub use driver::eliminate;
pub use merge::{merge_states, PhiMaterializer};
pub use state::{BlockState, MergeRequest, PendingStore, ValueState};

use crate::{
    analysis::{SsaFunction, SsaVarId, Token},
    compiler::{pass::SsaPass, CompilerContext, EventLog, LseConfig},
    Result,
};

/// A monitor enter/exit pair seen during elimination.
///
/// Pairs are matched per object in visit order; an enter without a matching
/// exit (or the reverse) is recorded with the missing side set to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPairRecord {
    /// The locked object.
    pub object: SsaVarId,
    /// Block of the monitor enter.
    pub enter_block: Option<usize>,
    /// Block of the monitor exit.
    pub exit_block: Option<usize>,
    /// `true` if the operations were deleted.
    pub eliminated: bool,
}

/// What one run of load/store elimination did to a method, summed over all
/// of its sweeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LseOutcome {
    /// Loads replaced by a known value, a phi or a default constant.
    pub loads_eliminated: usize,
    /// Stores deleted as redundant or never observed.
    pub stores_eliminated: usize,
    /// Phi nodes inserted for merged values.
    pub phis_created: usize,
    /// Monitor operations deleted.
    pub monitors_eliminated: usize,
    /// Every monitor pair seen, in visit order.
    pub monitor_pairs: Vec<MonitorPairRecord>,
}

impl LseOutcome {
    /// Returns `true` if the function was modified.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.loads_eliminated > 0
            || self.stores_eliminated > 0
            || self.phis_created > 0
            || self.monitors_eliminated > 0
    }

    /// Adds the counts of a later sweep over the same method.
    ///
    /// Eliminated monitor pairs accumulate; pairs that were kept are replaced
    /// by the later sweep's view, which sees them again.
    pub(crate) fn absorb(&mut self, later: LseOutcome) {
        self.loads_eliminated += later.loads_eliminated;
        self.stores_eliminated += later.stores_eliminated;
        self.phis_created += later.phis_created;
        self.monitors_eliminated += later.monitors_eliminated;
        self.monitor_pairs.retain(|pair| pair.eliminated);
        self.monitor_pairs.extend(later.monitor_pairs);
    }
}

/// Load/store elimination pass.
///
/// Runs [`eliminate`] on every method and stores the monitor pairs it found
/// in the context. A run that sees no monitor leaves earlier records alone.
pub struct LoadStoreEliminationPass {
    config: LseConfig,
}

impl Default for LoadStoreEliminationPass {
    fn default() -> Self {
        Self::new(LseConfig::default())
    }
}

impl LoadStoreEliminationPass {
    /// Creates a new load/store elimination pass.
    #[must_use]
    pub fn new(config: LseConfig) -> Self {
        Self { config }
    }

    /// Returns the pass configuration.
    #[must_use]
    pub fn config(&self) -> &LseConfig {
        &self.config
    }
}

impl SsaPass for LoadStoreEliminationPass {
    fn name(&self) -> &'static str {
        "load_store_elimination"
    }

    fn description(&self) -> &'static str {
        "Eliminates redundant heap loads and stores and thread-local monitors"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method_token: Token,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let changes = EventLog::new();
        let outcome = eliminate(ssa, method_token, &self.config, &changes)?;

        if !outcome.monitor_pairs.is_empty() {
            ctx.set_monitor_records(method_token, outcome.monitor_pairs.clone());
        }
        ctx.events.merge(&changes);
        Ok(outcome.changed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FieldFlags, FieldRef, SsaFunctionBuilder, SsaOp};

    fn field(row: u32, flags: FieldFlags) -> FieldRef {
        FieldRef::new(Token::from_parts(Token::FIELD, row), flags)
    }

    fn method() -> Token {
        Token::from_parts(Token::METHOD, 1)
    }

    fn run(ssa: &mut SsaFunction) -> LseOutcome {
        eliminate(ssa, method(), &LseConfig::default(), &EventLog::new())
            .expect("elimination succeeds")
    }

    fn ops(ssa: &SsaFunction) -> Vec<SsaOp> {
        ssa.iter_instructions()
            .map(|(_, _, instr)| instr.op().clone())
            .collect()
    }

    fn count(ssa: &SsaFunction, pred: impl Fn(&SsaOp) -> bool) -> usize {
        ops(ssa).iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn test_store_then_load_forwards() {
        let f = field(1, FieldFlags::empty());
        let mut ssa = SsaFunctionBuilder::new(1).build_with(|fb| {
            let obj = fb.arg(0);
            fb.block(0, |b| {
                let one = b.const_i32(1);
                b.store_field(obj, f, one);
                let v = b.load_field(obj, f);
                b.ret_val(v);
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.loads_eliminated, 1);
        assert_eq!(count(&ssa, |op| matches!(op, SsaOp::LoadField { .. })), 0);
        assert_eq!(count(&ssa, |op| matches!(op, SsaOp::StoreField { .. })), 1);
        assert!(matches!(
            ops(&ssa).last(),
            Some(SsaOp::Return { value: Some(v) }) if v.index() == 1
        ));
    }

    #[test]
    fn test_overwritten_store_removed() {
        let f = field(1, FieldFlags::empty());
        let mut ssa = SsaFunctionBuilder::new(1).build_with(|fb| {
            let obj = fb.arg(0);
            fb.block(0, |b| {
                let one = b.const_i32(1);
                let two = b.const_i32(2);
                b.store_field(obj, f, one);
                b.store_field(obj, f, two);
                b.ret();
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.stores_eliminated, 1);
        assert_eq!(count(&ssa, |op| matches!(op, SsaOp::StoreField { .. })), 1);
    }

    #[test]
    fn test_volatile_load_blocks_forwarding() {
        let f = field(1, FieldFlags::empty());
        let vol = field(2, FieldFlags::VOLATILE);
        let mut ssa = SsaFunctionBuilder::new(2).build_with(|fb| {
            let obj = fb.arg(0);
            let other = fb.arg(1);
            fb.block(0, |b| {
                let one = b.const_i32(1);
                b.store_field(obj, f, one);
                let _ = b.load_field(other, vol);
                let v = b.load_field(obj, f);
                b.ret_val(v);
            });
        });
        let outcome = run(&mut ssa);
        assert!(!outcome.changed());
        assert_eq!(count(&ssa, |op| matches!(op, SsaOp::LoadField { .. })), 2);
    }

    #[test]
    fn test_volatile_store_keeps_values() {
        let f = field(1, FieldFlags::empty());
        let vol = field(2, FieldFlags::VOLATILE);
        let mut ssa = SsaFunctionBuilder::new(2).build_with(|fb| {
            let obj = fb.arg(0);
            let other = fb.arg(1);
            fb.block(0, |b| {
                let one = b.const_i32(1);
                b.store_field(obj, f, one);
                b.store_field(other, vol, one);
                let v = b.load_field(obj, f);
                b.ret_val(v);
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.loads_eliminated, 1);
        assert_eq!(outcome.stores_eliminated, 0);
    }

    #[test]
    fn test_same_value_store_after_release_kept() {
        let f = field(1, FieldFlags::empty());
        let vol = field(2, FieldFlags::VOLATILE);
        let mut ssa = SsaFunctionBuilder::new(1).build_with(|fb| {
            let obj = fb.arg(0);
            fb.block(0, |b| {
                let one = b.const_i32(1);
                b.store_field(obj, f, one);
                let v = b.const_i32(123);
                b.store_field(obj, vol, v);
                b.store_field(obj, f, one);
                b.ret();
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.stores_eliminated, 0);
        assert_eq!(count(&ssa, |op| matches!(op, SsaOp::StoreField { .. })), 3);
    }

    #[test]
    fn test_same_value_store_on_singleton_ignores_release() {
        let f = field(1, FieldFlags::empty());
        let vol = field(2, FieldFlags::VOLATILE);
        let mut ssa = SsaFunctionBuilder::new(0).build_with(|fb| {
            fb.block(0, |b| {
                let obj = b.new_obj(Token::from_parts(Token::CLASS, 1));
                let one = b.const_i32(1);
                b.store_field(obj, f, one);
                let v = b.const_i32(123);
                b.store_field(obj, vol, v);
                b.store_field(obj, f, one);
                let r = b.load_field(obj, f);
                b.ret_val(r);
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.loads_eliminated, 1);
        assert_eq!(outcome.stores_eliminated, 3);
        assert_eq!(count(&ssa, |op| op.is_store() || op.is_load()), 0);
    }

    #[test]
    fn test_dead_store_removal_is_followed_up() {
        // x = arr[k]; arr[0] = x; arr[k] = x; return x + arr[1]
        let mut ssa = SsaFunctionBuilder::new(1).build_with(|fb| {
            let k = fb.arg(0);
            fb.block(0, |b| {
                let four = b.const_i32(4);
                let arr = b.new_arr(four);
                let x = b.load_element(arr, k);
                let zero = b.const_i32(0);
                b.store_element(arr, zero, x);
                b.store_element(arr, k, x);
                let one = b.const_i32(1);
                let y = b.load_element(arr, one);
                let sum = b.add(x, y);
                b.ret_val(sum);
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.stores_eliminated, 2);
        assert_eq!(outcome.loads_eliminated, 1);

        let settled = ssa.clone();
        assert!(!run(&mut ssa).changed());
        assert_eq!(ssa, settled);
    }

    #[test]
    fn test_singleton_monitor_removed_and_recorded() {
        let mut ssa = SsaFunctionBuilder::new(0).build_with(|fb| {
            fb.block(0, |b| {
                let obj = b.new_obj(Token::from_parts(Token::CLASS, 1));
                b.monitor_enter(obj);
                b.monitor_exit(obj);
                b.ret();
            });
        });
        let outcome = run(&mut ssa);
        assert_eq!(outcome.monitors_eliminated, 2);
        assert_eq!(outcome.monitor_pairs.len(), 1);
        assert!(outcome.monitor_pairs[0].eliminated);
        assert_eq!(outcome.monitor_pairs[0].enter_block, Some(0));
        assert_eq!(count(&ssa, |op| matches!(op, SsaOp::MonitorEnter { .. })), 0);
    }

    #[test]
    fn test_monitor_elimination_can_be_disabled() {
        let mut ssa = SsaFunctionBuilder::new(0).build_with(|fb| {
            fb.block(0, |b| {
                let obj = b.new_obj(Token::from_parts(Token::CLASS, 1));
                b.monitor_enter(obj);
                b.monitor_exit(obj);
                b.ret();
            });
        });
        let config = LseConfig {
            enable_monitor_elimination: false,
            ..LseConfig::default()
        };
        let outcome = eliminate(&mut ssa, method(), &config, &EventLog::new()).expect("runs");
        assert_eq!(outcome.monitors_eliminated, 0);
        assert!(!outcome.monitor_pairs[0].eliminated);
    }

    #[test]
    fn test_invalid_input_is_restored() {
        // B0 jumps to a block that does not exist
        let mut ssa = SsaFunctionBuilder::new(1).build_with(|fb| {
            let obj = fb.arg(0);
            fb.block(0, |b| {
                let one = b.const_i32(1);
                b.store_field(obj, field(1, FieldFlags::empty()), one);
                let _ = b.load_field(obj, field(1, FieldFlags::empty()));
                b.jump(7);
            });
        });
        let before = ssa.clone();
        let result = eliminate(&mut ssa, method(), &LseConfig::default(), &EventLog::new());
        assert!(matches!(result, Err(crate::Error::LseInvariant { .. })));
        assert_eq!(ssa, before);
    }

    #[test]
    fn test_pass_records_monitor_pairs() {
        use std::sync::Arc;

        use crate::unit::{CompilationUnit, MethodFlags};

        let body = SsaFunctionBuilder::new(0).build_with(|fb| {
            fb.block(0, |b| {
                let obj = b.new_obj(Token::from_parts(Token::CLASS, 1));
                b.monitor_enter(obj);
                b.monitor_exit(obj);
                b.ret();
            });
        });
        let mut unit = CompilationUnit::new();
        let m = unit.add_method("Main.sync", MethodFlags::STATIC, body);
        let ctx = CompilerContext::new(Arc::new(unit));
        let pass = LoadStoreEliminationPass::default();

        let mut ssa = ctx.take_ssa(m.token()).expect("body present");
        let changed = pass.run_on_method(&mut ssa, m.token(), &ctx);
        assert_eq!(changed.ok(), Some(true));
        assert_eq!(ctx.monitor_records(m.token()).len(), 1);
        assert_eq!(ctx.events.count_kind(crate::compiler::EventKind::MonitorEliminated), 2);
    }
}
