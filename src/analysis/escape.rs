//! Escape analysis for objects allocated in the current method.
//!
//! [`EscapeAnalysis`] classifies every allocation site (`NewObj` / `NewArr`
//! destination) as [`EscapeStatus::Singleton`] or [`EscapeStatus::Escaping`].
//! A singleton's reference never leaves the method: it is only ever used as
//! the base of field and element accesses or as a monitor operand. Any other
//! use makes the allocation escaping:
//!
//! - stored as a value into any heap location
//! - passed to a call
//! - returned or thrown
//! - copied, merged through a phi, or used as an arithmetic or index operand
//!
//! Every value that is not an allocation of this method (arguments, loaded
//! references, call results) is Escaping.
//!
//! The analysis is a single pass over the function and never reports
//! Singleton for a reference that could be observed outside the method. It is
//! cheap enough to be recomputed whenever the IR changes, which is how the
//! inliner's effect on escape status is picked up: once a call that received
//! an allocation is inlined, the next computation no longer sees the call.
//!
//! # Usage
//!
//! ```rust
//! use lsekit::analysis::{EscapeAnalysis, EscapeStatus, SsaFunctionBuilder, Token};
//!
//! let class = Token::from_parts(Token::CLASS, 1);
//! let ssa = SsaFunctionBuilder::new(0).build_with(|f| {
//!     f.block(0, |b| {
//!         let local = b.new_obj(class);
//!         b.monitor_enter(local);
//!         b.monitor_exit(local);
//!         let leaked = b.new_obj(class);
//!         b.ret_val(leaked);
//!     });
//! });
//!
//! let escape = EscapeAnalysis::compute(&ssa);
//! assert_eq!(escape.singleton_count(), 1);
//! ```

use std::collections::BTreeMap;

use strum::Display;

use crate::analysis::ssa::{SsaFunction, SsaOp, SsaVarId};

/// Escape classification of an object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EscapeStatus {
    /// Allocated in this method and never observable outside it.
    Singleton,
    /// Possibly shared with other methods or threads.
    Escaping,
}

/// Per-allocation escape results for one [`SsaFunction`].
#[derive(Debug, Clone, Default)]
pub struct EscapeAnalysis {
    allocations: BTreeMap<SsaVarId, EscapeStatus>,
}

impl EscapeAnalysis {
    /// Computes escape status for every allocation site in `ssa`.
    #[must_use]
    pub fn compute(ssa: &SsaFunction) -> Self {
        let mut allocations = BTreeMap::new();
        for (_, _, instr) in ssa.iter_instructions() {
            if let SsaOp::NewObj { dest, .. } | SsaOp::NewArr { dest, .. } = instr.op() {
                allocations.insert(*dest, EscapeStatus::Singleton);
            }
        }
        if allocations.is_empty() {
            return Self { allocations };
        }

        let mut escape = |var: SsaVarId| {
            if let Some(status) = allocations.get_mut(&var) {
                *status = EscapeStatus::Escaping;
            }
        };

        for block in ssa.blocks() {
            for phi in block.phi_nodes() {
                phi.used_variables().into_iter().for_each(&mut escape);
            }
            for instr in block.instructions() {
                for var in escaping_uses(instr.op()) {
                    escape(var);
                }
            }
        }

        Self { allocations }
    }

    /// Returns the escape status of `var`.
    ///
    /// Variables that are not allocation sites of this method are Escaping.
    #[must_use]
    pub fn escape_of(&self, var: SsaVarId) -> EscapeStatus {
        self.allocations
            .get(&var)
            .copied()
            .unwrap_or(EscapeStatus::Escaping)
    }

    /// Returns `true` if `var` is a non-escaping allocation.
    #[must_use]
    pub fn is_singleton(&self, var: SsaVarId) -> bool {
        self.escape_of(var) == EscapeStatus::Singleton
    }

    /// Returns `true` if `var` is an allocation site of this method.
    #[must_use]
    pub fn is_allocation(&self, var: SsaVarId) -> bool {
        self.allocations.contains_key(&var)
    }

    /// Iterates over `(allocation, status)` in variable order.
    pub fn allocations(&self) -> impl Iterator<Item = (SsaVarId, EscapeStatus)> + '_ {
        self.allocations.iter().map(|(var, status)| (*var, *status))
    }

    /// Returns the number of singleton allocations.
    #[must_use]
    pub fn singleton_count(&self) -> usize {
        self.allocations
            .values()
            .filter(|status| **status == EscapeStatus::Singleton)
            .count()
    }
}

/// Operands of `op` through which a reference may leave the method.
///
/// Base operands of heap accesses and monitor operands are the only
/// non-escaping uses.
fn escaping_uses(op: &SsaOp) -> Vec<SsaVarId> {
    match op {
        SsaOp::LoadField { .. } | SsaOp::MonitorEnter { .. } | SsaOp::MonitorExit { .. } => {
            vec![]
        }
        SsaOp::StoreField { value, .. } => vec![*value],
        SsaOp::LoadElement { index, .. } => vec![*index],
        SsaOp::StoreElement { index, value, .. } => vec![*index, *value],
        other => other.uses(),
    }
}
