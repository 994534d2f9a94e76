//! SSA instructions.

use std::fmt;

use crate::analysis::ssa::{SsaOp, SsaVarId};

/// An instruction in SSA form: an [`SsaOp`] plus the source position it was
/// lowered from, if any.
///
/// Synthetic instructions (inserted by passes such as inlining) carry no
/// position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaInstruction {
    op: SsaOp,
    position: Option<u32>,
}

impl SsaInstruction {
    /// Creates an instruction lowered from source position `position`.
    #[must_use]
    pub fn new(op: SsaOp, position: u32) -> Self {
        Self {
            op,
            position: Some(position),
        }
    }

    /// Creates an instruction with no source position.
    #[must_use]
    pub fn synthetic(op: SsaOp) -> Self {
        Self { op, position: None }
    }

    /// Returns the operation.
    #[must_use]
    pub fn op(&self) -> &SsaOp {
        &self.op
    }

    /// Returns the operation mutably.
    pub fn op_mut(&mut self) -> &mut SsaOp {
        &mut self.op
    }

    /// Replaces the operation, keeping the source position.
    pub fn set_op(&mut self, op: SsaOp) {
        self.op = op;
    }

    /// Returns the source position, if any.
    #[must_use]
    pub fn position(&self) -> Option<u32> {
        self.position
    }

    /// Returns `true` if this instruction ends its block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    /// Returns the variables this instruction reads.
    #[must_use]
    pub fn uses(&self) -> Vec<SsaVarId> {
        self.op.uses()
    }

    /// Returns the variable this instruction defines, if any.
    #[must_use]
    pub fn def(&self) -> Option<SsaVarId> {
        self.op.dest()
    }

    /// Returns `true` for removed instructions.
    #[must_use]
    pub fn is_nop(&self) -> bool {
        matches!(self.op, SsaOp::Nop)
    }
}

impl fmt::Display for SsaInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)
    }
}
