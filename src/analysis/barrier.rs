//! Memory-ordering classification of operations.
//!
//! | Operation                    | Barrier   |
//! |------------------------------|-----------|
//! | volatile field load          | `Acquire` |
//! | `MonitorEnter`               | `Acquire` |
//! | volatile field store         | `Release` |
//! | `MonitorExit`                | `Release` |
//! | `MemoryBarrier`              | `Full`    |
//! | everything else              | `None`    |
//!
//! The classification is a pure function of the operation: volatility is a
//! flag of the referenced field and monitor operations are their own kind.
//! Whether the barrier matters for a given access is decided by the caller,
//! which may treat barriers on singleton objects as transparent (see
//! [`barrier_subject`]).

use strum::{Display, EnumIter};

use crate::analysis::ssa::{SsaOp, SsaVarId};

/// Memory-ordering role of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum BarrierKind {
    /// Plain operation with no ordering effect.
    None,
    /// Later reads must observe writes published by other threads.
    Acquire,
    /// Earlier writes must be visible to other threads at this point.
    Release,
    /// Both acquire and release.
    Full,
}

impl BarrierKind {
    /// Returns `true` for `Acquire` and `Full`.
    #[must_use]
    pub const fn acquires(self) -> bool {
        matches!(self, Self::Acquire | Self::Full)
    }

    /// Returns `true` for `Release` and `Full`.
    #[must_use]
    pub const fn releases(self) -> bool {
        matches!(self, Self::Release | Self::Full)
    }

    /// Returns `true` for anything but `None`.
    #[must_use]
    pub const fn is_barrier(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Returns the barrier kind of `op`.
#[must_use]
pub fn barrier_of(op: &SsaOp) -> BarrierKind {
    match op {
        SsaOp::LoadField { field, .. } | SsaOp::LoadStaticField { field, .. }
            if field.is_volatile() =>
        {
            BarrierKind::Acquire
        }
        SsaOp::StoreField { field, .. } | SsaOp::StoreStaticField { field, .. }
            if field.is_volatile() =>
        {
            BarrierKind::Release
        }
        SsaOp::MonitorEnter { .. } => BarrierKind::Acquire,
        SsaOp::MonitorExit { .. } => BarrierKind::Release,
        SsaOp::MemoryBarrier => BarrierKind::Full,
        _ => BarrierKind::None,
    }
}

/// Returns the object whose storage the barrier synchronizes on.
///
/// A barrier whose subject is a singleton allocation cannot be observed by
/// another thread. Static volatile fields and fences have no subject and
/// always take effect.
#[must_use]
pub fn barrier_subject(op: &SsaOp) -> Option<SsaVarId> {
    match op {
        SsaOp::LoadField { object, field, .. } | SsaOp::StoreField { object, field, .. }
            if field.is_volatile() =>
        {
            Some(*object)
        }
        SsaOp::MonitorEnter { object } | SsaOp::MonitorExit { object } => Some(*object),
        _ => None,
    }
}
