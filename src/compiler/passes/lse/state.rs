//! Value-state lattice and per-block heap state.
//!
//! Every tracked heap location holds one [`ValueState`]:
//!
//! ```text
//!          Known(v)      NeedsMerge(request)
//!               \          /
//!                 Unknown
//! ```
//!
//! `Known(v)` means the location holds the value of SSA variable `v` on every
//! path reaching the current point. `NeedsMerge` means the predecessors of
//! some join block disagree, and a phi in that block would recover the
//! value. `Unknown` means nothing is known.
//!
//! [`BlockState`] maps locations to states and additionally tracks the stores
//! whose written value has not been observed yet, the allocations whose
//! untouched storage still holds the default zero, and the locations whose
//! known value was established before the last barrier.

use std::{
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use crate::analysis::{HeapLocation, SsaVarId};

/// Abstract value of one heap location at one program point.
#[derive(Debug, Clone)]
pub enum ValueState {
    /// Nothing is known about the content of the location.
    Unknown,
    /// The location holds the value of this variable.
    Known(SsaVarId),
    /// Predecessors of a join disagree; a phi may recover the value.
    NeedsMerge(Rc<MergeRequest>),
}

impl ValueState {
    /// Returns the known variable, if any.
    #[must_use]
    pub fn known(&self) -> Option<SsaVarId> {
        match self {
            Self::Known(var) => Some(*var),
            _ => None,
        }
    }

    /// Returns `true` if both states denote the same value.
    ///
    /// Merge requests agree only when they are the same request.
    #[must_use]
    pub fn agrees_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Known(a), Self::Known(b)) => a == b,
            (Self::NeedsMerge(a), Self::NeedsMerge(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A pending phi: the value of `location` at the entry of `block`, built
/// from the states at the end of each predecessor.
#[derive(Debug)]
pub struct MergeRequest {
    /// The join block in which the phi would be placed.
    pub block: usize,
    /// The location whose value is merged.
    pub location: HeapLocation,
    /// `(predecessor, state at the end of the predecessor)` in predecessor order.
    pub operands: Vec<(usize, ValueState)>,
}

/// A store whose written value has not been observed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingStore {
    /// The location written.
    pub location: HeapLocation,
    /// Block of the store instruction.
    pub block: usize,
    /// Index of the store within its block.
    pub index: usize,
}

impl PendingStore {
    /// Returns the `(block, index)` site of the store.
    #[must_use]
    pub const fn site(&self) -> (usize, usize) {
        (self.block, self.index)
    }
}

/// Heap knowledge at one program point.
#[derive(Debug, Clone, Default)]
pub struct BlockState {
    /// Tracked locations. A location absent from the map is `Unknown`, unless
    /// its base is fresh, in which case it holds the default zero.
    pub values: BTreeMap<HeapLocation, ValueState>,
    /// Stores not yet proven observable.
    pub pending: BTreeSet<PendingStore>,
    /// Allocations whose untracked locations still hold their default value.
    pub fresh: BTreeSet<SsaVarId>,
    /// Locations whose known value predates a barrier. Such a value may
    /// still forward loads, but storing it again is not redundant.
    pub behind_barrier: BTreeSet<HeapLocation>,
}

impl BlockState {
    /// Creates the empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tracked state of `location`, `None` if untracked.
    #[must_use]
    pub fn get(&self, location: &HeapLocation) -> Option<&ValueState> {
        self.values.get(location)
    }

    /// Sets the state of `location`.
    pub fn set(&mut self, location: HeapLocation, state: ValueState) {
        self.values.insert(location, state);
    }

    /// Returns `true` if untracked locations of `location`'s base hold the default value.
    #[must_use]
    pub fn is_fresh(&self, location: &HeapLocation) -> bool {
        location
            .object()
            .is_some_and(|object| self.fresh.contains(&object))
    }

    /// Sets every location matching `predicate` to `Unknown`.
    pub fn invalidate<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&HeapLocation) -> bool,
    {
        for (location, state) in &mut self.values {
            if predicate(location) {
                *state = ValueState::Unknown;
            }
        }
    }

    /// Marks every tracked location matching `predicate` as established
    /// before a barrier.
    pub fn cross_barrier<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&HeapLocation) -> bool,
    {
        let crossed: Vec<HeapLocation> = self
            .values
            .keys()
            .filter(|location| predicate(location))
            .copied()
            .collect();
        self.behind_barrier.extend(crossed);
    }

    /// Returns `true` if the value of `location` was established before a barrier.
    #[must_use]
    pub fn is_behind_barrier(&self, location: &HeapLocation) -> bool {
        self.behind_barrier.contains(location)
    }

    /// Records that the value of `location` was just established by an access.
    pub fn establish(&mut self, location: HeapLocation, value: SsaVarId) {
        self.behind_barrier.remove(&location);
        self.values.insert(location, ValueState::Known(value));
    }

    /// Removes and returns the pending stores matching `predicate`.
    pub fn take_pending<F>(&mut self, mut predicate: F) -> Vec<PendingStore>
    where
        F: FnMut(&PendingStore) -> bool,
    {
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| predicate(p));
        self.pending = kept.into_iter().collect();
        taken
    }

    /// Forgets all values and fresh allocations and returns every pending store.
    pub fn reset(&mut self) -> Vec<PendingStore> {
        self.values.clear();
        self.fresh.clear();
        self.behind_barrier.clear();
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}
