//! Joining block states and materializing merge requests into phis.

use std::{
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use crate::{
    analysis::{
        DefSite, HeapLocation, PhiNode, PhiOperand, SsaFunction, SsaVarId, VariableOrigin,
    },
    compiler::passes::lse::state::{BlockState, MergeRequest, ValueState},
};

/// Computes the entry state of `block` from the exit states of all of its
/// predecessors, given in predecessor order.
///
/// - a location on which all predecessors agree keeps that state
/// - a location some predecessor knows nothing about becomes `Unknown`
/// - any other disagreement becomes a merge request owned by `block`
///
/// Pending stores and barrier marks are united; fresh allocations are
/// intersected.
#[must_use]
pub fn merge_states(block: usize, predecessors: &[(usize, &BlockState)]) -> BlockState {
    let Some(((_, first), rest)) = predecessors.split_first() else {
        return BlockState::new();
    };
    if rest.is_empty() {
        return (*first).clone();
    }

    let locations: BTreeSet<HeapLocation> = predecessors
        .iter()
        .flat_map(|(_, state)| state.values.keys().copied())
        .collect();

    let mut merged = BlockState::new();
    for location in locations {
        let operands: Vec<(usize, ValueState)> = predecessors
            .iter()
            .map(|(pred, state)| {
                let value = state.get(&location).cloned().unwrap_or(ValueState::Unknown);
                (*pred, value)
            })
            .collect();

        let value = if operands
            .iter()
            .any(|(_, state)| matches!(state, ValueState::Unknown))
        {
            ValueState::Unknown
        } else if operands
            .iter()
            .all(|(_, state)| state.agrees_with(&operands[0].1))
        {
            operands[0].1.clone()
        } else {
            ValueState::NeedsMerge(Rc::new(MergeRequest {
                block,
                location,
                operands,
            }))
        };
        merged.set(location, value);
    }

    merged.pending = predecessors
        .iter()
        .flat_map(|(_, state)| state.pending.iter().copied())
        .collect();

    merged.behind_barrier = predecessors
        .iter()
        .flat_map(|(_, state)| state.behind_barrier.iter().copied())
        .collect();

    merged.fresh = first
        .fresh
        .iter()
        .filter(|var| rest.iter().all(|(_, state)| state.fresh.contains(var)))
        .copied()
        .collect();

    merged
}

/// Turns merge requests into phi nodes, sharing phis between requests for
/// the same block and location.
#[derive(Debug, Default)]
pub struct PhiMaterializer {
    cache: HashMap<(usize, HeapLocation), SsaVarId>,
    created: usize,
}

impl PhiMaterializer {
    /// Creates an empty materializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of phis inserted so far.
    #[must_use]
    pub fn phis_created(&self) -> usize {
        self.created
    }

    /// Returns `true` if `state` resolves to a variable, i.e. it is `Known`
    /// or a merge request whose operands all resolve.
    #[must_use]
    pub fn can_materialize(&self, state: &ValueState) -> bool {
        let mut memo = HashMap::new();
        self.resolvable(state, &mut memo)
    }

    fn resolvable(
        &self,
        state: &ValueState,
        memo: &mut HashMap<*const MergeRequest, bool>,
    ) -> bool {
        match state {
            ValueState::Unknown => false,
            ValueState::Known(_) => true,
            ValueState::NeedsMerge(request) => {
                if self.cache.contains_key(&(request.block, request.location)) {
                    return true;
                }
                let key = Rc::as_ptr(request);
                if let Some(done) = memo.get(&key) {
                    return *done;
                }
                let ok = request
                    .operands
                    .iter()
                    .all(|(_, operand)| self.resolvable(operand, memo));
                memo.insert(key, ok);
                ok
            }
        }
    }

    /// Returns the variable holding the value described by `state`, inserting
    /// phis as needed. Returns `None` if some operand is `Unknown`; callers
    /// check [`can_materialize`](Self::can_materialize) first so that no
    /// partial phis are left behind.
    pub fn materialize(&mut self, ssa: &mut SsaFunction, state: &ValueState) -> Option<SsaVarId> {
        match state {
            ValueState::Unknown => None,
            ValueState::Known(var) => Some(*var),
            ValueState::NeedsMerge(request) => {
                let key = (request.block, request.location);
                if let Some(var) = self.cache.get(&key) {
                    return Some(*var);
                }

                let mut operands = Vec::with_capacity(request.operands.len());
                for (pred, operand) in &request.operands {
                    operands.push((*pred, self.materialize(ssa, operand)?));
                }

                let result = ssa.create_variable(VariableOrigin::Phi, DefSite::phi(request.block));
                let mut phi = PhiNode::new(result, VariableOrigin::Phi);
                for (pred, value) in operands {
                    phi.add_operand(PhiOperand::new(value, pred));
                }
                ssa.block_mut(request.block)?.add_phi(phi);

                self.cache.insert(key, result);
                self.created += 1;
                Some(result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{LocationBase, LocationDescriptor, SsaBlock, Token},
        compiler::passes::lse::state::PendingStore,
    };

    fn loc(field: u32) -> HeapLocation {
        HeapLocation::new(
            LocationBase::Object(SsaVarId::new(0)),
            LocationDescriptor::Field(Token::from_parts(Token::FIELD, field)),
        )
    }

    fn known(state: &mut BlockState, field: u32, var: usize) {
        state.set(loc(field), ValueState::Known(SsaVarId::new(var)));
    }

    #[test]
    fn test_merge_agreement_and_disagreement() {
        let mut left = BlockState::new();
        let mut right = BlockState::new();
        known(&mut left, 1, 10);
        known(&mut right, 1, 10);
        known(&mut left, 2, 11);
        known(&mut right, 2, 12);
        known(&mut left, 3, 13);

        let merged = merge_states(3, &[(1, &left), (2, &right)]);
        assert_eq!(merged.get(&loc(1)).and_then(ValueState::known), Some(SsaVarId::new(10)));
        match merged.get(&loc(2)) {
            Some(ValueState::NeedsMerge(request)) => {
                assert_eq!(request.block, 3);
                assert_eq!(request.operands.len(), 2);
                assert_eq!(request.operands[0].0, 1);
            }
            other => panic!("expected merge request, got {other:?}"),
        }
        assert!(matches!(merged.get(&loc(3)), Some(ValueState::Unknown)));
    }

    #[test]
    fn test_merge_pending_union_fresh_intersection() {
        let mut left = BlockState::new();
        let mut right = BlockState::new();
        left.pending.insert(PendingStore {
            location: loc(1),
            block: 1,
            index: 0,
        });
        right.pending.insert(PendingStore {
            location: loc(1),
            block: 2,
            index: 0,
        });
        left.fresh.insert(SsaVarId::new(0));
        left.fresh.insert(SsaVarId::new(1));
        right.fresh.insert(SsaVarId::new(1));

        let merged = merge_states(3, &[(1, &left), (2, &right)]);
        assert_eq!(merged.pending.len(), 2);
        assert_eq!(merged.fresh.iter().copied().collect::<Vec<_>>(), vec![SsaVarId::new(1)]);
    }

    #[test]
    fn test_merge_keeps_barrier_mark_of_any_path() {
        let mut left = BlockState::new();
        let mut right = BlockState::new();
        known(&mut left, 1, 10);
        known(&mut right, 1, 10);
        right.cross_barrier(|_| true);

        let merged = merge_states(3, &[(1, &left), (2, &right)]);
        assert_eq!(merged.get(&loc(1)).and_then(ValueState::known), Some(SsaVarId::new(10)));
        assert!(merged.is_behind_barrier(&loc(1)));
    }

    #[test]
    fn test_materialize_inserts_single_phi() {
        let mut ssa = SsaFunction::new(0);
        for id in 0..4 {
            ssa.add_block(SsaBlock::new(id));
        }
        let a = ssa.create_variable(VariableOrigin::Local, DefSite::instruction(1, 0));
        let b = ssa.create_variable(VariableOrigin::Local, DefSite::instruction(2, 0));
        let request = ValueState::NeedsMerge(Rc::new(MergeRequest {
            block: 3,
            location: loc(1),
            operands: vec![(1, ValueState::Known(a)), (2, ValueState::Known(b))],
        }));

        let mut materializer = PhiMaterializer::new();
        assert!(materializer.can_materialize(&request));
        let first = materializer.materialize(&mut ssa, &request);
        let second = materializer.materialize(&mut ssa, &request);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(materializer.phis_created(), 1);
        assert_eq!(ssa.block(3).map(SsaBlock::phi_count), Some(1));
    }

    #[test]
    fn test_unknown_operand_blocks_materialization() {
        let request = ValueState::NeedsMerge(Rc::new(MergeRequest {
            block: 3,
            location: loc(1),
            operands: vec![
                (1, ValueState::Known(SsaVarId::new(1))),
                (2, ValueState::Unknown),
            ],
        }));
        assert!(!PhiMaterializer::new().can_materialize(&request));
    }
}
