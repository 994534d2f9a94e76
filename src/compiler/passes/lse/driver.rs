//! The load/store elimination walk.
//!
//! Blocks are visited once in reverse postorder. Each block starts from the
//! merge of its predecessors' exit states and every instruction updates the
//! state:
//!
//! - a load of a `Known` location is replaced by the known variable
//! - a load of a `NeedsMerge` location is replaced by a phi in the join block
//! - a load of untouched fresh storage becomes the default constant
//! - a store writing the value the location already holds is deleted, unless
//!   a barrier was crossed since that value was established
//! - a store overwritten before anything observed it becomes a dead candidate
//! - barriers and calls flush pending stores of escaping locations, and
//!   acquires additionally forget escaping values
//!
//! A store is removed at the end only if it is a dead candidate on some path
//! and was never kept on any path. Loop headers start from the empty state,
//! and every store still pending on a loop edge is kept.
//!
//! Removing a dead store can expose more work to an earlier point of the
//! walk, so [`eliminate`] repeats the walk as sweeps until one changes
//! nothing. Every changing sweep deletes a heap or monitor operation, which
//! bounds the number of sweeps.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, trace};

use crate::{
    analysis::{
        barrier_of, barrier_subject, is_default_value, BarrierKind, ConstValue, EscapeAnalysis,
        EscapeStatus, HeapLocation, HeapLocationModel, Relation, SsaCfg, SsaFunction, SsaOp,
        SsaVarId, Token,
    },
    compiler::{
        config::LseConfig,
        events::{EventKind, EventLog},
        passes::lse::{
            merge::{merge_states, PhiMaterializer},
            state::{BlockState, PendingStore, ValueState},
            LseOutcome, MonitorPairRecord,
        },
    },
    Error, Result,
};

/// Runs load/store elimination on `ssa`.
///
/// On error the function is restored to its exact input state.
///
/// # Errors
///
/// Returns [`Error::LseInvariant`] if the walk reaches an inconsistent state
/// or the rewritten function fails validation.
pub fn eliminate(
    ssa: &mut SsaFunction,
    method: Token,
    config: &LseConfig,
    events: &EventLog,
) -> Result<LseOutcome> {
    let original = ssa.clone();
    match sweep_to_fixpoint(ssa, method, config, events) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            *ssa = original;
            Err(e)
        }
    }
}

fn sweep_to_fixpoint(
    ssa: &mut SsaFunction,
    method: Token,
    config: &LseConfig,
    events: &EventLog,
) -> Result<LseOutcome> {
    let limit = removable_operations(ssa) + 1;
    let mut reported = HashSet::new();
    let mut total = LseOutcome::default();

    for sweep in 1..=limit {
        let escape = EscapeAnalysis::compute(ssa);
        let model = HeapLocationModel::new(ssa, &escape);
        let cfg = SsaCfg::from_ssa(ssa);

        let walker = Walker {
            method,
            config,
            events,
            reported: &mut reported,
            model: &model,
            escape: &escape,
            constants: ssa.constants(),
            kept: HashSet::new(),
            dead: BTreeSet::new(),
            materializer: PhiMaterializer::new(),
            monitor_stacks: HashMap::new(),
            outcome: LseOutcome::default(),
        };
        let outcome = walker.run(ssa, &cfg)?;
        let changed = outcome.changed();
        total.absorb(outcome);
        if !changed {
            trace!("{method}: settled after {sweep} sweeps");
            return Ok(total);
        }
    }

    Err(Error::LseInvariant {
        method,
        message: format!("no fixed point after {limit} sweeps"),
    })
}

/// Counts the operations a sweep can delete.
fn removable_operations(ssa: &SsaFunction) -> usize {
    ssa.iter_instructions()
        .filter(|(_, _, instr)| {
            let op = instr.op();
            op.is_load()
                || op.is_store()
                || matches!(op, SsaOp::MonitorEnter { .. } | SsaOp::MonitorExit { .. })
        })
        .count()
}

struct Walker<'a> {
    method: Token,
    config: &'a LseConfig,
    events: &'a EventLog,
    /// Allocations already reported as singletons by an earlier sweep.
    reported: &'a mut HashSet<SsaVarId>,
    model: &'a HeapLocationModel<'a>,
    escape: &'a EscapeAnalysis,
    constants: HashMap<SsaVarId, ConstValue>,
    /// Stores observed on at least one path.
    kept: HashSet<(usize, usize)>,
    /// Stores overwritten or dropped unobserved on at least one path.
    dead: BTreeSet<(usize, usize)>,
    materializer: PhiMaterializer,
    /// Open monitor enters per object: `(block, eliminated)`.
    monitor_stacks: HashMap<SsaVarId, Vec<(usize, bool)>>,
    outcome: LseOutcome,
}

impl Walker<'_> {
    fn run(mut self, ssa: &mut SsaFunction, cfg: &SsaCfg) -> Result<LseOutcome> {
        for (var, status) in self.escape.allocations() {
            if status != EscapeStatus::Singleton || !self.reported.insert(var) {
                continue;
            }
            self.events
                .record(EventKind::SingletonIdentified)
                .method(self.method)
                .message(format!("{var} does not escape"));
        }

        let order = cfg.reverse_postorder();
        let mut exit_states: Vec<Option<BlockState>> = vec![None; ssa.block_count()];

        for node in order {
            let block = node.index();
            let mut state = self.entry_state(block, cfg, &exit_states);

            let count = ssa.block(block).map_or(0, |b| b.instruction_count());
            for index in 0..count {
                let Some(op) = ssa
                    .block(block)
                    .and_then(|b| b.instructions().get(index))
                    .map(|instr| instr.op().clone())
                else {
                    continue;
                };
                self.visit(ssa, block, index, &op, &mut state)?;

                if state.values.len() > self.config.max_tracked_locations {
                    debug!(
                        "{}: B{} tracks {} locations, forgetting heap state",
                        self.method,
                        block,
                        state.values.len()
                    );
                    let flushed = state.reset();
                    self.keep(flushed);
                }
            }

            let successors = cfg.block_successors(block);
            let falls_off = successors.is_empty()
                && !matches!(
                    ssa.block(block).and_then(|b| b.terminator()).map(|t| t.op()),
                    Some(SsaOp::Return { .. } | SsaOp::Throw { .. })
                );
            let loops_back = successors
                .iter()
                .any(|succ| exit_states[*succ].is_some() || *succ == block);
            if falls_off || loops_back {
                let flushed = state.take_pending(|_| true);
                self.keep(flushed);
            }
            exit_states[block] = Some(state);
        }

        self.close_monitors();
        self.remove_dead_stores(ssa);

        ssa.canonicalize();
        ssa.validate().map_err(|e| Error::LseInvariant {
            method: self.method,
            message: format!("rewritten function is malformed: {e}"),
        })?;

        self.outcome.phis_created = self.materializer.phis_created();
        debug!(
            "{}: {} loads, {} stores, {} monitor operations eliminated, {} phis",
            self.method,
            self.outcome.loads_eliminated,
            self.outcome.stores_eliminated,
            self.outcome.monitors_eliminated,
            self.outcome.phis_created
        );
        Ok(self.outcome)
    }

    fn entry_state(
        &mut self,
        block: usize,
        cfg: &SsaCfg,
        exit_states: &[Option<BlockState>],
    ) -> BlockState {
        let preds = cfg.block_predecessors(block);
        if preds.iter().all(|pred| exit_states[*pred].is_some()) {
            let inputs: Vec<(usize, &BlockState)> = preds
                .iter()
                .filter_map(|pred| exit_states[*pred].as_ref().map(|state| (*pred, state)))
                .collect();
            return merge_states(block, &inputs);
        }

        // Loop header or join with an unreachable predecessor
        trace!("{}: B{} starts from the empty state", self.method, block);
        let flushed: Vec<PendingStore> = preds
            .iter()
            .filter_map(|pred| exit_states[*pred].as_ref())
            .flat_map(|state| state.pending.iter().copied())
            .collect();
        self.keep(flushed);
        BlockState::new()
    }

    fn visit(
        &mut self,
        ssa: &mut SsaFunction,
        block: usize,
        index: usize,
        op: &SsaOp,
        state: &mut BlockState,
    ) -> Result<()> {
        let barrier = barrier_of(op);
        let transparent =
            barrier_subject(op).is_some_and(|subject| self.escape.is_singleton(subject));

        match op {
            SsaOp::LoadField { dest, .. }
            | SsaOp::LoadStaticField { dest, .. }
            | SsaOp::LoadElement { dest, .. } => {
                let location = self.location(op)?;
                if barrier.is_barrier() && !transparent {
                    self.apply_barrier(barrier, state);
                    self.observe(&location, state);
                    state.set(location, ValueState::Unknown);
                } else {
                    self.visit_load(ssa, block, index, *dest, location, state)?;
                }
            }
            SsaOp::StoreField { value, .. }
            | SsaOp::StoreStaticField { value, .. }
            | SsaOp::StoreElement { value, .. } => {
                let location = self.location(op)?;
                if barrier.is_barrier() && !transparent {
                    self.apply_barrier(barrier, state);
                    self.observe(&location, state);
                    state.set(location, ValueState::Unknown);
                } else {
                    self.visit_store(ssa, block, index, *value, location, state);
                }
            }
            SsaOp::NewObj { dest, .. } | SsaOp::NewArr { dest, .. } => {
                if self.escape.is_singleton(*dest) {
                    state.fresh.insert(*dest);
                }
            }
            SsaOp::Call { .. } => {
                self.apply_barrier(BarrierKind::Full, state);
            }
            SsaOp::MonitorEnter { object } | SsaOp::MonitorExit { object } => {
                let eliminated = transparent && self.config.enable_monitor_elimination;
                if eliminated {
                    ssa.remove_instruction(block, index);
                    self.outcome.monitors_eliminated += 1;
                    self.events
                        .record(EventKind::MonitorEliminated)
                        .at(self.method, block)
                        .message(op.to_string());
                } else if !transparent {
                    self.apply_barrier(barrier, state);
                }
                let enter = matches!(op, SsaOp::MonitorEnter { .. });
                self.pair_monitor(*object, block, eliminated, enter);
            }
            SsaOp::MemoryBarrier => self.apply_barrier(barrier, state),
            SsaOp::Return { .. } | SsaOp::Throw { .. } => self.visit_exit(state),
            _ => {}
        }
        Ok(())
    }

    fn location(&self, op: &SsaOp) -> Result<HeapLocation> {
        self.model.location_of(op).ok_or_else(|| Error::LseInvariant {
            method: self.method,
            message: format!("no heap location for '{op}'"),
        })
    }

    fn visit_load(
        &mut self,
        ssa: &mut SsaFunction,
        block: usize,
        index: usize,
        dest: SsaVarId,
        location: HeapLocation,
        state: &mut BlockState,
    ) -> Result<()> {
        match state.get(&location).cloned() {
            Some(ValueState::Known(var)) => {
                self.forward(ssa, block, index, dest, var);
            }
            Some(merge @ ValueState::NeedsMerge(_))
                if self.materializer.can_materialize(&merge) =>
            {
                let phi = self
                    .materializer
                    .materialize(ssa, &merge)
                    .ok_or_else(|| Error::LseInvariant {
                        method: self.method,
                        message: format!("merge for {location} could not be materialized"),
                    })?;
                self.events
                    .record(EventKind::PhiInserted)
                    .at(self.method, block)
                    .message(format!("{phi} for {location}"));
                self.forward(ssa, block, index, dest, phi);
                state.set(location, ValueState::Known(phi));
            }
            None if state.is_fresh(&location) && !location.has_variable_index() => {
                ssa.replace_instruction_op(
                    block,
                    index,
                    SsaOp::Const {
                        dest,
                        value: ConstValue::DEFAULT,
                    },
                );
                self.constants.insert(dest, ConstValue::DEFAULT);
                self.outcome.loads_eliminated += 1;
                self.events
                    .record(EventKind::DefaultMaterialized)
                    .at(self.method, block)
                    .message(format!("{dest} = default of {location}"));
                state.set(location, ValueState::Known(dest));
            }
            _ => {
                self.observe(&location, state);
                state.establish(location, dest);
            }
        }
        Ok(())
    }

    fn forward(
        &mut self,
        ssa: &mut SsaFunction,
        block: usize,
        index: usize,
        dest: SsaVarId,
        value: SsaVarId,
    ) {
        trace!("{}: B{}:{} {} -> {}", self.method, block, index, dest, value);
        ssa.replace_uses(dest, value);
        ssa.remove_instruction(block, index);
        if let Some(constant) = self.constants.get(&value).copied() {
            self.constants.insert(dest, constant);
        }
        self.outcome.loads_eliminated += 1;
        self.events
            .record(EventKind::LoadEliminated)
            .at(self.method, block)
            .message(format!("{dest} -> {value}"));
    }

    fn visit_store(
        &mut self,
        ssa: &mut SsaFunction,
        block: usize,
        index: usize,
        value: SsaVarId,
        location: HeapLocation,
        state: &mut BlockState,
    ) {
        let redundant = match state.get(&location) {
            Some(ValueState::Known(current)) => {
                !state.is_behind_barrier(&location) && self.same_value(*current, value)
            }
            None => {
                state.is_fresh(&location)
                    && !location.has_variable_index()
                    && self
                        .constants
                        .get(&value)
                        .is_some_and(is_default_value)
            }
            _ => false,
        };
        if redundant {
            ssa.remove_instruction(block, index);
            self.outcome.stores_eliminated += 1;
            self.events
                .record(EventKind::StoreEliminated)
                .at(self.method, block)
                .message(format!("{location} already holds {value}"));
            return;
        }

        let model = self.model;
        let overwritten =
            state.take_pending(|p| model.relation_of(&p.location, &location) == Relation::Same);
        self.dead.extend(overwritten.iter().map(PendingStore::site));

        state.invalidate(|other| model.relation_of(other, &location) == Relation::MayAlias);
        if location.has_variable_index() {
            if let Some(object) = location.object() {
                state.fresh.remove(&object);
            }
        }
        state.establish(location, value);
        state.pending.insert(PendingStore {
            location,
            block,
            index,
        });
    }

    fn same_value(&self, a: SsaVarId, b: SsaVarId) -> bool {
        if a == b {
            return true;
        }
        match (self.constants.get(&a), self.constants.get(&b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Keeps every pending store the read of `location` may observe.
    fn observe(&mut self, location: &HeapLocation, state: &mut BlockState) {
        let model = self.model;
        let observed =
            state.take_pending(|p| model.relation_of(&p.location, location) != Relation::Distinct);
        self.keep(observed);
    }

    fn apply_barrier(&mut self, kind: BarrierKind, state: &mut BlockState) {
        if !kind.is_barrier() {
            return;
        }
        let model = self.model;
        let flushed = state.take_pending(|p| model.is_escaping(&p.location));
        self.keep(flushed);
        state.cross_barrier(|location| model.is_escaping(location));
        if kind.acquires() {
            state.invalidate(|location| model.is_escaping(location));
        }
    }

    fn visit_exit(&mut self, state: &mut BlockState) {
        let model = self.model;
        let escaping = state.take_pending(|p| model.is_escaping(&p.location));
        self.keep(escaping);
        let local = state.take_pending(|_| true);
        self.dead.extend(local.iter().map(PendingStore::site));
    }

    fn keep(&mut self, stores: impl IntoIterator<Item = PendingStore>) {
        self.kept.extend(stores.into_iter().map(|p| p.site()));
    }

    fn pair_monitor(&mut self, object: SsaVarId, block: usize, eliminated: bool, enter: bool) {
        if enter {
            self.monitor_stacks
                .entry(object)
                .or_default()
                .push((block, eliminated));
            return;
        }
        let enter_block = self
            .monitor_stacks
            .get_mut(&object)
            .and_then(Vec::pop)
            .map(|(enter_block, _)| enter_block);
        self.outcome.monitor_pairs.push(MonitorPairRecord {
            object,
            enter_block,
            exit_block: Some(block),
            eliminated,
        });
    }

    fn close_monitors(&mut self) {
        let open: BTreeMap<SsaVarId, Vec<(usize, bool)>> = self.monitor_stacks.drain().collect();
        for (object, stack) in open {
            for (enter_block, eliminated) in stack {
                self.outcome.monitor_pairs.push(MonitorPairRecord {
                    object,
                    enter_block: Some(enter_block),
                    exit_block: None,
                    eliminated,
                });
            }
        }
    }

    fn remove_dead_stores(&mut self, ssa: &mut SsaFunction) {
        if !self.config.enable_store_elimination {
            return;
        }
        for (block, index) in self.dead.iter().copied() {
            if self.kept.contains(&(block, index)) {
                continue;
            }
            let description = ssa
                .block(block)
                .and_then(|b| b.instructions().get(index))
                .map(|instr| instr.op().to_string())
                .unwrap_or_default();
            if ssa.remove_instruction(block, index) {
                self.outcome.stores_eliminated += 1;
                self.events
                    .record(EventKind::StoreEliminated)
                    .at(self.method, block)
                    .message(format!("{description} is never observed"));
            }
        }
    }
}
