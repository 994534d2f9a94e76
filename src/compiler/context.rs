//! Compiler context shared by all passes.
//!
//! The [`CompilerContext`] holds the per-run state that SSA passes need: the
//! compilation unit, the mutable SSA of every method, the event log, and the
//! IR snapshots the checker matches against.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, DashSet};

use crate::{
    analysis::{SsaFunction, Token},
    compiler::{events::EventLog, passes::MonitorPairRecord},
    unit::{CompilationUnit, MethodFlags},
};

/// Compiler context for the SSA pipeline.
///
/// All collection fields use thread-safe types (`DashMap`, `DashSet`) to
/// enable parallel processing of methods during pass execution.
pub struct CompilerContext {
    /// The unit being compiled. Method bodies here are never modified.
    pub unit: Arc<CompilationUnit>,

    /// SSA form for each method (copied from the unit, mutated by passes).
    pub ssa_functions: DashMap<Token, SsaFunction>,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Methods that should not be inlined.
    pub no_inline: DashSet<Token>,

    /// Methods that were inlined at least once.
    pub inlined_methods: DashSet<Token>,

    /// Methods that have been fully processed by the pass pipeline.
    pub processed_methods: DashSet<Token>,

    /// Monitor pairs seen by the last load/store elimination run, per method.
    monitor_records: DashMap<Token, Vec<MonitorPairRecord>>,

    /// IR snapshots keyed by method and phase name, e.g. `inliner (after)`.
    snapshots: DashMap<(Token, String), SsaFunction>,

    /// When compilation started.
    start_time: Instant,
}

impl CompilerContext {
    /// Creates a context for `unit`, copying every method body into SSA storage.
    #[must_use]
    pub fn new(unit: Arc<CompilationUnit>) -> Self {
        let ssa_functions = DashMap::new();
        let no_inline = DashSet::new();
        for method in unit.methods() {
            if let Some(body) = &method.body {
                ssa_functions.insert(method.token, body.clone());
            }
            if method.flags.contains(MethodFlags::NO_INLINE) {
                no_inline.insert(method.token);
            }
        }

        Self {
            unit,
            ssa_functions,
            events: EventLog::new(),
            no_inline,
            inlined_methods: DashSet::new(),
            processed_methods: DashSet::new(),
            monitor_records: DashMap::new(),
            snapshots: DashMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since compilation started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the name of a method, or its token if the unit does not know it.
    #[must_use]
    pub fn method_name(&self, token: Token) -> String {
        self.unit
            .method(token)
            .map_or_else(|| token.to_string(), |m| m.name.clone())
    }

    // ── Inlined method tracking ─────────────────────────────────────────

    /// Marks a method as having been inlined at least once.
    pub fn mark_inlined(&self, token: Token) {
        self.inlined_methods.insert(token);
    }

    /// Checks if a method was inlined at least once.
    #[must_use]
    pub fn was_inlined(&self, token: Token) -> bool {
        self.inlined_methods.contains(&token)
    }

    // ── SSA function access ─────────────────────────────────────────────

    /// Executes a closure with a reference to the SSA function.
    pub fn with_ssa<R, F>(&self, token: Token, f: F) -> Option<R>
    where
        F: FnOnce(&SsaFunction) -> R,
    {
        self.ssa_functions.get(&token).map(|r| f(&r))
    }

    /// Executes a closure with a mutable reference to the SSA function.
    pub fn with_ssa_mut<R, F>(&self, token: Token, f: F) -> Option<R>
    where
        F: FnOnce(&mut SsaFunction) -> R,
    {
        self.ssa_functions.get_mut(&token).map(|mut r| f(&mut r))
    }

    /// Checks if an SSA function exists for a method.
    #[must_use]
    pub fn has_ssa(&self, token: Token) -> bool {
        self.ssa_functions.contains_key(&token)
    }

    /// Stores an SSA function for a method.
    pub fn set_ssa(&self, token: Token, ssa: SsaFunction) {
        self.ssa_functions.insert(token, ssa);
    }

    /// Removes and returns the SSA function for a method.
    pub fn take_ssa(&self, token: Token) -> Option<SsaFunction> {
        self.ssa_functions.remove(&token).map(|(_, v)| v)
    }

    /// Returns all method tokens that have SSA functions, in token order.
    #[must_use]
    pub fn all_methods(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.ssa_functions.iter().map(|r| *r.key()).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Returns the count of methods with SSA representations.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.ssa_functions.len()
    }

    // ── Monitor records ─────────────────────────────────────────────────

    /// Stores the monitor pairs found by load/store elimination.
    pub fn set_monitor_records(&self, token: Token, records: Vec<MonitorPairRecord>) {
        self.monitor_records.insert(token, records);
    }

    /// Returns the monitor pairs found by the last load/store elimination run
    /// that saw any monitor operation.
    #[must_use]
    pub fn monitor_records(&self, token: Token) -> Vec<MonitorPairRecord> {
        self.monitor_records
            .get(&token)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    /// Records the IR of a method before a pass, keeping the first snapshot.
    pub fn snapshot_before(&self, token: Token, pass: &str, ssa: &SsaFunction) {
        self.snapshots
            .entry((token, format!("{pass} (before)")))
            .or_insert_with(|| ssa.clone());
    }

    /// Records the IR of a method after a pass, keeping the first snapshot.
    pub fn snapshot_after(&self, token: Token, pass: &str, ssa: &SsaFunction) {
        self.snapshots
            .entry((token, format!("{pass} (after)")))
            .or_insert_with(|| ssa.clone());
    }

    /// Executes a closure with the snapshot of `token` at `phase`.
    pub fn with_snapshot<R, F>(&self, token: Token, phase: &str, f: F) -> Option<R>
    where
        F: FnOnce(&SsaFunction) -> R,
    {
        self.snapshots
            .get(&(token, phase.to_string()))
            .map(|r| f(&r))
    }

    /// Returns the phase names recorded for `token`, sorted.
    #[must_use]
    pub fn snapshot_phases(&self, token: Token) -> Vec<String> {
        let mut phases: Vec<String> = self
            .snapshots
            .iter()
            .filter(|r| r.key().0 == token)
            .map(|r| r.key().1.clone())
            .collect();
        phases.sort();
        phases
    }
}
