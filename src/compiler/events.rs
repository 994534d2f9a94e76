//! Event logging for the optimization pipeline.
//!
//! Every rewrite a pass performs is recorded as an [`Event`]: which method,
//! which block, and what happened. Tests and the pipeline summary read the
//! log instead of keeping separate counters.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event (elimination, fallback, warning)
//! - [`EventLog`] - Append-only collection with query helpers
//! - [`EventBuilder`] - Fluent API for creating events
//! - [`DerivedStats`] - Counters computed from a log
//!
//! # Example
//!
//! ```rust
//! use lsekit::analysis::Token;
//! use lsekit::compiler::{DerivedStats, EventKind, EventLog};
//!
//! let log = EventLog::new();
//! let method = Token::from_parts(Token::METHOD, 1);
//!
//! log.record(EventKind::LoadEliminated)
//!     .at(method, 0)
//!     .message("v4 = ldfld v0.field#2 -> v3");
//!
//! assert_eq!(log.count_kind(EventKind::LoadEliminated), 1);
//! println!("{}", DerivedStats::from_log(&log));
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use crate::analysis::Token;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A heap load was replaced by a known value.
    LoadEliminated,
    /// A heap store was removed as redundant or dead.
    StoreEliminated,
    /// A merge value was materialized as a phi node.
    PhiInserted,
    /// A monitor operation on a thread-local object was removed.
    MonitorEliminated,
    /// A load of untouched fresh storage was replaced by its default value.
    DefaultMaterialized,
    /// A call was replaced by the callee body.
    MethodInlined,
    /// An unused instruction was removed.
    InstructionRemoved,
    /// A trivial phi node was removed.
    PhiSimplified,

    /// An allocation was proven not to escape.
    SingletonIdentified,

    /// An SSA pass started.
    PassStarted,
    /// An SSA pass completed.
    PassCompleted,
    /// A pass gave up on a method and restored its previous body.
    PassFallback,

    /// Something unexpected but recoverable, e.g. the pipeline stopped
    /// before settling.
    Warning,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::LoadEliminated => "load eliminated",
            Self::StoreEliminated => "store eliminated",
            Self::PhiInserted => "phi inserted",
            Self::MonitorEliminated => "monitor eliminated",
            Self::DefaultMaterialized => "default materialized",
            Self::MethodInlined => "method inlined",
            Self::InstructionRemoved => "instruction removed",
            Self::PhiSimplified => "phi simplified",
            // Analysis
            Self::SingletonIdentified => "singleton identified",
            // Engine
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::PassFallback => "pass fallback",
            Self::Warning => "warning",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::LoadEliminated
                | Self::StoreEliminated
                | Self::PhiInserted
                | Self::MonitorEliminated
                | Self::DefaultMaterialized
                | Self::MethodInlined
                | Self::InstructionRemoved
                | Self::PhiSimplified
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method where the event occurred (if applicable).
    pub method: Option<Token>,
    /// Block index within the method.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.method, self.location) {
            (Some(method), Some(block)) => {
                write!(f, "[{}] {} B{}: {}", self.kind, method, block, self.message)
            }
            (Some(method), None) => write!(f, "[{}] {}: {}", self.kind, method, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<Token>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the method and block where the event occurred.
    pub fn at(mut self, method: Token, location: usize) -> Self {
        self.method = Some(method);
        self.location = Some(location);
        self
    }

    /// Sets only the method (for method-level events).
    pub fn method(mut self, method: Token) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only, thread-safe collection of pipeline events.
///
/// Events can be appended concurrently through shared references (`&self`),
/// which is how parallel per-method pass runs report into one log.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records a warning that belongs to no particular method.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in self.iter() {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of unique methods with transformation events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.method)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Statistics derived from an [`EventLog`].
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Number of methods that had any transformations.
    pub methods_transformed: usize,
    /// Number of heap loads eliminated.
    pub loads_eliminated: usize,
    /// Number of heap stores eliminated.
    pub stores_eliminated: usize,
    /// Number of merge phis materialized.
    pub phis_inserted: usize,
    /// Number of monitor operations eliminated.
    pub monitors_eliminated: usize,
    /// Number of calls inlined.
    pub methods_inlined: usize,
    /// Number of unused instructions removed.
    pub instructions_removed: usize,
    /// Number of methods restored after a pass failure.
    pub fallbacks: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of pipeline iterations.
    pub iterations: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            methods_transformed: log.methods_affected(),
            loads_eliminated: get(EventKind::LoadEliminated) + get(EventKind::DefaultMaterialized),
            stores_eliminated: get(EventKind::StoreEliminated),
            phis_inserted: get(EventKind::PhiInserted),
            monitors_eliminated: get(EventKind::MonitorEliminated),
            methods_inlined: get(EventKind::MethodInlined),
            instructions_removed: get(EventKind::InstructionRemoved),
            fallbacks: get(EventKind::PassFallback),
            warnings: get(EventKind::Warning),
            iterations: 0,
            total_time: Duration::ZERO,
        }
    }

    /// Sets the total processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Sets the number of iterations.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let counters = [
            (self.methods_transformed, "methods"),
            (self.loads_eliminated, "loads eliminated"),
            (self.stores_eliminated, "stores eliminated"),
            (self.phis_inserted, "phis inserted"),
            (self.monitors_eliminated, "monitor operations eliminated"),
            (self.methods_inlined, "inlined"),
            (self.instructions_removed, "instructions removed"),
            (self.fallbacks, "fallbacks"),
            (self.warnings, "warnings"),
        ];
        let parts: Vec<String> = counters
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();

        let stats = if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        };

        if self.total_time.as_millis() > 0 {
            format!(
                "{} in {:?} ({} iterations)",
                stats, self.total_time, self.iterations
            )
        } else {
            stats
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
