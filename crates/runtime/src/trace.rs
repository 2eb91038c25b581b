//! In-memory record of everything that happened during a run.

use crate::call::{CallKind, CallState};
use coeffects::Violation;
use serde::Serialize;

/// Identifies one call within a trace.
pub type SiteId = u64;

/// The kind of event that occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A call site was reached.
    Call {
        site: SiteId,
        caller: String,
        callee: String,
        call: CallKind,
    },
    /// A call moved to a new state.
    State { site: SiteId, state: CallState },
    /// A call was rejected.
    Violation { site: SiteId, violation: Violation },
    /// A function body wrote output.
    Echo { text: String },
}

/// An event in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub seq: u64,
    pub depth: usize,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Trace {
    events: Vec<Event>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, depth: usize, kind: EventKind) {
        let seq = self.events.len() as u64;
        self.events.push(Event { seq, depth, kind });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Position to pass to [`Trace::since`] later.
    pub fn mark(&self) -> usize {
        self.events.len()
    }

    pub fn since(&self, mark: usize) -> &[Event] {
        &self.events[mark.min(self.events.len())..]
    }

    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        violations(&self.events)
    }

    /// Final state of `site`, if it reached one.
    pub fn final_state(&self, site: SiteId) -> Option<CallState> {
        self.events.iter().rev().find_map(|e| match &e.kind {
            EventKind::State { site: s, state } if *s == site && state.is_terminal() => Some(*state),
            _ => None,
        })
    }
}

/// Violations among `events`, in order.
pub fn violations(events: &[Event]) -> impl Iterator<Item = &Violation> {
    events.iter().filter_map(|e| match &e.kind {
        EventKind::Violation { violation, .. } => Some(violation),
        _ => None,
    })
}
