//! Per-deal update history
//!
//! An audit trail of every committed change: what the caller asked for and
//! what the rollup derived from it. Bypass is always recorded as such, so a
//! bypassed criterion can be told apart from a completed one after the fact.

use crate::graph::{ActorId, EvidenceId, NodeId, SignOff, Status};
use crate::rollup::Transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// Structural authoring call (create, remove, link)
    Edited { operation: String, entity: NodeId },
    /// Status explicitly set by a caller
    Marked { entity: NodeId, status: Status },
    SignOff { actor: ActorId, decision: SignOff },
    Evidence { entity: NodeId, evidence: EvidenceId },
    ClosedLost { reason: String },
    /// Change of derived state computed by the rollup
    Derived(Transition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: HistoryEvent,
}

/// Bounded history; the oldest entries are dropped first
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        History {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_entries(entries: Vec<HistoryEntry>, max_entries: usize) -> Self {
        let mut history = History::new(max_entries);
        for entry in entries {
            history.push_entry(entry);
        }
        history
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.max_entries {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record events committed together under one timestamp
    pub fn record(&mut self, events: impl IntoIterator<Item = HistoryEvent>) {
        let at = Utc::now();
        for event in events {
            self.push_entry(HistoryEntry { at, event });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Entries that concern `entity`
    pub fn for_entity<'a>(&'a self, entity: &'a NodeId) -> impl Iterator<Item = &'a HistoryEntry> {
        self.entries.iter().filter(move |entry| match &entry.event {
            HistoryEvent::Edited { entity: e, .. }
            | HistoryEvent::Marked { entity: e, .. }
            | HistoryEvent::Evidence { entity: e, .. } => e == entity,
            HistoryEvent::SignOff { actor, .. } => &actor.node() == entity,
            HistoryEvent::Derived(Transition::Status { entity: e, .. }) => e == entity,
            HistoryEvent::Derived(Transition::ActorCompletion { actor, .. }) => {
                &actor.node() == entity
            }
            HistoryEvent::Derived(Transition::Outcome { .. }) | HistoryEvent::ClosedLost { .. } => {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CriterionId;

    #[test]
    fn test_bound_drops_oldest() {
        let mut history = History::new(2);
        for status in [Status::InProgress, Status::Completed, Status::Bypassed] {
            history.record([HistoryEvent::Marked {
                entity: CriterionId::new("c1").node(),
                status,
            }]);
        }
        assert_eq!(history.len(), 2);
        let statuses: Vec<_> = history
            .iter()
            .map(|e| match &e.event {
                HistoryEvent::Marked { status, .. } => *status,
                _ => Status::NotStarted,
            })
            .collect();
        assert_eq!(statuses, vec![Status::Completed, Status::Bypassed]);
    }

    #[test]
    fn test_entry_serializes_flat() {
        let mut history = History::new(10);
        history.record([HistoryEvent::Marked {
            entity: CriterionId::new("c1").node(),
            status: Status::Bypassed,
        }]);
        let json = serde_json::to_value(history.to_vec()).unwrap();
        assert_eq!(json[0]["event"], "marked");
        assert_eq!(json[0]["status"], "Bypassed");

        let back: Vec<HistoryEntry> = serde_json::from_value(json).unwrap();
        assert_eq!(back, history.to_vec());
    }

    #[test]
    fn test_for_entity() {
        let mut history = History::new(10);
        let c1 = CriterionId::new("c1").node();
        history.record([
            HistoryEvent::Marked { entity: c1.clone(), status: Status::Completed },
            HistoryEvent::ClosedLost { reason: "budget cut".to_string() },
        ]);
        assert_eq!(history.for_entity(&c1).count(), 1);
    }
}
