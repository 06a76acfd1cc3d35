//! Presence reconciliation.
//!
//! A room's member set may briefly hold two entries for one username (the same
//! user opening a second tab, or reconnecting before the old socket is reaped).
//! The reconciled view keeps exactly one entry per username: the most recently
//! added one. Everything else is reported for eviction.

use std::collections::HashMap;

use super::{entity::MemberEntry, value_object::ConnectionId};

/// Result of reconciling a room's member entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Username-unique entries, in insertion order.
    pub members: Vec<MemberEntry>,
    /// Connections that lost to a newer entry with the same username.
    pub evicted: Vec<ConnectionId>,
}

/// Group entries by username and keep the newest one per group.
///
/// "Newest" is decided by the entry's insertion sequence, not by wall-clock
/// time, so the outcome is deterministic even when two joins share a timestamp.
pub fn reconcile(entries: &[MemberEntry]) -> Reconciliation {
    let mut newest: HashMap<&str, u64> = HashMap::new();
    for entry in entries {
        let seq = newest.entry(entry.username.as_str()).or_insert(entry.seq);
        if entry.seq > *seq {
            *seq = entry.seq;
        }
    }

    let mut members = Vec::with_capacity(newest.len());
    let mut evicted = Vec::new();
    for entry in entries {
        if newest.get(entry.username.as_str()) == Some(&entry.seq) {
            members.push(entry.clone());
        } else {
            evicted.push(entry.connection_id.clone());
        }
    }

    Reconciliation { members, evicted }
}

/// Connection ids to fan out to, optionally skipping one (usually the sender).
pub fn broadcast_targets(
    members: &[MemberEntry],
    exclude: Option<&ConnectionId>,
) -> Vec<ConnectionId> {
    members
        .iter()
        .filter(|m| Some(&m.connection_id) != exclude)
        .map(|m| m.connection_id.clone())
        .collect()
}
