// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Routing table: the participant-id -> next-hop map the router consults
//! on every send.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::address::Address;
use crate::types::{now_ms, ParticipantId};

/// One routed participant's next hop plus its eviction policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingEntry {
    pub address: Address,

    /// Sticky entries (typically local providers and the discovery
    /// provider itself) are never evicted by [`RoutingTable::evict_stale`].
    pub is_sticky: bool,

    /// Whether this participant is expected to also be reachable from
    /// other cluster-controllers, i.e. whether multicasts routed through
    /// it must be republished over the global transport.
    pub is_globally_visible: bool,

    /// Absolute expiry in epoch milliseconds; `None` never expires.
    pub expiry_date_ms: Option<u64>,
}

/// Thread-safe participant-id -> [`RoutingEntry`] map.
///
/// A single `parking_lot::RwLock` guards the whole table: lookups
/// (`resolve`) vastly outnumber mutations (`add`/`remove`) in steady
/// state, so a reader/writer lock beats sharding for this table's access
/// pattern.
#[derive(Default)]
pub struct RoutingTable {
    entries: RwLock<HashMap<ParticipantId, RoutingEntry>>,
}

impl RoutingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the next hop for `participant_id`.
    pub fn add(&self, participant_id: ParticipantId, entry: RoutingEntry) {
        self.entries.write().insert(participant_id, entry);
    }

    /// Remove a participant's next hop; a no-op if it wasn't present.
    pub fn remove(&self, participant_id: &str) {
        self.entries.write().remove(participant_id);
    }

    /// Resolve the next hop currently registered for `participant_id`.
    #[must_use]
    pub fn resolve(&self, participant_id: &str) -> Option<Address> {
        self.entries
            .read()
            .get(participant_id)
            .map(|entry| entry.address.clone())
    }

    /// Whether `participant_id` is registered at all.
    #[must_use]
    pub fn contains(&self, participant_id: &str) -> bool {
        self.entries.read().contains_key(participant_id)
    }

    /// Whether the registered next hop for `participant_id` is reachable
    /// from other cluster-controllers.
    #[must_use]
    pub fn is_globally_visible(&self, participant_id: &str) -> bool {
        self.entries
            .read()
            .get(participant_id)
            .is_some_and(|entry| entry.is_globally_visible)
    }

    /// Drop every non-sticky entry whose `expiry_date_ms` has passed.
    ///
    /// Called periodically by the server's maintenance tick; sticky
    /// entries (local providers, the discovery provider) are immune.
    pub fn evict_stale(&self) -> usize {
        let now = now_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| {
            entry.is_sticky || entry.expiry_date_ms.is_none_or(|expiry| expiry > now)
        });
        before - entries.len()
    }

    /// Snapshot every entry currently registered, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ParticipantId, RoutingEntry)> {
        self.entries
            .read()
            .iter()
            .map(|(participant_id, entry)| (participant_id.clone(), entry.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(address: Address, sticky: bool, expiry_ms: Option<u64>) -> RoutingEntry {
        RoutingEntry {
            address,
            is_sticky: sticky,
            is_globally_visible: false,
            expiry_date_ms: expiry_ms,
        }
    }

    #[test]
    fn add_resolve_remove_round_trip() {
        let table = RoutingTable::new();
        let address = Address::InProcess {
            skeleton_id: "p1".to_string(),
        };
        table.add("p1".to_string(), entry(address.clone(), false, None));
        assert_eq!(table.resolve("p1"), Some(address));
        table.remove("p1");
        assert_eq!(table.resolve("p1"), None);
    }

    #[test]
    fn sticky_entries_survive_eviction() {
        let table = RoutingTable::new();
        table.add(
            "sticky".to_string(),
            entry(
                Address::InProcess {
                    skeleton_id: "s".to_string(),
                },
                true,
                Some(0),
            ),
        );
        table.add(
            "stale".to_string(),
            entry(
                Address::InProcess {
                    skeleton_id: "t".to_string(),
                },
                false,
                Some(0),
            ),
        );
        let evicted = table.evict_stale();
        assert_eq!(evicted, 1);
        assert!(table.contains("sticky"));
        assert!(!table.contains("stale"));
    }
}
