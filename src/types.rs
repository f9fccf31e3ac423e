// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::time::{SystemTime, UNIX_EPOCH};

pub type ParticipantId = String;
pub type SubscriptionId = String;
pub type MulticastName = String;

/// Current wall-clock time, in milliseconds since epoch.
///
/// Every absolute-TTL comparison in the messaging core goes through this so
/// there's a single place to swap in a virtual clock for tests.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Hierarchical multicast identifier: `providerId/name[/partition]*`.
#[must_use]
pub fn create_multicast_id(provider_id: &str, name: &str, partitions: &[String]) -> String {
    let mut id = format!("{provider_id}/{name}");
    for partition in partitions {
        id.push('/');
        id.push_str(partition);
    }
    id
}

/// Recover the provider id a multicast id was created from.
#[must_use]
pub fn extract_participant_id_from_multicast_id(multicast_id: &str) -> Option<&str> {
    multicast_id.split('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multicast_id_round_trips_participant_id() {
        let id = create_multicast_id("p1", "news", &["sports".to_string()]);
        assert_eq!(id, "p1/news/sports");
        assert_eq!(extract_participant_id_from_multicast_id(&id), Some("p1"));
    }
}
