// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Multicast receiver directory: tracks which proxies subscribed to which
//! provider's multicasts, so the router can fan a single published
//! envelope out to every matching subscriber.

use dashmap::DashMap;

use crate::matcher::MulticastMatcher;
use crate::types::ParticipantId;

/// One subscriber registered against a provider's multicast.
struct Receiver {
    subscriber_participant_id: ParticipantId,
    matcher: MulticastMatcher,
}

/// Keyed by provider participant id so unrelated providers never
/// contend on the same shard, matching how `DashMap` partitions its
/// internal locks.
#[derive(Default)]
pub struct MulticastDirectory {
    by_provider: DashMap<ParticipantId, Vec<Receiver>>,
}

impl MulticastDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber_participant_id` against multicasts matching
    /// `multicast_id` (which may contain `+`/`*` wildcards) published by
    /// `provider_participant_id`.
    pub fn add(
        &self,
        provider_participant_id: &ParticipantId,
        subscriber_participant_id: ParticipantId,
        multicast_id: &str,
    ) -> Result<(), crate::error::Error> {
        let matcher = MulticastMatcher::compile(multicast_id)?;
        self.by_provider
            .entry(provider_participant_id.clone())
            .or_default()
            .push(Receiver {
                subscriber_participant_id,
                matcher,
            });
        Ok(())
    }

    /// Remove a previously registered receiver; a no-op if not present.
    pub fn remove(
        &self,
        provider_participant_id: &str,
        subscriber_participant_id: &str,
        multicast_id: &str,
    ) {
        if let Some(mut receivers) = self.by_provider.get_mut(provider_participant_id) {
            receivers.retain(|receiver| {
                !(receiver.subscriber_participant_id == subscriber_participant_id
                    && receiver.matcher.pattern() == multicast_id)
            });
        }
    }

    /// Every subscriber whose pattern matches `multicast_id`, published
    /// by `provider_participant_id`.
    #[must_use]
    pub fn matching_subscribers(
        &self,
        provider_participant_id: &str,
        multicast_id: &str,
    ) -> Vec<ParticipantId> {
        self.by_provider
            .get(provider_participant_id)
            .map(|receivers| {
                receivers
                    .iter()
                    .filter(|receiver| receiver.matcher.is_match(multicast_id))
                    .map(|receiver| receiver.subscriber_participant_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_out_to_every_matching_subscriber() {
        let directory = MulticastDirectory::new();
        directory
            .add(&"p1".to_string(), "sub1".to_string(), "p1/news/+")
            .unwrap();
        directory
            .add(&"p1".to_string(), "sub2".to_string(), "p1/news/sports")
            .unwrap();

        let mut subscribers = directory.matching_subscribers("p1", "p1/news/sports");
        subscribers.sort();
        assert_eq!(subscribers, vec!["sub1".to_string(), "sub2".to_string()]);
        assert!(directory
            .matching_subscribers("p1", "p1/weather")
            .is_empty());
    }

    #[test]
    fn remove_drops_only_the_matching_receiver() {
        let directory = MulticastDirectory::new();
        directory
            .add(&"p1".to_string(), "sub1".to_string(), "p1/news/+")
            .unwrap();
        directory.remove("p1", "sub1", "p1/news/+");
        assert!(directory
            .matching_subscribers("p1", "p1/news/sports")
            .is_empty());
    }
}
