// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Message queue: holds envelopes awaiting a next hop, under both a
//! total and a per-participant capacity.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use codec::Envelope;

use crate::types::{now_ms, ParticipantId};

/// Returned when an envelope can't be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue as a whole is at [`MessageQueue::max_total`] capacity.
    QueueFull,

    /// This recipient already holds [`MessageQueue::max_per_participant`]
    /// queued envelopes.
    ParticipantQueueFull,
}

struct Inner {
    by_participant: HashMap<ParticipantId, VecDeque<Envelope>>,
    total: usize,
}

/// FIFO holding area for envelopes whose next hop isn't resolved yet.
pub struct MessageQueue {
    inner: Mutex<Inner>,
    max_total: usize,
    max_per_participant: usize,
}

impl MessageQueue {
    #[must_use]
    pub fn new(max_total: usize, max_per_participant: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_participant: HashMap::new(),
                total: 0,
            }),
            max_total,
            max_per_participant,
        }
    }

    /// Enqueue `envelope` for `recipient`, rejecting it outright if it is
    /// already expired or either capacity would be exceeded.
    pub fn enqueue(
        &self,
        recipient: ParticipantId,
        envelope: Envelope,
    ) -> Result<(), QueueError> {
        if envelope.is_expired(now_ms()) {
            return Err(QueueError::QueueFull);
        }
        let mut inner = self.inner.lock();
        if inner.total >= self.max_total {
            return Err(QueueError::QueueFull);
        }
        let participant_queue = inner.by_participant.entry(recipient).or_default();
        if participant_queue.len() >= self.max_per_participant {
            return Err(QueueError::ParticipantQueueFull);
        }
        participant_queue.push_back(envelope);
        inner.total += 1;
        Ok(())
    }

    /// Pop every non-expired envelope queued for `recipient`, dropping any
    /// expired ones encountered along the way.
    #[must_use]
    pub fn drain(&self, recipient: &str) -> Vec<Envelope> {
        let mut inner = self.inner.lock();
        let Some(participant_queue) = inner.by_participant.remove(recipient) else {
            return Vec::new();
        };
        inner.total = inner.total.saturating_sub(participant_queue.len());
        let now = now_ms();
        participant_queue
            .into_iter()
            .filter(|envelope| !envelope.is_expired(now))
            .collect()
    }

    /// Sweep every participant's queue, removing and returning envelopes
    /// whose TTL has elapsed while they sat waiting for a next hop.
    #[must_use]
    pub fn evict_expired(&self) -> Vec<Envelope> {
        let mut inner = self.inner.lock();
        let now = now_ms();
        let mut expired = Vec::new();

        inner.by_participant.retain(|_, participant_queue| {
            let (keep, drop): (VecDeque<_>, VecDeque<_>) = participant_queue
                .drain(..)
                .partition(|envelope| !envelope.is_expired(now));
            expired.extend(drop);
            *participant_queue = keep;
            !participant_queue.is_empty()
        });

        inner.total = inner.by_participant.values().map(VecDeque::len).sum();
        expired
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().total
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(relative_ttl_ms: u64) -> Envelope {
        codec::EnvelopeBuilder::new(codec::MessageType::OneWay)
            .ttl_ms(now_ms() + relative_ttl_ms)
            .build()
            .unwrap()
    }

    #[test]
    fn enqueue_and_drain_round_trip() {
        let queue = MessageQueue::new(100, 10);
        queue
            .enqueue("p1".to_string(), envelope(60_000))
            .unwrap();
        assert_eq!(queue.len(), 1);
        let drained = queue.drain("p1");
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn per_participant_quota_is_enforced() {
        let queue = MessageQueue::new(100, 1);
        queue
            .enqueue("p1".to_string(), envelope(60_000))
            .unwrap();
        let result = queue.enqueue("p1".to_string(), envelope(60_000));
        assert_eq!(result, Err(QueueError::ParticipantQueueFull));
    }

    #[test]
    fn evict_expired_sweeps_timed_out_envelopes_only() {
        let queue = MessageQueue::new(100, 10);
        queue.enqueue("p1".to_string(), envelope(20)).unwrap();
        queue.enqueue("p2".to_string(), envelope(60_000)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(40));

        let expired = queue.evict_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain("p2").len(), 1);
    }

    #[test]
    fn total_quota_is_enforced_across_participants() {
        let queue = MessageQueue::new(1, 10);
        queue
            .enqueue("p1".to_string(), envelope(60_000))
            .unwrap();
        let result = queue.enqueue("p2".to_string(), envelope(60_000));
        assert_eq!(result, Err(QueueError::QueueFull));
    }
}
