// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

/// Snapshot of router/access-control counters, as reported by
/// [`crate::metrics::Metrics`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMetrics {
    pub envelopes_routed: u64,
    pub envelopes_dropped_expired: u64,
    pub envelopes_dropped_unroutable: u64,
    pub envelopes_retried: u64,
    pub access_control_denials: u64,
    pub active_subscriptions: u64,
    pub active_routing_entries: u64,
}
