// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Metrics: a single actor every other module reports counters to,
//! logging a summary line on a fixed interval.

use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::Receiver;
use tokio::time::interval;

use crate::cache_types::SystemMetrics;

/// A counter increment reported by another module.
#[derive(Debug, Clone, Copy)]
pub enum MetricsEvent {
    EnvelopeRouted,
    EnvelopeDroppedExpired,
    EnvelopeDroppedUnroutable,
    EnvelopeRetried,
    AccessControlDenial,
    RoutingEntriesChanged(i64),
    ActiveSubscriptionsChanged(i64),
}

pub struct Metrics {
    receiver: Receiver<MetricsEvent>,
    report_interval: Duration,
    startup: SystemTime,
    system: SystemMetrics,
}

impl Metrics {
    #[must_use]
    pub fn new(receiver: Receiver<MetricsEvent>, report_interval: Duration) -> Self {
        Self {
            receiver,
            report_interval,
            startup: SystemTime::now(),
            system: SystemMetrics::default(),
        }
    }

    pub async fn run_loop(&mut self) -> ! {
        let mut report_timer = interval(self.report_interval);
        loop {
            tokio::select! {
                Some(event) = self.receiver.recv() => {
                    self.apply(event);
                }
                _ = report_timer.tick() => {
                    self.report();
                }
            }
        }
    }

    fn apply(&mut self, event: MetricsEvent) {
        match event {
            MetricsEvent::EnvelopeRouted => self.system.envelopes_routed += 1,
            MetricsEvent::EnvelopeDroppedExpired => self.system.envelopes_dropped_expired += 1,
            MetricsEvent::EnvelopeDroppedUnroutable => {
                self.system.envelopes_dropped_unroutable += 1;
            }
            MetricsEvent::EnvelopeRetried => self.system.envelopes_retried += 1,
            MetricsEvent::AccessControlDenial => self.system.access_control_denials += 1,
            MetricsEvent::RoutingEntriesChanged(delta) => {
                self.system.active_routing_entries =
                    apply_signed_delta(self.system.active_routing_entries, delta);
            }
            MetricsEvent::ActiveSubscriptionsChanged(delta) => {
                self.system.active_subscriptions =
                    apply_signed_delta(self.system.active_subscriptions, delta);
            }
        }
    }

    fn report(&self) {
        let uptime_s = SystemTime::now()
            .duration_since(self.startup)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        log::info!(
            "uptime={uptime_s}s routed={} dropped_expired={} dropped_unroutable={} retried={} \
             acl_denials={} routing_entries={} subscriptions={}",
            self.system.envelopes_routed,
            self.system.envelopes_dropped_expired,
            self.system.envelopes_dropped_unroutable,
            self.system.envelopes_retried,
            self.system.access_control_denials,
            self.system.active_routing_entries,
            self.system.active_subscriptions,
        );
    }
}

fn apply_signed_delta(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta.unsigned_abs())
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}
