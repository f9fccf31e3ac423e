// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Message router: the hub every other module sends through. Resolves a
//! next hop, consults access control, and hands the envelope to the
//! matching [`crate::stub::MessagingStub`] or schedules a retry.

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot;

use codec::{Envelope, MessageType};

use crate::address::Address;
use crate::commands::{
    AccessControlCmd, RouterCmd, ScheduledAction, SchedulerCmd,
};
use crate::metrics::MetricsEvent;
use crate::multicast::MulticastDirectory;
use crate::queue::MessageQueue;
use crate::routing::{RoutingEntry, RoutingTable};
use crate::stub::StubFactoryRegistry;
use crate::types::now_ms;

/// Envelopes are retried this many times before being dropped for good.
const MAX_RETRY_ATTEMPTS: u32 = 3;

pub struct Router {
    receiver: Receiver<RouterCmd>,
    scheduler_sender: Sender<SchedulerCmd>,
    access_control_sender: Sender<AccessControlCmd>,
    metrics_sender: Sender<MetricsEvent>,

    routing_table: RoutingTable,
    stubs: StubFactoryRegistry,
    queue: MessageQueue,
    multicast_directory: MulticastDirectory,

    external_transport_suspended: bool,
}

impl Router {
    #[must_use]
    pub fn new(
        receiver: Receiver<RouterCmd>,
        scheduler_sender: Sender<SchedulerCmd>,
        access_control_sender: Sender<AccessControlCmd>,
        metrics_sender: Sender<MetricsEvent>,
        stubs: StubFactoryRegistry,
        max_queued_total: usize,
        max_queued_per_participant: usize,
    ) -> Self {
        Self {
            receiver,
            scheduler_sender,
            access_control_sender,
            metrics_sender,
            routing_table: RoutingTable::new(),
            stubs,
            queue: MessageQueue::new(max_queued_total, max_queued_per_participant),
            multicast_directory: MulticastDirectory::new(),
            external_transport_suspended: false,
        }
    }

    /// Seed a sticky routing entry before the run loop starts, e.g. from a
    /// persisted snapshot or a preloaded discovery entries file.
    pub fn seed_entry(&self, participant_id: crate::types::ParticipantId, entry: RoutingEntry) {
        self.routing_table.add(participant_id, entry);
    }

    pub async fn run_loop(&mut self) -> ! {
        loop {
            if let Some(cmd) = self.receiver.recv().await {
                self.handle_cmd(cmd).await;
            }
        }
    }

    async fn handle_cmd(&mut self, cmd: RouterCmd) {
        match cmd {
            RouterCmd::Route(envelope) => self.route(envelope, 0).await,
            RouterCmd::AddNextHop {
                participant_id,
                address,
                is_sticky,
                reply,
            } => {
                let is_globally_visible = address.is_globally_visible_by_default();
                let is_new = !self.routing_table.contains(&participant_id);
                self.routing_table.add(
                    participant_id.clone(),
                    RoutingEntry {
                        address,
                        is_sticky,
                        is_globally_visible,
                        expiry_date_ms: None,
                    },
                );
                log::info!("addNextHop participant={participant_id}");
                if is_new {
                    let _ = self
                        .metrics_sender
                        .send(MetricsEvent::RoutingEntriesChanged(1))
                        .await;
                }
                let _ = reply.send(Ok(()));
                self.flush_queued(&participant_id).await;
            }
            RouterCmd::RemoveNextHop {
                participant_id,
                reply,
            } => {
                if self.routing_table.contains(&participant_id) {
                    self.routing_table.remove(&participant_id);
                    log::info!("removeNextHop participant={participant_id}");
                    let _ = self
                        .metrics_sender
                        .send(MetricsEvent::RoutingEntriesChanged(-1))
                        .await;
                }
                let _ = reply.send(Ok(()));
            }
            RouterCmd::ResolveNextHop {
                participant_id,
                reply,
            } => {
                let _ = reply.send(self.routing_table.resolve(&participant_id));
            }
            RouterCmd::AddMulticastReceiver {
                multicast_id,
                subscriber_participant_id,
                provider_participant_id,
                reply,
            } => {
                let result = self.multicast_directory.add(
                    &provider_participant_id,
                    subscriber_participant_id,
                    &multicast_id,
                );
                let _ = reply.send(result);
            }
            RouterCmd::RemoveMulticastReceiver {
                multicast_id,
                subscriber_participant_id,
                provider_participant_id,
                reply,
            } => {
                self.multicast_directory.remove(
                    &provider_participant_id,
                    &subscriber_participant_id,
                    &multicast_id,
                );
                let _ = reply.send(Ok(()));
            }
            RouterCmd::SuspendExternalTransport => {
                self.external_transport_suspended = true;
                log::info!("External transport suspended");
            }
            RouterCmd::ResumeExternalTransport => {
                self.external_transport_suspended = false;
                log::info!("External transport resumed");
            }
            RouterCmd::EvictStale => {
                let evicted = self.routing_table.evict_stale();
                if evicted > 0 {
                    log::debug!("Evicted {evicted} stale routing entries");
                    let _ = self
                        .metrics_sender
                        .send(MetricsEvent::RoutingEntriesChanged(-(evicted as i64)))
                        .await;
                }

                for envelope in self.queue.evict_expired() {
                    log::warn!("Queued envelope {} timed out waiting for a next hop", envelope.id());
                    let _ = self
                        .metrics_sender
                        .send(MetricsEvent::EnvelopeDroppedExpired)
                        .await;
                }
            }
            RouterCmd::SnapshotRoutes { reply } => {
                let _ = reply.send(self.routing_table.snapshot());
            }
        }
    }

    async fn route(&mut self, envelope: Envelope, attempt: u32) {
        if envelope.is_expired(now_ms()) {
            log::warn!("Dropping expired envelope {}", envelope.id());
            let _ = self
                .metrics_sender
                .send(MetricsEvent::EnvelopeDroppedExpired)
                .await;
            return;
        }

        if envelope.message_type() == MessageType::Multicast {
            self.route_multicast(envelope).await;
            return;
        }

        if !self.check_permission(&envelope).await {
            log::warn!(
                "Access control denied envelope {} to {}",
                envelope.id(),
                envelope.recipient()
            );
            let _ = self
                .metrics_sender
                .send(MetricsEvent::AccessControlDenial)
                .await;
            return;
        }

        let Some(address) = self.routing_table.resolve(envelope.recipient()) else {
            if let Err(err) = self
                .queue
                .enqueue(envelope.recipient().to_string(), envelope)
            {
                log::warn!("Dropping unroutable envelope: {err:?}");
                let _ = self
                    .metrics_sender
                    .send(MetricsEvent::EnvelopeDroppedUnroutable)
                    .await;
            }
            return;
        };

        if self.external_transport_suspended && address.is_globally_visible_by_default() {
            if let Err(err) = self
                .queue
                .enqueue(envelope.recipient().to_string(), envelope)
            {
                log::warn!("Dropping envelope while external transport suspended: {err:?}");
            }
            return;
        }

        self.transmit(envelope, &address, attempt).await;
    }

    async fn route_multicast(&mut self, envelope: Envelope) {
        let Some(provider_participant_id) =
            crate::types::extract_participant_id_from_multicast_id(envelope.recipient())
        else {
            log::warn!("Malformed multicast id: {}", envelope.recipient());
            return;
        };
        let subscribers = self
            .multicast_directory
            .matching_subscribers(provider_participant_id, envelope.recipient());
        for subscriber in subscribers {
            let Some(address) = self.routing_table.resolve(&subscriber) else {
                continue;
            };
            let fanned_out = envelope.clone().with_recipient(subscriber);
            self.transmit(fanned_out, &address, 0).await;
        }
    }

    async fn transmit(&mut self, envelope: Envelope, address: &Address, attempt: u32) {
        let Some(stub) = self.stubs.get(address) else {
            log::warn!("No stub registered for resolved address {address:?}");
            return;
        };

        match stub.transmit(envelope.clone()).await {
            Ok(()) => {
                let _ = self.metrics_sender.send(MetricsEvent::EnvelopeRouted).await;
            }
            Err(err) if matches!(err.kind(), crate::error::ErrorKind::DelayWithRetry(_)) => {
                let delay_ms = match err.kind() {
                    crate::error::ErrorKind::DelayWithRetry(delay_ms) => *delay_ms,
                    _ => unreachable!(),
                };
                if attempt >= MAX_RETRY_ATTEMPTS {
                    log::warn!(
                        "Giving up on envelope {} after {attempt} attempts",
                        envelope.id()
                    );
                    let _ = self
                        .metrics_sender
                        .send(MetricsEvent::EnvelopeDroppedUnroutable)
                        .await;
                    return;
                }
                let _ = self.metrics_sender.send(MetricsEvent::EnvelopeRetried).await;
                let (reply, _) = oneshot::channel();
                let cmd = SchedulerCmd::Schedule {
                    action: ScheduledAction::RetryRoute(envelope),
                    delay_ms,
                    reply,
                };
                if let Err(send_err) = self.scheduler_sender.send(cmd).await {
                    log::warn!("Failed to schedule retry: {send_err}");
                }
            }
            Err(err) => {
                log::warn!("Permanent delivery failure for {}: {err}", envelope.id());
            }
        }
    }

    async fn check_permission(&self, envelope: &Envelope) -> bool {
        let (reply, receive) = oneshot::channel();
        let cmd = AccessControlCmd::CheckPermission {
            sender: envelope.sender().to_string(),
            participant_id: envelope.recipient().to_string(),
            operation: envelope.message_type().as_str().to_string(),
            reply,
        };
        if self.access_control_sender.send(cmd).await.is_err() {
            return true;
        }
        receive.await.unwrap_or(true)
    }

    async fn flush_queued(&mut self, participant_id: &str) {
        let queued = self.queue.drain(participant_id);
        for envelope in queued {
            self.route(envelope, 0).await;
        }
    }
}
