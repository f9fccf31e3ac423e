// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Subscription manager: the consumer-side bookkeeping for attribute and
//! broadcast subscriptions, including missed-publication detection.

pub mod qos;
pub mod state;

use std::collections::HashMap;

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot;

use codec::Envelope;

use crate::commands::{ScheduledAction, SchedulerCmd, SubscriptionManagerCmd};
use crate::types::SubscriptionId;

use state::SubscriptionState;

pub struct SubscriptionManager {
    receiver: Receiver<SubscriptionManagerCmd>,
    scheduler_sender: Sender<SchedulerCmd>,
    inbound_sender: Sender<Envelope>,
    subscriptions: HashMap<SubscriptionId, SubscriptionState>,
}

impl SubscriptionManager {
    #[must_use]
    pub fn new(
        receiver: Receiver<SubscriptionManagerCmd>,
        scheduler_sender: Sender<SchedulerCmd>,
        inbound_sender: Sender<Envelope>,
    ) -> Self {
        Self {
            receiver,
            scheduler_sender,
            inbound_sender,
            subscriptions: HashMap::new(),
        }
    }

    pub async fn run_loop(&mut self) -> ! {
        loop {
            if let Some(cmd) = self.receiver.recv().await {
                self.handle_cmd(cmd).await;
            }
        }
    }

    async fn handle_cmd(&mut self, cmd: SubscriptionManagerCmd) {
        match cmd {
            SubscriptionManagerCmd::HandlePublication(envelope) => {
                self.handle_publication(envelope).await;
            }
            SubscriptionManagerCmd::RegisterSubscription {
                subscription_id,
                provider_participant_id,
                proxy_participant_id,
                expected_interval_ms,
                validity_ms,
            } => {
                self.register(
                    subscription_id,
                    provider_participant_id,
                    proxy_participant_id,
                    expected_interval_ms,
                    validity_ms,
                )
                .await;
            }
            SubscriptionManagerCmd::UnregisterSubscription { subscription_id } => {
                self.unregister(&subscription_id).await;
            }
            SubscriptionManagerCmd::PublicationMissed {
                subscription_id,
                expected_interval_ms,
            } => {
                self.on_publication_missed(subscription_id, expected_interval_ms)
                    .await;
            }
            SubscriptionManagerCmd::SubscriptionExpired { subscription_id } => {
                self.unregister(&subscription_id).await;
                log::info!("Subscription {subscription_id} expired");
            }
        }
    }

    async fn register(
        &mut self,
        subscription_id: SubscriptionId,
        provider_participant_id: crate::types::ParticipantId,
        proxy_participant_id: crate::types::ParticipantId,
        expected_interval_ms: Option<u64>,
        validity_ms: Option<u64>,
    ) {
        let missed_publication_runnable_id = if let Some(interval) = expected_interval_ms {
            Some(
                self.arm_timer(
                    ScheduledAction::PublicationMissed {
                        subscription_id: subscription_id.clone(),
                        expected_interval_ms: interval,
                    },
                    interval,
                )
                .await,
            )
        } else {
            None
        };

        let expiry_runnable_id = if let Some(validity) = validity_ms {
            Some(
                self.arm_timer(
                    ScheduledAction::ExpireSubscription {
                        subscription_id: subscription_id.clone(),
                    },
                    validity,
                )
                .await,
            )
        } else {
            None
        };

        self.subscriptions.insert(
            subscription_id,
            SubscriptionState {
                provider_participant_id,
                proxy_participant_id,
                expected_interval_ms,
                missed_publication_runnable_id,
                expiry_runnable_id,
            },
        );
    }

    async fn unregister(&mut self, subscription_id: &str) {
        if let Some(state) = self.subscriptions.remove(subscription_id) {
            for runnable_id in [
                state.missed_publication_runnable_id,
                state.expiry_runnable_id,
            ]
            .into_iter()
            .flatten()
            {
                let _ = self
                    .scheduler_sender
                    .send(SchedulerCmd::Cancel { runnable_id })
                    .await;
            }
        }
    }

    async fn handle_publication(&mut self, envelope: Envelope) {
        let subscription_id = envelope
            .custom_headers()
            .get("subscriptionId")
            .cloned()
            .unwrap_or_default();

        if let Some(state) = self.subscriptions.get(&subscription_id) {
            if let (Some(old_runnable_id), Some(interval)) = (
                state.missed_publication_runnable_id,
                state.expected_interval_ms,
            ) {
                let _ = self
                    .scheduler_sender
                    .send(SchedulerCmd::Cancel {
                        runnable_id: old_runnable_id,
                    })
                    .await;
                let new_runnable_id = self
                    .arm_timer(
                        ScheduledAction::PublicationMissed {
                            subscription_id: subscription_id.clone(),
                            expected_interval_ms: interval,
                        },
                        interval,
                    )
                    .await;
                if let Some(state) = self.subscriptions.get_mut(&subscription_id) {
                    state.missed_publication_runnable_id = Some(new_runnable_id);
                }
            }
        }

        if let Err(err) = self.inbound_sender.send(envelope).await {
            log::warn!("Failed to deliver publication to subscriber: {err}");
        }
    }

    async fn on_publication_missed(&mut self, subscription_id: SubscriptionId, expected_interval_ms: u64) {
        log::warn!("Subscription {subscription_id} missed an expected publication");
        if let Some(state) = self.subscriptions.get(&subscription_id) {
            let runnable_id = self
                .arm_timer(
                    ScheduledAction::PublicationMissed {
                        subscription_id: subscription_id.clone(),
                        expected_interval_ms,
                    },
                    expected_interval_ms,
                )
                .await;
            if let Some(state) = self.subscriptions.get_mut(&subscription_id) {
                state.missed_publication_runnable_id = Some(runnable_id);
            }
            let _ = state;
        }
    }

    async fn arm_timer(&self, action: ScheduledAction, delay_ms: u64) -> u64 {
        let (reply, receive) = oneshot::channel();
        let cmd = SchedulerCmd::Schedule {
            action,
            delay_ms,
            reply,
        };
        if let Err(err) = self.scheduler_sender.send(cmd).await {
            log::warn!("Failed to arm subscription timer: {err}");
            return 0;
        }
        receive.await.unwrap_or(0)
    }
}
