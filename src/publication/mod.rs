// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Publication manager: the provider-side counterpart of
//! [`crate::subscription::SubscriptionManager`]. Tracks which proxies
//! subscribed to which attribute, applies minInterval coalescing and
//! periodic keep-alive republishing, and turns a provider's published
//! value into a routed publication envelope.

pub mod filters;

use std::collections::HashMap;

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot;

use codec::{EnvelopeBuilder, MessageType};

use filters::FilterParameters;

use crate::commands::{PublicationManagerCmd, RouterCmd, ScheduledAction, SchedulerCmd};
use crate::types::{now_ms, ParticipantId, SubscriptionId};

struct ProviderSubscription {
    proxy_participant_id: ParticipantId,
    provider_participant_id: ParticipantId,
    attribute_name: String,
    min_interval_ms: u64,
    periodic_interval_ms: Option<u64>,
    filter_parameters: Option<FilterParameters>,
    last_publication_ms: Option<u64>,
    /// The latest value delivered, kept around so a periodic tick can
    /// republish it when no on-change publication preempted the tick.
    last_value: Option<Vec<u8>>,
    /// A value that changed inside the `minIntervalMs` window, waiting
    /// for a `FlushDeferredPublication` to deliver it.
    pending_payload: Option<Vec<u8>>,
    flush_runnable_id: Option<u64>,
    periodic_runnable_id: Option<u64>,
}

pub struct PublicationManager {
    receiver: Receiver<PublicationManagerCmd>,
    router_sender: Sender<RouterCmd>,
    scheduler_sender: Sender<SchedulerCmd>,
    subscriptions: HashMap<SubscriptionId, ProviderSubscription>,
    default_ttl_ms: u64,
}

impl PublicationManager {
    #[must_use]
    pub fn new(
        receiver: Receiver<PublicationManagerCmd>,
        router_sender: Sender<RouterCmd>,
        scheduler_sender: Sender<SchedulerCmd>,
        default_ttl_ms: u64,
    ) -> Self {
        Self {
            receiver,
            router_sender,
            scheduler_sender,
            subscriptions: HashMap::new(),
            default_ttl_ms,
        }
    }

    pub async fn run_loop(&mut self) -> ! {
        loop {
            if let Some(cmd) = self.receiver.recv().await {
                self.handle_cmd(cmd).await;
            }
        }
    }

    async fn handle_cmd(&mut self, cmd: PublicationManagerCmd) {
        match cmd {
            PublicationManagerCmd::Publish {
                provider_participant_id,
                attribute_name,
                payload,
                broadcast_parameters,
            } => {
                self.publish(&provider_participant_id, &attribute_name, payload, broadcast_parameters.as_ref())
                    .await;
            }
            PublicationManagerCmd::RegisterSubscriptionRequest {
                subscription_id,
                provider_participant_id,
                proxy_participant_id,
                attribute_name,
                min_interval_ms,
                periodic_interval_ms,
                filter_parameters,
            } => {
                self.unregister(&subscription_id).await;
                let periodic_runnable_id = if let Some(interval) = periodic_interval_ms {
                    Some(
                        self.arm_timer(
                            ScheduledAction::PeriodicPublish {
                                subscription_id: subscription_id.clone(),
                            },
                            interval,
                        )
                        .await,
                    )
                } else {
                    None
                };

                self.subscriptions.insert(
                    subscription_id,
                    ProviderSubscription {
                        proxy_participant_id,
                        provider_participant_id,
                        attribute_name,
                        min_interval_ms: min_interval_ms.unwrap_or(0),
                        periodic_interval_ms,
                        filter_parameters,
                        last_publication_ms: None,
                        last_value: None,
                        pending_payload: None,
                        flush_runnable_id: None,
                        periodic_runnable_id,
                    },
                );
            }
            PublicationManagerCmd::StopSubscription { subscription_id } => {
                self.unregister(&subscription_id).await;
            }
            PublicationManagerCmd::FlushDeferredPublication { subscription_id } => {
                self.flush_deferred(&subscription_id).await;
            }
            PublicationManagerCmd::PeriodicPublish { subscription_id } => {
                self.periodic_publish(&subscription_id).await;
            }
        }
    }

    async fn unregister(&mut self, subscription_id: &str) {
        if let Some(sub) = self.subscriptions.remove(subscription_id) {
            for runnable_id in [sub.flush_runnable_id, sub.periodic_runnable_id].into_iter().flatten() {
                let _ = self.scheduler_sender.send(SchedulerCmd::Cancel { runnable_id }).await;
            }
        }
    }

    async fn publish(
        &mut self,
        provider_participant_id: &str,
        attribute_name: &str,
        payload: Vec<u8>,
        broadcast_parameters: Option<&FilterParameters>,
    ) {
        let matching: Vec<SubscriptionId> = self
            .subscriptions
            .iter()
            .filter(|(_, sub)| {
                sub.provider_participant_id == provider_participant_id
                    && sub.attribute_name == attribute_name
            })
            .map(|(id, _)| id.clone())
            .collect();

        for subscription_id in matching {
            let Some(sub) = self.subscriptions.get(&subscription_id) else {
                continue;
            };

            if let Some(filter_parameters) = &sub.filter_parameters {
                let broadcast_parameters = broadcast_parameters.cloned().unwrap_or_default();
                if !filters::matches(&broadcast_parameters, filter_parameters) {
                    continue;
                }
            }

            let now = now_ms();
            let elapsed_since_last = sub.last_publication_ms.map(|last| now.saturating_sub(last));
            let min_interval_ms = sub.min_interval_ms;
            let flush_already_scheduled = sub.flush_runnable_id.is_some();

            if elapsed_since_last.is_none_or(|elapsed| elapsed >= min_interval_ms) {
                self.deliver_on_change(&subscription_id, payload.clone()).await;
            } else {
                let remaining = min_interval_ms - elapsed_since_last.unwrap_or(0);
                if let Some(sub) = self.subscriptions.get_mut(&subscription_id) {
                    sub.pending_payload = Some(payload.clone());
                }
                if !flush_already_scheduled {
                    let runnable_id = self
                        .arm_timer(
                            ScheduledAction::FlushDeferredPublication {
                                subscription_id: subscription_id.clone(),
                            },
                            remaining,
                        )
                        .await;
                    if let Some(sub) = self.subscriptions.get_mut(&subscription_id) {
                        sub.flush_runnable_id = Some(runnable_id);
                    }
                }
            }
        }
    }

    async fn flush_deferred(&mut self, subscription_id: &str) {
        let Some(sub) = self.subscriptions.get_mut(subscription_id) else {
            return;
        };
        sub.flush_runnable_id = None;
        let Some(payload) = sub.pending_payload.take() else {
            return;
        };
        self.deliver_on_change(subscription_id, payload).await;
    }

    /// No on-change publication preempted the periodic tick: republish the
    /// last known value, if any, and rearm the next tick.
    async fn periodic_publish(&mut self, subscription_id: &str) {
        let Some(sub) = self.subscriptions.get(subscription_id) else {
            return;
        };
        let Some(periodic_interval_ms) = sub.periodic_interval_ms else {
            return;
        };
        if let Some(payload) = sub.last_value.clone() {
            self.deliver(subscription_id, payload).await;
            if let Some(sub) = self.subscriptions.get_mut(subscription_id) {
                sub.last_publication_ms = Some(now_ms());
            }
        }
        let runnable_id = self
            .arm_timer(
                ScheduledAction::PeriodicPublish {
                    subscription_id: subscription_id.to_string(),
                },
                periodic_interval_ms,
            )
            .await;
        if let Some(sub) = self.subscriptions.get_mut(subscription_id) {
            sub.periodic_runnable_id = Some(runnable_id);
        }
    }

    /// An on-change publication was actually delivered (immediately or
    /// after coalescing): record it and reset the periodic keep-alive
    /// timer so a redundant republish doesn't follow right behind it.
    async fn deliver_on_change(&mut self, subscription_id: &str, payload: Vec<u8>) {
        self.deliver(subscription_id, payload.clone()).await;

        let (periodic_interval_ms, old_runnable_id) = match self.subscriptions.get_mut(subscription_id) {
            Some(sub) => {
                sub.last_publication_ms = Some(now_ms());
                sub.last_value = Some(payload);
                (sub.periodic_interval_ms, sub.periodic_runnable_id.take())
            }
            None => return,
        };

        if let Some(periodic_interval_ms) = periodic_interval_ms {
            if let Some(old_runnable_id) = old_runnable_id {
                let _ = self.scheduler_sender.send(SchedulerCmd::Cancel { runnable_id: old_runnable_id }).await;
            }
            let runnable_id = self
                .arm_timer(
                    ScheduledAction::PeriodicPublish {
                        subscription_id: subscription_id.to_string(),
                    },
                    periodic_interval_ms,
                )
                .await;
            if let Some(sub) = self.subscriptions.get_mut(subscription_id) {
                sub.periodic_runnable_id = Some(runnable_id);
            }
        }
    }

    async fn arm_timer(&self, action: ScheduledAction, delay_ms: u64) -> u64 {
        let (reply, receive) = oneshot::channel();
        let cmd = SchedulerCmd::Schedule { action, delay_ms, reply };
        if let Err(err) = self.scheduler_sender.send(cmd).await {
            log::warn!("Failed to arm publication timer: {err}");
            return 0;
        }
        receive.await.unwrap_or(0)
    }

    async fn deliver(&self, subscription_id: &str, payload: Vec<u8>) {
        let Some(sub) = self.subscriptions.get(subscription_id) else {
            return;
        };
        let envelope = EnvelopeBuilder::new(MessageType::Publication)
            .sender(sub.provider_participant_id.clone())
            .recipient(sub.proxy_participant_id.clone())
            .ttl_ms(now_ms() + self.default_ttl_ms)
            .custom_header("subscriptionId", subscription_id)
            .and_then(|builder| builder.payload(payload).build());

        match envelope {
            Ok(envelope) => {
                if let Err(err) = self.router_sender.send(RouterCmd::Route(envelope)).await {
                    log::warn!("Failed to route publication: {err}");
                }
            }
            Err(err) => log::warn!("Failed to build publication envelope: {err:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_manager() -> (Sender<PublicationManagerCmd>, Receiver<RouterCmd>) {
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::channel(32);
        let (router_tx, router_rx) = tokio::sync::mpsc::channel(32);
        let (scheduler_tx, mut scheduler_rx) = tokio::sync::mpsc::channel(32);
        let loopback_sender = cmd_tx.clone();

        let mut manager = PublicationManager::new(cmd_rx, router_tx, scheduler_tx, 60_000);
        tokio::spawn(async move { manager.run_loop().await });

        // Stand in for the real delayed scheduler: forward each scheduled
        // action back to the manager once its delay elapses.
        tokio::spawn(async move {
            while let Some(cmd) = scheduler_rx.recv().await {
                match cmd {
                    SchedulerCmd::Schedule { action, delay_ms, reply } => {
                        let _ = reply.send(0);
                        let pub_tx = loopback_sender.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                            let cmd = match action {
                                ScheduledAction::FlushDeferredPublication { subscription_id } => {
                                    PublicationManagerCmd::FlushDeferredPublication { subscription_id }
                                }
                                ScheduledAction::PeriodicPublish { subscription_id } => {
                                    PublicationManagerCmd::PeriodicPublish { subscription_id }
                                }
                                _ => return,
                            };
                            let _ = pub_tx.send(cmd).await;
                        });
                    }
                    SchedulerCmd::Cancel { .. } => {}
                }
            }
        });

        (cmd_tx, router_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn min_interval_coalesces_rapid_changes() {
        let (cmd_tx, mut router_rx) = spawn_manager();

        cmd_tx
            .send(PublicationManagerCmd::RegisterSubscriptionRequest {
                subscription_id: "sub1".to_string(),
                provider_participant_id: "p1".to_string(),
                proxy_participant_id: "proxy1".to_string(),
                attribute_name: "attr".to_string(),
                min_interval_ms: Some(100),
                periodic_interval_ms: None,
                filter_parameters: None,
            })
            .await
            .unwrap();

        cmd_tx
            .send(PublicationManagerCmd::Publish {
                provider_participant_id: "p1".to_string(),
                attribute_name: "attr".to_string(),
                payload: vec![1],
                broadcast_parameters: None,
            })
            .await
            .unwrap();
        let RouterCmd::Route(first) = router_rx.recv().await.unwrap() else {
            panic!("expected Route");
        };
        assert_eq!(first.payload(), &[1]);

        // Two rapid changes within minInterval must coalesce into one.
        cmd_tx
            .send(PublicationManagerCmd::Publish {
                provider_participant_id: "p1".to_string(),
                attribute_name: "attr".to_string(),
                payload: vec![2],
                broadcast_parameters: None,
            })
            .await
            .unwrap();
        cmd_tx
            .send(PublicationManagerCmd::Publish {
                provider_participant_id: "p1".to_string(),
                attribute_name: "attr".to_string(),
                payload: vec![3],
                broadcast_parameters: None,
            })
            .await
            .unwrap();

        let RouterCmd::Route(coalesced) = router_rx.recv().await.unwrap() else {
            panic!("expected Route");
        };
        assert_eq!(coalesced.payload(), &[3]);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), router_rx.recv())
                .await
                .is_err(),
            "no further publication should be pending"
        );
    }

    #[tokio::test]
    async fn broadcast_filter_drops_non_matching_publication() {
        let (cmd_tx, mut router_rx) = spawn_manager();

        let mut filter = FilterParameters::new();
        filter.insert("city".to_string(), "Munich".to_string());

        cmd_tx
            .send(PublicationManagerCmd::RegisterSubscriptionRequest {
                subscription_id: "sub1".to_string(),
                provider_participant_id: "p1".to_string(),
                proxy_participant_id: "proxy1".to_string(),
                attribute_name: "event".to_string(),
                min_interval_ms: None,
                periodic_interval_ms: None,
                filter_parameters: Some(filter),
            })
            .await
            .unwrap();

        let mut params = FilterParameters::new();
        params.insert("city".to_string(), "Berlin".to_string());
        cmd_tx
            .send(PublicationManagerCmd::Publish {
                provider_participant_id: "p1".to_string(),
                attribute_name: "event".to_string(),
                payload: vec![9],
                broadcast_parameters: Some(params),
            })
            .await
            .unwrap();

        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), router_rx.recv())
                .await
                .is_err(),
            "a non-matching broadcast filter must drop the publication"
        );
    }
}
