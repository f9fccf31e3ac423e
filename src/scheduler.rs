// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Delayed scheduler: runs [`ScheduledAction`]s once their due time
//! elapses, capped to a fixed number of concurrent executions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::commands::{
    PublicationManagerCmd, RouterCmd, ScheduledAction, SchedulerCmd, SubscriptionManagerCmd,
};

/// Bounds how many scheduled actions may run at once, modelling the
/// fixed-size worker pool a native scheduler would hand runnables to.
const DEFAULT_MAX_CONCURRENT_RUNNABLES: usize = 6;

pub struct DelayedScheduler {
    receiver: Receiver<SchedulerCmd>,
    router_sender: Sender<RouterCmd>,
    subscription_manager_sender: Sender<SubscriptionManagerCmd>,
    publication_manager_sender: Sender<PublicationManagerCmd>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
    handles: Arc<DashMap<u64, JoinHandle<()>>>,
}

impl DelayedScheduler {
    #[must_use]
    pub fn new(
        receiver: Receiver<SchedulerCmd>,
        router_sender: Sender<RouterCmd>,
        subscription_manager_sender: Sender<SubscriptionManagerCmd>,
        publication_manager_sender: Sender<PublicationManagerCmd>,
    ) -> Self {
        Self {
            receiver,
            router_sender,
            subscription_manager_sender,
            publication_manager_sender,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_RUNNABLES)),
            next_id: AtomicU64::new(1),
            handles: Arc::new(DashMap::new()),
        }
    }

    pub async fn run_loop(&mut self) -> ! {
        loop {
            if let Some(cmd) = self.receiver.recv().await {
                self.handle_cmd(cmd);
            }
        }
    }

    fn handle_cmd(&mut self, cmd: SchedulerCmd) {
        match cmd {
            SchedulerCmd::Schedule {
                action,
                delay_ms,
                reply,
            } => {
                let runnable_id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let _ = reply.send(runnable_id);
                self.spawn_runnable(runnable_id, action, delay_ms);
            }
            SchedulerCmd::Cancel { runnable_id } => {
                if let Some((_, handle)) = self.handles.remove(&runnable_id) {
                    handle.abort();
                }
            }
        }
    }

    fn spawn_runnable(&self, runnable_id: u64, action: ScheduledAction, delay_ms: u64) {
        let permits = Arc::clone(&self.permits);
        let router_sender = self.router_sender.clone();
        let subscription_manager_sender = self.subscription_manager_sender.clone();
        let publication_manager_sender = self.publication_manager_sender.clone();
        let handles = Arc::clone(&self.handles);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let Ok(permit) = permits.acquire().await else {
                return;
            };
            match action {
                ScheduledAction::RetryRoute(envelope) => {
                    if let Err(err) = router_sender.send(RouterCmd::Route(envelope)).await {
                        log::warn!("Failed to requeue retried envelope: {err}");
                    }
                }
                ScheduledAction::PublicationMissed {
                    subscription_id,
                    expected_interval_ms,
                } => {
                    let cmd = SubscriptionManagerCmd::PublicationMissed {
                        subscription_id,
                        expected_interval_ms,
                    };
                    if let Err(err) = subscription_manager_sender.send(cmd).await {
                        log::warn!("Failed to deliver missed-publication callback: {err}");
                    }
                }
                ScheduledAction::ExpireSubscription { subscription_id } => {
                    let cmd = SubscriptionManagerCmd::SubscriptionExpired { subscription_id };
                    if let Err(err) = subscription_manager_sender.send(cmd).await {
                        log::warn!("Failed to deliver subscription-expired callback: {err}");
                    }
                }
                ScheduledAction::FlushDeferredPublication { subscription_id } => {
                    let cmd = PublicationManagerCmd::FlushDeferredPublication { subscription_id };
                    if let Err(err) = publication_manager_sender.send(cmd).await {
                        log::warn!("Failed to deliver deferred publication flush: {err}");
                    }
                }
                ScheduledAction::PeriodicPublish { subscription_id } => {
                    let cmd = PublicationManagerCmd::PeriodicPublish { subscription_id };
                    if let Err(err) = publication_manager_sender.send(cmd).await {
                        log::warn!("Failed to deliver periodic publish tick: {err}");
                    }
                }
            }
            drop(permit);
            handles.remove(&runnable_id);
        });

        self.handles.insert(runnable_id, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scheduled_action_fires_after_delay() {
        let (router_tx, mut router_rx) = tokio::sync::mpsc::channel(4);
        let (sub_tx, _sub_rx) = tokio::sync::mpsc::channel(4);
        let (pub_tx, _pub_rx) = tokio::sync::mpsc::channel(4);
        let (scheduler_tx, scheduler_rx) = tokio::sync::mpsc::channel(4);
        let mut scheduler = DelayedScheduler::new(scheduler_rx, router_tx, sub_tx, pub_tx);
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });

        let envelope = codec::EnvelopeBuilder::new(codec::MessageType::OneWay)
            .ttl_ms(crate::types::now_ms() + 1_000)
            .build()
            .unwrap();
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        scheduler_tx
            .send(SchedulerCmd::Schedule {
                action: ScheduledAction::RetryRoute(envelope.clone()),
                delay_ms: 10,
                reply: reply_tx,
            })
            .await
            .unwrap();
        reply_rx.await.unwrap();

        let RouterCmd::Route(routed) = router_rx.recv().await.unwrap() else {
            panic!("expected Route command");
        };
        assert_eq!(routed, envelope);
    }

    #[tokio::test]
    async fn cancel_prevents_execution() {
        let (router_tx, mut router_rx) = tokio::sync::mpsc::channel(4);
        let (sub_tx, _sub_rx) = tokio::sync::mpsc::channel(4);
        let (pub_tx, _pub_rx) = tokio::sync::mpsc::channel(4);
        let (scheduler_tx, scheduler_rx) = tokio::sync::mpsc::channel(4);
        let mut scheduler = DelayedScheduler::new(scheduler_rx, router_tx, sub_tx, pub_tx);
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });

        let envelope = codec::EnvelopeBuilder::new(codec::MessageType::OneWay)
            .ttl_ms(crate::types::now_ms() + 1_000)
            .build()
            .unwrap();
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        scheduler_tx
            .send(SchedulerCmd::Schedule {
                action: ScheduledAction::RetryRoute(envelope),
                delay_ms: 200,
                reply: reply_tx,
            })
            .await
            .unwrap();
        let runnable_id = reply_rx.await.unwrap();
        scheduler_tx
            .send(SchedulerCmd::Cancel { runnable_id })
            .await
            .unwrap();

        let result =
            tokio::time::timeout(Duration::from_millis(400), router_rx.recv()).await;
        assert!(result.is_err(), "cancelled runnable must not fire");
    }
}
