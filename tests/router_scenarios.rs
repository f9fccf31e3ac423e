// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! End-to-end router scenarios, driven entirely through in-process stubs
//! and a paused virtual clock so no test sleeps on wall-clock time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cluster_controller::acl::{AccessControlGate, Mode};
use cluster_controller::address::Address;
use cluster_controller::commands::RouterCmd;
use cluster_controller::error::{Error, ErrorKind};
use cluster_controller::metrics::Metrics;
use cluster_controller::router::Router;
use cluster_controller::scheduler::DelayedScheduler;
use cluster_controller::stub::{MessagingStub, StubFactoryRegistry};
use cluster_controller::types::now_ms;

use codec::{Envelope, EnvelopeBuilder, MessageType};

/// Spins up a [`Router`] wired to a live [`DelayedScheduler`], an
/// always-allow [`AccessControlGate`], and a discarding metrics sink;
/// returns the router's command sender and its stub registry.
fn spawn_router() -> (mpsc::Sender<RouterCmd>, StubFactoryRegistry) {
    let (router_tx, router_rx) = mpsc::channel(32);
    let (scheduler_tx, scheduler_rx) = mpsc::channel(32);
    let (access_control_tx, access_control_rx) = mpsc::channel(32);
    let (metrics_tx, metrics_rx) = mpsc::channel(32);
    let (sub_tx, _sub_rx) = mpsc::channel(32);
    let (pub_tx, _pub_rx) = mpsc::channel(32);

    let stubs = StubFactoryRegistry::new();

    let mut router = Router::new(
        router_rx,
        scheduler_tx.clone(),
        access_control_tx,
        metrics_tx,
        stubs.clone(),
        1_000,
        100,
    );
    tokio::spawn(async move { router.run_loop().await });

    let mut scheduler = DelayedScheduler::new(scheduler_rx, router_tx.clone(), sub_tx, pub_tx);
    tokio::spawn(async move { scheduler.run_loop().await });

    let mut access_control = AccessControlGate::new(access_control_rx, Mode::Disabled, Default::default());
    tokio::spawn(async move { access_control.run_loop().await });

    let mut metrics = Metrics::new(metrics_rx, Duration::from_secs(3600));
    tokio::spawn(async move { metrics.run_loop().await });

    (router_tx, stubs)
}

fn request(recipient: &str, ttl_relative_ms: u64) -> Envelope {
    EnvelopeBuilder::new(MessageType::Request)
        .sender("caller")
        .recipient(recipient)
        .ttl_ms(now_ms() + ttl_relative_ms)
        .build()
        .unwrap()
}

/// Always transmits successfully, counting how many times it was called.
struct CountingStub {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MessagingStub for CountingStub {
    async fn transmit(&self, _envelope: Envelope) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails with `DelayWithRetry` a fixed number of times, then succeeds.
struct FlakyStub {
    calls: Arc<AtomicUsize>,
    failures_before_success: usize,
}

#[async_trait]
impl MessagingStub for FlakyStub {
    async fn transmit(&self, _envelope: Envelope) -> Result<(), Error> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_index < self.failures_before_success {
            Err(Error::new(ErrorKind::DelayWithRetry(500), "transient failure"))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn scenario_1_routes_to_a_provisioned_next_hop_once() {
    let (router_tx, stubs) = spawn_router();

    let calls = Arc::new(AtomicUsize::new(0));
    let address = Address::InProcess {
        skeleton_id: "p1".to_string(),
    };
    stubs.insert(address.clone(), Arc::new(CountingStub { calls: calls.clone() }));

    let (reply, receive) = tokio::sync::oneshot::channel();
    router_tx
        .send(RouterCmd::AddNextHop {
            participant_id: "p1".to_string(),
            address,
            is_sticky: true,
            reply,
        })
        .await
        .unwrap();
    receive.await.unwrap().unwrap();

    router_tx
        .send(RouterCmd::Route(request("p1", 1_000)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_2_retries_until_the_stub_recovers() {
    let (router_tx, stubs) = spawn_router();

    let calls = Arc::new(AtomicUsize::new(0));
    let address = Address::InProcess {
        skeleton_id: "p1".to_string(),
    };
    stubs.insert(
        address.clone(),
        Arc::new(FlakyStub {
            calls: calls.clone(),
            failures_before_success: 3,
        }),
    );

    let (reply, receive) = tokio::sync::oneshot::channel();
    router_tx
        .send(RouterCmd::AddNextHop {
            participant_id: "p1".to_string(),
            address,
            is_sticky: true,
            reply,
        })
        .await
        .unwrap();
    receive.await.unwrap().unwrap();

    router_tx
        .send(RouterCmd::Route(request("p1", 60_000)))
        .await
        .unwrap();

    // Each retry waits out the stub's suggested delay; give the paused
    // clock enough virtual headroom to auto-advance through all of them.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn scenario_3_unroutable_envelope_times_out_in_the_queue() {
    let (router_tx, stubs) = spawn_router();

    router_tx
        .send(RouterCmd::Route(request("nobody-home", 30)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    router_tx.send(RouterCmd::EvictStale).await.unwrap();
    // Give the router's single-threaded command loop a moment to process
    // the eviction before the next-hop arrives.
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Provisioning the recipient after the TTL passed must not resurrect
    // the envelope: it was already evicted from the queue.
    let calls = Arc::new(AtomicUsize::new(0));
    let address = Address::InProcess {
        skeleton_id: "nobody-home".to_string(),
    };
    stubs.insert(address.clone(), Arc::new(CountingStub { calls: calls.clone() }));

    let (reply, receive) = tokio::sync::oneshot::channel();
    router_tx
        .send(RouterCmd::AddNextHop {
            participant_id: "nobody-home".to_string(),
            address,
            is_sticky: true,
            reply,
        })
        .await
        .unwrap();
    receive.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "envelope timed out before a next hop appeared"
    );
}
