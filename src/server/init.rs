// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Init server context internal modules and actors.

use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use super::{ServerContext, CHANNEL_CAPACITY};
use crate::acl::{AccessControlGate, Grant};
use crate::config::Config;
use crate::discovery::{DiscoveryClient, DISCOVERY_CLIENT_PARTICIPANT_ID};
use crate::error::Error;
use crate::metrics::Metrics;
use crate::publication::PublicationManager;
use crate::router::Router;
use crate::routing::RoutingEntry;
use crate::scheduler::DelayedScheduler;
use crate::stub::StubFactoryRegistry;
use crate::subscription::SubscriptionManager;

/// How often [`Metrics`] logs a summary line.
const METRICS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

impl ServerContext {
    pub(crate) async fn init_modules(config: Config, runtime: &Runtime) -> Result<Self, Error> {
        log::info!("ServerContext::init_modules()");

        let mut handles = Vec::new();

        let (router_sender, router_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (scheduler_sender, scheduler_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (access_control_sender, access_control_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (metrics_sender, metrics_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (subscription_sender, subscription_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (publication_sender, publication_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (discovery_sender, discovery_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        // Inbound publications the subscription manager forwards on to
        // whatever owns the proxy-side callback; this crate has no
        // transport driver of its own, so it is drained by a logging
        // sink until one is wired in.
        let (subscription_inbound_sender, mut subscription_inbound_receiver) =
            mpsc::channel(CHANNEL_CAPACITY);

        let grants = Self::load_grants(&config)?;

        let stubs = StubFactoryRegistry::new();

        let mut router = Router::new(
            router_receiver,
            scheduler_sender.clone(),
            access_control_sender.clone(),
            metrics_sender.clone(),
            stubs.clone(),
            config.general().max_queued_total(),
            config.general().max_queued_per_participant(),
        );

        Self::seed_router(&router, &config)?;

        // Register the discovery client as a routable, in-process
        // participant so replies addressed to it are delivered locally.
        let (discovery_inbound_sender, mut discovery_inbound_receiver) =
            mpsc::channel(CHANNEL_CAPACITY);
        router.seed_entry(
            DISCOVERY_CLIENT_PARTICIPANT_ID.to_string(),
            RoutingEntry {
                address: crate::address::Address::InProcess {
                    skeleton_id: DISCOVERY_CLIENT_PARTICIPANT_ID.to_string(),
                },
                is_sticky: true,
                is_globally_visible: false,
                expiry_date_ms: None,
            },
        );
        stubs.insert(
            crate::address::Address::InProcess {
                skeleton_id: DISCOVERY_CLIENT_PARTICIPANT_ID.to_string(),
            },
            std::sync::Arc::new(crate::stub::InProcessStub::new(discovery_inbound_sender)),
        );

        handles.push(runtime.spawn(async move {
            router.run_loop().await;
        }));

        let mut scheduler = DelayedScheduler::new(
            scheduler_receiver,
            router_sender.clone(),
            subscription_sender.clone(),
            publication_sender.clone(),
        );
        handles.push(runtime.spawn(async move {
            scheduler.run_loop().await;
        }));

        let mut access_control = AccessControlGate::new(
            access_control_receiver,
            config.security().access_control_mode(),
            grants,
        );
        handles.push(runtime.spawn(async move {
            access_control.run_loop().await;
        }));

        let mut metrics = Metrics::new(metrics_receiver, METRICS_REPORT_INTERVAL);
        handles.push(runtime.spawn(async move {
            metrics.run_loop().await;
        }));

        let mut subscription_manager = SubscriptionManager::new(
            subscription_receiver,
            scheduler_sender.clone(),
            subscription_inbound_sender,
        );
        handles.push(runtime.spawn(async move {
            subscription_manager.run_loop().await;
        }));
        handles.push(runtime.spawn(async move {
            while let Some(envelope) = subscription_inbound_receiver.recv().await {
                log::debug!("Publication delivered to local subscriber: {}", envelope.id());
            }
        }));

        let mut publication_manager = PublicationManager::new(
            publication_receiver,
            router_sender.clone(),
            scheduler_sender.clone(),
            config.general().publication_ttl_ms(),
        );
        handles.push(runtime.spawn(async move {
            publication_manager.run_loop().await;
        }));

        let mut discovery_client =
            DiscoveryClient::new(discovery_receiver, router_sender.clone());
        handles.push(runtime.spawn(async move {
            discovery_client.run_loop().await;
        }));
        let discovery_reply_sender = discovery_sender.clone();
        handles.push(runtime.spawn(async move {
            while let Some(envelope) = discovery_inbound_receiver.recv().await {
                // Replies are routed back here because the discovery
                // client is registered as an in-process participant.
                let _ = discovery_reply_sender
                    .send(crate::commands::DiscoveryCmd::HandleReply(envelope))
                    .await;
            }
        }));

        Ok(Self {
            config,
            router_sender,
            publication_sender,
            subscription_sender,
            discovery_sender,
            handles,
        })
    }

    fn load_grants(config: &Config) -> Result<std::collections::HashSet<Grant>, Error> {
        config
            .security()
            .grants_file()
            .map_or_else(|| Ok(std::collections::HashSet::new()), crate::acl::load_grants)
    }

    /// Seed sticky routing entries persisted from a previous run and any
    /// `-d discoveryEntries.json` provisioned entries named in config.
    fn seed_router(router: &Router, config: &Config) -> Result<(), Error> {
        #[cfg(feature = "persistence")]
        if config.storage().persistence() {
            for route in crate::persistence::load(config.storage().snapshot_path())? {
                let (participant_id, entry) = route.into_entry();
                router.seed_entry(participant_id, entry);
            }
        }

        if let Some(entries_file) = config.discovery().entries_file() {
            for entry in crate::discovery::load_entries(entries_file)? {
                router.seed_entry(
                    entry.participant_id,
                    RoutingEntry {
                        is_globally_visible: entry.address.is_globally_visible_by_default(),
                        address: entry.address,
                        is_sticky: true,
                        expiry_date_ms: None,
                    },
                );
            }
        }

        Ok(())
    }
}
