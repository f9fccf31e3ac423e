// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Command enums exchanged between the actor-style modules that make up
//! the cluster-controller: each module owns a `Receiver` of its own
//! command type and a `Sender` clone for every peer it talks to.

use tokio::sync::oneshot;

use codec::Envelope;

use crate::address::Address;
use crate::error::Error;
use crate::routing::RoutingEntry;
use crate::types::{MulticastName, ParticipantId, SubscriptionId};

/// Commands accepted by the message router.
#[derive(Debug)]
pub enum RouterCmd {
    /// Route one envelope towards its recipient, queuing or scheduling a
    /// retry as needed.
    Route(Envelope),

    /// Register (or replace) the next hop for a participant.
    AddNextHop {
        participant_id: ParticipantId,
        address: Address,
        is_sticky: bool,
        reply: oneshot::Sender<Result<(), Error>>,
    },

    /// Drop a previously registered next hop.
    RemoveNextHop {
        participant_id: ParticipantId,
        reply: oneshot::Sender<Result<(), Error>>,
    },

    /// Look up the next hop currently registered for a participant.
    ResolveNextHop {
        participant_id: ParticipantId,
        reply: oneshot::Sender<Option<Address>>,
    },

    /// Add a multicast receiver so matching publications get fanned out
    /// to it.
    AddMulticastReceiver {
        multicast_id: MulticastName,
        subscriber_participant_id: ParticipantId,
        provider_participant_id: ParticipantId,
        reply: oneshot::Sender<Result<(), Error>>,
    },

    /// Remove a previously added multicast receiver.
    RemoveMulticastReceiver {
        multicast_id: MulticastName,
        subscriber_participant_id: ParticipantId,
        provider_participant_id: ParticipantId,
        reply: oneshot::Sender<Result<(), Error>>,
    },

    /// Stop accepting externally-addressed envelopes for delivery while
    /// still routing local traffic; driven by SIGUSR2.
    SuspendExternalTransport,

    /// Resume externally-addressed delivery; driven by SIGUSR1.
    ResumeExternalTransport,

    /// Drop every non-sticky routing entry past its expiry; driven by the
    /// periodic maintenance tick.
    EvictStale,

    /// Dump every routing entry, for persistence snapshotting.
    SnapshotRoutes {
        reply: oneshot::Sender<Vec<(ParticipantId, RoutingEntry)>>,
    },
}

/// An action the delayed scheduler carries out once its due time elapses.
#[derive(Debug, Clone)]
pub enum ScheduledAction {
    /// Hand the envelope back to the router for another delivery attempt.
    RetryRoute(Envelope),

    /// Tell the subscription manager a publication interval was missed.
    PublicationMissed {
        subscription_id: SubscriptionId,
        expected_interval_ms: u64,
    },

    /// Expire a subscription whose QoS validity elapsed.
    ExpireSubscription { subscription_id: SubscriptionId },

    /// Flush a subscription's coalesced value once `minIntervalMs` has
    /// elapsed since the last delivered publication.
    FlushDeferredPublication { subscription_id: SubscriptionId },

    /// Re-publish the current value because no on-change publication
    /// occurred within the subscription's max/period interval.
    PeriodicPublish { subscription_id: SubscriptionId },
}

/// Commands accepted by the delayed scheduler.
#[derive(Debug)]
pub enum SchedulerCmd {
    /// Run `action` once `delay_ms` milliseconds have elapsed.
    Schedule {
        action: ScheduledAction,
        delay_ms: u64,
        reply: oneshot::Sender<u64>,
    },

    /// Cancel a previously scheduled action; a no-op if it already ran.
    Cancel { runnable_id: u64 },
}

/// Commands accepted by the subscription manager (consumer side).
#[derive(Debug)]
pub enum SubscriptionManagerCmd {
    /// An inbound publication envelope to dispatch to its subscriber.
    HandlePublication(Envelope),

    /// Register a new subscription and arm its missed-publication timer.
    RegisterSubscription {
        subscription_id: SubscriptionId,
        provider_participant_id: ParticipantId,
        proxy_participant_id: ParticipantId,
        expected_interval_ms: Option<u64>,
        validity_ms: Option<u64>,
    },

    /// Tear down a subscription, cancelling its timers.
    UnregisterSubscription { subscription_id: SubscriptionId },

    /// Scheduler callback: the subscriber missed an expected publication.
    PublicationMissed {
        subscription_id: SubscriptionId,
        expected_interval_ms: u64,
    },

    /// Scheduler callback: the subscription's validity elapsed.
    SubscriptionExpired { subscription_id: SubscriptionId },
}

/// Commands accepted by the publication manager (provider side).
#[derive(Debug)]
pub enum PublicationManagerCmd {
    /// A provider produced a new attribute or broadcast value.
    Publish {
        provider_participant_id: ParticipantId,
        attribute_name: String,
        payload: Vec<u8>,
        /// Actual broadcast parameter values, evaluated against each
        /// matching subscription's registered filter. `None` for plain
        /// attribute publications, which carry no filter parameters.
        broadcast_parameters: Option<crate::publication::filters::FilterParameters>,
    },

    /// Register a subscription request arriving from a remote proxy.
    RegisterSubscriptionRequest {
        subscription_id: SubscriptionId,
        provider_participant_id: ParticipantId,
        proxy_participant_id: ParticipantId,
        attribute_name: String,
        /// `OnChangeSubscriptionQos`/`OnChangeWithKeepAliveSubscriptionQos`
        /// minimum spacing between delivered publications.
        min_interval_ms: Option<u64>,
        /// `OnChangeWithKeepAliveSubscriptionQos.maxIntervalMs` or
        /// `PeriodicSubscriptionQos.periodMs`: republish on this cadence
        /// when no on-change publication has occurred.
        periodic_interval_ms: Option<u64>,
        /// Broadcast filter constraints this subscriber registered, if any.
        filter_parameters: Option<crate::publication::filters::FilterParameters>,
    },

    /// A subscription was cancelled by the subscriber.
    StopSubscription { subscription_id: SubscriptionId },

    /// Scheduler callback: deliver the coalesced value now that
    /// `minIntervalMs` has elapsed since the last delivered publication.
    FlushDeferredPublication { subscription_id: SubscriptionId },

    /// Scheduler callback: no on-change publication occurred within the
    /// max/period interval, republish the last known value.
    PeriodicPublish { subscription_id: SubscriptionId },
}

/// Commands accepted by the access-control gate.
#[derive(Debug)]
pub enum AccessControlCmd {
    /// Ask whether `sender` may deliver `operation` to `participant_id`.
    CheckPermission {
        sender: ParticipantId,
        participant_id: ParticipantId,
        operation: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Commands accepted by the discovery client.
#[derive(Debug)]
pub enum DiscoveryCmd {
    /// Resolve the given domain/interface to a participant id and register
    /// the chosen provider as a next hop.
    Lookup {
        domain: String,
        interface_name: String,
        discovery_timeout_ms: u64,
        reply: oneshot::Sender<Result<ParticipantId, Error>>,
    },

    /// An envelope carrying a discovery reply, routed back from the network.
    HandleReply(Envelope),
}
