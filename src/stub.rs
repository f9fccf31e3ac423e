// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Messaging stubs: the router's uniform handle onto "send this envelope
//! out over whatever transport its next hop resolved to".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc::Sender;

use codec::Envelope;

use crate::address::Address;
use crate::error::{Error, ErrorKind};

/// A transmit-only handle bound to one resolved [`Address`].
///
/// Transport drivers (MQTT, WebSocket, HTTP long-poll, ...) each provide
/// their own implementation; this crate ships only [`InProcessStub`],
/// which is enough to route envelopes between participants living in the
/// same process and to drive the in-process integration tests.
#[async_trait]
pub trait MessagingStub: Send + Sync {
    /// Hand `envelope` off to the transport. A transient failure should be
    /// surfaced as [`ErrorKind::DelayWithRetry`], carrying the delay in
    /// milliseconds the router should wait before retrying; anything else
    /// is treated as permanent.
    async fn transmit(&self, envelope: Envelope) -> Result<(), Error>;
}

/// Delivers directly into another participant's inbound channel.
///
/// Grounded on the single-process short-circuit every cluster-controller
/// takes for participants it hosts itself: no framing, no retry, just a
/// channel send.
pub struct InProcessStub {
    inbound: Sender<Envelope>,
}

impl InProcessStub {
    #[must_use]
    pub const fn new(inbound: Sender<Envelope>) -> Self {
        Self { inbound }
    }
}

#[async_trait]
impl MessagingStub for InProcessStub {
    async fn transmit(&self, envelope: Envelope) -> Result<(), Error> {
        self.inbound
            .send(envelope)
            .await
            .map_err(|err| Error::from_string(ErrorKind::NotSent, format!("{err}")))
    }
}

/// Caches one stub per [`Address`] so repeated sends to the same
/// destination reuse the same transport connection/channel instead of
/// building a fresh one every time.
#[derive(Clone, Default)]
pub struct StubFactoryRegistry {
    cache: Arc<RwLock<HashMap<Address, Arc<dyn MessagingStub>>>>,
}

impl StubFactoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached stub for `address`, if one has already been built.
    #[must_use]
    pub fn get(&self, address: &Address) -> Option<Arc<dyn MessagingStub>> {
        self.cache.read().get(address).cloned()
    }

    /// Cache `stub` for future lookups against `address`, replacing any
    /// stub previously cached there.
    pub fn insert(&self, address: Address, stub: Arc<dyn MessagingStub>) {
        self.cache.write().insert(address, stub);
    }

    /// Drop a cached stub, e.g. because its next hop was removed.
    pub fn remove(&self, address: &Address) {
        self.cache.write().remove(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_stub_forwards_to_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let stub = InProcessStub::new(tx);
        let envelope = codec::EnvelopeBuilder::new(codec::MessageType::OneWay)
            .ttl_ms(crate::types::now_ms() + 1_000)
            .build()
            .unwrap();
        stub.transmit(envelope.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), envelope);
    }

    #[test]
    fn registry_caches_by_address() {
        let registry = StubFactoryRegistry::new();
        let address = Address::InProcess {
            skeleton_id: "p1".to_string(),
        };
        assert!(registry.get(&address).is_none());
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        registry.insert(address.clone(), Arc::new(InProcessStub::new(tx)));
        assert!(registry.get(&address).is_some());
        registry.remove(&address);
        assert!(registry.get(&address).is_none());
    }
}
