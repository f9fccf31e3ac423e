// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Transport-facing traits implemented by each external driver (MQTT,
//! WebSocket, HTTP long-poll, ...), plus an in-process transport used by
//! tests and by participants hosted in this same process.

use async_trait::async_trait;
use tokio::sync::mpsc::{Receiver, Sender};

use codec::Envelope;

use crate::error::Error;

/// Sends envelopes out over a concrete transport.
#[async_trait]
pub trait TransportSender: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), Error>;
}

/// Produces envelopes arriving over a concrete transport.
///
/// Implementors run their own `tokio::spawn`ed receive loop and feed
/// decoded envelopes into the channel `subscribe` returns; the router
/// owns exactly one task per registered `TransportReceiver`.
#[async_trait]
pub trait TransportReceiver: Send + Sync {
    async fn subscribe(&mut self) -> Receiver<Envelope>;
}

/// Loopback transport: echoes whatever is sent back out as received.
/// Used by in-process participants and by integration tests that don't
/// want to stand up a real external transport.
pub struct InProcessTransport {
    sender: Sender<Envelope>,
}

impl InProcessTransport {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<Envelope>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    #[must_use]
    pub fn sender_handle(&self) -> Sender<Envelope> {
        self.sender.clone()
    }
}

#[async_trait]
impl TransportSender for InProcessTransport {
    async fn send(&self, envelope: Envelope) -> Result<(), Error> {
        self.sender
            .send(envelope)
            .await
            .map_err(|err| Error::from_string(crate::error::ErrorKind::NotSent, format!("{err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_process_transport_echoes_sent_envelopes() {
        let (transport, mut receiver) = InProcessTransport::new(4);
        let envelope = codec::EnvelopeBuilder::new(codec::MessageType::OneWay)
            .ttl_ms(crate::types::now_ms() + 1_000)
            .build()
            .unwrap();
        transport.send(envelope.clone()).await.unwrap();
        assert_eq!(receiver.recv().await.unwrap(), envelope);
    }
}
