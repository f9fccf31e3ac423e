// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Discovery client: itself just another participant. A lookup is an
//! ordinary request envelope round-tripped through the router, with the
//! reply delivered back through a continuation table keyed by request id.

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::oneshot;

use codec::{EnvelopeBuilder, MessageType};

use crate::address::Address;
use crate::commands::{DiscoveryCmd, RouterCmd};
use crate::error::{Error, ErrorKind};
use crate::types::ParticipantId;

/// Well-known participant id the discovery provider is reachable at.
pub const DISCOVERY_PROVIDER_PARTICIPANT_ID: &str = "discovery-provider";

/// This discovery client's own participant id, used as the `sender` and
/// `replyTo` of every lookup request it issues.
pub const DISCOVERY_CLIENT_PARTICIPANT_ID: &str = "discovery-client";

struct PendingLookup {
    reply: oneshot::Sender<Result<ParticipantId, Error>>,
}

pub struct DiscoveryClient {
    receiver: Receiver<DiscoveryCmd>,
    router_sender: Sender<RouterCmd>,
    pending: HashMap<String, PendingLookup>,
}

impl DiscoveryClient {
    #[must_use]
    pub fn new(receiver: Receiver<DiscoveryCmd>, router_sender: Sender<RouterCmd>) -> Self {
        Self {
            receiver,
            router_sender,
            pending: HashMap::new(),
        }
    }

    pub async fn run_loop(&mut self) -> ! {
        loop {
            if let Some(cmd) = self.receiver.recv().await {
                self.handle_cmd(cmd).await;
            }
        }
    }

    async fn handle_cmd(&mut self, cmd: DiscoveryCmd) {
        match cmd {
            DiscoveryCmd::Lookup {
                domain,
                interface_name,
                discovery_timeout_ms,
                reply,
            } => {
                self.lookup(domain, interface_name, discovery_timeout_ms, reply)
                    .await;
            }
            DiscoveryCmd::HandleReply(envelope) => self.handle_reply(envelope),
        }
    }

    async fn lookup(
        &mut self,
        domain: String,
        interface_name: String,
        discovery_timeout_ms: u64,
        reply: oneshot::Sender<Result<ParticipantId, Error>>,
    ) {
        let payload = format!("{domain}:{interface_name}").into_bytes();
        let envelope = EnvelopeBuilder::new(MessageType::Request)
            .sender(DISCOVERY_CLIENT_PARTICIPANT_ID)
            .recipient(DISCOVERY_PROVIDER_PARTICIPANT_ID)
            .reply_to(DISCOVERY_CLIENT_PARTICIPANT_ID)
            .ttl_ms(crate::types::now_ms() + discovery_timeout_ms)
            .payload(payload)
            .build();

        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(err) => {
                let _ = reply.send(Err(Error::from_string(
                    ErrorKind::Discovery,
                    format!("failed to build lookup request: {err:?}"),
                )));
                return;
            }
        };

        self.pending
            .insert(envelope.id().to_string(), PendingLookup { reply });

        if let Err(err) = self.router_sender.send(RouterCmd::Route(envelope)).await {
            log::warn!("Failed to route discovery lookup: {err}");
        }
    }

    fn handle_reply(&mut self, envelope: codec::Envelope) {
        let request_id = envelope
            .custom_headers()
            .get("requestReplyId")
            .cloned()
            .unwrap_or_default();

        let Some(pending) = self.pending.remove(&request_id) else {
            log::warn!("Discovery reply for unknown request {request_id}");
            return;
        };

        let resolved = String::from_utf8(envelope.payload().to_vec())
            .map_err(|err| Error::from_string(ErrorKind::Discovery, format!("{err}")));
        let _ = pending.reply.send(resolved);
    }
}

/// One provisioned routing entry preloaded from a `-d discoveryEntries.json`
/// file, registered as sticky before the router starts serving traffic.
#[derive(Debug, Deserialize)]
pub struct DiscoveryEntry {
    pub participant_id: ParticipantId,
    pub address: Address,
}

/// Load provisioned discovery entries from `path`.
///
/// # Errors
///
/// Returns error if the file can't be read or fails to parse.
pub fn load_entries(path: &std::path::Path) -> Result<Vec<DiscoveryEntry>, Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|err| Error::from_string(ErrorKind::ConfigError, format!("Invalid discovery entries file {path:?}: {err}")))
}
