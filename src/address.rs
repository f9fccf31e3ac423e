// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Tagged variant over transport-specific destinations.

use serde::{Deserialize, Serialize};

/// A resolved destination a [`crate::stub::MessagingStub`] can transmit to.
///
/// Equality is value-based per variant, which is what the routing table
/// relies on to detect a conflicting `addNextHop` for an existing
/// participant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// Another participant living in this same process.
    InProcess { skeleton_id: String },

    /// Reachable over a shared MQTT broker.
    Mqtt { broker_uri: String, topic: String },

    /// Reachable over an HTTP long-poll channel.
    HttpChannel {
        messaging_endpoint_url: String,
        channel_id: String,
    },

    /// A WebSocket server this cluster-controller listens on.
    WebSocketServer {
        protocol: String,
        host: String,
        port: u16,
        path: String,
    },

    /// A WebSocket client connected in.
    WebSocketClient { id: String },
}

impl Address {
    /// Whether this address is reachable from outside the local process,
    /// i.e. whether a multicast addressed through it must also be
    /// republished over the global transport.
    #[must_use]
    pub const fn is_globally_visible_by_default(&self) -> bool {
        !matches!(self, Self::InProcess { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_value_based_per_variant() {
        let a = Address::Mqtt {
            broker_uri: "tcp://broker".to_string(),
            topic: "t1".to_string(),
        };
        let b = Address::Mqtt {
            broker_uri: "tcp://broker".to_string(),
            topic: "t1".to_string(),
        };
        let c = Address::Mqtt {
            broker_uri: "tcp://broker".to_string(),
            topic: "t2".to_string(),
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
