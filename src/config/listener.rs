// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::net::ToSocketAddrs;

use serde::Deserialize;

use crate::error::{Error, ErrorKind};

/// External transport kind a listener accepts traffic for.
///
/// Individual transport drivers are not implemented by this crate; a
/// listener entry only records the address a future driver would bind
/// to, so configuration and discovery bootstrap can be exercised without
/// one.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    #[serde(alias = "mqtt")]
    Mqtt,

    #[serde(alias = "ws")]
    WebSocket,

    #[serde(alias = "http")]
    Http,
}

/// One external-transport listen address.
#[derive(Debug, Deserialize, Clone)]
pub struct Listener {
    /// Transport kind.
    ///
    /// Default is mqtt.
    #[serde(default = "Listener::default_protocol")]
    protocol: Protocol,

    /// Binding address, including host and port.
    ///
    /// Default is `0.0.0.0:49000`.
    #[serde(default = "Listener::default_address")]
    address: String,
}

impl Listener {
    #[must_use]
    pub fn default_listeners() -> Vec<Self> {
        Vec::new()
    }

    #[must_use]
    pub const fn default_protocol() -> Protocol {
        Protocol::Mqtt
    }

    #[must_use]
    pub fn default_address() -> String {
        "0.0.0.0:49000".to_string()
    }

    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Validate config.
    ///
    /// # Errors
    ///
    /// Returns error if the address doesn't parse as a socket address.
    pub fn validate(&self) -> Result<(), Error> {
        self.address.to_socket_addrs().map_err(|err| {
            Error::from_string(
                ErrorKind::ConfigError,
                format!("Invalid listener address {}: {err}", &self.address),
            )
        })?;
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            protocol: Self::default_protocol(),
            address: Self::default_address(),
        }
    }
}
