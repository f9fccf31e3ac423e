// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

use crate::error::Error;

mod discovery;
mod general;
mod listener;
mod log;
mod security;
mod storage;

pub use discovery::Discovery;
pub use general::General;
pub use listener::{Listener, Protocol};
pub use self::log::{Log, LogLevel};
pub use security::Security;
pub use storage::Storage;

/// Top-level settings, loaded from one or more layered TOML files and
/// merged positionally: later files override fields set by earlier ones.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "General::default")]
    general: General,

    #[serde(default = "Listener::default_listeners")]
    listeners: Vec<Listener>,

    #[serde(default = "Security::default")]
    security: Security,

    #[serde(default = "Storage::default")]
    storage: Storage,

    #[serde(default = "Log::default")]
    log: Log,

    #[serde(default = "Discovery::default")]
    discovery: Discovery,
}

impl Config {
    #[must_use]
    pub const fn general(&self) -> &General {
        &self.general
    }

    #[must_use]
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    #[must_use]
    pub const fn security(&self) -> &Security {
        &self.security
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub const fn log(&self) -> &Log {
        &self.log
    }

    #[must_use]
    pub const fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    #[must_use]
    pub fn discovery_mut(&mut self) -> &mut Discovery {
        &mut self.discovery
    }

    /// Validate config.
    ///
    /// # Errors
    ///
    /// Returns error if some section fails its own validation.
    pub fn validate(&self) -> Result<(), Error> {
        self.general.validate()?;

        for listener in &self.listeners {
            listener.validate()?;
        }

        self.security.validate()?;
        self.storage.validate()?;
        self.log.validate()?;
        self.discovery.validate()
    }
}
