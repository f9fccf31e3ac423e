// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

use crate::error::Error;

/// Discovery client defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct Discovery {
    /// How long, in milliseconds, a lookup waits for the discovery
    /// provider to reply before failing with [`crate::error::ErrorKind::Discovery`].
    ///
    /// Default is 10000 (10 seconds).
    #[serde(default = "Discovery::default_timeout_ms")]
    timeout_ms: u64,

    /// Optional path to a JSON file of preloaded discovery entries,
    /// registered as sticky routing-table entries at startup.
    ///
    /// Default is None.
    #[serde(default = "Discovery::default_entries_file")]
    entries_file: Option<std::path::PathBuf>,
}

impl Discovery {
    #[must_use]
    pub const fn default_timeout_ms() -> u64 {
        10_000
    }

    #[must_use]
    pub const fn default_entries_file() -> Option<std::path::PathBuf> {
        None
    }

    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    #[must_use]
    pub fn entries_file(&self) -> Option<&std::path::Path> {
        self.entries_file.as_deref()
    }

    /// Override the configured entries file, e.g. from the `-d` CLI flag.
    pub fn set_entries_file(&mut self, path: std::path::PathBuf) {
        self.entries_file = Some(path);
    }

    #[must_use]
    pub const fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            entries_file: Self::default_entries_file(),
        }
    }
}
