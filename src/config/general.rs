// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

#![allow(clippy::unsafe_derive_deserialize)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// General section in config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct General {
    /// Write process id to a file. A blank string means a pid file
    /// shouldn't be written.
    ///
    /// Default is `/run/cluster-controllerd.pid` for root, and
    /// `/run/user/UID/cluster-controllerd.pid` for non-root users.
    #[serde(default = "General::default_pid_file")]
    pid_file: PathBuf,

    /// Total number of envelopes the message queue may hold across every
    /// recipient combined.
    ///
    /// Default is 10000.
    #[serde(default = "General::default_max_queued_total")]
    max_queued_total: usize,

    /// Number of envelopes the message queue may hold for a single
    /// recipient.
    ///
    /// Default is 1000.
    #[serde(default = "General::default_max_queued_per_participant")]
    max_queued_per_participant: usize,

    /// Default time-to-live, in milliseconds, applied to publication
    /// envelopes synthesized by the publication manager.
    ///
    /// Default is 60000 (one minute).
    #[serde(default = "General::default_publication_ttl_ms")]
    default_publication_ttl_ms: u64,

    /// How often, in seconds, the routing table sweeps for and evicts
    /// stale non-sticky entries.
    ///
    /// Default is 60.
    #[serde(default = "General::default_routing_table_cleanup_interval_s")]
    routing_table_cleanup_interval_s: u64,
}

impl General {
    #[cfg(not(unix))]
    #[must_use]
    pub fn default_pid_file() -> PathBuf {
        PathBuf::from("cluster-controllerd.pid")
    }

    #[cfg(unix)]
    #[must_use]
    pub fn default_pid_file() -> PathBuf {
        let uid = unsafe { nc::geteuid() };
        if uid == 0 {
            PathBuf::from("/run/cluster-controllerd.pid")
        } else {
            PathBuf::from(&format!("/run/user/{uid}/cluster-controllerd.pid"))
        }
    }

    #[must_use]
    pub const fn default_max_queued_total() -> usize {
        10_000
    }

    #[must_use]
    pub const fn default_max_queued_per_participant() -> usize {
        1_000
    }

    #[must_use]
    pub const fn default_publication_ttl_ms() -> u64 {
        60_000
    }

    #[must_use]
    pub const fn default_routing_table_cleanup_interval_s() -> u64 {
        60
    }

    #[must_use]
    pub fn pid_file(&self) -> &Path {
        self.pid_file.as_path()
    }

    #[must_use]
    pub const fn max_queued_total(&self) -> usize {
        self.max_queued_total
    }

    #[must_use]
    pub const fn max_queued_per_participant(&self) -> usize {
        self.max_queued_per_participant
    }

    #[must_use]
    pub const fn publication_ttl_ms(&self) -> u64 {
        self.default_publication_ttl_ms
    }

    #[must_use]
    pub const fn routing_table_cleanup_interval_s(&self) -> u64 {
        self.routing_table_cleanup_interval_s
    }

    /// Validate config.
    ///
    /// # Errors
    ///
    /// Returns error if the per-participant quota exceeds the total quota.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_queued_per_participant > self.max_queued_total {
            return Err(Error::new(
                crate::error::ErrorKind::ConfigError,
                "max_queued_per_participant cannot exceed max_queued_total",
            ));
        }
        Ok(())
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            pid_file: Self::default_pid_file(),
            max_queued_total: Self::default_max_queued_total(),
            max_queued_per_participant: Self::default_max_queued_per_participant(),
            default_publication_ttl_ms: Self::default_publication_ttl_ms(),
            routing_table_cleanup_interval_s: Self::default_routing_table_cleanup_interval_s(),
        }
    }
}
