// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
    /// Persist the routing table's sticky entries and active
    /// subscriptions to disk as newline-delimited JSON, so they survive a
    /// restart.
    ///
    /// Only takes effect when this crate is built with the `persistence`
    /// feature.
    ///
    /// Default is false.
    #[serde(default = "Storage::default_persistence")]
    persistence: bool,

    /// Location of the persisted snapshot file.
    ///
    /// Default is "/var/lib/cluster-controller/state.jsonl".
    #[serde(default = "Storage::default_snapshot_path")]
    snapshot_path: PathBuf,

    /// Save the in-memory state to disk every `auto_save_interval`
    /// seconds.
    ///
    /// If set to 0, the snapshot is only written at graceful shutdown.
    ///
    /// Default is 1800 seconds.
    #[serde(default = "Storage::default_auto_save_interval")]
    auto_save_interval: u64,
}

impl Storage {
    #[must_use]
    pub const fn default_persistence() -> bool {
        false
    }

    #[must_use]
    pub fn default_snapshot_path() -> PathBuf {
        PathBuf::from("/var/lib/cluster-controller/state.jsonl")
    }

    #[must_use]
    pub const fn default_auto_save_interval() -> u64 {
        1800
    }

    #[must_use]
    pub const fn persistence(&self) -> bool {
        self.persistence
    }

    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        self.snapshot_path.as_path()
    }

    #[must_use]
    pub const fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval)
    }

    /// Validate storage config.
    ///
    /// # Errors
    ///
    /// Returns error if persistence is enabled but the snapshot path's
    /// parent directory doesn't exist and can't be created.
    pub fn validate(&self) -> Result<(), Error> {
        if self.persistence {
            if let Some(parent) = self.snapshot_path.parent() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    Error::from_string(
                        crate::error::ErrorKind::ConfigError,
                        format!("Failed to create snapshot directory {parent:?}: {err}"),
                    )
                })?;
            }
        }
        Ok(())
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            persistence: Self::default_persistence(),
            snapshot_path: Self::default_snapshot_path(),
            auto_save_interval: Self::default_auto_save_interval(),
        }
    }
}
