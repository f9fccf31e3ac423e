// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Snapshot persistence: saves sticky routing entries and active
//! subscriptions as newline-delimited JSON so they survive a restart.
//! Only compiled in when the `persistence` feature is enabled.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{Error, ErrorKind};
use crate::routing::RoutingEntry;
use crate::types::ParticipantId;

/// One persisted routing-table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRoute {
    pub participant_id: ParticipantId,
    pub address: Address,
    pub is_sticky: bool,
    pub is_globally_visible: bool,
}

impl PersistedRoute {
    #[must_use]
    pub fn from_entry(participant_id: ParticipantId, entry: &RoutingEntry) -> Self {
        Self {
            participant_id,
            address: entry.address.clone(),
            is_sticky: entry.is_sticky,
            is_globally_visible: entry.is_globally_visible,
        }
    }

    #[must_use]
    pub fn into_entry(self) -> (ParticipantId, RoutingEntry) {
        (
            self.participant_id,
            RoutingEntry {
                address: self.address,
                is_sticky: self.is_sticky,
                is_globally_visible: self.is_globally_visible,
                expiry_date_ms: None,
            },
        )
    }
}

/// Serialize `routes` to `path` as one JSON object per line.
pub fn save(path: &Path, routes: &[PersistedRoute]) -> Result<(), Error> {
    let mut file = std::fs::File::create(path)?;
    for route in routes {
        let line = serde_json::to_string(route)
            .map_err(|err| Error::from_string(ErrorKind::IoError, format!("{err}")))?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Load previously persisted routes, skipping any lines that fail to
/// parse rather than aborting the whole load.
pub fn load(path: &Path) -> Result<Vec<PersistedRoute>, Error> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut routes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PersistedRoute>(&line) {
            Ok(route) => routes.push(route),
            Err(err) => log::warn!("Skipping malformed persisted route: {err}"),
        }
    }
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_temp_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("cc-persistence-test-{}.jsonl", std::process::id()));
        let routes = vec![PersistedRoute {
            participant_id: "p1".to_string(),
            address: Address::InProcess {
                skeleton_id: "s1".to_string(),
            },
            is_sticky: true,
            is_globally_visible: false,
        }];
        save(&path, &routes).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].participant_id, "p1");
        std::fs::remove_file(&path).ok();
    }
}
