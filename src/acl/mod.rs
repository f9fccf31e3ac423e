// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Access-control gate: the router's single point of policy enforcement
//! before an envelope is handed to a stub.

use std::collections::HashSet;

use serde::Deserialize;
use tokio::sync::mpsc::Receiver;

use crate::commands::AccessControlCmd;

/// How strictly [`AccessControlGate`] enforces its permission table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Every check passes; used when no ACL store is configured.
    Disabled,

    /// Checks are evaluated and denials are enforced.
    Enforced,

    /// Checks are evaluated and logged, but every envelope is still let
    /// through. Useful for validating a new policy before enforcing it.
    AuditOnly,
}

/// One allowed `(sender participant, operation)` pair. `operation` of
/// `"*"` allows every operation from that sender.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Grant {
    pub sender: String,
    pub operation: String,
}

/// Load a JSON array of grants from `path`.
///
/// # Errors
///
/// Returns error if the file can't be read or fails to parse.
pub fn load_grants(path: &std::path::Path) -> Result<HashSet<Grant>, crate::error::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| {
        crate::error::Error::from_string(
            crate::error::ErrorKind::ConfigError,
            format!("Invalid grants file {path:?}: {err}"),
        )
    })
}

pub struct AccessControlGate {
    receiver: Receiver<AccessControlCmd>,
    mode: Mode,
    grants: HashSet<Grant>,
}

impl AccessControlGate {
    #[must_use]
    pub fn new(receiver: Receiver<AccessControlCmd>, mode: Mode, grants: HashSet<Grant>) -> Self {
        Self {
            receiver,
            mode,
            grants,
        }
    }

    pub async fn run_loop(&mut self) -> ! {
        loop {
            if let Some(cmd) = self.receiver.recv().await {
                self.handle_cmd(cmd);
            }
        }
    }

    fn handle_cmd(&mut self, cmd: AccessControlCmd) {
        let AccessControlCmd::CheckPermission {
            sender,
            participant_id,
            operation,
            reply,
        } = cmd;

        let allowed = self.is_allowed(&sender, &operation);
        if !allowed {
            log::warn!(
                "ACL denied: sender={sender} participant={participant_id} operation={operation}"
            );
        }

        let permit = match self.mode {
            Mode::Disabled | Mode::AuditOnly => true,
            Mode::Enforced => allowed,
        };
        let _ = reply.send(permit);
    }

    fn is_allowed(&self, sender: &str, operation: &str) -> bool {
        if matches!(self.mode, Mode::Disabled) {
            return true;
        }
        self.grants.iter().any(|grant| {
            grant.sender == sender && (grant.operation == "*" || grant.operation == operation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(mode: Mode, grants: HashSet<Grant>) -> (AccessControlGate, tokio::sync::mpsc::Sender<AccessControlCmd>) {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        (AccessControlGate::new(rx, mode, grants), tx)
    }

    #[tokio::test]
    async fn disabled_mode_allows_everything() {
        let (mut gate, tx) = gate(Mode::Disabled, HashSet::new());
        tokio::spawn(async move { gate.run_loop().await });
        let (reply, receive) = tokio::sync::oneshot::channel();
        tx.send(AccessControlCmd::CheckPermission {
            sender: "p1".to_string(),
            participant_id: "p2".to_string(),
            operation: "request".to_string(),
            reply,
        })
        .await
        .unwrap();
        assert!(receive.await.unwrap());
    }

    #[tokio::test]
    async fn enforced_mode_denies_ungranted_senders() {
        let (mut gate, tx) = gate(Mode::Enforced, HashSet::new());
        tokio::spawn(async move { gate.run_loop().await });
        let (reply, receive) = tokio::sync::oneshot::channel();
        tx.send(AccessControlCmd::CheckPermission {
            sender: "p1".to_string(),
            participant_id: "p2".to_string(),
            operation: "request".to_string(),
            reply,
        })
        .await
        .unwrap();
        assert!(!receive.await.unwrap());
    }

    #[tokio::test]
    async fn audit_only_mode_lets_denied_traffic_through() {
        let (mut gate, tx) = gate(Mode::AuditOnly, HashSet::new());
        tokio::spawn(async move { gate.run_loop().await });
        let (reply, receive) = tokio::sync::oneshot::channel();
        tx.send(AccessControlCmd::CheckPermission {
            sender: "p1".to_string(),
            participant_id: "p2".to_string(),
            operation: "request".to_string(),
            reply,
        })
        .await
        .unwrap();
        assert!(receive.await.unwrap());
    }
}
