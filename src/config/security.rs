// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::acl::Mode as AccessControlMode;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum AccessControlModeConfig {
    Disabled,
    Enforced,
    AuditOnly,
}

impl From<AccessControlModeConfig> for AccessControlMode {
    fn from(value: AccessControlModeConfig) -> Self {
        match value {
            AccessControlModeConfig::Disabled => Self::Disabled,
            AccessControlModeConfig::Enforced => Self::Enforced,
            AccessControlModeConfig::AuditOnly => Self::AuditOnly,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Security {
    /// How strictly the access-control gate enforces its grant table.
    ///
    /// Available values are "disabled", "enforced" and "audit-only".
    ///
    /// Default is "disabled".
    #[serde(default = "Security::default_access_control_mode")]
    access_control_mode: AccessControlModeConfig,

    /// Path to a JSON file listing `{sender, operation}` grants.
    ///
    /// Ignored when `access_control_mode` is "disabled".
    ///
    /// Default is None.
    #[serde(default = "Security::default_grants_file")]
    grants_file: Option<PathBuf>,
}

impl Security {
    #[must_use]
    pub const fn default_access_control_mode() -> AccessControlModeConfig {
        AccessControlModeConfig::Disabled
    }

    #[must_use]
    pub const fn default_grants_file() -> Option<PathBuf> {
        None
    }

    #[must_use]
    pub fn access_control_mode(&self) -> AccessControlMode {
        self.access_control_mode.into()
    }

    #[must_use]
    pub fn grants_file(&self) -> Option<&Path> {
        self.grants_file.as_deref()
    }

    #[must_use]
    pub const fn validate(&self) -> Result<(), crate::error::Error> {
        Ok(())
    }
}

impl Default for Security {
    fn default() -> Self {
        Self {
            access_control_mode: Self::default_access_control_mode(),
            grants_file: Self::default_grants_file(),
        }
    }
}
