// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt::{self, Display};
use std::io;

use tokio::sync::mpsc;
use tokio::time::error::Elapsed;

use crate::types::SubscriptionId;

/// Suggested retry delay a transport can fall back to when it has no
/// opinion of its own.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Wire-visible failure kinds, plus the local infrastructure kinds needed to
/// get a process up and running.
#[derive(Clone, Debug)]
pub enum ErrorKind {
    /// Unspecified failure; surfaced to the caller.
    Runtime,

    /// Envelope TTL exceeded mid-flight.
    Timeout,

    /// Permanent transport failure; not retried.
    NotSent,

    /// Envelope constructed already past TTL; dropped at the sender.
    Expired,

    /// Transient transport failure; the router will retry after the given
    /// delay, in milliseconds (default 1000 if the transport has no
    /// opinion).
    DelayWithRetry(u64),

    /// No provider matched a discovery lookup.
    Discovery,

    /// Thrown by provider logic; forwarded as a reply.
    ProviderRuntime,

    /// Synthesized by the subscription manager; carries the subscription id.
    PublicationMissed(SubscriptionId),

    /// Modelled business error: a named enum literal plus a message.
    Application(String),

    /// Settings file missing, unparsable, or failing validation.
    ConfigError,

    /// Error occurred while performing I/O.
    IoError,

    /// Envelope encode error.
    EncodeError,

    /// Envelope decode error.
    DecodeError,

    /// A transport or scheduler channel closed unexpectedly.
    ChannelError,

    /// Logging backend failed to initialize.
    LoggerError,
}

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_owned(),
        }
    }

    #[must_use]
    pub fn from_string(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from_string(ErrorKind::IoError, format!("IoError {err}"))
    }
}

impl From<Elapsed> for Error {
    fn from(err: Elapsed) -> Self {
        Self::from_string(ErrorKind::Timeout, format!("Deadline elapsed: {err}"))
    }
}

impl From<codec::EncodeError> for Error {
    fn from(err: codec::EncodeError) -> Self {
        Self::from_string(ErrorKind::EncodeError, format!("{err:?}"))
    }
}

impl From<codec::DecodeError> for Error {
    fn from(err: codec::DecodeError) -> Self {
        Self::from_string(ErrorKind::DecodeError, format!("{err:?}"))
    }
}

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        Self::from_string(ErrorKind::ChannelError, format!("channel send error: {err}"))
    }
}
