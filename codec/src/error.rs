// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::byte_array::ByteArrayError;

#[derive(Debug)]
pub enum EncodeError {
    /// Custom header key does not match `[A-Za-z0-9-]`.
    InvalidHeaderKey,

    /// Custom header value does not match the allowed charset.
    InvalidHeaderValue,

    /// Header table, body or signature exceeds the wire length limit.
    TooManyData,

    /// `id` is required and was not set before encoding.
    MissingId,

    /// `type` is required and was not set before encoding.
    MissingType,

    /// `ttlMs` must be an absolute timestamp, not a relative duration.
    NonAbsoluteTtl,
}

#[derive(Debug)]
pub enum DecodeError {
    OutOfRange,
    InvalidString,

    /// Leading magic bytes do not match `ENVELOPE_MAGIC`.
    InvalidMagic,

    /// Version byte is newer than this implementation understands.
    UnsupportedVersion,

    /// A required header (`id`, `type`, `from`, `to`, `expiryDate`) is absent.
    MissingRequiredHeader(&'static str),

    InvalidMessageType,
}

impl From<ByteArrayError> for DecodeError {
    fn from(err: ByteArrayError) -> Self {
        match err {
            ByteArrayError::OutOfRangeError => Self::OutOfRange,
            ByteArrayError::InvalidString(_) => Self::InvalidString,
        }
    }
}
