// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Framed binary envelope used to carry messages between participants.
//!
//! The wire format is a self-describing record: a fixed magic/version, a
//! length-prefixed header table, an opaque body and an optional signature.
//! This crate only knows about the *shape* of that record; serialization of
//! the business payload inside the body is left to callers.

mod byte_array;
mod effort;
mod envelope;
mod error;
mod header_table;
mod message_type;
mod string_data;
pub mod utils;

pub use byte_array::{ByteArray, ByteArrayError};
pub use effort::MessagingEffort;
pub use envelope::{Envelope, EnvelopeBuilder, ENVELOPE_MAGIC, ENVELOPE_VERSION};
pub use error::{DecodeError, EncodeError};
pub use header_table::HeaderTable;
pub use message_type::MessageType;

/// Decode a byte buffer into some type.
pub trait DecodePacket: Sized {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError>;
}

/// Encode a type into a byte buffer, returning the number of bytes written.
pub trait EncodePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError>;
}
