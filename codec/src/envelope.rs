// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Immutable message envelope and its framed wire representation.

use byteorder::{BigEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::Write;

use crate::byte_array::ByteArray;
use crate::effort::MessagingEffort;
use crate::error::{DecodeError, EncodeError};
use crate::header_table::{
    HeaderTable, CUSTOM_HEADER_PREFIX, HEADER_EFFORT, HEADER_EXPIRY_DATE, HEADER_FROM, HEADER_ID,
    HEADER_REPLY_TO, HEADER_TO, HEADER_TYPE,
};
use crate::message_type::MessageType;
use crate::utils;
use crate::{DecodePacket, EncodePacket};

/// Leading magic bytes of every envelope frame.
pub const ENVELOPE_MAGIC: [u8; 4] = *b"CCE1";
/// Current frame version. Decoders reject any version newer than this.
pub const ENVELOPE_VERSION: u8 = 1;

const FLAG_COMPRESSED: u8 = 0b0000_0001;
const FLAG_SIGNED: u8 = 0b0000_0010;
const FLAG_ENCRYPTED: u8 = 0b0000_0100;

/// Immutable framed record carrying one message between participants.
///
/// Construct via [`EnvelopeBuilder`]; there is no public way to mutate an
/// envelope in place once built, matching the "immutable after construction"
/// invariant of the messaging core.
#[derive(Clone, Debug)]
pub struct Envelope {
    id: String,
    message_type: MessageType,
    sender: String,
    recipient: String,
    ttl_ms: u64,
    reply_to: Option<String>,
    effort: MessagingEffort,
    custom_headers: BTreeMap<String, String>,
    payload: Vec<u8>,
    is_compressed: bool,
    is_signed: bool,
    is_encrypted: bool,
    signature: Option<Vec<u8>>,

    /// Not part of the wire frame. True if this envelope arrived over a
    /// global (cross-cluster) transport; used to decide whether an inbound
    /// multicast must be re-published globally.
    received_from_global: bool,
}

impl Envelope {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Absolute expiry timestamp, in milliseconds since epoch.
    #[must_use]
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.ttl_ms
    }

    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    #[must_use]
    pub fn effort(&self) -> MessagingEffort {
        self.effort
    }

    #[must_use]
    pub fn custom_headers(&self) -> &BTreeMap<String, String> {
        &self.custom_headers
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.is_compressed
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.is_encrypted
    }

    #[must_use]
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    #[must_use]
    pub fn received_from_global(&self) -> bool {
        self.received_from_global
    }

    /// Returns a clone of this envelope tagged with `receivedFromGlobal`,
    /// used when handing a just-received message to the router.
    #[must_use]
    pub fn with_received_from_global(mut self, value: bool) -> Self {
        self.received_from_global = value;
        self
    }

    /// Returns a clone addressed to a different recipient, used when the
    /// router fans a multicast envelope out to each matching subscriber.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    fn header_table(&self) -> HeaderTable {
        let mut table = HeaderTable::new();
        table.insert(HEADER_ID, self.id.clone());
        table.insert(HEADER_TYPE, self.message_type.as_str());
        table.insert(HEADER_FROM, self.sender.clone());
        table.insert(HEADER_TO, self.recipient.clone());
        table.insert(HEADER_EXPIRY_DATE, self.ttl_ms.to_string());
        if let Some(reply_to) = &self.reply_to {
            table.insert(HEADER_REPLY_TO, reply_to.clone());
        }
        table.insert(HEADER_EFFORT, self.effort.as_str());
        for (key, value) in &self.custom_headers {
            table.insert(format!("{CUSTOM_HEADER_PREFIX}{key}"), value.clone());
        }
        table
    }
}

impl PartialEq for Envelope {
    /// Two envelopes are equal iff `id`, `type`, all headers and `payload`
    /// match; `receivedFromGlobal` is excluded by design.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.message_type == other.message_type
            && self.sender == other.sender
            && self.recipient == other.recipient
            && self.ttl_ms == other.ttl_ms
            && self.reply_to == other.reply_to
            && self.effort == other.effort
            && self.custom_headers == other.custom_headers
            && self.payload == other.payload
    }
}

impl Eq for Envelope {}

impl EncodePacket for Envelope {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if self.id.is_empty() {
            return Err(EncodeError::MissingId);
        }

        let mut used = 0;
        buf.extend_from_slice(&ENVELOPE_MAGIC);
        buf.push(ENVELOPE_VERSION);
        used += ENVELOPE_MAGIC.len() + 1;

        let mut flags = 0u8;
        if self.is_compressed {
            flags |= FLAG_COMPRESSED;
        }
        if self.is_signed {
            flags |= FLAG_SIGNED;
        }
        if self.is_encrypted {
            flags |= FLAG_ENCRYPTED;
        }
        buf.push(flags);
        used += 1;

        used += self.header_table().encode(buf)?;

        if self.payload.len() > u32::MAX as usize {
            return Err(EncodeError::TooManyData);
        }
        #[allow(clippy::cast_possible_truncation)]
        let body_len = self.payload.len() as u32;
        buf.write_u32::<BigEndian>(body_len)
            .map_err(|_err| EncodeError::TooManyData)?;
        buf.write_all(&self.payload)
            .map_err(|_err| EncodeError::TooManyData)?;
        used += 4 + self.payload.len();

        let sig_bytes = self.signature.as_deref().unwrap_or(&[]);
        if sig_bytes.len() > u32::MAX as usize {
            return Err(EncodeError::TooManyData);
        }
        #[allow(clippy::cast_possible_truncation)]
        let sig_len = sig_bytes.len() as u32;
        buf.write_u32::<BigEndian>(sig_len)
            .map_err(|_err| EncodeError::TooManyData)?;
        buf.write_all(sig_bytes)
            .map_err(|_err| EncodeError::TooManyData)?;
        used += 4 + sig_bytes.len();

        Ok(used)
    }
}

impl DecodePacket for Envelope {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let magic = ba.read_bytes(ENVELOPE_MAGIC.len())?;
        if magic != ENVELOPE_MAGIC.as_slice() {
            return Err(DecodeError::InvalidMagic);
        }
        let version = ba.read_byte()?;
        if version > ENVELOPE_VERSION {
            return Err(DecodeError::UnsupportedVersion);
        }
        let flags = ba.read_byte()?;

        let table = HeaderTable::decode(ba)?;
        table.validate_required()?;

        let id = table
            .get(HEADER_ID)
            .ok_or(DecodeError::MissingRequiredHeader(HEADER_ID))?
            .to_string();
        let message_type: MessageType = table
            .get(HEADER_TYPE)
            .ok_or(DecodeError::MissingRequiredHeader(HEADER_TYPE))?
            .parse()?;
        let sender = table.get(HEADER_FROM).unwrap_or_default().to_string();
        let recipient = table.get(HEADER_TO).unwrap_or_default().to_string();
        let ttl_ms = table
            .get(HEADER_EXPIRY_DATE)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or(DecodeError::MissingRequiredHeader(HEADER_EXPIRY_DATE))?;
        let reply_to = table.get(HEADER_REPLY_TO).map(str::to_string);
        let effort = table
            .get(HEADER_EFFORT)
            .map(str::parse)
            .transpose()?
            .unwrap_or_default();
        let custom_headers = table
            .custom_headers()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let body_len = ba.read_u32()?;
        let payload = ba.read_bytes(body_len as usize)?.to_vec();

        let sig_len = ba.read_u32()?;
        let signature = if sig_len == 0 {
            None
        } else {
            Some(ba.read_bytes(sig_len as usize)?.to_vec())
        };

        Ok(Self {
            id,
            message_type,
            sender,
            recipient,
            ttl_ms,
            reply_to,
            effort,
            custom_headers,
            payload,
            is_compressed: flags & FLAG_COMPRESSED != 0,
            is_signed: flags & FLAG_SIGNED != 0,
            is_encrypted: flags & FLAG_ENCRYPTED != 0,
            signature,
            received_from_global: false,
        })
    }
}

/// Builder enforcing the envelope's construction invariants: `id` and `type`
/// must be present, and `ttlMs` must be an absolute timestamp.
#[derive(Debug)]
pub struct EnvelopeBuilder {
    id: Option<String>,
    message_type: MessageType,
    sender: String,
    recipient: String,
    ttl_ms: Option<u64>,
    reply_to: Option<String>,
    effort: MessagingEffort,
    custom_headers: BTreeMap<String, String>,
    payload: Vec<u8>,
    is_compressed: bool,
    is_signed: bool,
    is_encrypted: bool,
    signature: Option<Vec<u8>>,
}

impl EnvelopeBuilder {
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            id: None,
            message_type,
            sender: String::new(),
            recipient: String::new(),
            ttl_ms: None,
            reply_to: None,
            effort: MessagingEffort::default(),
            custom_headers: BTreeMap::new(),
            payload: Vec::new(),
            is_compressed: false,
            is_signed: false,
            is_encrypted: false,
            signature: None,
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    #[must_use]
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    /// Set the absolute expiry timestamp, in milliseconds since epoch.
    #[must_use]
    pub fn ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    #[must_use]
    pub fn effort(mut self, effort: MessagingEffort) -> Self {
        self.effort = effort;
        self
    }

    /// Add a custom header.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` or `value` contains characters outside the
    /// allowed charset.
    pub fn custom_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, EncodeError> {
        let key = key.into();
        let value = value.into();
        if !utils::is_valid_header_key(&key) {
            return Err(EncodeError::InvalidHeaderKey);
        }
        if !utils::is_valid_header_value(&value) {
            return Err(EncodeError::InvalidHeaderValue);
        }
        self.custom_headers.insert(key, value);
        Ok(self)
    }

    #[must_use]
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    #[must_use]
    pub fn compressed(mut self, value: bool) -> Self {
        self.is_compressed = value;
        self
    }

    #[must_use]
    pub fn encrypted(mut self, value: bool) -> Self {
        self.is_encrypted = value;
        self
    }

    #[must_use]
    pub fn signature(mut self, signature: Vec<u8>) -> Self {
        self.is_signed = true;
        self.signature = Some(signature);
        self
    }

    /// Build the immutable envelope.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::MissingId` only if an empty id was explicitly
    /// supplied; absent ids are auto-assigned. Returns
    /// `EncodeError::NonAbsoluteTtl` if no `ttl_ms` was set.
    pub fn build(self) -> Result<Envelope, EncodeError> {
        let id = match self.id {
            Some(id) if id.is_empty() => return Err(EncodeError::MissingId),
            Some(id) => id,
            None => utils::new_id(),
        };
        let ttl_ms = self.ttl_ms.ok_or(EncodeError::NonAbsoluteTtl)?;

        Ok(Envelope {
            id,
            message_type: self.message_type,
            sender: self.sender,
            recipient: self.recipient,
            ttl_ms,
            reply_to: self.reply_to,
            effort: self.effort,
            custom_headers: self.custom_headers,
            payload: self.payload,
            is_compressed: self.is_compressed,
            is_signed: self.is_signed,
            is_encrypted: self.is_encrypted,
            signature: self.signature,
            received_from_global: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        EnvelopeBuilder::new(MessageType::Request)
            .sender("p1")
            .recipient("p2")
            .ttl_ms(1_000)
            .custom_header("trace-id", "abc123")
            .unwrap()
            .payload(vec![1, 2, 3])
            .build()
            .unwrap()
    }

    #[test]
    fn round_trip_ignores_received_from_global() {
        let envelope = sample().with_received_from_global(true);

        let mut buf = Vec::new();
        envelope.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = Envelope::decode(&mut ba).unwrap();

        assert_eq!(envelope, decoded);
        assert!(!decoded.received_from_global());
    }

    #[test]
    fn missing_id_or_type_fails_construction() {
        let err = EnvelopeBuilder::new(MessageType::Request)
            .id("")
            .ttl_ms(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, EncodeError::MissingId));
    }

    #[test]
    fn ttl_must_be_set() {
        let err = EnvelopeBuilder::new(MessageType::OneWay).build().unwrap_err();
        assert!(matches!(err, EncodeError::NonAbsoluteTtl));
    }

    #[test]
    fn custom_header_charset_is_enforced() {
        let err = EnvelopeBuilder::new(MessageType::OneWay)
            .custom_header("bad key", "v")
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidHeaderKey));

        let err = EnvelopeBuilder::new(MessageType::OneWay)
            .custom_header("good-key", "bad#value")
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidHeaderValue));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0, 0, 0, 0];
        buf.extend_from_slice(&[ENVELOPE_VERSION, 0, 0, 0, 0, 0]);
        let mut ba = ByteArray::new(&buf);
        assert!(matches!(Envelope::decode(&mut ba), Err(DecodeError::InvalidMagic)));
    }
}
