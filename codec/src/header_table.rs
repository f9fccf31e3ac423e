// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::BTreeMap;

use byteorder::{BigEndian, WriteBytesExt};

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::string_data::StringData;
use crate::{DecodePacket, EncodePacket};

pub const HEADER_ID: &str = "id";
pub const HEADER_TYPE: &str = "type";
pub const HEADER_FROM: &str = "from";
pub const HEADER_TO: &str = "to";
pub const HEADER_EXPIRY_DATE: &str = "expiryDate";
pub const HEADER_REPLY_TO: &str = "replyTo";
pub const HEADER_EFFORT: &str = "effort";
pub const CUSTOM_HEADER_PREFIX: &str = "custom-";

const REQUIRED_HEADERS: [&str; 2] = [HEADER_ID, HEADER_TYPE];

/// Length-prefixed key/value table carried in every envelope frame.
///
/// Stored as a `BTreeMap` so two tables holding the same entries always
/// encode to the same bytes, which keeps `Envelope` equality and the
/// serialize-then-deserialize round trip well defined.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: BTreeMap<String, String>,
}

impl HeaderTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate `custom-*` headers with the prefix stripped.
    pub fn custom_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(k, v)| {
            k.strip_prefix(CUSTOM_HEADER_PREFIX)
                .map(|stripped| (stripped, v.as_str()))
        })
    }

    /// Validate that every required header key is present.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::MissingRequiredHeader` naming the first missing key.
    pub fn validate_required(&self) -> Result<(), DecodeError> {
        for key in REQUIRED_HEADERS {
            if !self.entries.contains_key(key) {
                return Err(DecodeError::MissingRequiredHeader(key));
            }
        }
        Ok(())
    }
}

impl EncodePacket for HeaderTable {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if self.entries.len() > u32::MAX as usize {
            return Err(EncodeError::TooManyData);
        }
        let mut used = 0;
        #[allow(clippy::cast_possible_truncation)]
        let count = self.entries.len() as u32;
        buf.write_u32::<BigEndian>(count)
            .map_err(|_err| EncodeError::TooManyData)?;
        used += 4;
        for (key, value) in &self.entries {
            used += StringData::new(key.clone()).encode(buf)?;
            used += StringData::new(value.clone()).encode(buf)?;
        }
        Ok(used)
    }
}

impl DecodePacket for HeaderTable {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let count = ba.read_u32()?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let key = StringData::decode(ba)?.into_inner();
            let value = StringData::decode(ba)?.into_inner();
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut table = HeaderTable::new();
        table.insert(HEADER_ID, "abc-123");
        table.insert("custom-region", "eu-west");

        let mut buf = Vec::new();
        table.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = HeaderTable::decode(&mut ba).unwrap();
        assert_eq!(table, decoded);
        assert_eq!(decoded.get(HEADER_ID), Some("abc-123"));
        assert_eq!(
            decoded.custom_headers().collect::<Vec<_>>(),
            vec![("region", "eu-west")]
        );
    }

    #[test]
    fn required_headers_enforced() {
        let mut table = HeaderTable::new();
        assert!(table.validate_required().is_err());
        table.insert(HEADER_ID, "x");
        assert!(table.validate_required().is_err());
        table.insert(HEADER_TYPE, "request");
        assert!(table.validate_required().is_ok());
    }
}
