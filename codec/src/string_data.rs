// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::{DecodePacket, EncodePacket};

/// A UTF-8 string, length-prefixed with a big-endian `u32`.
///
/// Header keys/values and body-adjacent strings in the envelope frame all
/// use this representation so the 64KB string cap of classic MQTT framing
/// doesn't leak into the envelope header table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StringData(String);

impl StringData {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        4 + self.0.len()
    }
}

impl EncodePacket for StringData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if self.0.len() > u32::MAX as usize {
            return Err(EncodeError::TooManyData);
        }
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u32;
        buf.write_u32::<BigEndian>(len)
            .map_err(|_err| EncodeError::TooManyData)?;
        buf.write_all(self.0.as_bytes())
            .map_err(|_err| EncodeError::TooManyData)?;
        Ok(self.bytes())
    }
}

impl DecodePacket for StringData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u32()?;
        let s = ba.read_string(len as usize)?;
        Ok(Self(s))
    }
}
