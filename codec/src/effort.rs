// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::{DecodePacket, EncodePacket};

/// Caller hint that allows transports to weaken delivery QoS.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessagingEffort {
    /// Transport MAY drop the message rather than retry or ack.
    BestEffort,

    /// Default. Transport uses its normal delivery guarantee.
    Normal,
}

impl Default for MessagingEffort {
    fn default() -> Self {
        Self::Normal
    }
}

impl MessagingEffort {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BestEffort => "BEST_EFFORT",
            Self::Normal => "NORMAL",
        }
    }
}

impl std::str::FromStr for MessagingEffort {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEST_EFFORT" => Ok(Self::BestEffort),
            "NORMAL" => Ok(Self::Normal),
            _ => Err(DecodeError::InvalidString),
        }
    }
}

impl EncodePacket for MessagingEffort {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(match self {
            Self::BestEffort => 0,
            Self::Normal => 1,
        });
        Ok(1)
    }
}

impl DecodePacket for MessagingEffort {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        match ba.read_byte()? {
            0 => Ok(Self::BestEffort),
            1 => Ok(Self::Normal),
            _ => Err(DecodeError::InvalidString),
        }
    }
}
