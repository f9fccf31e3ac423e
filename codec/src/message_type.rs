// Copyright (c) 2024 cluster-controller contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::{DecodePacket, EncodePacket};

/// Kind of payload an envelope is carrying.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MessageType {
    Request = 0,
    Reply = 1,
    OneWay = 2,
    SubscriptionRequest = 3,
    SubscriptionReply = 4,
    SubscriptionStop = 5,
    BroadcastSubscriptionRequest = 6,
    MulticastSubscriptionRequest = 7,
    Publication = 8,
    Multicast = 9,
}

impl MessageType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Reply => "reply",
            Self::OneWay => "one-way",
            Self::SubscriptionRequest => "subscription-request",
            Self::SubscriptionReply => "subscription-reply",
            Self::SubscriptionStop => "subscription-stop",
            Self::BroadcastSubscriptionRequest => "broadcast-subscription-request",
            Self::MulticastSubscriptionRequest => "multicast-subscription-request",
            Self::Publication => "publication",
            Self::Multicast => "multicast",
        }
    }

    #[must_use]
    pub const fn is_multicast(self) -> bool {
        matches!(self, Self::Multicast)
    }
}

impl std::str::FromStr for MessageType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "reply" => Ok(Self::Reply),
            "one-way" => Ok(Self::OneWay),
            "subscription-request" => Ok(Self::SubscriptionRequest),
            "subscription-reply" => Ok(Self::SubscriptionReply),
            "subscription-stop" => Ok(Self::SubscriptionStop),
            "broadcast-subscription-request" => Ok(Self::BroadcastSubscriptionRequest),
            "multicast-subscription-request" => Ok(Self::MulticastSubscriptionRequest),
            "publication" => Ok(Self::Publication),
            "multicast" => Ok(Self::Multicast),
            _ => Err(DecodeError::InvalidMessageType),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EncodePacket for MessageType {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(*self as u8);
        Ok(1)
    }
}

impl DecodePacket for MessageType {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let byte = ba.read_byte()?;
        match byte {
            0 => Ok(Self::Request),
            1 => Ok(Self::Reply),
            2 => Ok(Self::OneWay),
            3 => Ok(Self::SubscriptionRequest),
            4 => Ok(Self::SubscriptionReply),
            5 => Ok(Self::SubscriptionStop),
            6 => Ok(Self::BroadcastSubscriptionRequest),
            7 => Ok(Self::MulticastSubscriptionRequest),
            8 => Ok(Self::Publication),
            9 => Ok(Self::Multicast),
            _ => Err(DecodeError::InvalidMessageType),
        }
    }
}
