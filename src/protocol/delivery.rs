//! Delivery channel policy.
//!
//! Two channels exist. Channel 0 carries reliable, ordered traffic and
//! channel 1 carries unreliable, unsequenced traffic. The mapping is a pure
//! function so the same intent always lands on the same channel.

use crate::transport::PacketFlags;

/// Channel carrying reliable, ordered packets
pub const RELIABLE_CHANNEL: u8 = 0;

/// Channel carrying unreliable, unsequenced packets
pub const UNRELIABLE_CHANNEL: u8 = 1;

/// Number of channels every host allocates
pub const CHANNEL_COUNT: u8 = 2;

/// Delivery guarantee requested by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryType {
    /// Delivered exactly once, in send order
    Reliable,
    /// May be dropped or reordered
    Unreliable,
}

/// Transport channel and flags a packet is sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRoute {
    pub channel: u8,
    pub flags: PacketFlags,
}

impl DeliveryType {
    /// Resolve the channel and transport flags for this delivery type
    pub const fn route(self) -> ChannelRoute {
        match self {
            DeliveryType::Reliable => ChannelRoute {
                channel: RELIABLE_CHANNEL,
                flags: PacketFlags::RELIABLE,
            },
            DeliveryType::Unreliable => ChannelRoute {
                channel: UNRELIABLE_CHANNEL,
                flags: PacketFlags::UNSEQUENCED,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeliveryType::Reliable => "reliable",
            DeliveryType::Unreliable => "unreliable",
        }
    }
}
