use core::fmt::{self, Display, Formatter};

use bitfield_struct::bitfield;
use bitflags::bitflags;

/// Size in bytes of one radio control packet.
pub const PACKET_SIZE: usize = 7;
/// Number of analog stick axes carried by a packet.
pub const STICK_AXIS_COUNT: usize = 4;
/// Raw value of a centered stick axis.
pub const STICK_CENTER: u8 = 127;

const TRIM_BYTE: usize = 4;
const RESERVED_BYTE: usize = 5;
const FLAGS_BYTE: usize = 6;

/// Flag byte of the control packet, bit 0 first.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ControlFlags {
    pub abort: bool,
    pub standby: bool,
    pub light: bool,
    #[bits(5)]
    __: u8,
}

bitflags! {
    /// Discrete buttons decoded from a packet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StickButtons: u8 {
        const ABORT = 1 << 0;
        const STANDBY = 1 << 1;
        const LIGHT = 1 << 2;
    }
}

impl From<ControlFlags> for StickButtons {
    fn from(flags: ControlFlags) -> Self {
        StickButtons::from_bits_truncate(flags.into_bits())
    }
}

/// Raw control packet as sent by the hand controller.
///
/// Stick bytes are offset-binary around [`STICK_CENTER`] in the order
/// roll, pitch, throttle, yaw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerPacket {
    pub axes: [u8; STICK_AXIS_COUNT],
    pub trim: u8,
    pub reserved: u8,
    pub flags: ControlFlags,
}

impl ControllerPacket {
    pub const fn from_bytes(bytes: [u8; PACKET_SIZE]) -> Self {
        ControllerPacket {
            axes: [bytes[0], bytes[1], bytes[2], bytes[3]],
            trim: bytes[TRIM_BYTE],
            reserved: bytes[RESERVED_BYTE],
            flags: ControlFlags::from_bits(bytes[FLAGS_BYTE]),
        }
    }

    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut bytes = [0_u8; PACKET_SIZE];
        bytes[..STICK_AXIS_COUNT].copy_from_slice(&self.axes);
        bytes[TRIM_BYTE] = self.trim;
        bytes[RESERVED_BYTE] = self.reserved;
        bytes[FLAGS_BYTE] = self.flags.into_bits();
        bytes
    }

    pub fn buttons(&self) -> StickButtons {
        StickButtons::from(self.flags)
    }
}

impl TryFrom<&[u8]> for ControllerPacket {
    type Error = PacketError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PACKET_SIZE] =
            value.try_into().map_err(|_| PacketError::WrongLength {
                expected: PACKET_SIZE,
                found: value.len(),
            })?;
        Ok(Self::from_bytes(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    WrongLength { expected: usize, found: usize },
}

impl Display for PacketError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            PacketError::WrongLength { expected, found } => {
                write!(f, "control packet must be {} bytes, got {}", expected, found)
            }
        }
    }
}

impl std::error::Error for PacketError {}
