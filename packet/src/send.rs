//! Instruction packets.
//!
//! Every builder reinitializes the packet, appends its parameters and the
//! checksum, and returns the size of the status packet to wait for
//! (zero when the device won't answer).

use {
    crate::{
        constants::{BROADCAST_ID, MAX_PARAMETERS, STATUS_SIZE},
        packet::{CapacityError, Packet},
    },
    enum_repr::EnumRepr,
};

#[EnumRepr(type = "u8")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Eq, PartialEq)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    Reset = 0x06,
    DigitalReset = 0x07,
    SystemRead = 0x0C,
    SystemWrite = 0x0D,
    SyncWrite = 0x83,
    SyncRegWrite = 0x84,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Capacity(CapacityError),
    /// The reply to this read wouldn't fit in one packet.
    ReplyTooLong { requested: usize },
    /// A sync-write buffer holds fewer bytes than its actuator count implies.
    ShortData { expected: usize, actual: usize },
}

impl From<CapacityError> for Error {
    #[inline(always)]
    fn from(e: CapacityError) -> Self {
        Self::Capacity(e)
    }
}

impl core::fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::Capacity(ref e) => core::fmt::Display::fmt(e, f),
            Self::ReplyTooLong { requested } => write!(
                f,
                "Reading {requested} bytes would need more than {MAX_PARAMETERS} parameters in the reply"
            ),
            Self::ShortData { expected, actual } => write!(
                f,
                "Sync-write needs {expected} bytes of data but got {actual}"
            ),
        }
    }
}

#[inline(always)]
const fn unicast(id: u8, size: usize) -> usize {
    if id == BROADCAST_ID { 0 } else { size }
}

#[inline]
fn simple(packet: &mut Packet, id: u8, instruction: Instruction) -> Result<usize, Error> {
    packet.init(id, instruction.repr());
    let () = packet.add_checksum()?;
    Ok(unicast(id, STATUS_SIZE))
}

#[inline]
fn addressed(
    packet: &mut Packet,
    id: u8,
    instruction: Instruction,
    address: u8,
    data: &[u8],
) -> Result<usize, Error> {
    packet.init(id, instruction.repr());
    let () = packet.add_parameter(address)?;
    let () = packet.add_parameters(data)?;
    let () = packet.add_checksum()?;
    Ok(unicast(id, STATUS_SIZE))
}

#[inline]
pub fn ping(packet: &mut Packet, id: u8) -> Result<usize, Error> {
    simple(packet, id, Instruction::Ping)
}

/// Execute whatever was staged with [`reg_write`].
#[inline]
pub fn action(packet: &mut Packet, id: u8) -> Result<usize, Error> {
    simple(packet, id, Instruction::Action)
}

/// Factory reset.
#[inline]
pub fn reset(packet: &mut Packet, id: u8) -> Result<usize, Error> {
    simple(packet, id, Instruction::Reset)
}

#[inline]
pub fn write(packet: &mut Packet, id: u8, address: u8, data: &[u8]) -> Result<usize, Error> {
    addressed(packet, id, Instruction::Write, address, data)
}

/// Stage a write until the next [`action`].
#[inline]
pub fn reg_write(packet: &mut Packet, id: u8, address: u8, data: &[u8]) -> Result<usize, Error> {
    addressed(packet, id, Instruction::RegWrite, address, data)
}

#[inline]
pub fn read(packet: &mut Packet, id: u8, address: u8, len: u8) -> Result<usize, Error> {
    let requested = usize::from(len);
    if requested > MAX_PARAMETERS {
        return Err(Error::ReplyTooLong { requested });
    }
    packet.init(id, Instruction::Read.repr());
    let () = packet.add_parameters(&[address, len])?;
    let () = packet.add_checksum()?;
    Ok(unicast(id, STATUS_SIZE + requested))
}

#[inline]
pub fn set_register_u8(packet: &mut Packet, id: u8, address: u8, value: u8) -> Result<usize, Error> {
    write(packet, id, address, &[value])
}

#[inline]
pub fn set_register_u16(
    packet: &mut Packet,
    id: u8,
    address: u8,
    value: u16,
) -> Result<usize, Error> {
    write(packet, id, address, &value.to_le_bytes())
}

#[inline]
pub fn read_register_u8(packet: &mut Packet, id: u8, address: u8) -> Result<usize, Error> {
    read(packet, id, address, 1)
}

#[inline]
pub fn read_register_u16(packet: &mut Packet, id: u8, address: u8) -> Result<usize, Error> {
    read(packet, id, address, 2)
}

/// One broadcast frame writing `width` bytes at `address` on each of `n_actuators` devices.
///
/// `data` is `{id, data[0..width]}` repeated per actuator; anything past that is ignored.
#[inline]
pub fn sync_write(
    packet: &mut Packet,
    address: u8,
    data: &[u8],
    n_actuators: usize,
    width: usize,
) -> Result<usize, Error> {
    let Some(expected) = width
        .checked_add(1)
        .and_then(|per_actuator| per_actuator.checked_mul(n_actuators))
    else {
        return Err(Error::Capacity(CapacityError {
            requested: usize::MAX,
            available: MAX_PARAMETERS,
        }));
    };
    if data.len() < expected {
        return Err(Error::ShortData {
            expected,
            actual: data.len(),
        });
    }
    let sync = SyncWrite::init(packet, address, width)?;
    let () = sync.packet.add_parameters(&data[..expected])?;
    sync.end()
}

/// [`sync_write`], one actuator at a time.
pub struct SyncWrite<'packet> {
    packet: &'packet mut Packet,
    width: usize,
}

impl<'packet> SyncWrite<'packet> {
    #[inline]
    pub fn init(packet: &'packet mut Packet, address: u8, width: usize) -> Result<Self, Error> {
        let Ok(width_byte) = u8::try_from(width) else {
            return Err(Error::Capacity(CapacityError {
                requested: width,
                available: MAX_PARAMETERS,
            }));
        };
        packet.init(BROADCAST_ID, Instruction::SyncWrite.repr());
        let () = packet.add_parameters(&[address, width_byte])?;
        Ok(Self { packet, width })
    }

    #[inline(always)]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Append one actuator. Uses exactly `width` bytes of `data`; nothing is added on error.
    #[inline]
    pub fn add_next(&mut self, id: u8, data: &[u8]) -> Result<(), Error> {
        let Some(data) = data.get(..self.width) else {
            return Err(Error::ShortData {
                expected: self.width,
                actual: data.len(),
            });
        };
        let available = self.packet.space_remaining().saturating_sub(1);
        if 1 + data.len() > available {
            return Err(Error::Capacity(CapacityError {
                requested: 1 + data.len(),
                available,
            }));
        }
        let () = self.packet.add_parameter(id)?;
        let () = self.packet.add_parameters(data)?;
        Ok(())
    }

    /// Seal the packet. Sync-write is always broadcast, so there is never a reply.
    #[inline]
    pub fn end(self) -> Result<usize, Error> {
        let () = self.packet.add_checksum()?;
        Ok(0)
    }
}
