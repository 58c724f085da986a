//! Fixed-capacity frame: `[0xFF, 0xFF, id, length, instruction/error, parameters.., checksum]`.

mod recv;

pub use recv::DecodeError;

use crate::{
    alarm::Alarm,
    constants::{BASE_SIZE, HEADER, MAX_PARAMETERS, MAX_SIZE, POISON},
};

const ID: usize = 2;
const LENGTH: usize = 3;
const INSTRUCTION: usize = 4;
const PARAMETERS: usize = BASE_SIZE;

/// Adding parameters would overflow the packet. Nothing was written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError {
    pub requested: usize,
    pub available: usize,
}

impl core::fmt::Display for CapacityError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let Self {
            requested,
            available,
        } = *self;
        write!(
            f,
            "Tried to add {requested} parameter bytes with room for only {available}"
        )
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Packet {
    bytes: [u8; MAX_SIZE],
}

impl Default for Packet {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    /// Empty packet: header only, everything else zero.
    #[inline]
    pub const fn new() -> Self {
        let mut bytes = [0; MAX_SIZE];
        bytes[0] = HEADER[0];
        bytes[1] = HEADER[1];
        Self { bytes }
    }

    /// Reset to a parameterless packet, ready to be built.
    #[inline]
    pub fn init(&mut self, id: u8, instruction: u8) {
        self.bytes = [0; MAX_SIZE];
        self.bytes[..HEADER.len()].copy_from_slice(&HEADER);
        self.bytes[ID] = id;
        self.bytes[LENGTH] = 2;
        self.bytes[INSTRUCTION] = instruction;
    }

    #[inline(always)]
    pub const fn id(&self) -> u8 {
        self.bytes[ID]
    }

    /// Parameter count plus two, as it appears on the wire.
    #[inline(always)]
    pub const fn length(&self) -> u8 {
        self.bytes[LENGTH]
    }

    #[inline(always)]
    pub const fn instruction(&self) -> u8 {
        self.bytes[INSTRUCTION]
    }

    /// The instruction byte read as the error flags of a status packet.
    #[inline(always)]
    pub const fn error(&self) -> Alarm {
        Alarm::from_bits(self.bytes[INSTRUCTION])
    }

    /// Clamped to the buffer, so a garbage length byte can't index out of bounds.
    #[inline]
    pub const fn parameter_count(&self) -> usize {
        let n = self.length().saturating_sub(2) as usize;
        if n > MAX_PARAMETERS { MAX_PARAMETERS } else { n }
    }

    #[inline]
    pub fn parameters(&self) -> &[u8] {
        &self.bytes[PARAMETERS..PARAMETERS + self.parameter_count()]
    }

    /// Bytes on the wire, checksum included.
    #[inline(always)]
    pub const fn size(&self) -> usize {
        BASE_SIZE + self.parameter_count() + 1
    }

    /// Free slots after the parameters, the checksum slot included.
    #[inline]
    pub const fn space_remaining(&self) -> usize {
        let used = self.length().saturating_sub(2) as usize;
        (MAX_PARAMETERS + 1).saturating_sub(used)
    }

    #[inline]
    pub fn add_parameter(&mut self, parameter: u8) -> Result<(), CapacityError> {
        self.add_parameters(&[parameter])
    }

    /// All or nothing.
    #[inline]
    pub fn add_parameters(&mut self, parameters: &[u8]) -> Result<(), CapacityError> {
        let available = self.space_remaining().saturating_sub(1);
        if parameters.len() > available {
            return Err(CapacityError {
                requested: parameters.len(),
                available,
            });
        }
        let start = PARAMETERS + self.parameter_count();
        self.bytes[start..start + parameters.len()].copy_from_slice(parameters);
        self.bytes[LENGTH] += parameters.len() as u8;
        Ok(())
    }

    /// Little-endian.
    #[inline]
    pub fn add_parameter_u16(&mut self, parameter: u16) -> Result<(), CapacityError> {
        self.add_parameters(&parameter.to_le_bytes())
    }

    /// Store the checksum right after the last parameter.
    #[inline]
    pub fn add_checksum(&mut self) -> Result<(), CapacityError> {
        if self.space_remaining() < 1 {
            return Err(CapacityError {
                requested: 1,
                available: 0,
            });
        }
        let index = self.size() - 1;
        self.bytes[index] = self.compute_checksum();
        Ok(())
    }

    #[inline]
    pub fn compute_checksum(&self) -> u8 {
        let sum = self.parameters().iter().fold(
            self.id()
                .wrapping_add(self.length())
                .wrapping_add(self.instruction()),
            |acc, &byte| acc.wrapping_add(byte),
        );
        !sum
    }

    /// The byte currently in the checksum slot.
    #[inline(always)]
    pub const fn checksum(&self) -> u8 {
        self.bytes[self.size() - 1]
    }

    #[inline]
    pub fn checksum_is_ok(&self) -> bool {
        self.compute_checksum() == self.checksum()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.size()]
    }

    /// The whole buffer, for receiving into.
    #[inline(always)]
    pub fn buffer_mut(&mut self) -> &mut [u8; MAX_SIZE] {
        &mut self.bytes
    }

    /// Overwrite the whole buffer with a repeating sentinel.
    #[inline]
    pub fn poison(&mut self) {
        for (byte, &sentinel) in self.bytes.iter_mut().zip(POISON.iter().cycle()) {
            *byte = sentinel;
        }
    }
}

impl core::fmt::Debug for Packet {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02X?}", self.as_bytes())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Packet {
    #[inline]
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]:X}", self.as_bytes())
    }
}
