use {
    super::{LENGTH, Packet},
    crate::constants::{BASE_SIZE, HEADER, MAX_PARAMETERS},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Fewer bytes than the frame claims.
    Truncated { expected: usize, actual: usize },
    Header([u8; 2]),
    Length(u8),
    Checksum { expected: u8, actual: u8 },
}

impl core::fmt::Display for DecodeError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::Truncated { expected, actual } => {
                write!(f, "Expected {expected} bytes but got {actual}")
            }
            Self::Header(bytes) => write!(f, "Invalid header: {bytes:02X?}"),
            Self::Length(length) => write!(f, "Invalid length byte: {length}"),
            Self::Checksum { expected, actual } => write!(
                f,
                "Checksum mismatch: computed {expected:02X} but received {actual:02X}"
            ),
        }
    }
}

impl Packet {
    /// Decode the frame at the start of `bytes`. Anything after it is ignored.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < BASE_SIZE + 1 {
            return Err(DecodeError::Truncated {
                expected: BASE_SIZE + 1,
                actual: bytes.len(),
            });
        }
        if bytes[..2] != HEADER {
            return Err(DecodeError::Header([bytes[0], bytes[1]]));
        }
        let length = bytes[LENGTH];
        if !(2..=MAX_PARAMETERS as u8 + 2).contains(&length) {
            return Err(DecodeError::Length(length));
        }
        let size = BASE_SIZE + length as usize - 1;
        if bytes.len() < size {
            return Err(DecodeError::Truncated {
                expected: size,
                actual: bytes.len(),
            });
        }
        let mut packet = Packet::new();
        packet.bytes[..size].copy_from_slice(&bytes[..size]);
        let expected = packet.compute_checksum();
        let actual = packet.checksum();
        if expected != actual {
            return Err(DecodeError::Checksum { expected, actual });
        }
        Ok(packet)
    }
}
