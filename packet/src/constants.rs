/// Every frame opens with these two bytes.
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Addresses every device on the line; devices never answer it.
pub const BROADCAST_ID: u8 = 0xFE;

/// Highest individually addressable ID.
pub const MAX_ID: u8 = 0xFD;

/// Header, ID, length, and instruction/error byte.
pub const BASE_SIZE: usize = 5;

pub const MAX_PARAMETERS: usize = 24;

/// Largest possible frame, checksum included.
pub const MAX_SIZE: usize = BASE_SIZE + MAX_PARAMETERS + 1;

/// A status frame that carries no parameters.
pub const STATUS_SIZE: usize = BASE_SIZE + 1;

pub const AX12_MODEL: u16 = 0x000C;
pub const AX18_MODEL: u16 = 0x0012;

/// Written over a receive buffer so a short read can't pass for a stale one.
pub const POISON: [u8; 4] = [0xBA, 0xAD, 0xF0, 0x0D];
