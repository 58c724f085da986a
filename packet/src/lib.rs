#![cfg_attr(not(test), no_std)]

pub mod alarm;
pub mod constants;
pub mod control_table;
pub mod packet;
pub mod send;
pub mod units;

pub use {alarm::Alarm, packet::Packet};
