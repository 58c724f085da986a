#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod bus;
pub mod comm;
pub mod group;
pub mod scan;
pub mod servo;
pub mod worker;

#[cfg(test)]
mod test_util;

pub use {
    bus::{Bus, Completion, IoError, Response},
    comm::Comm,
    fmt::Format,
    group::ServoGroup,
    servo::{Servo, Width},
    worker::{Phase, Timing, Worker},
};
