//! Log macros that compile to nothing without the `defmt` feature,
//! so host builds don't need a global logger.
//!
//! Declared first in `lib.rs` with `#[macro_use]`, so every later module sees them.

#![allow(unused_macros)]

macro_rules! log {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::$level!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! trace {
    ($($arg:tt)*) => { log!(trace, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { log!(debug, $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { log!(info, $($arg)*) };
}

macro_rules! warn {
    ($($arg:tt)*) => { log!(warn, $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { log!(error, $($arg)*) };
}

/// Anything the log macros can print.
#[cfg(feature = "defmt")]
pub trait Format: defmt::Format {}
#[cfg(feature = "defmt")]
impl<T: defmt::Format + ?Sized> Format for T {}

#[cfg(not(feature = "defmt"))]
pub trait Format {}
#[cfg(not(feature = "defmt"))]
impl<T: ?Sized> Format for T {}
