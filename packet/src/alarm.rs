//! Error byte of a status packet.

/// One bit of the error byte.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(test, derive(Ord, PartialOrd, strum_macros::VariantArray))]
pub enum Flag {
    InputVoltage = 0x01,
    AngleLimit = 0x02,
    Overheating = 0x04,
    Range = 0x08,
    Checksum = 0x10,
    Overload = 0x20,
    Instruction = 0x40,
}

impl Flag {
    #[inline]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InputVoltage => "Input voltage out of the configured range",
            Self::AngleLimit => "Goal position outside the angle limits",
            Self::Overheating => "Internal temperature above the configured limit",
            Self::Range => "Command out of range",
            Self::Checksum => "Device disagrees about the checksum",
            Self::Overload => "Load exceeds the configured maximum torque",
            Self::Instruction => "Undefined instruction, or `Action` without `RegWrite`",
        }
    }
}

pub const ALL: [Flag; 7] = [
    Flag::InputVoltage,
    Flag::AngleLimit,
    Flag::Overheating,
    Flag::Range,
    Flag::Checksum,
    Flag::Overload,
    Flag::Instruction,
];

/// Set of [`Flag`]s, as reported by a device or written to its alarm registers.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alarm(u8);

impl Alarm {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0x7F);

    /// Keeps the seven defined bits; bit 7 is unused on the wire.
    #[inline(always)]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7F)
    }

    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    #[inline(always)]
    pub const fn contains(self, flag: Flag) -> bool {
        self.0 & flag as u8 != 0
    }

    #[inline(always)]
    #[must_use]
    pub const fn with(self, flag: Flag) -> Self {
        Self(self.0 | flag as u8)
    }

    #[inline(always)]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Flags that are set, lowest bit first.
    #[inline]
    pub fn iter(self) -> impl Iterator<Item = Flag> {
        ALL.into_iter().filter(move |&flag| self.contains(flag))
    }
}

impl From<Flag> for Alarm {
    #[inline(always)]
    fn from(flag: Flag) -> Self {
        Self(flag as u8)
    }
}

impl core::fmt::Display for Alarm {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_ok() {
            return write!(f, "no error");
        }
        let mut first = true;
        for flag in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}", flag.description())?;
        }
        Ok(())
    }
}
