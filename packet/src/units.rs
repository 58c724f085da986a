//! Register values to and from physical units.
//!
//! Nothing here clamps: anything out of range is an error.

use core::f32::consts::PI;

/// Full travel of the position registers.
pub const MAX_ANGLE: u16 = 1023;
pub const MAX_ANGLE_DEG: f32 = 300.;
pub const MAX_ANGLE_RAD: f32 = MAX_ANGLE_DEG * PI / 180.;

/// Speed magnitude in the moving/present speed registers.
pub const MAX_SPEED: u16 = 0x3FF;
pub const MAX_SPEED_RPM: f32 = 114.;
pub const MAX_SPEED_RADPS: f32 = MAX_SPEED_RPM * 2. * PI / 60.;

/// Bit 10 of a speed register: set means clockwise.
pub const DIRECTION_MASK: u16 = 1 << 10;

pub const RETURN_DELAY_US_PER_UNIT: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DomainError {
    NotANumber,
    /// Register value above its maximum.
    Register { value: u16, max: u16 },
    /// Physical value outside `0..=max`.
    Physical { value: f32, max: f32 },
}

impl core::fmt::Display for DomainError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::NotANumber => write!(f, "Tried to convert NaN"),
            Self::Register { value, max } => {
                write!(f, "Register value {value} is above its maximum of {max}")
            }
            Self::Physical { value, max } => write!(f, "{value} is outside 0..={max}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Ccw,
    Cw,
}

#[inline]
fn register(value: u16, max: u16) -> Result<f32, DomainError> {
    if value > max {
        return Err(DomainError::Register { value, max });
    }
    Ok(f32::from(value) / f32::from(max))
}

/// Scale `value / max_physical` onto `0..=max`, rounding to nearest.
#[inline]
fn physical(value: f32, max_physical: f32, max: u16) -> Result<u16, DomainError> {
    if value.is_nan() {
        return Err(DomainError::NotANumber);
    }
    if !(0. ..=max_physical).contains(&value) {
        return Err(DomainError::Physical {
            value,
            max: max_physical,
        });
    }
    let scaled = (value / max_physical * f32::from(max) + 0.5) as u16;
    Ok(scaled.min(max))
}

#[inline]
pub fn angle_to_deg(angle: u16) -> Result<f32, DomainError> {
    Ok(register(angle, MAX_ANGLE)? * MAX_ANGLE_DEG)
}

#[inline]
pub fn angle_to_rad(angle: u16) -> Result<f32, DomainError> {
    Ok(register(angle, MAX_ANGLE)? * MAX_ANGLE_RAD)
}

#[inline]
pub fn deg_to_angle(deg: f32) -> Result<u16, DomainError> {
    physical(deg, MAX_ANGLE_DEG, MAX_ANGLE)
}

#[inline]
pub fn rad_to_angle(rad: f32) -> Result<u16, DomainError> {
    physical(rad, MAX_ANGLE_RAD, MAX_ANGLE)
}

/// Magnitude only; see [`with_direction`].
#[inline]
pub fn rpm_to_speed(rpm: f32) -> Result<u16, DomainError> {
    physical(rpm, MAX_SPEED_RPM, MAX_SPEED)
}

#[inline]
pub fn radps_to_speed(radps: f32) -> Result<u16, DomainError> {
    physical(radps, MAX_SPEED_RADPS, MAX_SPEED)
}

/// Ignores the direction bit.
#[inline]
pub fn speed_to_rpm(speed: u16) -> Result<f32, DomainError> {
    Ok(register(speed & !DIRECTION_MASK, MAX_SPEED)? * MAX_SPEED_RPM)
}

/// Ignores the direction bit.
#[inline]
pub fn speed_to_radps(speed: u16) -> Result<f32, DomainError> {
    Ok(register(speed & !DIRECTION_MASK, MAX_SPEED)? * MAX_SPEED_RADPS)
}

#[inline]
pub fn with_direction(speed: u16, direction: Direction) -> Result<u16, DomainError> {
    if speed > MAX_SPEED {
        return Err(DomainError::Register {
            value: speed,
            max: MAX_SPEED,
        });
    }
    Ok(match direction {
        Direction::Ccw => speed,
        Direction::Cw => speed | DIRECTION_MASK,
    })
}

/// Split a speed or load register into magnitude and direction.
#[inline]
pub const fn direction(speed: u16) -> (u16, Direction) {
    let direction = if speed & DIRECTION_MASK == 0 {
        Direction::Ccw
    } else {
        Direction::Cw
    };
    (speed & !DIRECTION_MASK, direction)
}

/// Rounds down to an even number of microseconds.
#[inline]
pub fn us_to_return_delay(us: u16) -> Result<u8, DomainError> {
    u8::try_from(us / RETURN_DELAY_US_PER_UNIT).map_err(|_| DomainError::Register {
        value: us,
        max: u16::from(u8::MAX) * RETURN_DELAY_US_PER_UNIT,
    })
}

#[inline(always)]
pub fn return_delay_to_us(value: u8) -> u16 {
    u16::from(value) * RETURN_DELAY_US_PER_UNIT
}
