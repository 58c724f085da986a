//! AX-12/AX-18 control table.
//!
//! Two-byte registers are listed once, at the address of their low byte.

pub trait Item {
    const ADDRESS: u8;
    const BYTES: u8;
    const DESCRIPTION: &str;
}

macro_rules! items {
    ($($name:ident: $address:expr, $bytes:expr, $description:expr;)+) => {
        $(
            pub struct $name;
            impl Item for $name {
                const ADDRESS: u8 = $address;
                const BYTES: u8 = $bytes;
                const DESCRIPTION: &str = $description;
            }
        )+
    };
}

// EEPROM
items! {
    ModelNumber: 0x00, 2, "Model Number";
    FirmwareVersion: 0x02, 1, "Version of Firmware";
    Id: 0x03, 1, "ID";
    BaudRate: 0x04, 1, "Baud Rate";
    ReturnDelayTime: 0x05, 1, "Return Delay Time";
    CwAngleLimit: 0x06, 2, "CW Angle Limit";
    CcwAngleLimit: 0x08, 2, "CCW Angle Limit";
    SystemData2: 0x0A, 1, "System Data 2";
    TemperatureLimit: 0x0B, 1, "Highest Limit Temperature";
    MinVoltageLimit: 0x0C, 1, "Lowest Limit Voltage";
    MaxVoltageLimit: 0x0D, 1, "Highest Limit Voltage";
    MaxTorque: 0x0E, 2, "Max Torque";
    StatusReturnLevel: 0x10, 1, "Status Return Level";
    AlarmLed: 0x11, 1, "Alarm LED";
    AlarmShutdown: 0x12, 1, "Alarm Shutdown";
    OperatingMode: 0x13, 1, "Operating Mode";
    DownCalibration: 0x14, 2, "Down Calibration";
    UpCalibration: 0x16, 2, "Up Calibration";
}

// RAM
items! {
    TorqueEnable: 0x18, 1, "Torque Enable";
    Led: 0x19, 1, "LED";
    CwComplianceMargin: 0x1A, 1, "CW Compliance Margin";
    CcwComplianceMargin: 0x1B, 1, "CCW Compliance Margin";
    CwComplianceSlope: 0x1C, 1, "CW Compliance Slope";
    CcwComplianceSlope: 0x1D, 1, "CCW Compliance Slope";
    GoalPosition: 0x1E, 2, "Goal Position";
    MovingSpeed: 0x20, 2, "Moving Speed";
    TorqueLimit: 0x22, 2, "Torque Limit";
    PresentPosition: 0x24, 2, "Present Position";
    PresentSpeed: 0x26, 2, "Present Speed";
    PresentLoad: 0x28, 2, "Present Load";
    PresentVoltage: 0x2A, 1, "Present Voltage";
    PresentTemperature: 0x2B, 1, "Present Temperature";
    RegisteredInstruction: 0x2C, 1, "Registered Instruction";
    PauseTime: 0x2D, 1, "Pause Time";
    Moving: 0x2E, 1, "Moving";
    Lock: 0x2F, 1, "Lock";
    Punch: 0x30, 2, "Punch";
}

/// Last RAM address.
pub const END: u8 = 0x31;

/// Values of the `BaudRate` register (`2_000_000 / (value + 1)` bps).
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Baud {
    Baud1000000 = 0x01,
    Baud500000 = 0x03,
    Baud400000 = 0x04,
    Baud250000 = 0x07,
    Baud200000 = 0x09,
    Baud115200 = 0x10,
    Baud57600 = 0x22,
    Baud19200 = 0x67,
    Baud9600 = 0xCF,
}

impl Baud {
    /// Nominal bits per second for this register value.
    #[inline]
    pub const fn bps(self) -> u32 {
        2_000_000 / (self as u32 + 1)
    }
}

/// Values of the `StatusReturnLevel` register.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReturnLevel {
    Never = 0,
    ReadData = 1,
    Always = 2,
}
