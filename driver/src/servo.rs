use ax_packet::{Alarm, constants::MAX_ID};

/// How many bytes a servo has staged.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    Byte = 1,
    Word = 2,
}

impl Width {
    #[inline(always)]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

/// One device on the line, plus the register access staged for it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Servo {
    id: u8,
    last_error: Alarm,
    address: u8,
    data: [u8; 2],
    width: Width,
    selected: bool,
}

impl Servo {
    /// # Panics
    /// If `id` is the broadcast ID (at compile time when used in a `const`).
    #[inline]
    pub const fn new(id: u8) -> Self {
        match Self::try_new(id) {
            Some(servo) => servo,
            None => panic!("Servo IDs must be individually addressable (0..=253)"),
        }
    }

    #[inline]
    pub const fn try_new(id: u8) -> Option<Self> {
        if id > MAX_ID {
            return None;
        }
        Some(Self {
            id,
            last_error: Alarm::NONE,
            address: 0,
            data: [0; 2],
            width: Width::Byte,
            selected: false,
        })
    }

    /// Stage a one-byte access and select this servo. For reads, `value` is ignored.
    #[inline]
    pub fn prepare_u8(&mut self, address: u8, value: u8) {
        self.selected = true;
        self.address = address;
        self.width = Width::Byte;
        self.data = [value, 0];
    }

    /// Stage a two-byte access and select this servo. For reads, `value` is ignored.
    #[inline]
    pub fn prepare_u16(&mut self, address: u8, value: u16) {
        self.selected = true;
        self.address = address;
        self.width = Width::Word;
        self.data = value.to_le_bytes();
    }

    #[inline(always)]
    pub fn select(&mut self, selected: bool) {
        self.selected = selected;
    }

    #[inline(always)]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[inline(always)]
    pub const fn address(&self) -> u8 {
        self.address
    }

    #[inline(always)]
    pub const fn width(&self) -> Width {
        self.width
    }

    /// The staged bytes, `width` of them.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.width.bytes()]
    }

    #[inline(always)]
    pub const fn data_u8(&self) -> u8 {
        self.data[0]
    }

    #[inline(always)]
    pub const fn data_u16(&self) -> u16 {
        u16::from_le_bytes(self.data)
    }

    #[inline(always)]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    /// Error byte of the last status packet read from this servo.
    #[inline(always)]
    pub const fn last_error(&self) -> Alarm {
        self.last_error
    }

    /// Store bytes read back from the staged address.
    #[inline]
    pub(crate) fn store(&mut self, data: &[u8], error: Alarm) {
        let n = data.len().min(self.width.bytes());
        self.data[..n].copy_from_slice(&data[..n]);
        self.last_error = error;
    }

    #[inline(always)]
    pub(crate) fn set_last_error(&mut self, error: Alarm) {
        self.last_error = error;
    }
}
