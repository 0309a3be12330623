//! Field values for the four actuators packed into the status byte.

use crate::error::DeviceError;

/// Lookup table for [`Color::from_initial`]; position equals field value.
const COLOR_INITIALS: &str = "wcmbygrn";

/// Main indicator color.
///
/// The three color bits are active-low red, green and blue, so `White` (all
/// lit) is zero and `Nothing` (all dark) is seven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Color {
    White = 0,
    Cyan = 1,
    Magenta = 2,
    Blue = 3,
    Yellow = 4,
    Green = 5,
    Red = 6,
    Nothing = 7,
}

impl Color {
    /// Alias used by the chase palette and `flash`.
    pub const BLACK: Color = Color::Nothing;

    const ALL: [Color; 8] = [
        Color::White,
        Color::Cyan,
        Color::Magenta,
        Color::Blue,
        Color::Yellow,
        Color::Green,
        Color::Red,
        Color::Nothing,
    ];

    /// Builds a color from a field value, clamping into `0..=7`.
    pub fn from_index(index: i64) -> Self {
        Self::ALL[index.clamp(0, 7) as usize]
    }

    /// Decodes the raw 3-bit field value.
    pub(crate) fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 0x07) as usize]
    }

    /// Looks a color up by the first character of `name` (`"red"`, `"r"`).
    ///
    /// Unknown or empty names fall back to white.
    pub fn from_initial(name: &str) -> Self {
        Self::try_from_initial(name).unwrap_or(Color::White)
    }

    /// Strict variant of [`Color::from_initial`].
    pub fn try_from_initial(name: &str) -> Result<Self, DeviceError> {
        name.chars()
            .next()
            .map(|c| c.to_ascii_lowercase())
            .and_then(|c| COLOR_INITIALS.find(c))
            .map(|index| Self::ALL[index])
            .ok_or_else(|| DeviceError::UnknownColor(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Cyan => "cyan",
            Color::Magenta => "magenta",
            Color::Blue => "blue",
            Color::Yellow => "yellow",
            Color::Green => "green",
            Color::Red => "red",
            Color::Nothing => "nothing",
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<i64> for Color {
    fn from(index: i64) -> Self {
        Color::from_index(index)
    }
}

impl From<&str> for Color {
    fn from(name: &str) -> Self {
        Color::from_initial(name)
    }
}

/// Secondary (heart) indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Heart {
    Show = 0,
    Hide = 1,
}

impl Heart {
    pub fn from_value(value: i64) -> Self {
        if value.clamp(0, 1) == 0 { Heart::Show } else { Heart::Hide }
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        if bits & 0x01 == 0 { Heart::Show } else { Heart::Hide }
    }

    pub fn name(self) -> &'static str {
        match self {
            Heart::Show => "heart",
            Heart::Hide => "",
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<i64> for Heart {
    fn from(value: i64) -> Self {
        Heart::from_value(value)
    }
}

impl From<bool> for Heart {
    fn from(show: bool) -> Self {
        if show { Heart::Show } else { Heart::Hide }
    }
}

/// Wing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Wings {
    Both = 0,
    Pull = 1,
    Push = 2,
    Neutral = 3,
}

impl Wings {
    const ALL: [Wings; 4] = [Wings::Both, Wings::Pull, Wings::Push, Wings::Neutral];

    pub fn from_value(value: i64) -> Self {
        Self::ALL[value.clamp(0, 3) as usize]
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 0x03) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Wings::Both => "flaps both",
            Wings::Pull => "pull",
            Wings::Push => "push",
            Wings::Neutral => "",
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<i64> for Wings {
    fn from(value: i64) -> Self {
        Wings::from_value(value)
    }
}

/// Body turn position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Turn {
    Both = 0,
    Left = 1,
    Right = 2,
    Neutral = 3,
}

impl Turn {
    const ALL: [Turn; 4] = [Turn::Both, Turn::Left, Turn::Right, Turn::Neutral];

    pub fn from_value(value: i64) -> Self {
        Self::ALL[value.clamp(0, 3) as usize]
    }

    pub(crate) fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & 0x03) as usize]
    }

    /// The other direction; `Both` and `Neutral` swap with each other.
    pub fn opposite(self) -> Self {
        Self::from_bits(self.value() ^ 0x03)
    }

    /// True for `Left` and `Right`, the only values remembered for `buzz`.
    pub fn is_direction(self) -> bool {
        matches!(self, Turn::Left | Turn::Right)
    }

    pub fn name(self) -> &'static str {
        match self {
            Turn::Both => "turn both",
            Turn::Left => "left",
            Turn::Right => "right",
            Turn::Neutral => "",
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<i64> for Turn {
    fn from(value: i64) -> Self {
        Turn::from_value(value)
    }
}
