//! Bit-field model of the composite status byte.
//!
//! A partial update is a `(clear_mask, value)` pair: the mask keeps every bit
//! outside the target field and `value` is the field value already shifted
//! into position. Applying it is [`merge`]. Nothing here performs I/O.

use core::fmt;

use crate::config::{
    COLOR_MASK, COLOR_SHIFT, FLAP_MASK, FLAP_SHIFT, HEART_MASK, HEART_SHIFT, TURN_MASK, TURN_SHIFT,
};
use crate::types::{Color, Heart, Turn, Wings};

/// One of the four fields packed into the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Heart,
    Color,
    Flap,
    Turn,
}

impl Field {
    /// Mask of the bits preserved when this field is written.
    #[inline]
    pub const fn clear_mask(self) -> u8 {
        match self {
            Field::Heart => HEART_MASK,
            Field::Color => COLOR_MASK,
            Field::Flap => FLAP_MASK,
            Field::Turn => TURN_MASK,
        }
    }

    #[inline]
    pub const fn shift(self) -> u8 {
        match self {
            Field::Heart => HEART_SHIFT,
            Field::Color => COLOR_SHIFT,
            Field::Flap => FLAP_SHIFT,
            Field::Turn => TURN_SHIFT,
        }
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max(self) -> u8 {
        !self.clear_mask() >> self.shift()
    }

    /// Clamps `value` into the field's range and shifts it into position.
    #[inline]
    pub fn encode(self, value: u8) -> u8 {
        value.min(self.max()) << self.shift()
    }

    /// Reads the field's raw value out of `state`.
    #[inline]
    pub fn extract(self, state: u8) -> u8 {
        (state & !self.clear_mask()) >> self.shift()
    }
}

/// Applies a partial update: clears the target field, then ORs in the new value.
#[inline]
pub fn merge(state: u8, clear_mask: u8, value: u8) -> u8 {
    (state & clear_mask) | value
}

/// Composes a full status byte from individual field values.
pub fn assemble(color: Color, heart: Heart, wings: Wings, turn: Turn) -> u8 {
    Field::Color.encode(color.value())
        | Field::Heart.encode(heart.value())
        | Field::Flap.encode(wings.value())
        | Field::Turn.encode(turn.value())
}

/// Splits a status byte into its fields.
pub fn decode(state: u8) -> Decoded {
    Decoded {
        color: Color::from_bits(Field::Color.extract(state)),
        heart: Heart::from_bits(Field::Heart.extract(state)),
        wings: Wings::from_bits(Field::Flap.extract(state)),
        turn: Turn::from_bits(Field::Turn.extract(state)),
    }
}

/// Field-by-field view of a status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Decoded {
    pub color: Color,
    pub heart: Heart,
    pub wings: Wings,
    pub turn: Turn,
}

impl Decoded {
    /// Re-encodes the fields into a status byte.
    pub fn assemble(&self) -> u8 {
        assemble(self.color, self.heart, self.wings, self.turn)
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.color.name(),
            self.heart.name(),
            self.wings.name(),
            self.turn.name()
        )
    }
}
