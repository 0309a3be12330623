//! Color space conversion helpers.
//!
//! The indicator can only show the eight corners of the RGB cube. These
//! helpers map arbitrary `palette::Srgb` values (and HSV hues, which are more
//! intuitive for color-wheel style animations) onto that cube and back.

use palette::{FromColor, Hsv, Srgb};

use crate::types::Color;

/// Channels at or above this level are treated as lit.
const LIT_THRESHOLD: f32 = 0.5;

/// RGB for a hue in degrees plus saturation and value in `0.0..=1.0`.
pub fn hsv(degrees: f32, saturation: f32, value: f32) -> Srgb {
    Srgb::from_color(Hsv::new(degrees, saturation, value))
}

/// The fully saturated, full brightness color at `degrees` on the wheel.
/// Feeds [`Device::color_hue`](crate::Device::color_hue).
pub fn hue(degrees: f32) -> Srgb {
    hsv(degrees, 1.0, 1.0)
}

/// Quantizes an RGB color to the nearest indicator color.
///
/// Each channel is thresholded independently; the color bits are active-low
/// red (bit 0), green (bit 1) and blue (bit 2).
pub fn quantize(color: Srgb) -> Color {
    let dark = |channel: f32| u8::from(channel < LIT_THRESHOLD);
    let bits = dark(color.red) | dark(color.green) << 1 | dark(color.blue) << 2;
    Color::from_index(i64::from(bits))
}

/// The RGB color an indicator value displays.
pub fn to_srgb(color: Color) -> Srgb {
    let lit = |bit: u8| if color.value() & bit == 0 { 1.0 } else { 0.0 };
    Srgb::new(lit(0x01), lit(0x02), lit(0x04))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_primaries() {
        assert_eq!(quantize(Srgb::new(1.0, 0.0, 0.0)), Color::Red);
        assert_eq!(quantize(Srgb::new(0.0, 0.9, 0.0)), Color::Green);
        assert_eq!(quantize(Srgb::new(0.1, 0.2, 0.8)), Color::Blue);
        assert_eq!(quantize(Srgb::new(0.0, 0.0, 0.0)), Color::Nothing);
        assert_eq!(quantize(Srgb::new(1.0, 1.0, 1.0)), Color::White);
    }

    #[test]
    fn quantize_secondaries() {
        assert_eq!(quantize(Srgb::new(0.0, 1.0, 1.0)), Color::Cyan);
        assert_eq!(quantize(Srgb::new(1.0, 0.0, 1.0)), Color::Magenta);
        assert_eq!(quantize(Srgb::new(1.0, 1.0, 0.0)), Color::Yellow);
    }

    #[test]
    fn every_color_survives_conversion() {
        for index in 0..8 {
            let color = Color::from_index(index);
            assert_eq!(quantize(to_srgb(color)), color);
        }
    }

    #[test]
    fn hue_wheel_hits_primaries() {
        assert_eq!(quantize(hue(0.0)), Color::Red);
        assert_eq!(quantize(hue(120.0)), Color::Green);
        assert_eq!(quantize(hue(240.0)), Color::Blue);
    }
}
