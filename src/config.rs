//! Protocol constants and compile-time configuration.
//!
//! Bit-field layout, report framing, discovery filters and gesture defaults
//! live here so they can be tuned in one place.

use core::time::Duration;

// Composite state byte

/// Value of the status byte with every field at its off/neutral position.
pub const RESET_STATE: u8 = 0xff;

/// Bits kept when writing the heart field (the field occupies bit 7).
pub const HEART_MASK: u8 = 0x7f;
pub const HEART_SHIFT: u8 = 7;

/// Bits kept when writing the color field (the field occupies bits 4-6).
pub const COLOR_MASK: u8 = 0x8f;
pub const COLOR_SHIFT: u8 = 4;

/// Bits kept when writing the wing field (the field occupies bits 2-3).
pub const FLAP_MASK: u8 = 0xf3;
pub const FLAP_SHIFT: u8 = 2;

/// Bits kept when writing the turn field (the field occupies bits 0-1).
pub const TURN_MASK: u8 = 0xfc;
pub const TURN_SHIFT: u8 = 0;

// USB

/// Length of the output report sent for every state change.
pub const REPORT_LEN: usize = 9;

/// Fixed report prefix; the status byte is appended as the last byte.
pub const REPORT_HEADER: [u8; REPORT_LEN - 1] = [0x00, 0x55, 0x53, 0x42, 0x43, 0x00, 0x40, 0x02];

/// Vendor id shared by every supported unit.
pub const VENDOR_ID: u16 = 0x1130;

/// Each physical unit enumerates twice; only the interface whose path carries
/// this marker accepts output reports.
pub const PRIMARY_INTERFACE_MARKER: &str = "&mi_01#";

// Gesture defaults

pub const DANCE_COUNT: u32 = 10;
pub const DANCE_DELAY: Duration = Duration::from_millis(200);

pub const FLY_COUNT: u32 = 10;
pub const FLY_DELAY: Duration = Duration::from_millis(100);

pub const BUZZ_COUNT: u32 = 30;
pub const BUZZ_DELAY: Duration = Duration::from_millis(20);

pub const PULSE_COUNT: u32 = 30;
pub const PULSE_DELAY: Duration = Duration::from_millis(100);

pub const FLASH_COUNT: u32 = 30;
pub const FLASH_DELAY: Duration = Duration::from_millis(10);

// Choreography

/// Spacing of the identification pulses.
pub const IDENTIFY_PULSE_DELAY: Duration = Duration::from_millis(700);

/// Number of frames a chase runs for.
pub const CHASE_FRAMES: u32 = 100;

/// Time between chase frames.
pub const CHASE_FRAME_DELAY: Duration = Duration::from_millis(700);

// Worker

/// Longest single sleep the worker takes while waiting for an update to fall
/// due; cancellation is checked between slices.
pub const WORKER_SLEEP_SLICE: Duration = Duration::from_millis(25);
