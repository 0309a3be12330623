//! Temporal action scheduler for USB-attached actuator toys.
//!
//! Each toy exposes four fields packed into one status byte: a color
//! indicator, a heart light, flapping wings and a turning body. This crate
//! schedules timed partial updates to that byte and plays them out on a
//! dedicated worker thread per device.
//!
//! # Core Concepts
//!
//! - **`Field`** / **`merge`**: the bit-field model; an update clears one field and ORs in a new value
//! - **`ActionQueue`**: per-device min-heap of `PendingUpdate`s, FIFO among equal timestamps
//! - **`VirtualClock`**: per-device cursor that lets gestures chain without timestamp bookkeeping
//! - **`Device`**: façade with the fluent gesture API (`color`, `dance`, `pulse`, `wait`, ...)
//! - **`DeviceGroup`**: ordered fan-out plus choreography (`identify`, `chase`, `reorder`)
//! - **`Action`** / **`parse`**: the one-character-per-action animation notation used by `play`
//! - **`Transport`**: trait to implement for your HID backend
//! - **`TimeSource`**: trait to implement for your timing system
//!
//! ```no_run
//! use std::time::Duration;
//! use buddy_sequencer::{Color, Device, Transport, TransportError, REPORT_LEN};
//!
//! struct Hid;
//!
//! impl Transport for Hid {
//!     fn open(&mut self) -> Result<(), TransportError> { Ok(()) }
//!     fn close(&mut self) -> Result<(), TransportError> { Ok(()) }
//!     fn send_report(&mut self, _report: &[u8; REPORT_LEN]) -> Result<(), TransportError> { Ok(()) }
//! }
//!
//! let device = Device::new(0, Hid).unwrap();
//! device
//!     .color(Color::Red)
//!     .pulse(5, Duration::from_millis(100))
//!     .play("d+g,x", Duration::from_millis(300))
//!     .wait();
//! ```

pub mod clock;
pub mod colors;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod group;
pub mod queue;
pub mod register;
pub mod time;
pub mod transport;
pub mod types;

pub use palette::Srgb;

pub use clock::VirtualClock;
pub use command::{Action, DeviceCommand, Step, parse};
pub use config::{REPORT_LEN, RESET_STATE};
pub use device::{Device, DeviceBuilder};
pub use error::{DeviceError, GroupError, TransportError};
pub use group::DeviceGroup;
pub use queue::{ActionQueue, Interruption, PendingUpdate};
pub use register::{Decoded, Field, assemble, decode, merge};
pub use time::{SystemTimeSource, TimeSource};
pub use transport::{DeviceEnumerator, DeviceInfo, Transport, report};
pub use types::{Color, Heart, Turn, Wings};
