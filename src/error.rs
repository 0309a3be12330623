//! Error types.
//!
//! Gesture inputs are clamped rather than rejected, so errors only arise at
//! the hardware boundary, on a torn-down device, or from group validation.

use thiserror::Error;

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("device handle is not open")]
    NotOpen,

    #[error("device disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a single device.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The device has been shut down and no longer accepts work.
    #[error("device has been shut down")]
    ShutDown,

    #[error("unknown color initial in {0:?}")]
    UnknownColor(String),

    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised by group operations.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("expected {expected} labels, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A label is out of range or repeated after offset normalization.
    #[error("label {label} does not form a permutation")]
    NotAPermutation { label: i64 },

    #[error("no device at position {0}")]
    NoSuchDevice(usize),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
