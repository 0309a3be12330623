//! Hardware boundary: output reports, device handles and discovery.
//!
//! The crate never talks to a HID stack itself. Hosts implement
//! [`Transport`] for one device handle and [`DeviceEnumerator`] for their
//! HID backend; the filtering rule that picks usable interfaces lives here.

use core::fmt;

use crate::config::{PRIMARY_INTERFACE_MARKER, REPORT_HEADER, REPORT_LEN, VENDOR_ID};
use crate::error::TransportError;

/// Trait for abstracting a single device handle.
///
/// Every state change is written as `open`, `send_report`, `close`. Calls are
/// always made under the owning device's transport lock, so an implementation
/// never sees overlapping writes.
pub trait Transport: Send + 'static {
    fn open(&mut self) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;

    /// Transmits one fixed-size output report. Only called while open.
    fn send_report(&mut self, report: &[u8; REPORT_LEN]) -> Result<(), TransportError>;
}

/// Builds the output report carrying `state`.
#[inline]
pub fn report(state: u8) -> [u8; REPORT_LEN] {
    let mut report = [0u8; REPORT_LEN];
    report[..REPORT_LEN - 1].copy_from_slice(&REPORT_HEADER);
    report[REPORT_LEN - 1] = state;
    report
}

/// Description of one enumerated HID interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_name: String,
    pub path: String,
}

impl DeviceInfo {
    /// True when this interface belongs to a supported unit and is the one
    /// that accepts output reports.
    pub fn is_supported(&self) -> bool {
        self.vendor_id == VENDOR_ID && is_primary_interface(&self.path)
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pID=0x{:04x} {}",
            self.product_name, self.product_id, self.path
        )
    }
}

/// Each physical unit enumerates as two interfaces; only one accepts reports.
pub fn is_primary_interface(path: &str) -> bool {
    path.to_ascii_lowercase().contains(PRIMARY_INTERFACE_MARKER)
}

/// Trait for abstracting HID discovery.
pub trait DeviceEnumerator {
    type Transport: Transport;

    /// Lists HID interfaces reported for `vendor_id`, in a stable order.
    fn list(&mut self, vendor_id: u16) -> Result<Vec<DeviceInfo>, TransportError>;

    /// Opens a handle for a listed interface.
    fn connect(&mut self, info: &DeviceInfo) -> Result<Self::Transport, TransportError>;
}

/// Lists the supported interfaces an enumerator can see, in enumeration order.
pub fn supported_devices<E: DeviceEnumerator>(
    enumerator: &mut E,
) -> Result<Vec<DeviceInfo>, TransportError> {
    let devices = enumerator.list(VENDOR_ID)?;
    Ok(devices.into_iter().filter(DeviceInfo::is_supported).collect())
}
