//! Shared test infrastructure for buddy-sequencer integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::sync::{Arc, Mutex};
use std::time::Duration;

use buddy_sequencer::{
    Device, DeviceEnumerator, DeviceInfo, PendingUpdate, REPORT_LEN, TimeSource, Transport,
    TransportError,
};

// ============================================================================
// Mock Time Source
// ============================================================================

/// Virtual clock: time only moves when a test advances it or a worker sleeps.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    current_time: Mutex<Duration>,
}

impl ManualTimeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        *self.current_time.lock().unwrap() += duration;
    }

    pub fn set_time(&self, time: Duration) {
        *self.current_time.lock().unwrap() = time;
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        *self.current_time.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        std::thread::yield_now();
    }
}

/// Clock that moves forward by `tick` every time it is read, like a wall
/// clock observed by a slow caller.
#[derive(Debug)]
pub struct TickingTimeSource {
    tick: Duration,
    current_time: Mutex<Duration>,
}

impl TickingTimeSource {
    pub fn new(tick: Duration) -> Arc<Self> {
        Arc::new(Self {
            tick,
            current_time: Mutex::new(Duration::ZERO),
        })
    }
}

impl TimeSource for TickingTimeSource {
    fn now(&self) -> Duration {
        let mut current_time = self.current_time.lock().unwrap();
        *current_time += self.tick;
        *current_time
    }

    fn sleep(&self, duration: Duration) {
        *self.current_time.lock().unwrap() += duration;
        std::thread::yield_now();
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug, Default)]
struct TransportLog {
    reports: Vec<[u8; REPORT_LEN]>,
    opens: usize,
    closes: usize,
    failures_pending: usize,
    is_open: bool,
}

/// Transport that records every report; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` sends fail with `Disconnected`.
    pub fn fail_next(&self, count: usize) {
        self.log.lock().unwrap().failures_pending = count;
    }

    /// Status bytes successfully sent, oldest first.
    pub fn states(&self) -> Vec<u8> {
        self.log
            .lock()
            .unwrap()
            .reports
            .iter()
            .map(|report| report[REPORT_LEN - 1])
            .collect()
    }

    pub fn reports(&self) -> Vec<[u8; REPORT_LEN]> {
        self.log.lock().unwrap().reports.clone()
    }

    pub fn sent(&self) -> usize {
        self.log.lock().unwrap().reports.len()
    }

    pub fn opens(&self) -> usize {
        self.log.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl Transport for MockTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        log.opens += 1;
        log.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        log.closes += 1;
        log.is_open = false;
        Ok(())
    }

    fn send_report(&mut self, report: &[u8; REPORT_LEN]) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        if !log.is_open {
            return Err(TransportError::NotOpen);
        }
        if log.failures_pending > 0 {
            log.failures_pending -= 1;
            return Err(TransportError::Disconnected);
        }
        log.reports.push(*report);
        Ok(())
    }
}

// ============================================================================
// Mock Enumerator
// ============================================================================

/// Enumerator over a fixed list of interfaces.
pub struct MockEnumerator {
    pub devices: Vec<DeviceInfo>,
    pub connected: Vec<String>,
}

impl MockEnumerator {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices,
            connected: Vec::new(),
        }
    }
}

impl DeviceEnumerator for MockEnumerator {
    type Transport = MockTransport;

    fn list(&mut self, vendor_id: u16) -> Result<Vec<DeviceInfo>, TransportError> {
        Ok(self
            .devices
            .iter()
            .filter(|info| info.vendor_id == vendor_id)
            .cloned()
            .collect())
    }

    fn connect(&mut self, info: &DeviceInfo) -> Result<MockTransport, TransportError> {
        self.connected.push(info.path.clone());
        Ok(MockTransport::new())
    }
}

pub fn hid_info(vendor_id: u16, path: &str) -> DeviceInfo {
    DeviceInfo {
        vendor_id,
        product_id: 0x0001,
        product_name: "i-Buddy".to_string(),
        path: path.to_string(),
    }
}

// ============================================================================
// Test Helper Functions
// ============================================================================

pub type TestDevice = Device<MockTransport, ManualTimeSource>;

/// A device whose worker is held, so queued updates can be inspected.
pub fn paused_device(index: usize, time: &Arc<ManualTimeSource>) -> (TestDevice, MockTransport) {
    start_device(index, time, true)
}

/// A device whose worker runs on virtual time.
pub fn running_device(index: usize, time: &Arc<ManualTimeSource>) -> (TestDevice, MockTransport) {
    start_device(index, time, false)
}

fn start_device(
    index: usize,
    time: &Arc<ManualTimeSource>,
    paused: bool,
) -> (TestDevice, MockTransport) {
    let transport = MockTransport::new();
    let device = Device::builder(transport.clone())
        .index(index)
        .time_source(Arc::clone(time))
        .paused(paused)
        .start()
        .unwrap();
    (device, transport)
}

/// `(at, clear_mask, value)` of every queued update.
pub fn schedule_of(device: &TestDevice) -> Vec<(Duration, u8, u8)> {
    device
        .pending()
        .iter()
        .map(|update: &PendingUpdate| (update.at, update.clear_mask, update.value))
        .collect()
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
