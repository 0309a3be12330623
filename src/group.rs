//! Ordered groups of devices and multi-device choreography.
//!
//! A [`DeviceGroup`] holds shared handles to devices; reordering or slicing a
//! group never copies device state. Fan-out methods call the matching
//! [`Device`] method on every member in order and only enqueue work, so
//! effects across devices line up by timestamp, not by a shared barrier.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use palette::Srgb;

use crate::command::DeviceCommand;
use crate::config::{
    CHASE_FRAME_DELAY, CHASE_FRAMES, DANCE_COUNT, DANCE_DELAY, IDENTIFY_PULSE_DELAY,
};
use crate::device::Device;
use crate::error::{DeviceError, GroupError};
use crate::time::{SystemTimeSource, TimeSource};
use crate::transport::{DeviceEnumerator, Transport, supported_devices};
use crate::types::{Color, Heart, Turn, Wings};

/// Longest chase palette: white, cyan, blue, black.
const MAX_CHASE_PALETTE: usize = 4;

/// Manages an ordered set of devices for coordinated control.
///
/// # Type Parameters
/// * `T` - Transport implementation (same for every member)
/// * `S` - Time source implementation
pub struct DeviceGroup<T: Transport, S: TimeSource = SystemTimeSource> {
    devices: Vec<Arc<Device<T, S>>>,
}

impl<T: Transport> DeviceGroup<T> {
    /// Builds a group from every supported unit the enumerator can see, on
    /// the wall clock.
    ///
    /// # Errors
    /// Fails if listing or connecting fails, or a worker cannot start.
    pub fn discover<E>(enumerator: &mut E) -> Result<Self, DeviceError>
    where
        E: DeviceEnumerator<Transport = T>,
    {
        Self::discover_with(enumerator, Arc::new(SystemTimeSource::new()))
    }
}

impl<T: Transport, S: TimeSource> DeviceGroup<T, S> {
    /// Creates a new empty group.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// [`discover`](DeviceGroup::discover) with an explicit time source,
    /// shared by every member.
    pub fn discover_with<E>(enumerator: &mut E, time_source: Arc<S>) -> Result<Self, DeviceError>
    where
        E: DeviceEnumerator<Transport = T>,
    {
        let mut group = Self::new();
        for (index, info) in supported_devices(enumerator)?.into_iter().enumerate() {
            let transport = enumerator.connect(&info)?;
            let device = Device::builder(transport)
                .index(index)
                .info(info)
                .time_source(Arc::clone(&time_source))
                .start()?;
            group.push(device);
        }

        tracing::info!(count = group.len(), "devices discovered");
        Ok(group)
    }

    /// Appends a device, taking ownership of it.
    pub fn push(&mut self, device: Device<T, S>) {
        self.devices.push(Arc::new(device));
    }

    /// Appends a device already shared elsewhere.
    pub fn push_shared(&mut self, device: Arc<Device<T, S>>) {
        self.devices.push(device);
    }

    pub fn get(&self, position: usize) -> Option<&Arc<Device<T, S>>> {
        self.devices.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device<T, S>>> {
        self.devices.iter()
    }

    /// Returns the number of devices in the group.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns true if the group contains no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// A new group over a contiguous slice of this one's members.
    ///
    /// Out-of-range bounds are clamped to the group.
    pub fn subgroup(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.devices.len());
        let start = range.start.min(end);
        self.devices[start..end].iter().cloned().collect()
    }

    /// Routes a command to the device at `command.position`.
    ///
    /// # Errors
    /// `NoSuchDevice` if the position is out of range.
    pub fn handle_command(&self, command: DeviceCommand) -> Result<(), GroupError> {
        let device = self
            .devices
            .get(command.position)
            .ok_or(GroupError::NoSuchDevice(command.position))?;
        device.handle_action(command.action);
        Ok(())
    }

    fn each(&self, mut f: impl FnMut(&Device<T, S>)) -> &Self {
        for device in &self.devices {
            f(device.as_ref());
        }
        self
    }

    // Fan-out

    pub fn color(&self, color: impl Into<Color>) -> &Self {
        let color = color.into();
        self.each(|device| {
            device.color(color);
        })
    }

    pub fn color_rgb(&self, color: Srgb) -> &Self {
        self.each(|device| {
            device.color_rgb(color);
        })
    }

    pub fn color_hue(&self, degrees: f32) -> &Self {
        self.each(|device| {
            device.color_hue(degrees);
        })
    }

    pub fn heart(&self, heart: impl Into<Heart>) -> &Self {
        let heart = heart.into();
        self.each(|device| {
            device.heart(heart);
        })
    }

    pub fn wings(&self, wings: impl Into<Wings>) -> &Self {
        let wings = wings.into();
        self.each(|device| {
            device.wings(wings);
        })
    }

    pub fn turn(&self, turn: impl Into<Turn>) -> &Self {
        let turn = turn.into();
        self.each(|device| {
            device.turn(turn);
        })
    }

    pub fn dance(&self, count: u32, delay: Duration) -> &Self {
        self.each(|device| {
            device.dance(count, delay);
        })
    }

    pub fn fly(&self, count: u32, delay: Duration) -> &Self {
        self.each(|device| {
            device.fly(count, delay);
        })
    }

    pub fn buzz(&self, count: u32, delay: Duration) -> &Self {
        self.each(|device| {
            device.buzz(count, delay);
        })
    }

    pub fn pulse(&self, count: u32, delay: Duration) -> &Self {
        self.each(|device| {
            device.pulse(count, delay);
        })
    }

    pub fn flash(&self, count: u32, delay: Duration, color: Color) -> &Self {
        self.each(|device| {
            device.flash(count, delay, color);
        })
    }

    pub fn delay(&self, by: Duration) -> &Self {
        self.each(|device| {
            device.delay(by);
        })
    }

    /// Interprets an animation string on every member independently.
    pub fn play(&self, script: &str, delay: Duration) -> &Self {
        self.each(|device| {
            device.play(script, delay);
        })
    }

    pub fn discard(&self) -> &Self {
        self.each(|device| {
            device.discard();
        })
    }

    pub fn reset(&self) -> &Self {
        self.each(|device| {
            device.reset();
        })
    }

    pub fn pause(&self) -> &Self {
        self.each(|device| {
            device.pause();
        })
    }

    pub fn resume(&self) -> &Self {
        self.each(|device| {
            device.resume();
        })
    }

    /// Blocks until every member has drained its queue.
    pub fn wait(&self) -> &Self {
        self.each(|device| {
            device.wait();
        })
    }

    /// Bounded [`wait`](Self::wait) over the whole group. Returns `true` if
    /// every member drained before the deadline.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.devices.iter().all(|device| {
            let remaining = deadline.saturating_duration_since(Instant::now());
            device.wait_timeout(remaining)
        })
    }

    /// Shuts down every member's worker.
    pub fn shutdown(&self) {
        for device in &self.devices {
            device.shutdown();
        }
    }

    // Choreography

    /// Lets an operator map positions to physical units: device `i`
    /// (counting from one) shows color `i` and pulses `i` times, then each
    /// device dances in turn. Blocks until done.
    pub fn identify(&self) -> &Self {
        for (position, device) in self.devices.iter().enumerate() {
            let number = position + 1;
            device
                .color(Color::from_index(number as i64))
                .pulse(number as u32, IDENTIFY_PULSE_DELAY);
        }
        self.wait();

        self.each(|device| {
            device.dance(DANCE_COUNT, DANCE_DELAY).wait();
        })
    }

    /// Runs a light around the group with a fading tail: at frame `f`,
    /// palette entry `c` lands on device `(f - c) mod len`. Every frame is
    /// timed from one start, the latest cursor across the group.
    pub fn chase(&self) -> &Self {
        let len = self.devices.len();
        if len == 0 {
            return self;
        }

        let palette = chase_palette(len);
        let start = self
            .devices
            .iter()
            .map(|device| device.schedule())
            .max()
            .unwrap_or_default();

        for frame in 0..CHASE_FRAMES {
            let at = start + CHASE_FRAME_DELAY * frame;
            for (offset, color) in palette.iter().enumerate() {
                let target = (frame as usize + len - offset % len) % len;
                self.devices[target].color_at(at, *color);
            }
        }

        let end = start + CHASE_FRAME_DELAY * CHASE_FRAMES;
        self.each(|device| {
            device.at(end);
        })
    }

    /// Returns a new ordering of the same devices.
    ///
    /// `sequence[i]` is the new position of the device currently at `i`,
    /// offset by the smallest label, so `[5, 3, 4]` and `[2, 0, 1]` are the
    /// same ordering.
    ///
    /// # Errors
    /// * `LengthMismatch` - `sequence` is not one label per device
    /// * `NotAPermutation` - a label is out of range or repeated
    pub fn reorder(&self, sequence: &[i64]) -> Result<Self, GroupError> {
        let len = self.devices.len();
        if sequence.len() != len {
            return Err(GroupError::LengthMismatch {
                expected: len,
                actual: sequence.len(),
            });
        }
        let Some(&offset) = sequence.iter().min() else {
            return Ok(Self::new());
        };

        let mut slots: Vec<Option<Arc<Device<T, S>>>> = vec![None; len];
        for (device, &label) in self.devices.iter().zip(sequence) {
            let position = label
                .checked_sub(offset)
                .and_then(|position| usize::try_from(position).ok())
                .filter(|&position| position < len)
                .ok_or(GroupError::NotAPermutation { label })?;

            let slot = &mut slots[position];
            if slot.is_some() {
                return Err(GroupError::NotAPermutation { label });
            }
            *slot = Some(Arc::clone(device));
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// One line per member describing the underlying HID interface.
    pub fn describe(&self) -> Vec<String> {
        self.devices
            .iter()
            .map(|device| match device.info() {
                Some(info) => info.to_string(),
                None => format!("device {} (no HID description)", device.index()),
            })
            .collect()
    }
}

/// White head, optional cyan and blue tail, black end.
fn chase_palette(len: usize) -> heapless::Vec<Color, MAX_CHASE_PALETTE> {
    let mut palette = heapless::Vec::new();
    palette.extend(
        [
            Some(Color::White),
            (len > 2).then_some(Color::Cyan),
            (len > 3).then_some(Color::Blue),
            Some(Color::BLACK),
        ]
        .into_iter()
        .flatten(),
    );
    palette
}

impl<T: Transport, S: TimeSource> Default for DeviceGroup<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport, S: TimeSource> Clone for DeviceGroup<T, S> {
    fn clone(&self) -> Self {
        Self {
            devices: self.devices.clone(),
        }
    }
}

impl<T: Transport, S: TimeSource> FromIterator<Arc<Device<T, S>>> for DeviceGroup<T, S> {
    fn from_iter<I: IntoIterator<Item = Arc<Device<T, S>>>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

impl<T: Transport, S: TimeSource> FromIterator<Device<T, S>> for DeviceGroup<T, S> {
    fn from_iter<I: IntoIterator<Item = Device<T, S>>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().map(Arc::new).collect(),
        }
    }
}

impl<T: Transport, S: TimeSource> fmt::Display for DeviceGroup<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for device in &self.devices {
            writeln!(f, "{device}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chase_palette_grows_with_group_size() {
        assert_eq!(chase_palette(1).as_slice(), [Color::White, Color::BLACK]);
        assert_eq!(chase_palette(2).as_slice(), [Color::White, Color::BLACK]);
        assert_eq!(
            chase_palette(3).as_slice(),
            [Color::White, Color::Cyan, Color::BLACK]
        );
        assert_eq!(
            chase_palette(7).as_slice(),
            [Color::White, Color::Cyan, Color::Blue, Color::BLACK]
        );
    }
}
