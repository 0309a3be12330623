//! Single-device façade with its scheduling worker.
//!
//! Provides [`Device`], which owns one unit's status byte, its
//! [`ActionQueue`], its virtual clock and a dedicated worker thread. Gesture
//! methods only enqueue timed updates; the worker sleeps until each update is
//! due, merges it into the status byte and writes the result through the
//! [`Transport`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use palette::Srgb;

use crate::clock::VirtualClock;
use crate::colors;
use crate::command::{Action, parse};
use crate::config::{
    BUZZ_COUNT, BUZZ_DELAY, DANCE_COUNT, DANCE_DELAY, FLY_COUNT, FLY_DELAY, PULSE_COUNT,
    PULSE_DELAY, RESET_STATE, WORKER_SLEEP_SLICE,
};
use crate::error::{DeviceError, TransportError};
use crate::queue::{ActionQueue, Interruption, PendingUpdate};
use crate::register::{Decoded, Field, decode, merge};
use crate::time::{SystemTimeSource, TimeSource};
use crate::transport::{DeviceInfo, Transport, report};
use crate::types::{Color, Heart, Turn, Wings};

/// State shared between the façade and its worker thread.
struct Shared<T, S> {
    index: usize,
    queue: ActionQueue,
    /// Transport lock; also guards read-modify-write of `state`.
    port: Mutex<T>,
    /// Last status byte actually transmitted.
    state: AtomicU8,
    degraded: AtomicBool,
    failures: AtomicU64,
    cancelled: AtomicBool,
    time_source: Arc<S>,
}

impl<T: Transport, S: TimeSource> Shared<T, S> {
    fn lock_port(&self) -> MutexGuard<'_, T> {
        self.port.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes `next` while the transport lock is held. The stored state only
    /// changes once the report has gone out.
    fn transmit(&self, port: &mut T, next: u8) -> Result<(), TransportError> {
        port.open()?;
        let sent = port.send_report(&report(next));
        let closed = port.close();
        sent?;
        self.state.store(next, Ordering::Release);
        closed
    }

    /// Merges and sends a due update. The last interruption check happens
    /// under the transport lock, so an update discarded by `reset` can never
    /// land after the reset byte.
    fn apply(&self, update: &PendingUpdate) -> Result<Outcome, TransportError> {
        let mut port = self.lock_port();
        if let Some(interruption) = self.queue.interruption(update) {
            return Ok(Outcome::Interrupted(interruption));
        }
        let next = merge(self.state.load(Ordering::Acquire), update.clear_mask, update.value);
        self.transmit(&mut port, next)?;
        Ok(Outcome::Applied(next))
    }

    fn force(&self, next: u8) -> Result<(), TransportError> {
        let mut port = self.lock_port();
        self.transmit(&mut port, next)
    }

    fn record_failure(&self, err: &TransportError) {
        self.degraded.store(true, Ordering::Release);
        self.failures.fetch_add(1, Ordering::AcqRel);
        tracing::warn!(device = self.index, error = %err, "transport write failed, device degraded");
    }

    /// Sleeps until `update` is due, in slices so cancellation, discards and
    /// earlier arrivals are noticed. Returns `None` once the update is due.
    fn sleep_until(&self, update: &PendingUpdate) -> Option<Outcome> {
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return Some(Outcome::Cancelled);
            }
            if let Some(interruption) = self.queue.interruption(update) {
                return Some(Outcome::Interrupted(interruption));
            }
            let now = self.time_source.now();
            if now >= update.at {
                return None;
            }
            self.time_source.sleep((update.at - now).min(WORKER_SLEEP_SLICE));
        }
    }

    fn process(&self, update: PendingUpdate) {
        let outcome = match self.sleep_until(&update) {
            Some(outcome) => outcome,
            None => match self.apply(&update) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.record_failure(&err);
                    return;
                }
            },
        };

        match outcome {
            Outcome::Applied(state) => {
                tracing::trace!(device = self.index, state, "update applied");
            }
            Outcome::Interrupted(Interruption::Superseded) => self.queue.requeue(update),
            Outcome::Interrupted(Interruption::Abandoned) => {
                tracing::trace!(device = self.index, "update abandoned");
            }
            Outcome::Cancelled => {}
        }
    }
}

/// How the worker finished with one popped update.
enum Outcome {
    Applied(u8),
    Interrupted(Interruption),
    Cancelled,
}

/// Releases the completion barrier for the in-flight update, also when a
/// transport panics. A worker unwinding closes the queue behind it.
struct Completion<'a> {
    index: usize,
    queue: &'a ActionQueue,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!(device = self.index, "worker panicked, closing queue");
            self.queue.close();
        }
        self.queue.complete();
    }
}

fn run_worker<T: Transport, S: TimeSource>(shared: Arc<Shared<T, S>>) {
    tracing::debug!(device = shared.index, "worker started");

    while let Some(update) = shared.queue.pop() {
        let _completion = Completion {
            index: shared.index,
            queue: &shared.queue,
        };
        shared.process(update);
    }

    tracing::debug!(device = shared.index, "worker stopped");
}

/// Timeline bookkeeping guarded as one unit so a gesture's updates are
/// scheduled without interleaving with another caller's.
#[derive(Debug, Default)]
struct Timeline {
    clock: VirtualClock,
    /// Last left/right turn commanded, used by `buzz`.
    direction: Option<Turn>,
}

/// Schedules the updates of one gesture. Every update is timed against a
/// single reading of the time source, taken when the gesture starts.
struct Composer<'a> {
    queue: &'a ActionQueue,
    timeline: MutexGuard<'a, Timeline>,
    now: Duration,
}

impl Composer<'_> {
    fn add(&mut self, field: Field, value: u8, delay: Duration) -> Result<(), DeviceError> {
        let at = self.timeline.clock.schedule(self.now);
        self.queue.push(at, field.clear_mask(), field.encode(value))?;
        self.timeline.clock.delay(delay);
        Ok(())
    }
}

/// Builder for [`Device`].
pub struct DeviceBuilder<T, S = SystemTimeSource> {
    transport: T,
    index: usize,
    info: Option<DeviceInfo>,
    time_source: Arc<S>,
    paused: bool,
}

impl<T: Transport, S: TimeSource> DeviceBuilder<T, S> {
    /// Position of the device in its fleet, used in logs and listings.
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn info(mut self, info: DeviceInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Replaces the time source the worker and the virtual clock use.
    pub fn time_source<S2: TimeSource>(self, time_source: Arc<S2>) -> DeviceBuilder<T, S2> {
        DeviceBuilder {
            transport: self.transport,
            index: self.index,
            info: self.info,
            time_source,
            paused: self.paused,
        }
    }

    /// Starts the worker held; nothing is applied until [`Device::resume`].
    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Spawns the worker thread and returns the running device.
    ///
    /// # Errors
    /// `Spawn` if the worker thread cannot be started.
    pub fn start(self) -> Result<Device<T, S>, DeviceError> {
        let shared = Arc::new(Shared {
            index: self.index,
            queue: ActionQueue::new(),
            port: Mutex::new(self.transport),
            state: AtomicU8::new(RESET_STATE),
            degraded: AtomicBool::new(false),
            failures: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            time_source: self.time_source,
        });
        if self.paused {
            shared.queue.pause();
        }

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("buddy-{}", self.index))
                .spawn(move || run_worker(shared))
                .map_err(DeviceError::Spawn)?
        };

        Ok(Device {
            index: self.index,
            info: self.info,
            shared,
            timeline: Mutex::new(Timeline::default()),
            worker: Mutex::new(Some(worker)),
        })
    }
}

/// Controls a single actuator toy through timed partial updates.
///
/// All methods take `&self`; a device is meant to be shared (usually in an
/// `Arc`) between the threads that script it. Gesture methods return `&Self`
/// for chaining and never block, except [`wait`](Self::wait) and
/// [`reset`](Self::reset).
///
/// # Type Parameters
/// * `T` - Transport implementation for this unit
/// * `S` - Time source shared with the worker
pub struct Device<T: Transport, S: TimeSource = SystemTimeSource> {
    index: usize,
    info: Option<DeviceInfo>,
    shared: Arc<Shared<T, S>>,
    timeline: Mutex<Timeline>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Device<T> {
    /// Starts a device on the wall clock.
    pub fn new(index: usize, transport: T) -> Result<Self, DeviceError> {
        Self::builder(transport).index(index).start()
    }

    pub fn builder(transport: T) -> DeviceBuilder<T> {
        DeviceBuilder {
            transport,
            index: 0,
            info: None,
            time_source: Arc::new(SystemTimeSource::new()),
            paused: false,
        }
    }
}

impl<T: Transport, S: TimeSource> Device<T, S> {
    fn timeline(&self) -> MutexGuard<'_, Timeline> {
        self.timeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Duration {
        self.shared.time_source.now()
    }

    /// Runs a gesture body under the timeline lock. Failures are logged; the
    /// fluent API never surfaces them.
    fn compose<F>(&self, gesture: &'static str, body: F) -> &Self
    where
        F: FnOnce(&mut Composer<'_>) -> Result<(), DeviceError>,
    {
        self.compose_from(self.now(), gesture, body)
    }

    /// [`compose`](Self::compose) against a given `now` instead of the time
    /// source.
    fn compose_from<F>(&self, now: Duration, gesture: &'static str, body: F) -> &Self
    where
        F: FnOnce(&mut Composer<'_>) -> Result<(), DeviceError>,
    {
        if let Err(err) = body(&mut self.composer(now)) {
            tracing::warn!(device = self.index, gesture, error = %err, "gesture dropped");
        }
        self
    }

    fn composer(&self, now: Duration) -> Composer<'_> {
        Composer {
            queue: &self.shared.queue,
            timeline: self.timeline(),
            now,
        }
    }

    /// Fallible form of the scheduling primitive: queue `value` for `field`
    /// at the cursor, then move the cursor on by `delay`.
    ///
    /// # Errors
    /// `ShutDown` once the device has been shut down.
    pub fn try_add(&self, field: Field, value: u8, delay: Duration) -> Result<(), DeviceError> {
        self.composer(self.now()).add(field, value, delay)
    }

    // Immediate actions

    /// Sets the main indicator color. Accepts a [`Color`], a field value
    /// (clamped) or a name matched by its first letter.
    pub fn color(&self, color: impl Into<Color>) -> &Self {
        let color = color.into();
        self.compose("color", |g| g.add(Field::Color, color.value(), Duration::ZERO))
    }

    /// Sets the color closest to an arbitrary RGB value.
    pub fn color_rgb(&self, color: Srgb) -> &Self {
        self.color(colors::quantize(color))
    }

    /// Sets the color closest to `degrees` on the color wheel.
    pub fn color_hue(&self, degrees: f32) -> &Self {
        self.color_rgb(colors::hue(degrees))
    }

    /// Schedules `color` at `at` exactly, unless the cursor is already past
    /// it. Lets a group time frames against one shared start.
    pub(crate) fn color_at(&self, at: Duration, color: Color) -> &Self {
        self.compose_from(at, "color", |g| {
            g.add(Field::Color, color.value(), Duration::ZERO)
        })
    }

    pub fn heart(&self, heart: impl Into<Heart>) -> &Self {
        let heart = heart.into();
        self.compose("heart", |g| g.add(Field::Heart, heart.value(), Duration::ZERO))
    }

    pub fn wings(&self, wings: impl Into<Wings>) -> &Self {
        let wings = wings.into();
        self.compose("wings", |g| g.add(Field::Flap, wings.value(), Duration::ZERO))
    }

    /// Turns the body. Left and right are remembered for [`buzz`](Self::buzz).
    pub fn turn(&self, turn: impl Into<Turn>) -> &Self {
        let turn = turn.into();
        self.compose("turn", |g| {
            if turn.is_direction() {
                g.timeline.direction = Some(turn);
            }
            g.add(Field::Turn, turn.value(), Duration::ZERO)
        })
    }

    // Gestures

    /// Turns left and right `count` times, then comes to rest.
    pub fn dance(&self, count: u32, delay: Duration) -> &Self {
        self.compose("dance", |g| {
            for _ in 0..count {
                g.add(Field::Turn, Turn::Left.value(), delay)?;
                g.add(Field::Turn, Turn::Right.value(), delay)?;
            }
            g.add(Field::Turn, Turn::Neutral.value(), Duration::ZERO)
        })
    }

    /// Flaps the wings `count` times, then folds them.
    pub fn fly(&self, count: u32, delay: Duration) -> &Self {
        self.compose("fly", |g| {
            for _ in 0..count {
                g.add(Field::Flap, Wings::Pull.value(), delay)?;
                g.add(Field::Flap, Wings::Push.value(), delay)?;
            }
            g.add(Field::Flap, Wings::Neutral.value(), Duration::ZERO)
        })
    }

    /// Rapidly jerks between the last commanded direction and its opposite,
    /// resting after every jerk.
    pub fn buzz(&self, count: u32, delay: Duration) -> &Self {
        self.compose("buzz", |g| {
            let direction = g.timeline.direction.unwrap_or(Turn::Left);
            for _ in 0..count {
                g.add(Field::Turn, direction.value(), Duration::ZERO)?;
                g.add(Field::Turn, direction.opposite().value(), delay)?;
                g.add(Field::Turn, Turn::Neutral.value(), delay)?;
            }
            Ok(())
        })
    }

    /// Blinks the heart `count` times.
    pub fn pulse(&self, count: u32, delay: Duration) -> &Self {
        self.sequence(count, delay, Field::Heart, Heart::Show.value(), Heart::Hide.value())
    }

    /// Blinks the main indicator in `color` `count` times, ending dark.
    pub fn flash(&self, count: u32, delay: Duration, color: Color) -> &Self {
        self.sequence(count, delay, Field::Color, color.value(), Color::BLACK.value())
    }

    /// Alternates `field` between `on` and `off` `count` times.
    pub fn sequence(&self, count: u32, delay: Duration, field: Field, on: u8, off: u8) -> &Self {
        self.compose("sequence", |g| {
            for _ in 0..count {
                g.add(field, on, delay)?;
                g.add(field, off, delay)?;
            }
            Ok(())
        })
    }

    // Timeline control

    /// Leaves a gap of `by` before the next scheduled action.
    pub fn delay(&self, by: Duration) -> &Self {
        let now = self.now();
        let mut timeline = self.timeline();
        timeline.clock.schedule(now);
        timeline.clock.delay(by);
        self
    }

    /// Moves the timeline forward so the next action happens no earlier than
    /// `at` (time source offset).
    pub fn at(&self, at: Duration) -> &Self {
        self.timeline().clock.advance_to(at);
        self
    }

    /// Pulls the cursor up to now and returns it: the instant the next
    /// action would be scheduled at.
    pub fn schedule(&self) -> Duration {
        let now = self.now();
        self.timeline().clock.schedule(now)
    }

    /// Drops every queued update, including one the worker is still waiting
    /// on. An update already being written finishes.
    pub fn discard(&self) -> &Self {
        let dropped = self.shared.queue.discard();
        if dropped > 0 {
            tracing::debug!(device = self.index, dropped, "queue discarded");
        }
        self
    }

    /// Discards queued work, switches everything off immediately and rewinds
    /// the timeline. Updates scheduled afterwards never wait behind work
    /// queued before the reset.
    pub fn reset(&self) -> &Self {
        let mut timeline = self.timeline();
        let dropped = self.shared.queue.discard();
        if let Err(err) = self.shared.force(RESET_STATE) {
            self.shared.record_failure(&err);
        }
        timeline.clock.reset();
        tracing::debug!(device = self.index, dropped, "device reset");
        self
    }

    /// Blocks until every queued update has been applied.
    ///
    /// Never returns while the device is paused with work queued.
    pub fn wait(&self) -> &Self {
        self.shared.queue.wait();
        self
    }

    /// Bounded [`wait`](Self::wait). Returns `true` if the queue drained.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.shared.queue.wait_timeout(timeout)
    }

    /// Holds the worker. Queued updates stay queued.
    pub fn pause(&self) -> &Self {
        self.shared.queue.pause();
        self
    }

    pub fn resume(&self) -> &Self {
        self.shared.queue.resume();
        self
    }

    /// Dispatches a single action. Gestures use their default counts and
    /// delays.
    pub fn handle_action(&self, action: Action) -> &Self {
        match action {
            Action::Color(color) => self.color(color),
            Action::Turn(turn) => self.turn(turn),
            Action::Wings(wings) => self.wings(wings),
            Action::Heart(heart) => self.heart(heart),
            Action::Reset => self.reset(),
            Action::Dance => self.dance(DANCE_COUNT, DANCE_DELAY),
            Action::Fly => self.fly(FLY_COUNT, FLY_DELAY),
            Action::Buzz => self.buzz(BUZZ_COUNT, BUZZ_DELAY),
            Action::Pulse => self.pulse(PULSE_COUNT, PULSE_DELAY),
            Action::Pause | Action::Ignore => self,
        }
    }

    /// Interprets an animation string, leaving `delay` between tokens.
    /// See [`command`](crate::command) for the notation.
    pub fn play(&self, script: &str, delay: Duration) -> &Self {
        for step in parse(script) {
            self.handle_action(step.action);
            if step.advance {
                self.delay(delay);
            }
        }
        self
    }

    /// Stops the worker: pending updates are dropped, an update being slept
    /// on is abandoned, and the thread is joined. Idempotent; also run on
    /// drop. Later gestures are logged and ignored.
    pub fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };

        self.shared.cancelled.store(true, Ordering::Release);
        self.shared.queue.close();
        if worker.join().is_err() {
            tracing::warn!(device = self.index, "worker panicked");
        }
        tracing::debug!(device = self.index, "device shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.is_closed()
    }

    // Status

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    /// Last status byte transmitted to the hardware.
    pub fn state(&self) -> u8 {
        self.shared.state.load(Ordering::Acquire)
    }

    pub fn decoded(&self) -> Decoded {
        decode(self.state())
    }

    /// Queued updates in the order they will be applied.
    pub fn pending(&self) -> Vec<PendingUpdate> {
        self.shared.queue.snapshot()
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// The instant the next action will be scheduled at, ignoring `now`.
    pub fn cursor(&self) -> Duration {
        self.timeline().clock.cursor()
    }

    /// Direction `buzz` will start from.
    pub fn last_direction(&self) -> Turn {
        self.timeline().direction.unwrap_or(Turn::Left)
    }

    /// True once a transport write has failed since the last
    /// [`clear_degraded`](Self::clear_degraded).
    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::Acquire)
    }

    pub fn clear_degraded(&self) -> &Self {
        self.shared.degraded.store(false, Ordering::Release);
        self
    }

    /// Total number of failed transport writes.
    pub fn failures(&self) -> u64 {
        self.shared.failures.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.queue.is_paused()
    }
}

impl<T: Transport, S: TimeSource> Drop for Device<T, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T: Transport, S: TimeSource> fmt::Display for Device<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}) {} {} queued", self.index, self.decoded(), self.queued())
    }
}

impl<T: Transport, S: TimeSource> fmt::Debug for Device<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("state", &format_args!("{:#04x}", self.state()))
            .field("queued", &self.queued())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}
