#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Duty-cycle plumbing bridging firmware tasks with `discovery-core`.
//!
//! The scheduler and link monitor stay generic over an instant type; this
//! module pins them to the Embassy tick clock and provides the bounded
//! channels the tasks communicate through. The action channel is the
//! deferred-action queue: one producer task, one consumer task, strict FIFO.

use core::convert::TryFrom;
use core::ops::Add;

pub use discovery_core::link::LinkEvent;
use discovery_core::link::LinkMonitor;
use discovery_core::scheduler::{ActionSink, EnqueueError, EpochScheduler, PhaseAction};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use embassy_time::{Duration, Instant};

/// Depth of the deferred phase-action queue. One epoch boundary enqueues at
/// most three actions, suspension at most one more.
pub const ACTION_QUEUE_DEPTH: usize = 8;

/// Depth of the link-event queue fed by the connection layer.
pub const LINK_EVENT_QUEUE_DEPTH: usize = 4;

#[cfg(target_os = "none")]
type DutyMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type DutyMutex = NoopRawMutex;

/// Queue carrying deferred phase actions to the radio task.
pub type ActionQueue = Channel<DutyMutex, PhaseAction, ACTION_QUEUE_DEPTH>;

/// Convenience sender type alias for the action queue.
pub type ActionSender<'a> = Sender<'a, DutyMutex, PhaseAction, ACTION_QUEUE_DEPTH>;

/// Convenience receiver type alias for the action queue.
pub type ActionReceiver<'a> = Receiver<'a, DutyMutex, PhaseAction, ACTION_QUEUE_DEPTH>;

/// Queue carrying link lifecycle events into the scheduler task.
pub type LinkEventQueue = Channel<DutyMutex, LinkEvent, LINK_EVENT_QUEUE_DEPTH>;

/// Convenience sender type alias for the link-event queue.
pub type LinkEventSender<'a> = Sender<'a, DutyMutex, LinkEvent, LINK_EVENT_QUEUE_DEPTH>;

/// Convenience receiver type alias for the link-event queue.
pub type LinkEventReceiver<'a> = Receiver<'a, DutyMutex, LinkEvent, LINK_EVENT_QUEUE_DEPTH>;

/// Scheduler bound to the firmware clock.
pub type DutyScheduler = EpochScheduler<FirmwareInstant>;

/// Link monitor bound to the firmware clock.
pub type DutyLinkMonitor = LinkMonitor<FirmwareInstant>;

/// Monotonic firmware timestamp satisfying the core's instant bounds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    /// Captures the current tick-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    /// Unwraps the underlying Embassy instant.
    #[must_use]
    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        Self(self.0 + core_duration_to_embassy(rhs))
    }
}

/// Adapter exposing the Embassy channel sender as a core action sink.
pub struct ActionProducer<'a> {
    sender: ActionSender<'a>,
}

impl<'a> ActionProducer<'a> {
    /// Creates a new adapter that wraps the provided sender.
    #[must_use]
    pub const fn new(sender: ActionSender<'a>) -> Self {
        Self { sender }
    }
}

impl ActionSink for ActionProducer<'_> {
    type Error = TrySendError<PhaseAction>;

    fn try_enqueue(&mut self, action: PhaseAction) -> Result<(), EnqueueError<Self::Error>> {
        match self.sender.try_send(action) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(EnqueueError::QueueFull),
        }
    }

    fn capacity(&self) -> Option<usize> {
        Some(ACTION_QUEUE_DEPTH)
    }
}
