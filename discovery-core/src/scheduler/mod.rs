//! Epoch scheduler state machine and the deferred phase-action boundary.
//!
//! The scheduler owns three logical timers — the periodic epoch timer and the
//! one-shot listen/broadcast timeouts — as deadline data. A single driver
//! context sleeps until [`EpochScheduler::next_deadline`] and then calls
//! [`EpochScheduler::service`], which applies every expired deadline in
//! chronological order. Radio work is never performed here: each transition
//! only enqueues a [`PhaseAction`] onto an [`ActionSink`], and a single
//! consumer executes those actions strictly in FIFO order. That split is what
//! guarantees that no two radio operations ever run concurrently and that a
//! stop is never reordered after the start it must precede.
//!
//! Suspension clears every deadline before returning, so a timeout can never
//! fire after [`EpochScheduler::suspend`] and drag the machine back into a
//! radio phase.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

#[cfg(feature = "defmt")]
use defmt::warn;
#[cfg(not(feature = "defmt"))]
use log::warn;

use crate::timing::{DerivedTiming, EpochConfig, TimingError};

/// Deferred, parameterless radio operation.
///
/// Created by timer expiry or connection-event code, consumed exactly once by
/// the action queue's single consumer, then discarded.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PhaseAction {
    StartListen,
    StopListen,
    StartBroadcast,
    StopBroadcast,
}

impl PhaseAction {
    /// Stable label used in logs and transcripts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PhaseAction::StartListen => "start-listen",
            PhaseAction::StopListen => "stop-listen",
            PhaseAction::StartBroadcast => "start-broadcast",
            PhaseAction::StopBroadcast => "stop-broadcast",
        }
    }
}

impl fmt::Display for PhaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error surfaced when a phase action cannot be enqueued.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EnqueueError<E = ()> {
    /// Queue has reached its maximum capacity.
    QueueFull,
    /// Queue has been disconnected from its consumer.
    Disconnected,
    /// Transport-specific failure.
    Other(E),
}

impl<E> EnqueueError<E> {
    /// Maps the inner error type.
    pub fn map_other<F, M>(self, mapper: M) -> EnqueueError<F>
    where
        M: FnOnce(E) -> F,
    {
        match self {
            EnqueueError::QueueFull => EnqueueError::QueueFull,
            EnqueueError::Disconnected => EnqueueError::Disconnected,
            EnqueueError::Other(err) => EnqueueError::Other(mapper(err)),
        }
    }
}

/// Producer half of the deferred action queue.
///
/// Implementations must preserve FIFO order towards a single consumer; the
/// scheduler relies on that to keep stop/start pairs ordered.
pub trait ActionSink {
    /// Transport-specific error type.
    type Error;

    /// Attempts to enqueue an action without blocking.
    fn try_enqueue(&mut self, action: PhaseAction) -> Result<(), EnqueueError<Self::Error>>;

    /// Returns the queue capacity if it is known.
    fn capacity(&self) -> Option<usize> {
        None
    }

    /// Returns the current queue depth if it can be observed.
    fn len(&self) -> Option<usize> {
        None
    }

    /// Returns `true` when the queue reports that it currently holds no items.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|current| current == 0)
    }
}

/// Scheduler lifecycle states.
///
/// `Listening` covers both the active listen window and the idle tail of an
/// epoch after the broadcast window closed; whether the receiver is actually
/// running is the radio executor's bookkeeping, not the scheduler's.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    Listening,
    Broadcasting,
    Suspended,
}

impl SchedulerState {
    /// Returns `true` while the duty cycle is advancing.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, SchedulerState::Listening | SchedulerState::Broadcasting)
    }

    /// Stable label used in logs and transcripts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Listening => "listening",
            SchedulerState::Broadcasting => "broadcasting",
            SchedulerState::Suspended => "suspended",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies which one-shot phase timer is armed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PhaseTimerKind {
    ListenTimeout,
    BroadcastTimeout,
}

/// One-shot phase timer as deadline data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseTimer<TInstant> {
    pub kind: PhaseTimerKind,
    pub deadline: TInstant,
}

/// Failure reported when starting the scheduler in the wrong state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StartError {
    /// State the scheduler was in when `start` was called.
    pub state: SchedulerState,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scheduler already started (state {})", self.state)
    }
}

enum Expiry<TInstant> {
    Phase(PhaseTimer<TInstant>),
    Epoch(TInstant),
}

/// Drives the listen/broadcast alternation inside a repeating epoch.
///
/// Owned by exactly one execution context; every entry point runs to
/// completion without blocking, and all state mutation happens through these
/// entry points.
pub struct EpochScheduler<TInstant> {
    state: SchedulerState,
    epoch_period: Duration,
    timing: DerivedTiming,
    epoch_deadline: Option<TInstant>,
    phase_timer: Option<PhaseTimer<TInstant>>,
    epochs_started: u32,
}

impl<TInstant> EpochScheduler<TInstant>
where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
{
    /// Builds a scheduler from a configuration, deriving both phase windows.
    ///
    /// # Errors
    ///
    /// Propagates the fatal [`TimingError`] for invalid configurations.
    pub fn new(config: &EpochConfig) -> Result<Self, TimingError> {
        let timing = DerivedTiming::derive(config)?;
        Ok(Self::with_timing(config.epoch_length(), timing))
    }

    /// Builds a scheduler from pre-derived timing.
    #[must_use]
    pub const fn with_timing(epoch_period: Duration, timing: DerivedTiming) -> Self {
        Self {
            state: SchedulerState::Idle,
            epoch_period,
            timing,
            epoch_deadline: None,
            phase_timer: None,
            epochs_started: 0,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns the derived phase windows.
    #[must_use]
    pub const fn timing(&self) -> DerivedTiming {
        self.timing
    }

    /// Returns the configured epoch period.
    #[must_use]
    pub const fn epoch_period(&self) -> Duration {
        self.epoch_period
    }

    /// Returns how many epochs have begun since startup.
    #[must_use]
    pub const fn epochs_started(&self) -> u32 {
        self.epochs_started
    }

    /// Returns the armed one-shot phase timer, if any.
    #[must_use]
    pub fn phase_timer(&self) -> Option<PhaseTimer<TInstant>> {
        self.phase_timer
    }

    /// Returns the earliest pending deadline, if any timer is armed.
    ///
    /// The driver context sleeps until this instant and then calls
    /// [`Self::service`].
    #[must_use]
    pub fn next_deadline(&self) -> Option<TInstant> {
        match (self.phase_timer, self.epoch_deadline) {
            (Some(timer), Some(epoch)) => Some(timer.deadline.min(epoch)),
            (Some(timer), None) => Some(timer.deadline),
            (None, epoch) => epoch,
        }
    }

    /// Starts duty cycling: the first epoch begins immediately.
    ///
    /// Enqueues `start-listen`, arms the listen timeout, and arms the epoch
    /// timer one full period out.
    ///
    /// # Errors
    ///
    /// Returns [`StartError`] unless the scheduler is idle.
    pub fn start<S: ActionSink>(&mut self, sink: &mut S, now: TInstant) -> Result<(), StartError> {
        if self.state != SchedulerState::Idle {
            return Err(StartError { state: self.state });
        }

        self.begin_epoch(sink, now);
        Ok(())
    }

    /// Halts duty cycling in response to an established link.
    ///
    /// Enqueues the stop matching the phase the radio may be in, then clears
    /// every deadline before returning so no timeout can fire after this call.
    /// Suspending an already-suspended scheduler is a logged no-op.
    pub fn suspend<S: ActionSink>(&mut self, sink: &mut S) {
        match self.state {
            SchedulerState::Suspended => {
                warn!("scheduler: suspend while already suspended");
                return;
            }
            SchedulerState::Idle => {}
            SchedulerState::Broadcasting => submit(sink, PhaseAction::StopBroadcast),
            SchedulerState::Listening => {
                // Only the active listen window needs a stop; the idle tail of
                // an epoch has no receiver running.
                if self
                    .phase_timer
                    .is_some_and(|timer| timer.kind == PhaseTimerKind::ListenTimeout)
                {
                    submit(sink, PhaseAction::StopListen);
                }
            }
        }

        self.phase_timer = None;
        self.epoch_deadline = None;
        self.state = SchedulerState::Suspended;
    }

    /// Resumes duty cycling after a link terminated.
    ///
    /// Restarts from a fresh full epoch rather than a stale partial one, so
    /// the cadence carries no assumption about how long the link lasted.
    /// Resuming a scheduler that is not suspended is a logged no-op.
    pub fn resume<S: ActionSink>(&mut self, sink: &mut S, now: TInstant) {
        if self.state != SchedulerState::Suspended {
            warn!("scheduler: resume in {} state", self.state.label());
            return;
        }

        self.begin_epoch(sink, now);
    }

    /// Applies every expired deadline, in chronological order.
    ///
    /// A phase timeout sharing an instant with an epoch tick is applied
    /// first, so the stop it emits always precedes the next window's start in
    /// the action queue. Returns the number of timer events handled.
    pub fn service<S: ActionSink>(&mut self, sink: &mut S, now: TInstant) -> u32 {
        let mut handled = 0;
        loop {
            match self.next_expired(now) {
                Some(Expiry::Phase(timer)) => {
                    self.phase_timer = None;
                    match timer.kind {
                        PhaseTimerKind::ListenTimeout => {
                            self.on_listen_timeout(sink, timer.deadline);
                        }
                        PhaseTimerKind::BroadcastTimeout => self.on_broadcast_timeout(sink),
                    }
                }
                Some(Expiry::Epoch(at)) => self.on_epoch_tick(sink, at),
                None => return handled,
            }
            handled += 1;
        }
    }

    fn next_expired(&self, now: TInstant) -> Option<Expiry<TInstant>> {
        let phase = self.phase_timer.filter(|timer| timer.deadline <= now);
        let epoch = self.epoch_deadline.filter(|deadline| *deadline <= now);

        match (phase, epoch) {
            (Some(timer), Some(tick)) if tick < timer.deadline => Some(Expiry::Epoch(tick)),
            (Some(timer), _) => Some(Expiry::Phase(timer)),
            (None, Some(tick)) => Some(Expiry::Epoch(tick)),
            (None, None) => None,
        }
    }

    /// Opens a listen window at `at` and re-arms the epoch cadence from it.
    fn begin_epoch<S: ActionSink>(&mut self, sink: &mut S, at: TInstant) {
        submit(sink, PhaseAction::StartListen);
        self.phase_timer = Some(PhaseTimer {
            kind: PhaseTimerKind::ListenTimeout,
            deadline: at + self.timing.listen(),
        });
        self.epoch_deadline = Some(at + self.epoch_period);
        self.epochs_started = self.epochs_started.saturating_add(1);
        self.state = SchedulerState::Listening;
    }

    fn on_epoch_tick<S: ActionSink>(&mut self, sink: &mut S, at: TInstant) {
        if self.state != SchedulerState::Listening {
            // A correctly derived configuration closes the broadcast window
            // strictly before the epoch boundary; advance the cadence anyway
            // so a misbehaving clock cannot wedge the service loop.
            warn!("scheduler: epoch tick in {} state", self.state.label());
            self.epoch_deadline = Some(at + self.epoch_period);
            return;
        }

        if self.phase_timer.is_some() {
            warn!("scheduler: epoch tick with a phase window still open");
            self.phase_timer = None;
        }

        self.begin_epoch(sink, at);
    }

    /// Listen window closed: swap phases. The broadcast deadline is computed
    /// from the scheduled listen expiry, not the observed clock, so service
    /// jitter cannot push the window past the guard margin.
    fn on_listen_timeout<S: ActionSink>(&mut self, sink: &mut S, at: TInstant) {
        if self.state != SchedulerState::Listening {
            warn!("scheduler: listen timeout in {} state", self.state.label());
            return;
        }

        submit(sink, PhaseAction::StopListen);
        submit(sink, PhaseAction::StartBroadcast);
        self.phase_timer = Some(PhaseTimer {
            kind: PhaseTimerKind::BroadcastTimeout,
            deadline: at + self.timing.broadcast(),
        });
        self.state = SchedulerState::Broadcasting;
    }

    fn on_broadcast_timeout<S: ActionSink>(&mut self, sink: &mut S) {
        if self.state != SchedulerState::Broadcasting {
            warn!(
                "scheduler: broadcast timeout in {} state",
                self.state.label()
            );
            return;
        }

        submit(sink, PhaseAction::StopBroadcast);
        self.state = SchedulerState::Listening;
    }
}

/// Enqueue failures never halt the cycle: the next phase boundary re-attempts
/// the complementary action.
fn submit<S: ActionSink>(sink: &mut S, action: PhaseAction) {
    if sink.try_enqueue(action).is_err() {
        warn!("scheduler: action queue rejected {}", action.label());
    }
}
