//! End-to-end duty-cycle timeline: scheduler deadlines drained through a
//! FIFO queue into a stateful radio, with the non-overlap invariant checked
//! after every executed action.

use core::ops::Add;
use core::time::Duration;
use std::collections::VecDeque;

use discovery_core::radio::{ActionOutcome, RadioControl, RadioError, execute};
use discovery_core::scheduler::{
    ActionSink, EnqueueError, EpochScheduler, PhaseAction, SchedulerState,
};
use discovery_core::timing::EpochConfig;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SimInstant(u64);

impl SimInstant {
    fn millis(value: u64) -> Self {
        Self(value)
    }

    fn value(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_millis()).unwrap())
    }
}

#[derive(Default)]
struct QueueSink {
    queue: VecDeque<PhaseAction>,
}

impl ActionSink for QueueSink {
    type Error = ();

    fn try_enqueue(&mut self, action: PhaseAction) -> Result<(), EnqueueError<Self::Error>> {
        self.queue.push_back(action);
        Ok(())
    }

    fn len(&self) -> Option<usize> {
        Some(self.queue.len())
    }
}

/// Radio that tracks which phase is running and reports redundant calls.
#[derive(Default)]
struct PhaseRadio {
    listening: bool,
    broadcasting: bool,
}

impl RadioControl for PhaseRadio {
    fn start_broadcast(&mut self) -> Result<(), RadioError> {
        if self.broadcasting {
            return Err(RadioError::AlreadyActive);
        }
        self.broadcasting = true;
        Ok(())
    }

    fn stop_broadcast(&mut self) -> Result<(), RadioError> {
        if !self.broadcasting {
            return Err(RadioError::NotActive);
        }
        self.broadcasting = false;
        Ok(())
    }

    fn start_listen(&mut self) -> Result<(), RadioError> {
        if self.listening {
            return Err(RadioError::AlreadyActive);
        }
        self.listening = true;
        Ok(())
    }

    fn stop_listen(&mut self) -> Result<(), RadioError> {
        if !self.listening {
            return Err(RadioError::NotActive);
        }
        self.listening = false;
        Ok(())
    }
}

struct Harness {
    scheduler: EpochScheduler<SimInstant>,
    sink: QueueSink,
    radio: PhaseRadio,
    /// `(time, action, outcome)` for every executed action, in order.
    executed: Vec<(u64, PhaseAction, ActionOutcome)>,
}

impl Harness {
    fn new() -> Self {
        let config = EpochConfig::from_millis(10_000, 800);
        Self {
            scheduler: EpochScheduler::new(&config).expect("valid configuration"),
            sink: QueueSink::default(),
            radio: PhaseRadio::default(),
            executed: Vec::new(),
        }
    }

    /// Executes queued actions in FIFO order, checking the invariant that at
    /// most one phase is ever active.
    fn drain(&mut self, now: SimInstant) {
        while let Some(action) = self.sink.queue.pop_front() {
            let outcome = execute(&mut self.radio, action);
            assert!(
                !(self.radio.listening && self.radio.broadcasting),
                "listen and broadcast active at once after {action} at t={}",
                now.value()
            );
            self.executed.push((now.value(), action, outcome));
        }
    }

    /// Runs the scheduler deadline-by-deadline until `end`.
    fn run_until(&mut self, end: SimInstant) {
        while let Some(deadline) = self.scheduler.next_deadline() {
            if deadline > end {
                break;
            }
            self.scheduler.service(&mut self.sink, deadline);
            self.drain(deadline);
        }
    }
}

#[test]
fn reference_scenario_produces_the_documented_timeline() {
    let mut harness = Harness::new();
    harness
        .scheduler
        .start(&mut harness.sink, SimInstant::millis(0))
        .expect("start from idle");
    harness.drain(SimInstant::millis(0));
    harness.run_until(SimInstant::millis(20_000));

    let expected: &[(u64, PhaseAction)] = &[
        (0, PhaseAction::StartListen),
        (515, PhaseAction::StopListen),
        (515, PhaseAction::StartBroadcast),
        (9_990, PhaseAction::StopBroadcast),
        (10_000, PhaseAction::StartListen),
        (10_515, PhaseAction::StopListen),
        (10_515, PhaseAction::StartBroadcast),
        (19_990, PhaseAction::StopBroadcast),
        (20_000, PhaseAction::StartListen),
    ];

    let observed: Vec<(u64, PhaseAction)> = harness
        .executed
        .iter()
        .map(|(time, action, _)| (*time, *action))
        .collect();
    assert_eq!(observed, expected);

    // Every action applied cleanly; the sequence never tripped a redundant
    // start or stop.
    assert!(
        harness
            .executed
            .iter()
            .all(|(_, _, outcome)| *outcome == ActionOutcome::Applied)
    );
}

#[test]
fn stop_and_start_are_never_reordered_across_a_phase_swap() {
    let mut harness = Harness::new();
    harness
        .scheduler
        .start(&mut harness.sink, SimInstant::millis(0))
        .expect("start");
    harness.drain(SimInstant::millis(0));

    // Phase swap and epoch rollover both pending in one service call.
    harness.scheduler.service(&mut harness.sink, SimInstant::millis(10_000));
    let queued: Vec<PhaseAction> = harness.sink.queue.iter().copied().collect();
    assert_eq!(
        queued,
        [
            PhaseAction::StopListen,
            PhaseAction::StartBroadcast,
            PhaseAction::StopBroadcast,
            PhaseAction::StartListen,
        ]
    );

    harness.drain(SimInstant::millis(10_000));
    assert!(harness.radio.listening);
    assert!(!harness.radio.broadcasting);
}

#[test]
fn cadence_holds_over_many_epochs_without_drift() {
    let mut harness = Harness::new();
    harness
        .scheduler
        .start(&mut harness.sink, SimInstant::millis(0))
        .expect("start");
    harness.drain(SimInstant::millis(0));
    harness.run_until(SimInstant::millis(100_000));

    let listen_starts: Vec<u64> = harness
        .executed
        .iter()
        .filter(|(_, action, _)| *action == PhaseAction::StartListen)
        .map(|(time, _, _)| *time)
        .collect();

    let expected: Vec<u64> = (0..=10).map(|epoch| epoch * 10_000).collect();
    assert_eq!(listen_starts, expected);
    assert_eq!(harness.scheduler.state(), SchedulerState::Listening);
    assert_eq!(harness.scheduler.epochs_started(), 11);
}
