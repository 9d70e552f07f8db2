//! Interactive session driving the duty-cycle core over simulated time.
//!
//! The session owns the full plumbing a device would run — scheduler, link
//! monitor, FIFO action queue, and a stateful radio — but advances a
//! millisecond clock only when asked. Every executed action lands in the
//! transcript, and the session checks the non-overlap invariant after each
//! one, so a scripted scenario doubles as a protocol check.

use std::collections::VecDeque;
use std::time::Duration;

use core::ops::Add;

use discovery_core::link::{LinkEvent, LinkMonitor, handle_link_event};
use discovery_core::neighbors::NeighborTable;
use discovery_core::payload::DeviceAddr;
use discovery_core::radio::{ActionOutcome, RadioControl, RadioError, execute};
use discovery_core::scheduler::{ActionSink, EnqueueError, EpochScheduler, PhaseAction};
use discovery_core::timing::EpochConfig;

/// Peer identity used for simulated connections.
const SIM_PEER: DeviceAddr = DeviceAddr([0xF0, 0x0D, 0xCA, 0xFE, 0x00, 0x01]);

/// HCI "remote user terminated connection".
const REASON_REMOTE_TERMINATED: u8 = 0x13;

/// HCI "connection failed to be established".
const REASON_ATTEMPT_FAILED: u8 = 0x3E;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("start", "start                - begin duty cycling at the current time"),
    ("run", "run <ms>             - advance simulated time, executing due actions"),
    ("connect", "connect              - simulate a peer establishing a link"),
    ("disconnect", "disconnect           - simulate the active link terminating"),
    ("fail", "fail                 - simulate a failed connection attempt"),
    ("hear", "hear <id>            - inject a peer beacon into an open listen window"),
    ("status", "status               - display scheduler, link, and radio state"),
    ("help", "help [topic]         - show help for a command"),
];

/// Simulated monotonic clock, in milliseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    const ZERO: Self = Self(0);

    fn as_millis(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX))
    }
}

/// FIFO action queue feeding the session's radio.
#[derive(Default)]
struct SimQueue {
    actions: VecDeque<PhaseAction>,
}

impl ActionSink for SimQueue {
    type Error = ();

    fn try_enqueue(&mut self, action: PhaseAction) -> Result<(), EnqueueError<Self::Error>> {
        self.actions.push_back(action);
        Ok(())
    }

    fn len(&self) -> Option<usize> {
        Some(self.actions.len())
    }
}

/// Radio double that tracks which phase is running and reports redundant
/// transitions the way a real link layer does.
struct SimRadio {
    listening: bool,
    broadcasting: bool,
}

impl SimRadio {
    const fn new() -> Self {
        Self {
            listening: false,
            broadcasting: false,
        }
    }
}

impl RadioControl for SimRadio {
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

pub struct Session {
    scheduler: EpochScheduler<SimInstant>,
    monitor: LinkMonitor<SimInstant>,
    queue: SimQueue,
    radio: SimRadio,
    neighbors: NeighborTable<SimInstant>,
    now: SimInstant,
}

impl Session {
    /// Builds a session for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns the derivation error message for invalid configurations.
    pub fn new(epoch_length_ms: u64, advertise_interval_units: u16) -> Result<Self, String> {
        let config = EpochConfig::from_millis(epoch_length_ms, advertise_interval_units);
        let scheduler = EpochScheduler::new(&config).map_err(|err| err.to_string())?;

        Ok(Self {
            scheduler,
            monitor: LinkMonitor::new(),
            queue: SimQueue::default(),
            radio: SimRadio::new(),
            neighbors: NeighborTable::new(),
            now: SimInstant::ZERO,
        })
    }

    /// Dispatches one command line, returning the transcript lines it produced.
    pub fn handle_command(&mut self, line: &str) -> Vec<String> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Vec::new();
        };
        let argument = parts.next();

        if parts.next().is_some() {
            return vec![format!("ERR trailing input after `{command}`")];
        }

        match (command.to_ascii_lowercase().as_str(), argument) {
            ("help", topic) => self.handle_help(topic),
            ("start", None) => self.handle_start(),
            ("run", Some(millis)) => match millis.parse::<u64>() {
                Ok(millis) => self.handle_run(millis),
                Err(_) => vec![format!("ERR `{millis}` is not a duration in ms")],
            },
            ("run", None) => vec!["ERR usage: run <ms>".to_string()],
            ("connect", None) => self.handle_link(LinkEvent::Established { peer: SIM_PEER }),
            ("disconnect", None) => self.handle_link(LinkEvent::Terminated {
                reason: REASON_REMOTE_TERMINATED,
            }),
            ("fail", None) => self.handle_link(LinkEvent::AttemptFailed {
                reason: REASON_ATTEMPT_FAILED,
            }),
            ("hear", Some(id)) => match id.parse::<u16>() {
                Ok(id) => self.handle_hear(id),
                Err(_) => vec![format!("ERR `{id}` is not a beacon id")],
            },
            ("hear", None) => vec!["ERR usage: hear <id>".to_string()],
            ("status", None) => self.handle_status(),
            _ => vec![format!("ERR unknown command `{line}` (try `help`)")],
        }
    }

    fn handle_help(&self, topic: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        match topic {
            Some(target) if !target.is_empty() => {
                if let Some((_, detail)) = HELP_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(target))
                {
                    lines.push((*detail).to_string());
                } else {
                    lines.push(format!("No help available for `{target}`."));
                }
            }
            _ => {
                lines.push("Available commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
            }
        }
        lines
    }

    fn handle_start(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.scheduler.start(&mut self.queue, self.now) {
            Ok(()) => {
                lines.push(self.stamp("duty cycle started"));
                lines.extend(self.drain_actions());
            }
            Err(err) => lines.push(format!("ERR {err}")),
        }
        lines
    }

    /// Advances the clock, stopping at every scheduler deadline on the way.
    fn handle_run(&mut self, millis: u64) -> Vec<String> {
        let target = SimInstant(self.now.as_millis() + millis);
        let mut lines = Vec::new();

        while let Some(deadline) = self.scheduler.next_deadline() {
            if deadline > target {
                break;
            }
            self.now = deadline;
            self.scheduler.service(&mut self.queue, deadline);
            lines.extend(self.drain_actions());
        }

        self.now = target;
        lines.push(self.stamp(&format!("advanced to +{}ms", target.as_millis())));
        lines
    }

    fn handle_link(&mut self, event: LinkEvent) -> Vec<String> {
        let mut lines = vec![self.stamp(&describe_link_event(event))];

        handle_link_event(
            &mut self.monitor,
            &mut self.scheduler,
            &mut self.queue,
            event,
            self.now,
        );

        lines.extend(self.drain_actions());
        lines.push(self.stamp(&format!("scheduler {}", self.scheduler.state())));
        lines
    }

    fn handle_hear(&mut self, beacon: u16) -> Vec<String> {
        if !self.radio.listening {
            return vec![self.stamp("beacon ignored (receiver not active)")];
        }

        let peer = DeviceAddr([0xA0, 0, 0, beacon.to_le_bytes()[0], beacon.to_le_bytes()[1], 0x01]);
        let observation = self.neighbors.observe(peer, beacon, self.now);
        vec![self.stamp(&format!(
            "beacon {beacon} from {peer} ({observation:?}, {} tracked)",
            self.neighbors.len()
        ))]
    }

    fn handle_status(&self) -> Vec<String> {
        let timing = self.scheduler.timing();
        vec![
            self.stamp(&format!("scheduler {}", self.scheduler.state())),
            format!(
                "  epoch {}ms listen {}ms broadcast {}ms ({} started)",
                self.scheduler.epoch_period().as_millis(),
                timing.listen().as_millis(),
                timing.broadcast().as_millis(),
                self.scheduler.epochs_started(),
            ),
            format!(
                "  radio listening={} broadcasting={}",
                self.radio.listening, self.radio.broadcasting
            ),
            format!(
                "  link {} (rejected {})",
                if self.monitor.is_active() { "up" } else { "down" },
                self.monitor.rejected_count(),
            ),
            format!("  neighbors tracked: {}", self.neighbors.len()),
        ]
    }

    /// Executes queued actions in FIFO order against the session radio.
    fn drain_actions(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(action) = self.queue.actions.pop_front() {
            let outcome = execute(&mut self.radio, action);
            let note = match outcome {
                ActionOutcome::Applied => "",
                ActionOutcome::Redundant => " (no-op)",
                ActionOutcome::Errored => " (failed)",
            };
            lines.push(self.stamp(&format!("radio {action}{note}")));

            if self.radio.listening && self.radio.broadcasting {
                lines.push(self.stamp("ERR invariant violated: both phases active"));
            }
        }
        lines
    }

    fn stamp(&self, message: &str) -> String {
        format!("[+{:>6}ms] {message}", self.now.as_millis())
    }
}

fn describe_link_event(event: LinkEvent) -> String {
    match event {
        LinkEvent::Established { peer } => format!("link established by {peer}"),
        LinkEvent::AttemptFailed { reason } => {
            format!("connection attempt failed (reason {reason:#04x})")
        }
        LinkEvent::Terminated { reason } => format!("link terminated (reason {reason:#04x})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(10_000, 800).expect("valid configuration")
    }

    fn flat(lines: Vec<String>) -> String {
        lines.join("\n")
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(Session::new(100, 800).is_err());
    }

    #[test]
    fn start_and_first_phase_swap_follow_the_derived_windows() {
        let mut session = session();

        let started = flat(session.handle_command("start"));
        assert!(started.contains("duty cycle started"));
        assert!(started.contains("radio start-listen"));
        assert!(session.radio.listening);

        let ran = flat(session.handle_command("run 600"));
        assert!(ran.contains("[+   515ms] radio stop-listen"));
        assert!(ran.contains("[+   515ms] radio start-broadcast"));
        assert!(session.radio.broadcasting);
        assert!(!session.radio.listening);
    }

    #[test]
    fn connect_suspends_and_disconnect_resumes() {
        let mut session = session();
        session.handle_command("start");
        session.handle_command("run 600");

        let connected = flat(session.handle_command("connect"));
        assert!(connected.contains("link established"));
        assert!(connected.contains("radio stop-broadcast"));
        assert!(connected.contains("scheduler suspended"));
        assert!(!session.radio.broadcasting);

        // Time passes with the link up; no phase action may fire.
        let idle = flat(session.handle_command("run 30000"));
        assert!(!idle.contains("radio "));

        let resumed = flat(session.handle_command("disconnect"));
        assert!(resumed.contains("radio start-listen"));
        assert!(resumed.contains("scheduler listening"));
        assert!(session.radio.listening);
    }

    #[test]
    fn transcript_never_reports_an_invariant_violation() {
        let mut session = session();
        session.handle_command("start");

        let mut transcript = String::new();
        transcript.push_str(&flat(session.handle_command("run 25000")));
        transcript.push_str(&flat(session.handle_command("connect")));
        transcript.push_str(&flat(session.handle_command("run 5000")));
        transcript.push_str(&flat(session.handle_command("disconnect")));
        transcript.push_str(&flat(session.handle_command("run 25000")));

        assert!(!transcript.contains("invariant violated"));
    }

    #[test]
    fn hear_requires_an_open_listen_window() {
        let mut session = session();
        session.handle_command("start");

        let heard = flat(session.handle_command("hear 42"));
        assert!(heard.contains("beacon 42"));
        assert!(heard.contains("1 tracked"));

        session.handle_command("run 600");
        let ignored = flat(session.handle_command("hear 43"));
        assert!(ignored.contains("receiver not active"));
    }

    #[test]
    fn status_reports_the_derived_windows() {
        let mut session = session();
        session.handle_command("start");
        let status = flat(session.handle_command("status"));

        assert!(status.contains("epoch 10000ms listen 515ms broadcast 9475ms"));
        assert!(status.contains("link down"));
    }
}
