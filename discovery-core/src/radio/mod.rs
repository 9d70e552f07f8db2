//! Radio control boundary and the deferred-action executor.
//!
//! The link-layer stack behind [`RadioControl`] is an external collaborator;
//! this module only fixes the contract the scheduler's actions are executed
//! against. Redundant starts and stops are expected in normal operation —
//! suspension can race an in-flight phase timeout — so [`execute`] downgrades
//! them to a warning instead of treating them as failures.

use core::fmt;

#[cfg(feature = "defmt")]
use defmt::warn;
#[cfg(not(feature = "defmt"))]
use log::warn;

use crate::scheduler::PhaseAction;

/// Errors surfaced by the link-layer radio calls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RadioError {
    /// The requested phase is already running.
    AlreadyActive,
    /// The requested phase was not running.
    NotActive,
    /// The radio is busy with a conflicting operation.
    Busy,
    /// Link-layer failure with a stack-specific code.
    Failed(i32),
}

impl RadioError {
    /// Stable label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RadioError::AlreadyActive => "already active",
            RadioError::NotActive => "not active",
            RadioError::Busy => "busy",
            RadioError::Failed(_) => "link-layer failure",
        }
    }

    /// Returns `true` for the races [`execute`] treats as harmless.
    #[must_use]
    pub const fn is_redundant(self) -> bool {
        matches!(self, RadioError::AlreadyActive | RadioError::NotActive)
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::Failed(code) => write!(f, "link-layer failure ({code})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Abstraction over the broadcast/listen halves of the radio.
pub trait RadioControl {
    /// Begins emitting discovery beacons.
    fn start_broadcast(&mut self) -> Result<(), RadioError>;

    /// Stops emitting discovery beacons.
    fn stop_broadcast(&mut self) -> Result<(), RadioError>;

    /// Begins receiving peer beacons.
    fn start_listen(&mut self) -> Result<(), RadioError>;

    /// Stops receiving peer beacons.
    fn stop_listen(&mut self) -> Result<(), RadioError>;
}

/// Radio that performs no link-layer interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRadio;

impl NoopRadio {
    /// Creates a new no-op radio.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RadioControl for NoopRadio {
    fn start_broadcast(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn stop_broadcast(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn start_listen(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    fn stop_listen(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
}

/// Result of executing one deferred action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
    /// The radio accepted the operation.
    Applied,
    /// The radio was already in the requested sub-state.
    Redundant,
    /// The radio reported a failure; the cycle proceeds regardless.
    Errored,
}

/// Dispatches a [`PhaseAction`] to the radio.
///
/// Failures never propagate: a redundant start/stop is at most one warning,
/// and any other error is logged while the duty cycle keeps advancing — the
/// next phase boundary re-attempts the complementary operation.
pub fn execute<R: RadioControl>(radio: &mut R, action: PhaseAction) -> ActionOutcome {
    let result = match action {
        PhaseAction::StartListen => radio.start_listen(),
        PhaseAction::StopListen => radio.stop_listen(),
        PhaseAction::StartBroadcast => radio.start_broadcast(),
        PhaseAction::StopBroadcast => radio.stop_broadcast(),
    };

    match result {
        Ok(()) => ActionOutcome::Applied,
        Err(err) if err.is_redundant() => {
            warn!("radio: {} was a no-op ({})", action.label(), err.label());
            ActionOutcome::Redundant
        }
        Err(err) => {
            warn!("radio: {} failed ({})", action.label(), err.label());
            ActionOutcome::Errored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Radio that tracks phase flags and reports redundant transitions the
    /// way a real link layer does.
    #[derive(Default)]
    struct FlagRadio {
        broadcasting: bool,
        listening: bool,
    }

    impl RadioControl for FlagRadio {
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

    #[test]
    fn execute_applies_each_action() {
        let mut radio = FlagRadio::default();

        assert_eq!(
            execute(&mut radio, PhaseAction::StartListen),
            ActionOutcome::Applied
        );
        assert!(radio.listening);

        assert_eq!(
            execute(&mut radio, PhaseAction::StopListen),
            ActionOutcome::Applied
        );
        assert_eq!(
            execute(&mut radio, PhaseAction::StartBroadcast),
            ActionOutcome::Applied
        );
        assert!(radio.broadcasting);
    }

    #[test]
    fn redundant_stop_is_a_safe_no_op() {
        let mut radio = FlagRadio::default();
        execute(&mut radio, PhaseAction::StartBroadcast);
        execute(&mut radio, PhaseAction::StopBroadcast);

        // Simulates suspension racing the broadcast timeout.
        assert_eq!(
            execute(&mut radio, PhaseAction::StopBroadcast),
            ActionOutcome::Redundant
        );
        assert!(!radio.broadcasting);
    }

    #[test]
    fn link_layer_failure_does_not_halt_execution() {
        struct FailingRadio;

        impl RadioControl for FailingRadio {
            fn start_broadcast(&mut self) -> Result<(), RadioError> {
                Err(RadioError::Failed(-12))
            }

            fn stop_broadcast(&mut self) -> Result<(), RadioError> {
                Ok(())
            }

            fn start_listen(&mut self) -> Result<(), RadioError> {
                Err(RadioError::Busy)
            }

            fn stop_listen(&mut self) -> Result<(), RadioError> {
                Ok(())
            }
        }

        let mut radio = FailingRadio;
        assert_eq!(
            execute(&mut radio, PhaseAction::StartBroadcast),
            ActionOutcome::Errored
        );
        assert_eq!(
            execute(&mut radio, PhaseAction::StartListen),
            ActionOutcome::Errored
        );
    }
}
