#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Telemetry recorder bound to the firmware clock.
//!
//! Wraps the shared history ring from `discovery-core` and mirrors each event
//! to defmt (or stdout on host builds) so phase transitions are visible
//! during bring-up without extra plumbing.

use discovery_core::telemetry::{EventId, TelemetryEventKind, TelemetryLog, TelemetryRecord};

use crate::duty::FirmwareInstant;

/// Records discovery events into the shared ring and mirrors them to the
/// console transport.
pub struct TelemetryRecorder {
    log: TelemetryLog<FirmwareInstant>,
}

impl TelemetryRecorder {
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            log: TelemetryLog::new(),
        }
    }

    /// Records an event, returning its identifier.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: FirmwareInstant) -> EventId {
        emit_log(event.label(), timestamp.into_embassy().as_micros());
        self.log.record(event, timestamp)
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<FirmwareInstant>> {
        self.log.latest()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn emit_log(event: &'static str, timestamp_us: u64) {
    defmt::info!("telemetry: {} t={}us", event, timestamp_us);
}

#[cfg(not(target_os = "none"))]
fn emit_log(event: &'static str, timestamp_us: u64) {
    println!("telemetry: {event} t={timestamp_us}us");
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Instant;

    fn micros(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_micros(value))
    }

    #[test]
    fn records_events_with_sequential_ids() {
        let mut recorder = TelemetryRecorder::new();

        let first = recorder.record(TelemetryEventKind::ListenStarted, micros(100));
        let second = recorder.record(TelemetryEventKind::ListenStopped, micros(250));
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(recorder.len(), 2);

        let latest = recorder.latest().expect("latest record");
        assert_eq!(latest.event, TelemetryEventKind::ListenStopped);
        assert_eq!(latest.timestamp, micros(250));
    }
}
