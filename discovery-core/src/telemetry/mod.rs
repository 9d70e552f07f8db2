//! Telemetry event catalog and history ring.
//!
//! Events carry compact numeric codes so they can be mirrored over
//! diagnostics transports without string formatting on target. The ring is
//! generic over the instant type and therefore lives here rather than in the
//! firmware crate; the firmware binds it to its tick clock.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

/// Identifier attached to each recorded event.
pub type EventId = u32;

/// Discriminated telemetry events shared across all targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    ListenStarted,
    ListenStopped,
    BroadcastStarted,
    BroadcastStopped,
    SchedulerSuspended,
    SchedulerResumed,
    LinkEstablished,
    LinkTerminated,
    LinkRejected,
    LinkAttemptFailed,
    NeighborSeen,
    Custom(u16),
}

impl TelemetryEventKind {
    const LISTEN_STARTED_CODE: u16 = 0x0000;
    const LISTEN_STOPPED_CODE: u16 = 0x0001;
    const BROADCAST_STARTED_CODE: u16 = 0x0002;
    const BROADCAST_STOPPED_CODE: u16 = 0x0003;
    const SUSPENDED_CODE: u16 = 0x0004;
    const RESUMED_CODE: u16 = 0x0005;
    const LINK_ESTABLISHED_CODE: u16 = 0x0010;
    const LINK_TERMINATED_CODE: u16 = 0x0011;
    const LINK_REJECTED_CODE: u16 = 0x0012;
    const LINK_ATTEMPT_FAILED_CODE: u16 = 0x0013;
    const NEIGHBOR_SEEN_CODE: u16 = 0x0020;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::ListenStarted => Self::LISTEN_STARTED_CODE,
            TelemetryEventKind::ListenStopped => Self::LISTEN_STOPPED_CODE,
            TelemetryEventKind::BroadcastStarted => Self::BROADCAST_STARTED_CODE,
            TelemetryEventKind::BroadcastStopped => Self::BROADCAST_STOPPED_CODE,
            TelemetryEventKind::SchedulerSuspended => Self::SUSPENDED_CODE,
            TelemetryEventKind::SchedulerResumed => Self::RESUMED_CODE,
            TelemetryEventKind::LinkEstablished => Self::LINK_ESTABLISHED_CODE,
            TelemetryEventKind::LinkTerminated => Self::LINK_TERMINATED_CODE,
            TelemetryEventKind::LinkRejected => Self::LINK_REJECTED_CODE,
            TelemetryEventKind::LinkAttemptFailed => Self::LINK_ATTEMPT_FAILED_CODE,
            TelemetryEventKind::NeighborSeen => Self::NEIGHBOR_SEEN_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`Self::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::LISTEN_STARTED_CODE => TelemetryEventKind::ListenStarted,
            Self::LISTEN_STOPPED_CODE => TelemetryEventKind::ListenStopped,
            Self::BROADCAST_STARTED_CODE => TelemetryEventKind::BroadcastStarted,
            Self::BROADCAST_STOPPED_CODE => TelemetryEventKind::BroadcastStopped,
            Self::SUSPENDED_CODE => TelemetryEventKind::SchedulerSuspended,
            Self::RESUMED_CODE => TelemetryEventKind::SchedulerResumed,
            Self::LINK_ESTABLISHED_CODE => TelemetryEventKind::LinkEstablished,
            Self::LINK_TERMINATED_CODE => TelemetryEventKind::LinkTerminated,
            Self::LINK_REJECTED_CODE => TelemetryEventKind::LinkRejected,
            Self::LINK_ATTEMPT_FAILED_CODE => TelemetryEventKind::LinkAttemptFailed,
            Self::NEIGHBOR_SEEN_CODE => TelemetryEventKind::NeighborSeen,
            other => TelemetryEventKind::Custom(other),
        }
    }

    /// Stable label used in logs and transcripts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TelemetryEventKind::ListenStarted => "listen-started",
            TelemetryEventKind::ListenStopped => "listen-stopped",
            TelemetryEventKind::BroadcastStarted => "broadcast-started",
            TelemetryEventKind::BroadcastStopped => "broadcast-stopped",
            TelemetryEventKind::SchedulerSuspended => "scheduler-suspended",
            TelemetryEventKind::SchedulerResumed => "scheduler-resumed",
            TelemetryEventKind::LinkEstablished => "link-established",
            TelemetryEventKind::LinkTerminated => "link-terminated",
            TelemetryEventKind::LinkRejected => "link-rejected",
            TelemetryEventKind::LinkAttemptFailed => "link-attempt-failed",
            TelemetryEventKind::NeighborSeen => "neighbor-seen",
            TelemetryEventKind::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Default number of records retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Telemetry record stored in the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord<TInstant> {
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
}

/// Fixed-capacity event history with monotonically increasing identifiers.
pub struct TelemetryLog<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>,
    next_id: EventId,
}

impl<TInstant: Copy, const CAPACITY: usize> TelemetryLog<TInstant, CAPACITY> {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 0,
        }
    }

    /// Records an event, returning its identifier.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp: TInstant) -> EventId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Iterates over stored records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }
}

impl<TInstant: Copy, const CAPACITY: usize> Default for TelemetryLog<TInstant, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip() {
        let kinds = [
            TelemetryEventKind::ListenStarted,
            TelemetryEventKind::BroadcastStopped,
            TelemetryEventKind::SchedulerSuspended,
            TelemetryEventKind::LinkRejected,
            TelemetryEventKind::LinkAttemptFailed,
            TelemetryEventKind::NeighborSeen,
            TelemetryEventKind::Custom(0x7777),
        ];

        for kind in kinds {
            assert_eq!(TelemetryEventKind::from_raw(kind.to_raw()), kind);
        }
    }

    #[test]
    fn record_assigns_sequential_ids_and_keeps_order() {
        let mut log = TelemetryLog::<u64, 4>::new();

        let first = log.record(TelemetryEventKind::ListenStarted, 10);
        let second = log.record(TelemetryEventKind::ListenStopped, 20);
        assert_eq!(first, 0);
        assert_eq!(second, 1);

        let latest = log.latest().expect("latest record");
        assert_eq!(latest.event, TelemetryEventKind::ListenStopped);
        assert_eq!(latest.timestamp, 20);

        let ids: heapless::Vec<EventId, 8> = log.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), [0, 1]);
    }

    #[test]
    fn ring_overwrites_oldest_records() {
        let mut log = TelemetryLog::<u64, 2>::new();
        log.record(TelemetryEventKind::ListenStarted, 1);
        log.record(TelemetryEventKind::ListenStopped, 2);
        log.record(TelemetryEventKind::BroadcastStarted, 3);

        assert_eq!(log.len(), 2);
        let ids: heapless::Vec<EventId, 4> = log.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), [1, 2]);
    }
}
