#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lightweight atomics track the radio phases, the link state, and discovery
//! progress so diagnostics can surface a [`StatusSnapshot`] without touching
//! the task-owned state machines.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Receiver currently running.
static LISTENING: AtomicBool = AtomicBool::new(false);
/// Beacon transmission loop currently running.
static BROADCASTING: AtomicBool = AtomicBool::new(false);
/// A peer link is up and duty cycling is suspended.
static LINK_ACTIVE: AtomicBool = AtomicBool::new(false);
/// Epochs begun since boot.
static EPOCHS_STARTED: AtomicU32 = AtomicU32::new(0);
/// Distinct peers currently tracked in the neighbor table.
static NEIGHBOR_COUNT: AtomicU32 = AtomicU32::new(0);

/// Point-in-time view of the shared status atomics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub listening: bool,
    pub broadcasting: bool,
    pub link_active: bool,
    pub epochs_started: u32,
    pub neighbor_count: u32,
}

/// Records whether the receiver is running.
pub fn record_listening(listening: bool) {
    LISTENING.store(listening, Ordering::Relaxed);
}

/// Records whether the beacon transmission loop is running.
pub fn record_broadcasting(broadcasting: bool) {
    BROADCASTING.store(broadcasting, Ordering::Relaxed);
}

/// Records whether a peer link is up.
pub fn record_link_active(active: bool) {
    LINK_ACTIVE.store(active, Ordering::Relaxed);
}

/// Records the number of epochs begun since boot.
pub fn record_epochs_started(epochs: u32) {
    EPOCHS_STARTED.store(epochs, Ordering::Relaxed);
}

/// Records the current neighbor table population.
pub fn record_neighbor_count(count: usize) {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    NEIGHBOR_COUNT.store(count, Ordering::Relaxed);
}

/// Builds a [`StatusSnapshot`] from the stored metrics.
#[must_use]
pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        listening: LISTENING.load(Ordering::Relaxed),
        broadcasting: BROADCASTING.load(Ordering::Relaxed),
        link_active: LINK_ACTIVE.load(Ordering::Relaxed),
        epochs_started: EPOCHS_STARTED.load(Ordering::Relaxed),
        neighbor_count: NEIGHBOR_COUNT.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The phase flags are exercised through `PhaseEngine`, whose tests run in
    // parallel with this one; only the fields nothing else touches are
    // asserted here.
    #[test]
    fn snapshot_reflects_recorded_values() {
        record_link_active(true);
        record_epochs_started(17);
        record_neighbor_count(3);

        let snapshot = snapshot();
        assert!(snapshot.link_active);
        assert_eq!(snapshot.epochs_started, 17);
        assert_eq!(snapshot.neighbor_count, 3);
    }
}
