//! Connection interrupt handling.
//!
//! The external link layer delivers three distinct events: a link was
//! established, a connection attempt failed, and a link terminated. Only an
//! accepted establishment suspends duty cycling, and only the termination of
//! the tracked link resumes it. A failed attempt touches no state at all —
//! the device keeps cycling as if nothing happened.
//!
//! The design owns one documented limitation: if the link layer loses a
//! connection without delivering a terminate event, duty cycling stays
//! suspended indefinitely. There is no timeout fallback here.

#[cfg(feature = "defmt")]
use defmt::{info, warn};
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use core::ops::Add;
use core::time::Duration;

use crate::payload::DeviceAddr;
use crate::scheduler::{ActionSink, EpochScheduler};

/// Notification delivered by the external link layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    /// A peer-initiated link is up.
    Established { peer: DeviceAddr },
    /// A connection attempt failed before any link existed.
    AttemptFailed { reason: u8 },
    /// The active link ended.
    Terminated { reason: u8 },
}

/// Details of the link currently being tracked.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActiveLink<TInstant> {
    pub peer: DeviceAddr,
    pub established_at: TInstant,
}

/// Outcome of an establishment notification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkAccept {
    /// The link is now tracked.
    Accepted,
    /// Another link is already tracked; the existing link wins.
    RejectedBusy,
}

/// Tracks at most one active link.
#[derive(Clone, Debug)]
pub struct LinkMonitor<TInstant> {
    active: Option<ActiveLink<TInstant>>,
    rejected: u32,
}

impl<TInstant: Copy> LinkMonitor<TInstant> {
    /// Creates a monitor with no tracked link.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: None,
            rejected: 0,
        }
    }

    /// Returns `true` while a link is tracked.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the tracked link, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&ActiveLink<TInstant>> {
        self.active.as_ref()
    }

    /// Returns how many establishment attempts were rejected while busy.
    #[must_use]
    pub const fn rejected_count(&self) -> u32 {
        self.rejected
    }

    /// Records an established link; a second link while one is tracked is
    /// rejected and counted.
    pub fn on_established(&mut self, peer: DeviceAddr, now: TInstant) -> LinkAccept {
        if self.active.is_some() {
            self.rejected = self.rejected.saturating_add(1);
            warn!("link: rejecting establishment while a link is active");
            return LinkAccept::RejectedBusy;
        }

        info!("link: established");
        self.active = Some(ActiveLink {
            peer,
            established_at: now,
        });
        LinkAccept::Accepted
    }

    /// Records a failed connection attempt. No link state is touched; the
    /// attempt never produced a link to release.
    pub fn on_attempt_failed(&mut self, reason: u8) {
        warn!("link: connection attempt failed (reason {})", reason);
    }

    /// Clears the tracked link, returning it if one existed. A terminate
    /// without a tracked link is a link-layer contract violation, logged and
    /// otherwise ignored.
    pub fn on_terminated(&mut self, reason: u8) -> Option<ActiveLink<TInstant>> {
        match self.active.take() {
            Some(link) => {
                info!("link: terminated (reason {})", reason);
                Some(link)
            }
            None => {
                warn!("link: terminate without a tracked link (reason {})", reason);
                None
            }
        }
    }
}

impl<TInstant: Copy> Default for LinkMonitor<TInstant> {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies a link event to the scheduler.
///
/// This is the single place connection lifecycle and duty cycling meet: an
/// accepted establishment suspends the scheduler, a matched termination
/// resumes it from a fresh epoch, and everything else leaves the cycle alone.
pub fn handle_link_event<TInstant, S>(
    monitor: &mut LinkMonitor<TInstant>,
    scheduler: &mut EpochScheduler<TInstant>,
    sink: &mut S,
    event: LinkEvent,
    now: TInstant,
) where
    TInstant: Copy + Ord + Add<Duration, Output = TInstant>,
    S: ActionSink,
{
    match event {
        LinkEvent::Established { peer } => {
            if monitor.on_established(peer, now) == LinkAccept::Accepted {
                scheduler.suspend(sink);
            }
        }
        LinkEvent::AttemptFailed { reason } => monitor.on_attempt_failed(reason),
        LinkEvent::Terminated { reason } => {
            if monitor.on_terminated(reason).is_some() {
                scheduler.resume(sink, now);
            }
        }
    }
}
