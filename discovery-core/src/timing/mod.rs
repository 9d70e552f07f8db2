//! Epoch timing configuration and window derivation.
//!
//! An epoch is one repeating cycle of a listen window followed by a broadcast
//! window and an idle guard margin. Only the epoch length and the advertising
//! interval are configured; both window lengths are derived here, once, at
//! startup. Deriving the broadcast window by subtraction keeps the two phases
//! from drifting apart under configuration changes: the listen window always
//! covers one full advertising interval (plus the link layer's randomized
//! pre-packet delay and one packet of airtime), and whatever remains of the
//! epoch after the guard margin belongs to broadcasting.

use core::fmt;
use core::time::Duration;

/// One advertising-interval unit in radio-native time (625 µs).
pub const ADVERTISE_UNIT: Duration = Duration::from_micros(625);

/// Worst-case randomized delay the link layer adds before each beacon packet.
pub const RANDOM_DELAY_BUDGET: Duration = Duration::from_millis(10);

/// Airtime of a single beacon packet.
pub const PACKET_AIRTIME: Duration = Duration::from_millis(5);

/// Guard margin keeping the last beacon of an epoch clear of the boundary.
pub const EPOCH_GUARD: Duration = Duration::from_millis(10);

/// Advertising interval expressed in radio-native 625 µs units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdvertiseInterval(u16);

impl AdvertiseInterval {
    /// Wraps a raw unit count. Zero is rejected by [`DerivedTiming::derive`].
    #[must_use]
    pub const fn from_units(units: u16) -> Self {
        Self(units)
    }

    /// Returns the raw unit count.
    #[must_use]
    pub const fn units(self) -> u16 {
        self.0
    }

    /// Converts the interval into wall-clock time.
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_micros(625 * self.0 as u64)
    }
}

impl fmt::Display for AdvertiseInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} units ({} ms)", self.0, self.as_duration().as_millis())
    }
}

/// Immutable configuration consumed once at startup.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EpochConfig {
    epoch_length: Duration,
    advertise_interval: AdvertiseInterval,
}

impl EpochConfig {
    /// Builds a configuration from an epoch length and advertising interval.
    #[must_use]
    pub const fn new(epoch_length: Duration, advertise_interval: AdvertiseInterval) -> Self {
        Self {
            epoch_length,
            advertise_interval,
        }
    }

    /// Convenience constructor taking the units the configuration surface uses.
    #[must_use]
    pub const fn from_millis(epoch_length_ms: u64, advertise_interval_units: u16) -> Self {
        Self::new(
            Duration::from_millis(epoch_length_ms),
            AdvertiseInterval::from_units(advertise_interval_units),
        )
    }

    /// Returns the configured epoch length.
    #[must_use]
    pub const fn epoch_length(&self) -> Duration {
        self.epoch_length
    }

    /// Returns the configured advertising interval.
    #[must_use]
    pub const fn advertise_interval(&self) -> AdvertiseInterval {
        self.advertise_interval
    }
}

/// Listen and broadcast window lengths derived from an [`EpochConfig`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DerivedTiming {
    listen: Duration,
    broadcast: Duration,
}

impl DerivedTiming {
    /// Derives both phase windows from the configuration.
    ///
    /// The listen window covers one advertising interval plus the randomized
    /// pre-packet delay budget and one packet of airtime, so a peer's beacon
    /// lands fully inside it wherever the peer's random delay falls. The
    /// broadcast window is the remainder of the epoch minus the guard margin.
    ///
    /// # Errors
    ///
    /// Returns a [`TimingError`] when either configured value is zero or the
    /// epoch is too short to leave a positive broadcast window. Configuration
    /// errors are fatal: callers must not start a scheduler from them.
    pub fn derive(config: &EpochConfig) -> Result<Self, TimingError> {
        if config.epoch_length().is_zero() {
            return Err(TimingError::ZeroEpoch);
        }
        if config.advertise_interval().units() == 0 {
            return Err(TimingError::ZeroInterval);
        }

        let listen = config.advertise_interval().as_duration() + RANDOM_DELAY_BUDGET + PACKET_AIRTIME;
        let reserved = listen + EPOCH_GUARD;
        let broadcast = config.epoch_length().saturating_sub(reserved);
        if broadcast.is_zero() {
            return Err(TimingError::EpochTooShort {
                epoch: config.epoch_length(),
                reserved,
            });
        }

        Ok(Self { listen, broadcast })
    }

    /// Builds timing from pre-computed windows; used by tests and the emulator.
    #[must_use]
    pub const fn from_windows(listen: Duration, broadcast: Duration) -> Self {
        Self { listen, broadcast }
    }

    /// Returns the listen window length.
    #[must_use]
    pub const fn listen(&self) -> Duration {
        self.listen
    }

    /// Returns the broadcast window length.
    #[must_use]
    pub const fn broadcast(&self) -> Duration {
        self.broadcast
    }

    /// Returns the combined radio-active time per epoch.
    #[must_use]
    pub const fn active(&self) -> Duration {
        self.listen.saturating_add(self.broadcast)
    }
}

/// Fatal configuration errors reported by [`DerivedTiming::derive`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingError {
    /// The epoch length is zero.
    ZeroEpoch,
    /// The advertising interval is zero units.
    ZeroInterval,
    /// The epoch cannot fit the listen window plus the guard margin.
    EpochTooShort {
        epoch: Duration,
        /// Listen window plus guard; the epoch must strictly exceed this.
        reserved: Duration,
    },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::ZeroEpoch => f.write_str("epoch length must be positive"),
            TimingError::ZeroInterval => f.write_str("advertising interval must be positive"),
            TimingError::EpochTooShort { epoch, reserved } => write!(
                f,
                "epoch of {} ms cannot fit listen window and guard ({} ms)",
                epoch.as_millis(),
                reserved.as_millis()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_configuration_derives_documented_windows() {
        // 10 s epoch, 800 × 625 µs = 500 ms advertising interval.
        let config = EpochConfig::from_millis(10_000, 800);
        let timing = DerivedTiming::derive(&config).expect("valid configuration");

        assert_eq!(timing.listen(), Duration::from_millis(515));
        assert_eq!(timing.broadcast(), Duration::from_millis(9_475));
    }

    #[test]
    fn windows_and_guard_always_fit_the_epoch() {
        for epoch_ms in (1_000..=30_000).step_by(500) {
            for units in [160, 320, 800, 1_600, 3_200] {
                let config = EpochConfig::from_millis(epoch_ms, units);
                let Ok(timing) = DerivedTiming::derive(&config) else {
                    continue;
                };

                assert!(
                    timing.active() + EPOCH_GUARD <= config.epoch_length(),
                    "epoch {epoch_ms} ms / {units} units overflows its epoch"
                );
                assert!(!timing.listen().is_zero());
                assert!(!timing.broadcast().is_zero());
            }
        }
    }

    #[test]
    fn too_short_epoch_is_a_configuration_error() {
        let config = EpochConfig::from_millis(500, 800);
        assert!(matches!(
            DerivedTiming::derive(&config),
            Err(TimingError::EpochTooShort { .. })
        ));

        // Exactly listen + guard leaves a zero broadcast window, still fatal.
        let config = EpochConfig::from_millis(525, 800);
        assert!(matches!(
            DerivedTiming::derive(&config),
            Err(TimingError::EpochTooShort { .. })
        ));
    }

    #[test]
    fn zero_configuration_values_are_rejected() {
        assert_eq!(
            DerivedTiming::derive(&EpochConfig::from_millis(0, 800)),
            Err(TimingError::ZeroEpoch)
        );
        assert_eq!(
            DerivedTiming::derive(&EpochConfig::from_millis(10_000, 0)),
            Err(TimingError::ZeroInterval)
        );
    }

    #[test]
    fn advertise_interval_unit_conversion_is_exact() {
        assert_eq!(
            AdvertiseInterval::from_units(800).as_duration(),
            Duration::from_millis(500)
        );
        assert_eq!(
            AdvertiseInterval::from_units(1).as_duration(),
            Duration::from_micros(625)
        );
    }
}
