//! Beacon payload codec and scan-filter predicate.
//!
//! A discovery beacon carries four bytes of manufacturer data: the company
//! identifier followed by a beacon identifier, both little-endian. The beacon
//! identifier doubles as a sequence number for deployments that number their
//! packets; the scheduler never looks inside, it only needs the payload to be
//! a fixed, one-packet size class.

use core::fmt;

/// Company identifier carried in every beacon (Nordic Semiconductor ASA).
pub const COMPANY_ID: u16 = 0x0059;

/// Encoded payload length in bytes.
pub const BEACON_PAYLOAD_LEN: usize = 4;

/// 48-bit device address as reported by the link layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeviceAddr(pub [u8; 6]);

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Manufacturer-data payload of one discovery beacon.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BeaconPayload {
    pub company: u16,
    pub beacon: u16,
}

impl BeaconPayload {
    /// Builds a payload carrying a fixed beacon identifier.
    #[must_use]
    pub const fn new(beacon: u16) -> Self {
        Self {
            company: COMPANY_ID,
            beacon,
        }
    }

    /// Encodes the payload into its on-air byte layout.
    #[must_use]
    pub const fn encode(self) -> [u8; BEACON_PAYLOAD_LEN] {
        let company = self.company.to_le_bytes();
        let beacon = self.beacon.to_le_bytes();
        [company[0], company[1], beacon[0], beacon[1]]
    }

    /// Decodes a received manufacturer-data field.
    ///
    /// Returns `None` unless the field is exactly [`BEACON_PAYLOAD_LEN`]
    /// bytes; malformed beacons are dropped, never an error.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let [c0, c1, b0, b1] = *bytes.first_chunk::<BEACON_PAYLOAD_LEN>()?;
        if bytes.len() != BEACON_PAYLOAD_LEN {
            return None;
        }

        Some(Self {
            company: u16::from_le_bytes([c0, c1]),
            beacon: u16::from_le_bytes([b0, b1]),
        })
    }

    /// Scan-filter predicate: does this manufacturer data open with our
    /// company identifier?
    #[must_use]
    pub fn matches_company(bytes: &[u8]) -> bool {
        match bytes.first_chunk::<2>() {
            Some(&prefix) => u16::from_le_bytes(prefix) == COMPANY_ID,
            None => false,
        }
    }
}

/// Wrapping sequence counter for numbered beacon deployments.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SequenceCounter(u16);

impl SequenceCounter {
    /// Creates a counter starting at the given value.
    #[must_use]
    pub const fn starting_at(value: u16) -> Self {
        Self(value)
    }

    /// Returns the value the next packet will carry.
    #[must_use]
    pub const fn current(self) -> u16 {
        self.0
    }

    /// Returns the current value and advances, wrapping at `u16::MAX`.
    pub fn next(&mut self) -> u16 {
        let value = self.0;
        self.0 = self.0.wrapping_add(1);
        value
    }
}
