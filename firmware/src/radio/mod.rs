#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Phase bookkeeping and beacon framing for the radio task.
//!
//! [`PhaseEngine`] is the firmware's [`RadioControl`] implementation. It only
//! flips the mode the radio task's airtime loops key off and mirrors the
//! result into the status atomics; the actual transmit/receive work happens
//! in the runtime task that owns the RADIO peripheral. Keeping the engine
//! free of hardware types lets the mode protocol be tested on the host.

use discovery_core::payload::{BEACON_PAYLOAD_LEN, BeaconPayload, DeviceAddr, SequenceCounter};
use discovery_core::radio::{RadioControl, RadioError};

use crate::status;

/// Advertising channel 37 center frequency in MHz.
pub const ADV_CHANNEL_FREQ_MHZ: u32 = 2_402;

/// Access address shared by all advertising-channel traffic.
pub const ADV_ACCESS_ADDRESS: u32 = 0x8E89_BED6;

/// CRC initial value for advertising PDUs.
pub const ADV_CRC_INIT: u32 = 0x0055_5555;

/// CRC polynomial for advertising PDUs (x^24 + x^10 + x^9 + x^6 + x^4 + x^3 + x + 1).
pub const ADV_CRC_POLY: u16 = 0x065B;

/// Largest advertising PDU this firmware frames: 2-byte header, 6-byte
/// address, manufacturer-data structure.
pub const MAX_PDU_LEN: usize = 2 + 6 + 2 + BEACON_PAYLOAD_LEN;

/// ADV_NONCONN_IND with a random transmitter address.
const PDU_HEADER: u8 = 0x42;

/// AD type for manufacturer-specific data.
const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Which airtime loop the radio task should be running.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RadioMode {
    Idle,
    Listening,
    Broadcasting,
}

/// Mode state machine the deferred actions execute against.
///
/// The FIFO queue guarantees a stop always reaches the engine before the
/// next start, so a start arriving while the other phase is still running is
/// an ordering bug upstream and is reported as [`RadioError::Busy`].
pub struct PhaseEngine {
    mode: RadioMode,
    sequence: SequenceCounter,
}

impl PhaseEngine {
    /// Creates an idle engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: RadioMode::Idle,
            sequence: SequenceCounter::starting_at(0),
        }
    }

    /// Returns the currently requested mode.
    #[must_use]
    pub const fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Returns the sequence number for the next beacon packet.
    pub fn next_sequence(&mut self) -> u16 {
        self.sequence.next()
    }

    fn enter(&mut self, mode: RadioMode) {
        self.mode = mode;
        status::record_listening(mode == RadioMode::Listening);
        status::record_broadcasting(mode == RadioMode::Broadcasting);
    }
}

impl Default for PhaseEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioControl for PhaseEngine {
    fn start_broadcast(&mut self) -> Result<(), RadioError> {
        match self.mode {
            RadioMode::Broadcasting => Err(RadioError::AlreadyActive),
            RadioMode::Listening => Err(RadioError::Busy),
            RadioMode::Idle => {
                self.enter(RadioMode::Broadcasting);
                Ok(())
            }
        }
    }

    fn stop_broadcast(&mut self) -> Result<(), RadioError> {
        if self.mode != RadioMode::Broadcasting {
            return Err(RadioError::NotActive);
        }
        self.enter(RadioMode::Idle);
        Ok(())
    }

    fn start_listen(&mut self) -> Result<(), RadioError> {
        match self.mode {
            RadioMode::Listening => Err(RadioError::AlreadyActive),
            RadioMode::Broadcasting => Err(RadioError::Busy),
            RadioMode::Idle => {
                self.enter(RadioMode::Listening);
                Ok(())
            }
        }
    }

    fn stop_listen(&mut self) -> Result<(), RadioError> {
        if self.mode != RadioMode::Listening {
            return Err(RadioError::NotActive);
        }
        self.enter(RadioMode::Idle);
        Ok(())
    }
}

/// Frames one non-connectable advertising PDU carrying the beacon payload.
///
/// Returns the number of valid bytes in `pdu`.
pub fn build_beacon_pdu(
    addr: DeviceAddr,
    payload: &BeaconPayload,
    pdu: &mut [u8; MAX_PDU_LEN],
) -> usize {
    let encoded = payload.encode();

    pdu[0] = PDU_HEADER;
    pdu[1] = (MAX_PDU_LEN - 2) as u8;
    pdu[2..8].copy_from_slice(&addr.0);
    pdu[8] = (1 + BEACON_PAYLOAD_LEN) as u8;
    pdu[9] = AD_TYPE_MANUFACTURER_DATA;
    pdu[10..10 + BEACON_PAYLOAD_LEN].copy_from_slice(&encoded);

    MAX_PDU_LEN
}

/// Parses a received advertising PDU into the sender address and payload.
///
/// Returns `None` for anything that is not a well-formed beacon of ours:
/// wrong PDU type, wrong length, wrong AD structure, or a foreign company
/// identifier. Malformed traffic is dropped silently; the listen window sees
/// plenty of unrelated advertising.
pub fn parse_beacon_pdu(pdu: &[u8]) -> Option<(DeviceAddr, BeaconPayload)> {
    if pdu.len() < MAX_PDU_LEN {
        return None;
    }
    // Low nibble carries the PDU type; ignore the TxAdd/RxAdd flags.
    if pdu[0] & 0x0F != PDU_HEADER & 0x0F {
        return None;
    }
    if usize::from(pdu[1]) != MAX_PDU_LEN - 2 {
        return None;
    }
    if usize::from(pdu[8]) != 1 + BEACON_PAYLOAD_LEN || pdu[9] != AD_TYPE_MANUFACTURER_DATA {
        return None;
    }
    if !BeaconPayload::matches_company(&pdu[10..10 + BEACON_PAYLOAD_LEN]) {
        return None;
    }

    let mut addr = [0u8; 6];
    addr.copy_from_slice(&pdu[2..8]);
    let payload = BeaconPayload::parse(&pdu[10..10 + BEACON_PAYLOAD_LEN])?;
    Some((DeviceAddr(addr), payload))
}

/// Pseudo-random 0–9 ms pre-packet delay, mimicking the advertising delay a
/// full link layer inserts between packets.
pub struct AdvDelay(u16);

impl AdvDelay {
    /// Seeds the generator; zero seeds are bumped to keep the shift register
    /// from sticking.
    #[must_use]
    pub const fn new(seed: u16) -> Self {
        Self(if seed == 0 { 0xACE1 } else { seed })
    }

    /// Returns the next delay in whole milliseconds, in `0..10`.
    pub fn next_millis(&mut self) -> u64 {
        // 16-bit xorshift.
        let mut value = self.0;
        value ^= value << 7;
        value ^= value >> 9;
        value ^= value << 8;
        self.0 = value;
        u64::from(value % 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::radio::{ActionOutcome, execute};
    use discovery_core::scheduler::PhaseAction;

    const ADDR: DeviceAddr = DeviceAddr([0xC1, 0x20, 0x33, 0x40, 0x55, 0x66]);

    #[test]
    fn engine_follows_the_phase_protocol() {
        let mut engine = PhaseEngine::new();
        assert_eq!(engine.mode(), RadioMode::Idle);

        engine.start_listen().expect("listen from idle");
        assert_eq!(engine.mode(), RadioMode::Listening);

        engine.stop_listen().expect("stop listen");
        engine.start_broadcast().expect("broadcast from idle");
        assert_eq!(engine.mode(), RadioMode::Broadcasting);

        engine.stop_broadcast().expect("stop broadcast");
        assert_eq!(engine.mode(), RadioMode::Idle);
    }

    #[test]
    fn redundant_transitions_report_without_corrupting_mode() {
        let mut engine = PhaseEngine::new();

        assert_eq!(engine.stop_broadcast(), Err(RadioError::NotActive));
        engine.start_broadcast().expect("broadcast");
        assert_eq!(engine.start_broadcast(), Err(RadioError::AlreadyActive));
        assert_eq!(engine.mode(), RadioMode::Broadcasting);

        // The executor downgrades the race to a warning.
        assert_eq!(
            execute(&mut engine, PhaseAction::StopBroadcast),
            ActionOutcome::Applied
        );
        assert_eq!(
            execute(&mut engine, PhaseAction::StopBroadcast),
            ActionOutcome::Redundant
        );
        assert_eq!(engine.mode(), RadioMode::Idle);
    }

    #[test]
    fn cross_phase_start_is_a_busy_error() {
        let mut engine = PhaseEngine::new();
        engine.start_listen().expect("listen");
        assert_eq!(engine.start_broadcast(), Err(RadioError::Busy));
        assert_eq!(engine.mode(), RadioMode::Listening);
    }

    #[test]
    fn beacon_pdu_round_trips() {
        let mut pdu = [0u8; MAX_PDU_LEN];
        let payload = BeaconPayload::new(0x0102);
        let len = build_beacon_pdu(ADDR, &payload, &mut pdu);
        assert_eq!(len, MAX_PDU_LEN);

        let (addr, parsed) = parse_beacon_pdu(&pdu).expect("well-formed beacon");
        assert_eq!(addr, ADDR);
        assert_eq!(parsed, payload);
    }

    #[test]
    fn foreign_traffic_is_dropped() {
        let mut pdu = [0u8; MAX_PDU_LEN];
        let payload = BeaconPayload::new(7);
        build_beacon_pdu(ADDR, &payload, &mut pdu);

        let mut scan_response = pdu;
        scan_response[0] = 0x44;
        assert!(parse_beacon_pdu(&scan_response).is_none());

        let mut foreign_company = pdu;
        foreign_company[10] = 0x4C;
        assert!(parse_beacon_pdu(&foreign_company).is_none());

        assert!(parse_beacon_pdu(&pdu[..8]).is_none());
    }

    #[test]
    fn adv_delay_stays_inside_the_budget() {
        let mut delay = AdvDelay::new(0);
        for _ in 0..1_000 {
            assert!(delay.next_millis() < 10);
        }
    }
}
