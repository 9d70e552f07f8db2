//! Deferred-action consumer and airtime loops.
//!
//! The single consumer of the action queue; because every start/stop runs
//! here, in arrival order, no two radio operations can ever overlap. While a
//! phase is active the task interleaves the phase's airtime work with waiting
//! for the next action, so a stop takes effect at the next packet boundary.

use discovery_core::neighbors::NeighborTable;
use discovery_core::payload::{BeaconPayload, DeviceAddr};
use discovery_core::radio::execute;
use embassy_futures::select::{Either, select};
use embassy_nrf::gpio::Output;
use embassy_nrf::radio::ble::Radio;
use embassy_nrf::{Peri, bind_interrupts, peripherals, radio as nrf_radio};
use embassy_time::{Duration, Instant, Timer};

use crate::duty::{ActionReceiver, FirmwareInstant};
use crate::radio::{
    ADV_ACCESS_ADDRESS, ADV_CHANNEL_FREQ_MHZ, ADV_CRC_INIT, ADV_CRC_POLY, AdvDelay, MAX_PDU_LEN,
    PhaseEngine, RadioMode, build_beacon_pdu, parse_beacon_pdu,
};
use crate::status;

bind_interrupts!(struct Irqs {
    RADIO => nrf_radio::InterruptHandler<peripherals::RADIO>;
});

/// Random-static transmitter address carried in our beacons.
const LOCAL_ADDR: DeviceAddr = DeviceAddr([0xC2, 0x9E, 0x51, 0x73, 0x1A, 0xD4]);

/// Beacon pacing inside the broadcast window; matches the configured
/// advertising interval of 800 × 625 µs.
const BEACON_INTERVAL: Duration = Duration::from_millis(500);

#[embassy_executor::task]
pub async fn run(
    radio: Peri<'static, peripherals::RADIO>,
    actions: ActionReceiver<'static>,
    mut listen_led: Output<'static>,
    mut broadcast_led: Output<'static>,
) -> ! {
    let mut radio = Radio::new(radio, Irqs);
    radio.set_frequency(ADV_CHANNEL_FREQ_MHZ);
    radio.set_access_address(ADV_ACCESS_ADDRESS);
    radio.set_header_expansion(false);
    radio.set_crc_init(ADV_CRC_INIT);
    radio.set_crc_poly(ADV_CRC_POLY);

    let mut engine = PhaseEngine::new();
    let mut delay = AdvDelay::new(Instant::now().as_ticks() as u16);
    let mut neighbors: NeighborTable<FirmwareInstant> = NeighborTable::new();

    loop {
        let action = match engine.mode() {
            RadioMode::Idle => actions.receive().await,
            RadioMode::Broadcasting => {
                match select(
                    actions.receive(),
                    broadcast_once(&mut radio, &mut engine, &mut delay),
                )
                .await
                {
                    Either::First(action) => action,
                    Either::Second(()) => continue,
                }
            }
            RadioMode::Listening => {
                match select(actions.receive(), listen_once(&mut radio, &mut neighbors)).await {
                    Either::First(action) => action,
                    Either::Second(()) => continue,
                }
            }
        };

        execute(&mut engine, action);

        match engine.mode() {
            RadioMode::Listening => {
                listen_led.set_low();
                broadcast_led.set_high();
            }
            RadioMode::Broadcasting => {
                listen_led.set_high();
                broadcast_led.set_low();
            }
            RadioMode::Idle => {
                listen_led.set_high();
                broadcast_led.set_high();
            }
        }
    }
}

/// Emits one beacon, then idles for the advertising interval plus the
/// randomized pre-packet delay.
async fn broadcast_once(
    radio: &mut Radio<'static, peripherals::RADIO>,
    engine: &mut PhaseEngine,
    delay: &mut AdvDelay,
) {
    let payload = BeaconPayload::new(engine.next_sequence());
    let mut pdu = [0u8; MAX_PDU_LEN];
    let len = build_beacon_pdu(LOCAL_ADDR, &payload, &mut pdu);
    radio.transmit(&mut pdu[..len]).await;
    Timer::after(BEACON_INTERVAL + Duration::from_millis(delay.next_millis())).await;
}

/// Receives one advertising PDU and records it if it is a peer beacon.
async fn listen_once(
    radio: &mut Radio<'static, peripherals::RADIO>,
    neighbors: &mut NeighborTable<FirmwareInstant>,
) {
    let mut pdu = [0u8; MAX_PDU_LEN];
    radio.receive(&mut pdu).await;

    let Some((peer, payload)) = parse_beacon_pdu(&pdu) else {
        return;
    };

    let now = FirmwareInstant::now();
    neighbors.observe(peer, payload.beacon, now);
    status::record_neighbor_count(neighbors.len());
    defmt::info!("radio: peer beacon {}", payload.beacon);
}
