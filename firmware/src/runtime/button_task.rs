//! Bench stand-in for the external connection layer.
//!
//! The real link layer owns connection establishment and must deliver the
//! established/terminated pair into `LINK_EVENTS`. On a bare development kit
//! there is no peer, so button 1 plays the part: holding it simulates an
//! established link, releasing it delivers the termination.

use discovery_core::link::LinkEvent;
use discovery_core::payload::DeviceAddr;
use embassy_nrf::gpio::Input;

use crate::duty::LinkEventSender;

const BENCH_PEER: DeviceAddr = DeviceAddr([0xF0, 0x0D, 0xCA, 0xFE, 0x00, 0x01]);

/// HCI "remote user terminated connection".
const REASON_REMOTE_TERMINATED: u8 = 0x13;

#[embassy_executor::task]
pub async fn run(mut button: Input<'static>, events: LinkEventSender<'static>) -> ! {
    loop {
        button.wait_for_falling_edge().await;
        events
            .send(LinkEvent::Established { peer: BENCH_PEER })
            .await;

        button.wait_for_rising_edge().await;
        events
            .send(LinkEvent::Terminated {
                reason: REASON_REMOTE_TERMINATED,
            })
            .await;
    }
}
