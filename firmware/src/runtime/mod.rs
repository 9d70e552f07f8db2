use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf as hal;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_sync::channel::Channel;

use crate::duty::{self, DutyScheduler};
use discovery_core::timing::EpochConfig;

mod button_task;
mod duty_task;
mod radio_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Configuration surface consumed once at startup.
const EPOCH_LENGTH_MS: u64 = 10_000;
const ADVERTISE_INTERVAL_UNITS: u16 = 800;

pub(super) static ACTION_QUEUE: duty::ActionQueue = Channel::new();
pub(super) static LINK_EVENTS: duty::LinkEventQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let p = hal::init(hal::config::Config::default());

    // nRF52840-DK LEDs and button 1; all active low.
    let listen_led = Output::new(p.P0_13, Level::High, OutputDrive::Standard);
    let broadcast_led = Output::new(p.P0_14, Level::High, OutputDrive::Standard);
    let link_led = Output::new(p.P0_15, Level::High, OutputDrive::Standard);
    let button = Input::new(p.P0_11, Pull::Up);

    let config = EpochConfig::from_millis(EPOCH_LENGTH_MS, ADVERTISE_INTERVAL_UNITS);
    // A configuration the derivation rejects must never reach the scheduler.
    let scheduler = DutyScheduler::new(&config).expect("invalid epoch configuration");

    spawner
        .spawn(duty_task::run(
            scheduler,
            LINK_EVENTS.receiver(),
            ACTION_QUEUE.sender(),
            link_led,
        ))
        .expect("failed to spawn duty-cycle task");

    spawner
        .spawn(radio_task::run(
            p.RADIO,
            ACTION_QUEUE.receiver(),
            listen_led,
            broadcast_led,
        ))
        .expect("failed to spawn radio task");

    spawner
        .spawn(button_task::run(button, LINK_EVENTS.sender()))
        .expect("failed to spawn link bench task");

    core::future::pending::<()>().await;
}
