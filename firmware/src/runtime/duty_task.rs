//! Scheduler driver task.
//!
//! Owns the epoch scheduler and the link monitor outright: every state
//! mutation happens on this task, so timer expiry can never race a link
//! event. The task sleeps until the scheduler's next deadline, services it,
//! and otherwise waits for link events from the connection layer.

use discovery_core::link::{LinkEvent, handle_link_event};
use discovery_core::scheduler::SchedulerState;
use discovery_core::telemetry::TelemetryEventKind;
use embassy_futures::select::{Either, select};
use embassy_nrf::gpio::Output;
use embassy_time::Timer;

use crate::duty::{
    ActionProducer, ActionSender, DutyLinkMonitor, DutyScheduler, FirmwareInstant,
    LinkEventReceiver,
};
use crate::status;
use crate::telemetry::TelemetryRecorder;

#[embassy_executor::task]
pub async fn run(
    mut scheduler: DutyScheduler,
    link_events: LinkEventReceiver<'static>,
    actions: ActionSender<'static>,
    mut link_led: Output<'static>,
) -> ! {
    let mut sink = ActionProducer::new(actions);
    let mut monitor = DutyLinkMonitor::new();
    let mut telemetry = TelemetryRecorder::new();

    let now = FirmwareInstant::now();
    scheduler
        .start(&mut sink, now)
        .expect("duty cycle started twice");
    status::record_epochs_started(scheduler.epochs_started());
    defmt::info!(
        "duty: started, epoch {}ms listen {}ms broadcast {}ms",
        scheduler.epoch_period().as_millis() as u64,
        scheduler.timing().listen().as_millis() as u64,
        scheduler.timing().broadcast().as_millis() as u64,
    );

    loop {
        let event = match scheduler.next_deadline() {
            Some(deadline) => {
                match select(Timer::at(deadline.into_embassy()), link_events.receive()).await {
                    Either::First(()) => {
                        let now = FirmwareInstant::now();
                        scheduler.service(&mut sink, now);
                        status::record_epochs_started(scheduler.epochs_started());
                        continue;
                    }
                    Either::Second(event) => event,
                }
            }
            // Suspended: only the connection layer can wake the cycle.
            None => link_events.receive().await,
        };

        let now = FirmwareInstant::now();
        apply_link_event(
            &mut scheduler,
            &mut monitor,
            &mut sink,
            &mut telemetry,
            event,
            now,
        );

        let link_active = monitor.is_active();
        status::record_link_active(link_active);
        if link_active {
            link_led.set_low();
        } else {
            link_led.set_high();
        }
    }
}

fn apply_link_event(
    scheduler: &mut DutyScheduler,
    monitor: &mut DutyLinkMonitor,
    sink: &mut ActionProducer<'static>,
    telemetry: &mut TelemetryRecorder,
    event: LinkEvent,
    now: FirmwareInstant,
) {
    let kind = match event {
        LinkEvent::Established { .. } if monitor.is_active() => TelemetryEventKind::LinkRejected,
        LinkEvent::Established { .. } => TelemetryEventKind::LinkEstablished,
        LinkEvent::AttemptFailed { .. } => TelemetryEventKind::LinkAttemptFailed,
        LinkEvent::Terminated { .. } => TelemetryEventKind::LinkTerminated,
    };
    telemetry.record(kind, now);

    let before = scheduler.state();
    handle_link_event(monitor, scheduler, sink, event, now);
    let after = scheduler.state();

    if before != after {
        if after == SchedulerState::Suspended {
            telemetry.record(TelemetryEventKind::SchedulerSuspended, now);
        } else if before == SchedulerState::Suspended {
            telemetry.record(TelemetryEventKind::SchedulerResumed, now);
        }
        status::record_epochs_started(scheduler.epochs_started());
    }
}
