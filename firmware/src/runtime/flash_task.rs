use drumflash_core::machine::{FlashEvent, Transition, TransitionCause};

use super::FirmwareMachine;
use crate::events::EventReceiver;
use crate::status;
use crate::telemetry::{FirmwareInstant, FlashLog};

/// Sole owner of the state machine; applies queued events one at a time.
#[embassy_executor::task]
pub async fn run(mut machine: FirmwareMachine, events: EventReceiver<'static>) -> ! {
    let mut log = FlashLog::new();

    if let Some(transition) = machine.boot() {
        publish(&mut log, transition);
    }

    loop {
        let event = events.receive().await;
        if let FlashEvent::TimerExpired(ticket) = event {
            machine.timer_mut().expired(ticket);
        }

        match machine.handle(event) {
            Some(transition) => publish(&mut log, transition),
            None => defmt::debug!("flash: ignored {} in {}", event, machine.state()),
        }
    }
}

fn publish(log: &mut FlashLog, transition: Transition) {
    let now = FirmwareInstant::now();
    status::record_transition(transition);
    log.record(transition, now);

    if transition.cause == TransitionCause::SoundEdge {
        let published = status::snapshot();
        defmt::debug!("flash: trigger #{} code={}", published.triggers, published.code);
    }
}
