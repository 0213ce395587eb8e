use drumflash_core::machine::{FlashEvent, TimerTicket};
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};

use crate::events::{EventSender, TimerSignal};

/// Single-shot countdown driven by [`TimerCommand`](crate::events::TimerCommand)s.
///
/// A new `Start` replaces the running countdown; only the countdown that
/// actually elapses produces a `TimerExpired` event.
#[embassy_executor::task]
pub async fn run(commands: &'static TimerSignal, events: EventSender<'static>) -> ! {
    let mut countdown: Option<(TimerTicket, Duration)> = None;

    loop {
        let Some((ticket, duration)) = countdown.take() else {
            countdown = commands.wait().await.countdown();
            continue;
        };

        match select(Timer::after(duration), commands.wait()).await {
            Either::First(()) => {
                defmt::trace!("timer: ticket {} elapsed", ticket);
                events.send(FlashEvent::TimerExpired(ticket)).await;
            }
            Either::Second(command) => countdown = command.countdown(),
        }
    }
}
