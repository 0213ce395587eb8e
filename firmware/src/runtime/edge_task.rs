//! Comparator edge monitor.
//!
//! The task forwards at most one rising edge per arming: after reporting an
//! edge it treats itself as disarmed until the flash task re-arms it. EXTI
//! waits only observe edges that occur after the wait starts, so an edge seen
//! while disarmed can never fire after re-arming.

use drumflash_core::machine::FlashEvent;
use embassy_futures::select::{Either, select};
use embassy_stm32::exti::ExtiInput;
#[cfg(feature = "passthrough")]
use embassy_stm32::gpio::Output;

use crate::events::{ArmSignal, EventSender};

pub struct EdgeMonitor<'d> {
    comparator: ExtiInput<'d>,
    #[cfg(feature = "passthrough")]
    level: Output<'d>,
    #[cfg(feature = "passthrough")]
    armed: Output<'d>,
}

#[cfg(not(feature = "passthrough"))]
impl<'d> EdgeMonitor<'d> {
    pub fn new(comparator: ExtiInput<'d>) -> Self {
        Self { comparator }
    }

    async fn rising_edge(&mut self) {
        self.comparator.wait_for_rising_edge().await;
    }

    // Same signatures as the passthrough build; the edge loop calls both.
    #[allow(clippy::unused_self)]
    async fn idle_edge(&mut self) {
        core::future::pending::<()>().await;
    }

    #[allow(clippy::unused_self)]
    fn show_armed(&mut self, _armed: bool) {}
}

#[cfg(feature = "passthrough")]
impl<'d> EdgeMonitor<'d> {
    /// Mirrors the comparator level on `level` and the armed flag on `armed`.
    pub fn new(comparator: ExtiInput<'d>, level: Output<'d>, armed: Output<'d>) -> Self {
        let mut monitor = Self {
            comparator,
            level,
            armed,
        };
        monitor.mirror();
        monitor
    }

    fn mirror(&mut self) {
        if self.comparator.is_high() {
            self.level.set_high();
        } else {
            self.level.set_low();
        }
    }

    async fn rising_edge(&mut self) {
        loop {
            self.comparator.wait_for_any_edge().await;
            self.mirror();
            if self.comparator.is_high() {
                return;
            }
        }
    }

    async fn idle_edge(&mut self) {
        self.comparator.wait_for_any_edge().await;
        self.mirror();
    }

    fn show_armed(&mut self, armed: bool) {
        if armed {
            self.armed.set_high();
        } else {
            self.armed.set_low();
        }
    }
}

#[embassy_executor::task]
pub async fn run(
    mut monitor: EdgeMonitor<'static>,
    arm: &'static ArmSignal,
    events: EventSender<'static>,
) -> ! {
    let mut armed = false;

    loop {
        monitor.show_armed(armed);

        if !armed {
            if let Either::Second(request) = select(monitor.idle_edge(), arm.wait()).await {
                armed = request;
            }
            continue;
        }

        match select(monitor.rising_edge(), arm.wait()).await {
            Either::First(()) => {
                armed = false;
                defmt::trace!("edge: sound edge");
                events.send(FlashEvent::SoundEdge).await;
            }
            Either::Second(request) => armed = request,
        }
    }
}
