use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use drumflash_core::machine::{FlashPeripherals, FlashStateMachine};
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};

use crate::events::{ArmSignal, EventQueue, SignalDetector, SignalTimer, TimerSignal};
use crate::hw::PinLight;
use crate::profile::PROFILE;

mod edge_task;
mod flash_task;
mod timer_task;

#[cfg(not(feature = "passthrough"))]
type FirmwareIndicator = crate::hw::PinIndicator<'static>;
#[cfg(feature = "passthrough")]
type FirmwareIndicator = drumflash_core::diagnostics::NoopIndicator;

pub(super) type FirmwareMachine = FlashStateMachine<
    SignalDetector<'static>,
    SignalTimer<'static>,
    PinLight<'static>,
    FirmwareIndicator,
>;

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

pub(super) static FLASH_EVENTS: EventQueue = EventQueue::new();
pub(super) static ARM_SIGNAL: ArmSignal = ArmSignal::new();
pub(super) static TIMER_SIGNAL: TimerSignal = TimerSignal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA5,
        PB0,
        PB1,
        EXTI0,
        ..
    } = hal::init(config);

    // Comparator output is wired to PA0; the light driver to PA5.
    let comparator = ExtiInput::new(PA0, EXTI0, Pull::None);
    let light = PinLight::new(Output::new(PA5, Level::Low, Speed::Low));
    let debug0 = Output::new(PB0, Level::Low, Speed::Low);
    let debug1 = Output::new(PB1, Level::Low, Speed::Low);

    #[cfg(not(feature = "passthrough"))]
    let (indicator, monitor) = (
        crate::hw::PinIndicator::new(debug0, debug1),
        edge_task::EdgeMonitor::new(comparator),
    );
    #[cfg(feature = "passthrough")]
    let (indicator, monitor) = (
        drumflash_core::diagnostics::NoopIndicator::new(),
        edge_task::EdgeMonitor::new(comparator, debug0, debug1),
    );

    let peripherals = FlashPeripherals::new(
        SignalDetector::new(&ARM_SIGNAL),
        SignalTimer::new(&TIMER_SIGNAL, PROFILE.clock),
        light,
        indicator,
    );
    let machine: FirmwareMachine = FlashStateMachine::new(peripherals, PROFILE.durations());

    defmt::info!(
        "drumflash: preset {} flash={}ms deaf={}ms",
        PROFILE.name,
        u64::try_from(PROFILE.flash.as_millis()).unwrap_or(u64::MAX),
        u64::try_from(PROFILE.deaf.as_millis()).unwrap_or(u64::MAX)
    );

    spawner
        .spawn(edge_task::run(monitor, &ARM_SIGNAL, FLASH_EVENTS.sender()))
        .expect("failed to spawn edge monitor task");

    spawner
        .spawn(timer_task::run(&TIMER_SIGNAL, FLASH_EVENTS.sender()))
        .expect("failed to spawn interval timer task");

    spawner
        .spawn(flash_task::run(machine, FLASH_EVENTS.receiver()))
        .expect("failed to spawn flash task");

    core::future::pending::<()>().await;
}
