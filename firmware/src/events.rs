//! Event plumbing between the interrupt-facing tasks and the flash task.
//!
//! The edge monitor and the interval timer task never touch the state
//! machine. They push [`FlashEvent`]s into a bounded queue drained by the
//! single flash task, which owns the machine. Commands flowing the other way
//! (arm/disarm, start/stop) travel through [`Signal`]s, so only the most
//! recent request is ever acted on.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration as CoreDuration;

use drumflash_core::machine::{FlashEvent, IntervalTimer, SoundDetector, TimerTicket};
use drumflash_core::timing::TimerClock;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;
use embassy_time::Duration;

/// Depth of the event queue feeding the flash task.
pub const FLASH_EVENT_QUEUE_DEPTH: usize = 4;

#[cfg(target_os = "none")]
pub type FlashMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type FlashMutex = NoopRawMutex;

/// Queue of events awaiting the flash task.
pub type EventQueue = Channel<FlashMutex, FlashEvent, FLASH_EVENT_QUEUE_DEPTH>;

pub type EventSender<'a> = Sender<'a, FlashMutex, FlashEvent, FLASH_EVENT_QUEUE_DEPTH>;

pub type EventReceiver<'a> = Receiver<'a, FlashMutex, FlashEvent, FLASH_EVENT_QUEUE_DEPTH>;

/// Latest requested detector state (`true` == armed).
pub type ArmSignal = Signal<FlashMutex, bool>;

/// Request for the interval timer task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerCommand {
    Start {
        ticket: TimerTicket,
        duration: Duration,
    },
    Stop,
}

impl TimerCommand {
    /// Countdown this command leaves running, if any.
    #[must_use]
    pub const fn countdown(self) -> Option<(TimerTicket, Duration)> {
        match self {
            Self::Start { ticket, duration } => Some((ticket, duration)),
            Self::Stop => None,
        }
    }
}

pub type TimerSignal = Signal<FlashMutex, TimerCommand>;

pub fn core_duration_to_embassy(duration: CoreDuration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

/// Detector handle that forwards arm/disarm requests to the edge task.
pub struct SignalDetector<'a> {
    signal: &'a ArmSignal,
    armed: bool,
}

impl<'a> SignalDetector<'a> {
    pub const fn new(signal: &'a ArmSignal) -> Self {
        Self {
            signal,
            armed: false,
        }
    }
}

impl SoundDetector for SignalDetector<'_> {
    fn arm(&mut self) {
        if !self.armed {
            self.armed = true;
            self.signal.signal(true);
        }
    }

    fn disarm(&mut self) {
        if self.armed {
            self.armed = false;
            self.signal.signal(false);
        }
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}

/// Timer handle that forwards countdowns to the timer task.
///
/// Durations are rounded up to whole ticks of the configured timer clock so
/// the firmware holds each phase exactly as long as the counter hardware it
/// models would.
pub struct SignalTimer<'a> {
    signal: &'a TimerSignal,
    clock: TimerClock,
    running: Option<TimerTicket>,
}

impl<'a> SignalTimer<'a> {
    pub const fn new(signal: &'a TimerSignal, clock: TimerClock) -> Self {
        Self {
            signal,
            clock,
            running: None,
        }
    }

    /// Marks the countdown for `ticket` as finished; the timer task stops by
    /// itself after firing.
    pub fn expired(&mut self, ticket: TimerTicket) {
        if self.running == Some(ticket) {
            self.running = None;
        }
    }
}

impl IntervalTimer for SignalTimer<'_> {
    fn start(&mut self, ticket: TimerTicket, duration: CoreDuration) {
        let duration = core_duration_to_embassy(self.clock.quantize(duration));
        self.running = Some(ticket);
        self.signal.signal(TimerCommand::Start { ticket, duration });
    }

    fn stop(&mut self) {
        if self.running.take().is_some() {
            self.signal.signal(TimerCommand::Stop);
        }
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}
