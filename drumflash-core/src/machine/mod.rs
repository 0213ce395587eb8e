//! Flash state machine and the peripheral traits it drives.
//!
//! The machine owns the current [`FlashState`] and the single pending timer
//! registration. It is fed by exactly two event sources, the sound-edge
//! detector and the interval timer, and expects its caller to deliver those
//! events one at a time: on the bare-metal target that is guaranteed by
//! non-nesting interrupts, on the async target by a single consumer draining a
//! bounded queue.
//!
//! Each timed phase is chained to the next by a [`PendingExpiry`] tag rather
//! than a stored callback, so the three-stage relay is a closed `match`.

use core::time::Duration;

use crate::diagnostics::{DiagnosticCode, DiagnosticIndicator};
use crate::timing::PhaseDurations;

/// Phases of the flash cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashState {
    Idle,
    Triggered,
    Deaf,
}

impl FlashState {
    /// Returns `true` while the machine should listen for sound.
    #[must_use]
    pub const fn listens(self) -> bool {
        matches!(self, FlashState::Idle)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            FlashState::Idle => "idle",
            FlashState::Triggered => "triggered",
            FlashState::Deaf => "deaf",
        }
    }
}

impl core::fmt::Display for FlashState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the machine does when the running timer expires.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingExpiry {
    /// Flash is over: light off, start the deaf window.
    EndOfFlash,
    /// Deaf window is over: re-arm.
    EndOfDeaf,
}

/// Identifies one timer activation so stale expiries can be told apart.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerTicket(pub u32);

impl TimerTicket {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Timer registration awaiting expiry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PendingTimer {
    pub ticket: TimerTicket,
    pub expiry: PendingExpiry,
}

/// Inputs accepted by [`FlashStateMachine::handle`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashEvent {
    /// The comparator saw a qualifying edge while armed.
    SoundEdge,
    /// The interval timer started with this ticket reached its compare value.
    TimerExpired(TimerTicket),
}

/// Why a transition happened.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionCause {
    Boot,
    SoundEdge,
    FlashElapsed,
    DeafElapsed,
}

impl TransitionCause {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TransitionCause::Boot => "boot",
            TransitionCause::SoundEdge => "sound-edge",
            TransitionCause::FlashElapsed => "flash-elapsed",
            TransitionCause::DeafElapsed => "deaf-elapsed",
        }
    }
}

/// State change reported by the machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    /// `None` only for the boot transition.
    pub from: Option<FlashState>,
    pub to: FlashState,
    pub cause: TransitionCause,
}

/// Edge-triggered comparator interrupt control.
///
/// `arm` must discard any edge latched while disarmed before enabling the
/// interrupt. Both operations are idempotent.
pub trait SoundDetector {
    fn arm(&mut self);

    fn disarm(&mut self);

    fn is_armed(&self) -> bool;
}

/// Single-shot interval timer.
///
/// `start` replaces any running countdown. When the countdown elapses the
/// timer stops itself and the owner delivers
/// [`FlashEvent::TimerExpired`] carrying the same ticket.
pub trait IntervalTimer {
    fn start(&mut self, ticket: TimerTicket, duration: Duration);

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Binary light actuator.
pub trait LightOutput {
    fn on(&mut self);

    fn off(&mut self);

    fn is_on(&self) -> bool;
}

/// Peripherals owned by the machine.
pub struct FlashPeripherals<D, T, L, I> {
    pub detector: D,
    pub timer: T,
    pub light: L,
    pub indicator: I,
}

impl<D, T, L, I> FlashPeripherals<D, T, L, I> {
    pub const fn new(detector: D, timer: T, light: L, indicator: I) -> Self {
        Self {
            detector,
            timer,
            light,
            indicator,
        }
    }
}

/// Idle → Triggered → Deaf → Idle relay.
pub struct FlashStateMachine<D, T, L, I> {
    state: FlashState,
    booted: bool,
    detector: D,
    timer: T,
    light: L,
    indicator: I,
    durations: PhaseDurations,
    pending: Option<PendingTimer>,
    next_ticket: TimerTicket,
    triggers: u32,
}

impl<D, T, L, I> FlashStateMachine<D, T, L, I>
where
    D: SoundDetector,
    T: IntervalTimer,
    L: LightOutput,
    I: DiagnosticIndicator,
{
    /// Takes ownership of the peripherals and reports the pre-boot code.
    ///
    /// The detector stays disarmed and the light dark until [`Self::boot`].
    pub fn new(peripherals: FlashPeripherals<D, T, L, I>, durations: PhaseDurations) -> Self {
        let FlashPeripherals {
            mut detector,
            mut timer,
            mut light,
            mut indicator,
        } = peripherals;

        detector.disarm();
        timer.stop();
        light.off();
        indicator.report(DiagnosticCode::Started);

        Self {
            state: FlashState::Idle,
            booted: false,
            detector,
            timer,
            light,
            indicator,
            durations,
            pending: None,
            next_ticket: TimerTicket(0),
            triggers: 0,
        }
    }

    /// Enters `Idle` once hardware configuration is complete. Later calls are
    /// ignored.
    pub fn boot(&mut self) -> Option<Transition> {
        if self.booted {
            return None;
        }
        self.booted = true;
        self.enter_idle();
        Some(Transition {
            from: None,
            to: FlashState::Idle,
            cause: TransitionCause::Boot,
        })
    }

    /// Applies one event and reports the resulting transition, if any.
    ///
    /// Sound edges outside `Idle` and expiries that do not match the pending
    /// registration are dropped.
    pub fn handle(&mut self, event: FlashEvent) -> Option<Transition> {
        if !self.booted {
            return None;
        }

        let from = self.state;
        let cause = match event {
            FlashEvent::SoundEdge => {
                if !from.listens() {
                    return None;
                }
                self.enter_triggered();
                TransitionCause::SoundEdge
            }
            FlashEvent::TimerExpired(ticket) => match self.take_pending(ticket)? {
                PendingExpiry::EndOfFlash => {
                    self.enter_deaf();
                    TransitionCause::FlashElapsed
                }
                PendingExpiry::EndOfDeaf => {
                    self.enter_idle();
                    TransitionCause::DeafElapsed
                }
            },
        };

        Some(Transition {
            from: Some(from),
            to: self.state,
            cause,
        })
    }

    fn take_pending(&mut self, ticket: TimerTicket) -> Option<PendingExpiry> {
        match self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                Some(pending.expiry)
            }
            _ => None,
        }
    }

    fn enter_idle(&mut self) {
        self.state = FlashState::Idle;
        self.detector.arm();
        self.indicator.report(DiagnosticCode::Idle);
    }

    fn enter_triggered(&mut self) {
        self.state = FlashState::Triggered;
        self.triggers = self.triggers.wrapping_add(1);
        self.detector.disarm();
        self.light.on();
        self.start_timer(self.durations.flash, PendingExpiry::EndOfFlash);
        self.indicator.report(DiagnosticCode::Triggered);
    }

    fn enter_deaf(&mut self) {
        self.state = FlashState::Deaf;
        self.light.off();
        self.start_timer(self.durations.deaf, PendingExpiry::EndOfDeaf);
        self.indicator.report(DiagnosticCode::Deaf);
    }

    fn start_timer(&mut self, duration: Duration, expiry: PendingExpiry) {
        self.timer.stop();
        let ticket = self.next_ticket;
        self.next_ticket = ticket.next();
        self.pending = Some(PendingTimer { ticket, expiry });
        self.timer.start(ticket, duration);
    }

    #[must_use]
    pub fn state(&self) -> FlashState {
        self.state
    }

    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.booted
    }

    #[must_use]
    pub fn pending(&self) -> Option<PendingTimer> {
        self.pending
    }

    /// Number of accepted triggers since power-up.
    #[must_use]
    pub fn triggers(&self) -> u32 {
        self.triggers
    }

    #[must_use]
    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    /// Returns `true` when exactly one event source is live: the armed
    /// detector in `Idle`, or the running timer in `Triggered`/`Deaf`.
    #[must_use]
    pub fn sources_exclusive(&self) -> bool {
        let armed = self.detector.is_armed();
        let running = self.timer.is_running();
        match self.state {
            FlashState::Idle => armed && !running,
            FlashState::Triggered | FlashState::Deaf => !armed && running,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn light(&self) -> &L {
        &self.light
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec as HeaplessVec;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    enum Call {
        Arm,
        Disarm,
        TimerStart(TimerTicket, Duration),
        TimerStop,
        LightOn,
        LightOff,
        Report(DiagnosticCode),
    }

    type CallLog = core::cell::RefCell<HeaplessVec<Call, 64>>;

    struct MockDetector<'a> {
        log: &'a CallLog,
        armed: bool,
    }

    impl SoundDetector for MockDetector<'_> {
        fn arm(&mut self) {
            self.armed = true;
            let _ = self.log.borrow_mut().push(Call::Arm);
        }

        fn disarm(&mut self) {
            self.armed = false;
            let _ = self.log.borrow_mut().push(Call::Disarm);
        }

        fn is_armed(&self) -> bool {
            self.armed
        }
    }

    struct MockTimer<'a> {
        log: &'a CallLog,
        running: Option<TimerTicket>,
    }

    impl IntervalTimer for MockTimer<'_> {
        fn start(&mut self, ticket: TimerTicket, duration: Duration) {
            self.running = Some(ticket);
            let _ = self.log.borrow_mut().push(Call::TimerStart(ticket, duration));
        }

        fn stop(&mut self) {
            self.running = None;
            let _ = self.log.borrow_mut().push(Call::TimerStop);
        }

        fn is_running(&self) -> bool {
            self.running.is_some()
        }
    }

    struct MockLight<'a> {
        log: &'a CallLog,
        lit: bool,
    }

    impl LightOutput for MockLight<'_> {
        fn on(&mut self) {
            self.lit = true;
            let _ = self.log.borrow_mut().push(Call::LightOn);
        }

        fn off(&mut self) {
            self.lit = false;
            let _ = self.log.borrow_mut().push(Call::LightOff);
        }

        fn is_on(&self) -> bool {
            self.lit
        }
    }

    struct MockIndicator<'a> {
        log: &'a CallLog,
    }

    impl DiagnosticIndicator for MockIndicator<'_> {
        fn report(&mut self, code: DiagnosticCode) {
            let _ = self.log.borrow_mut().push(Call::Report(code));
        }
    }

    type MockMachine<'a> =
        FlashStateMachine<MockDetector<'a>, MockTimer<'a>, MockLight<'a>, MockIndicator<'a>>;

    const FLASH: Duration = Duration::from_millis(100);
    const DEAF: Duration = Duration::from_millis(400);

    fn build(log: &CallLog) -> MockMachine<'_> {
        FlashStateMachine::new(
            FlashPeripherals::new(
                MockDetector { log, armed: false },
                MockTimer { log, running: None },
                MockLight { log, lit: false },
                MockIndicator { log },
            ),
            PhaseDurations::new(FLASH, DEAF),
        )
    }

    fn expire(machine: &mut MockMachine<'_>) -> Option<Transition> {
        let ticket = machine.pending().expect("pending timer").ticket;
        machine.timer_mut().running = None;
        machine.handle(FlashEvent::TimerExpired(ticket))
    }

    #[test]
    fn construction_reports_started_and_stays_dark() {
        let log = CallLog::default();
        let machine = build(&log);

        assert!(!machine.is_booted());
        assert!(!machine.detector().is_armed());
        assert!(!machine.light().is_on());
        assert_eq!(
            log.borrow().as_slice(),
            &[
                Call::Disarm,
                Call::TimerStop,
                Call::LightOff,
                Call::Report(DiagnosticCode::Started)
            ]
        );
    }

    #[test]
    fn events_before_boot_are_ignored() {
        let log = CallLog::default();
        let mut machine = build(&log);

        assert_eq!(machine.handle(FlashEvent::SoundEdge), None);
        assert_eq!(machine.triggers(), 0);
    }

    #[test]
    fn boot_arms_detector_once() {
        let log = CallLog::default();
        let mut machine = build(&log);
        log.borrow_mut().clear();

        let transition = machine.boot().expect("boot transition");
        assert_eq!(transition.from, None);
        assert_eq!(transition.to, FlashState::Idle);
        assert_eq!(transition.cause, TransitionCause::Boot);
        assert_eq!(
            log.borrow().as_slice(),
            &[Call::Arm, Call::Report(DiagnosticCode::Idle)]
        );

        assert_eq!(machine.boot(), None);
        assert!(machine.sources_exclusive());
    }

    #[test]
    fn trigger_entry_actions_run_in_order() {
        let log = CallLog::default();
        let mut machine = build(&log);
        machine.boot();
        log.borrow_mut().clear();

        let transition = machine.handle(FlashEvent::SoundEdge).expect("trigger");
        assert_eq!(transition.from, Some(FlashState::Idle));
        assert_eq!(transition.to, FlashState::Triggered);
        assert_eq!(
            log.borrow().as_slice(),
            &[
                Call::Disarm,
                Call::LightOn,
                Call::TimerStop,
                Call::TimerStart(TimerTicket(0), FLASH),
                Call::Report(DiagnosticCode::Triggered),
            ]
        );
        assert_eq!(
            machine.pending(),
            Some(PendingTimer {
                ticket: TimerTicket(0),
                expiry: PendingExpiry::EndOfFlash
            })
        );
        assert!(machine.sources_exclusive());
    }

    #[test]
    fn full_cycle_returns_to_post_boot_state() {
        let log = CallLog::default();
        let mut machine = build(&log);
        machine.boot();
        machine.handle(FlashEvent::SoundEdge);

        let deaf = expire(&mut machine).expect("end of flash");
        assert_eq!(deaf.to, FlashState::Deaf);
        assert_eq!(deaf.cause, TransitionCause::FlashElapsed);
        assert!(!machine.light().is_on());
        assert_eq!(
            machine.pending().map(|pending| pending.expiry),
            Some(PendingExpiry::EndOfDeaf)
        );

        let idle = expire(&mut machine).expect("end of deaf");
        assert_eq!(idle.to, FlashState::Idle);
        assert_eq!(idle.cause, TransitionCause::DeafElapsed);
        assert!(machine.detector().is_armed());
        assert!(!machine.light().is_on());
        assert_eq!(machine.pending(), None);
        assert!(machine.sources_exclusive());
    }

    #[test]
    fn sound_outside_idle_is_ignored() {
        let log = CallLog::default();
        let mut machine = build(&log);
        machine.boot();
        machine.handle(FlashEvent::SoundEdge);

        assert_eq!(machine.handle(FlashEvent::SoundEdge), None);
        expire(&mut machine);
        assert_eq!(machine.handle(FlashEvent::SoundEdge), None);
        assert_eq!(machine.state(), FlashState::Deaf);
        assert_eq!(machine.triggers(), 1);
    }

    #[test]
    fn stale_ticket_never_fires() {
        let log = CallLog::default();
        let mut machine = build(&log);
        machine.boot();
        machine.handle(FlashEvent::SoundEdge);
        let flash_ticket = machine.pending().expect("pending").ticket;
        expire(&mut machine);

        // The flash timer's ticket is spent; replaying it must not end the deaf window.
        assert_eq!(machine.handle(FlashEvent::TimerExpired(flash_ticket)), None);
        assert_eq!(machine.state(), FlashState::Deaf);
        assert!(machine.pending().is_some());
    }

    #[test]
    fn expiry_without_registration_is_dropped() {
        let log = CallLog::default();
        let mut machine = build(&log);
        machine.boot();

        assert_eq!(machine.handle(FlashEvent::TimerExpired(TimerTicket(7))), None);
        assert_eq!(machine.state(), FlashState::Idle);
        assert!(machine.detector().is_armed());
    }

    #[test]
    fn tickets_advance_per_activation() {
        let log = CallLog::default();
        let mut machine = build(&log);
        machine.boot();

        for cycle in 0..3u32 {
            machine.handle(FlashEvent::SoundEdge);
            assert_eq!(machine.pending().map(|p| p.ticket), Some(TimerTicket(cycle * 2)));
            expire(&mut machine);
            assert_eq!(
                machine.pending().map(|p| p.ticket),
                Some(TimerTicket(cycle * 2 + 1))
            );
            expire(&mut machine);
        }
        assert_eq!(machine.triggers(), 3);
    }
}
