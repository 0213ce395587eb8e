//! Simulated peripherals and a tick-accurate bench rig.
//!
//! The simulated parts reproduce the register-level behavior the state
//! machine depends on: the comparator latches an edge flag even while its
//! interrupt is disabled, and the interval timer is an 8-bit counter that
//! stops itself on compare match. [`BenchRig`] advances time one timer tick
//! at a time and delivers interrupts serially, timer first, then comparator,
//! so host tests and the emulator observe the same ordering as the device.

use core::time::Duration;

use crate::diagnostics::{DiagnosticCode, DiagnosticIndicator};
use crate::machine::{
    FlashEvent, FlashPeripherals, FlashState, FlashStateMachine, IntervalTimer, LightOutput,
    SoundDetector, TimerTicket, Transition,
};
use crate::telemetry::{TRANSITION_RING_CAPACITY, TelemetryInstant, TransitionRecorder};
use crate::timing::{COUNTER_MAX, FlashProfile, TimerClock, TimingError};

const MICROS_PER_SECOND: u128 = 1_000_000;

/// Comparator model with a sticky edge flag.
#[derive(Clone, Debug, Default)]
pub struct SimDetector {
    armed: bool,
    latched: bool,
    edges_seen: u32,
}

impl SimDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            armed: false,
            latched: false,
            edges_seen: 0,
        }
    }

    /// Latches a comparator edge; the flag is set whether or not the
    /// interrupt is enabled.
    pub fn latch_edge(&mut self) {
        self.latched = true;
        self.edges_seen = self.edges_seen.wrapping_add(1);
    }

    /// Consumes the latched edge when the interrupt is enabled.
    pub fn take_interrupt(&mut self) -> bool {
        if self.armed && self.latched {
            self.latched = false;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn edge_latched(&self) -> bool {
        self.latched
    }

    #[must_use]
    pub fn edges_seen(&self) -> u32 {
        self.edges_seen
    }
}

impl SoundDetector for SimDetector {
    fn arm(&mut self) {
        if self.armed {
            return;
        }
        self.latched = false;
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}

/// 8-bit compare-match timer model.
#[derive(Clone, Debug)]
pub struct SimTimer {
    clock: TimerClock,
    counter: u32,
    compare: u32,
    running: Option<TimerTicket>,
    activations: u32,
    last_error: Option<TimingError>,
}

impl SimTimer {
    #[must_use]
    pub const fn new(clock: TimerClock) -> Self {
        Self {
            clock,
            counter: 0,
            compare: 0,
            running: None,
            activations: 0,
            last_error: None,
        }
    }

    /// Advances the counter by one tick and returns the ticket on compare
    /// match. The timer stops itself when it fires.
    pub fn tick(&mut self) -> Option<TimerTicket> {
        let ticket = self.running?;
        self.counter += 1;
        if self.counter >= self.compare {
            self.running = None;
            Some(ticket)
        } else {
            None
        }
    }

    #[must_use]
    pub fn compare(&self) -> u32 {
        self.compare
    }

    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    #[must_use]
    pub fn activations(&self) -> u32 {
        self.activations
    }

    /// Ticket of the running countdown, if any.
    #[must_use]
    pub fn running_ticket(&self) -> Option<TimerTicket> {
        self.running
    }

    /// Last duration that did not fit the counter; the hardware would have
    /// truncated it.
    #[must_use]
    pub fn last_error(&self) -> Option<TimingError> {
        self.last_error
    }

    #[must_use]
    pub fn clock(&self) -> TimerClock {
        self.clock
    }
}

impl IntervalTimer for SimTimer {
    fn start(&mut self, ticket: TimerTicket, duration: Duration) {
        self.compare = match self.clock.compare_for(duration) {
            Ok(compare) => {
                self.last_error = None;
                u32::from(compare)
            }
            Err(err) => {
                self.last_error = Some(err);
                match err {
                    TimingError::CounterOverflow { .. } => COUNTER_MAX,
                    TimingError::ZeroDuration | TimingError::InvalidClock => 1,
                }
            }
        };
        self.counter = 0;
        self.running = Some(ticket);
        self.activations = self.activations.wrapping_add(1);
    }

    fn stop(&mut self) {
        self.running = None;
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

/// Light pin model.
#[derive(Clone, Debug, Default)]
pub struct SimLight {
    lit: bool,
    pulses: u32,
}

impl SimLight {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lit: false,
            pulses: 0,
        }
    }

    /// Number of off→on transitions.
    #[must_use]
    pub fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl LightOutput for SimLight {
    fn on(&mut self) {
        if !self.lit {
            self.pulses = self.pulses.wrapping_add(1);
        }
        self.lit = true;
    }

    fn off(&mut self) {
        self.lit = false;
    }

    fn is_on(&self) -> bool {
        self.lit
    }
}

/// Indicator line pair model.
#[derive(Clone, Debug)]
pub struct SimIndicator {
    debug0: bool,
    debug1: bool,
    reports: u32,
}

impl SimIndicator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            debug0: false,
            debug1: false,
            reports: 0,
        }
    }

    /// Line levels as `(debug0, debug1)`.
    #[must_use]
    pub fn lines(&self) -> (bool, bool) {
        (self.debug0, self.debug1)
    }

    /// Code a logic probe would read off the lines.
    #[must_use]
    pub fn code(&self) -> DiagnosticCode {
        DiagnosticCode::from_lines(self.debug0, self.debug1)
    }

    #[must_use]
    pub fn reports(&self) -> u32 {
        self.reports
    }
}

impl Default for SimIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticIndicator for SimIndicator {
    fn report(&mut self, code: DiagnosticCode) {
        let (debug0, debug1) = code.lines();
        self.debug0 = debug0;
        self.debug1 = debug1;
        self.reports = self.reports.wrapping_add(1);
    }
}

/// Bench time expressed in whole timer ticks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct BenchInstant {
    ticks: u64,
    micros: u64,
}

impl BenchInstant {
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.ticks
    }

    /// Time since power-up.
    #[must_use]
    pub const fn since_power_up(self) -> Duration {
        Duration::from_micros(self.micros)
    }
}

impl TelemetryInstant for BenchInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.micros.saturating_sub(earlier.micros))
    }
}

/// State machine wired to simulated peripherals.
pub type BenchMachine = FlashStateMachine<SimDetector, SimTimer, SimLight, SimIndicator>;

/// Simulated device: machine, peripherals, bench clock and transition log.
pub struct BenchRig<const CAPACITY: usize = TRANSITION_RING_CAPACITY> {
    profile: FlashProfile,
    machine: BenchMachine,
    now: BenchInstant,
    telemetry: TransitionRecorder<BenchInstant, CAPACITY>,
}

impl<const CAPACITY: usize> BenchRig<CAPACITY> {
    /// Builds an unpowered rig; the diagnostic lines read `started`.
    #[must_use]
    pub fn new(profile: FlashProfile) -> Self {
        let peripherals = FlashPeripherals::new(
            SimDetector::new(),
            SimTimer::new(profile.clock),
            SimLight::new(),
            SimIndicator::new(),
        );
        Self {
            profile,
            machine: FlashStateMachine::new(peripherals, profile.durations()),
            now: BenchInstant {
                ticks: 0,
                micros: 0,
            },
            telemetry: TransitionRecorder::new(),
        }
    }

    /// Builds a rig and boots it straight into `Idle`.
    #[must_use]
    pub fn powered(profile: FlashProfile) -> Self {
        let mut rig = Self::new(profile);
        rig.boot();
        rig
    }

    pub fn boot(&mut self) -> Option<Transition> {
        let transition = self.machine.boot()?;
        self.telemetry.record(transition, self.now);
        Some(transition)
    }

    /// Feeds a comparator edge and services the interrupt if enabled.
    pub fn sound(&mut self) -> Option<Transition> {
        self.machine.detector_mut().latch_edge();
        self.service_detector()
    }

    /// Advances the bench clock by one timer tick.
    pub fn tick(&mut self) -> Option<Transition> {
        self.now = self.instant_at(self.now.ticks.saturating_add(1));

        let fired = self.machine.timer_mut().tick();
        let from_timer = fired.and_then(|ticket| self.dispatch(FlashEvent::TimerExpired(ticket)));
        let from_detector = self.service_detector();
        from_detector.or(from_timer)
    }

    /// Advances by `ticks` and returns the number of transitions observed.
    ///
    /// Ticks are stepped one at a time only while the timer runs; with the
    /// timer stopped nothing can fire, so the clock jumps to the target.
    pub fn advance_ticks(&mut self, ticks: u64) -> usize {
        let target = self.now.ticks.saturating_add(ticks);
        let mut transitions = 0;
        while self.now.ticks < target {
            if !self.timer_running() {
                self.now = self.instant_at(target);
                break;
            }
            if self.tick().is_some() {
                transitions += 1;
            }
        }
        transitions
    }

    /// Advances by at least `duration`, rounded up to whole ticks.
    pub fn advance(&mut self, duration: Duration) -> usize {
        let ticks = self.ticks_for(duration);
        self.advance_ticks(ticks)
    }

    /// Ticks until the machine is back in `Idle`, giving up after
    /// `max_ticks`. Returns the bench time spent.
    pub fn run_until_idle(&mut self, max_ticks: u64) -> Option<Duration> {
        let started = self.now;
        let mut remaining = max_ticks;
        while self.machine.state() != FlashState::Idle {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            self.tick();
        }
        Some(self.now.saturating_duration_since(started))
    }

    /// Whole ticks covering `duration`.
    #[must_use]
    pub fn ticks_for(&self, duration: Duration) -> u64 {
        let clock = self.profile.clock;
        if clock.clock_hz == 0 || clock.prescaler == 0 {
            return 0;
        }
        let scaled = duration.as_micros() * u128::from(clock.clock_hz);
        let ticks = scaled.div_ceil(u128::from(clock.prescaler) * MICROS_PER_SECOND);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    fn instant_at(&self, ticks: u64) -> BenchInstant {
        let clock = self.profile.clock;
        let micros = if clock.clock_hz == 0 {
            0
        } else {
            u128::from(ticks) * u128::from(clock.prescaler) * MICROS_PER_SECOND
                / u128::from(clock.clock_hz)
        };
        BenchInstant {
            ticks,
            micros: u64::try_from(micros).unwrap_or(u64::MAX),
        }
    }

    fn service_detector(&mut self) -> Option<Transition> {
        if self.machine.detector_mut().take_interrupt() {
            self.dispatch(FlashEvent::SoundEdge)
        } else {
            None
        }
    }

    fn dispatch(&mut self, event: FlashEvent) -> Option<Transition> {
        let transition = self.machine.handle(event)?;
        self.telemetry.record(transition, self.now);
        Some(transition)
    }

    #[must_use]
    pub fn profile(&self) -> FlashProfile {
        self.profile
    }

    #[must_use]
    pub fn machine(&self) -> &BenchMachine {
        &self.machine
    }

    #[must_use]
    pub fn telemetry(&self) -> &TransitionRecorder<BenchInstant, CAPACITY> {
        &self.telemetry
    }

    #[must_use]
    pub fn now(&self) -> BenchInstant {
        self.now
    }

    #[must_use]
    pub fn state(&self) -> FlashState {
        self.machine.state()
    }

    #[must_use]
    pub fn light_on(&self) -> bool {
        self.machine.light().is_on()
    }

    #[must_use]
    pub fn armed(&self) -> bool {
        self.machine.detector().is_armed()
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.machine.timer().is_running()
    }

    #[must_use]
    pub fn diagnostic(&self) -> DiagnosticCode {
        self.machine.indicator().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_latches_edges_while_disarmed() {
        let mut detector = SimDetector::new();
        detector.latch_edge();
        assert!(detector.edge_latched());
        assert!(!detector.take_interrupt());

        detector.arm();
        assert!(!detector.edge_latched(), "arming must clear the stale edge");
        assert!(!detector.take_interrupt());

        detector.latch_edge();
        assert!(detector.take_interrupt());
        assert!(!detector.take_interrupt());
        assert_eq!(detector.edges_seen(), 2);
    }

    #[test]
    fn rearming_an_armed_detector_keeps_state() {
        let mut detector = SimDetector::new();
        detector.arm();
        detector.latch_edge();
        detector.arm();
        assert!(detector.is_armed());
        assert!(detector.edge_latched());

        detector.disarm();
        detector.disarm();
        assert!(!detector.is_armed());
    }

    #[test]
    fn timer_fires_once_on_compare_match() {
        let mut timer = SimTimer::new(TimerClock::new(1_000_000, 1_024));
        timer.start(TimerTicket(4), Duration::from_millis(10));
        assert_eq!(timer.compare(), 10);

        for _ in 0..9 {
            assert_eq!(timer.tick(), None);
        }
        assert_eq!(timer.tick(), Some(TimerTicket(4)));
        assert!(!timer.is_running());
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn restarting_timer_discards_previous_countdown() {
        let mut timer = SimTimer::new(TimerClock::new(1_000_000, 1_024));
        timer.start(TimerTicket(1), Duration::from_millis(5));
        for _ in 0..3 {
            timer.tick();
        }
        timer.start(TimerTicket(2), Duration::from_millis(5));
        assert_eq!(timer.counter(), 0);

        let mut fired = None;
        for _ in 0..timer.compare() {
            fired = fired.or(timer.tick());
        }
        assert_eq!(fired, Some(TimerTicket(2)));
        assert_eq!(timer.activations(), 2);
    }

    #[test]
    fn oversized_duration_saturates_and_is_flagged() {
        let mut timer = SimTimer::new(TimerClock::new(1_000_000, 1_024));
        timer.start(TimerTicket(0), Duration::from_millis(400));
        assert_eq!(timer.compare(), COUNTER_MAX);
        assert!(matches!(
            timer.last_error(),
            Some(TimingError::CounterOverflow { .. })
        ));
    }

    #[test]
    fn indicator_tracks_line_levels() {
        let mut indicator = SimIndicator::new();
        assert_eq!(indicator.code(), DiagnosticCode::Started);
        indicator.report(DiagnosticCode::Deaf);
        assert_eq!(indicator.lines(), (true, true));
        assert_eq!(indicator.code(), DiagnosticCode::Deaf);
    }

    #[test]
    fn unpowered_rig_reads_started() {
        let rig: BenchRig = BenchRig::new(FlashProfile::STANDARD);
        assert_eq!(rig.diagnostic(), DiagnosticCode::Started);
        assert!(!rig.armed());
        assert!(rig.telemetry().is_empty());
    }

    #[test]
    fn huge_advance_in_idle_jumps_the_clock() {
        let mut rig: BenchRig = BenchRig::powered(FlashProfile::STANDARD);
        assert_eq!(rig.advance_ticks(u64::MAX), 0);
        assert_eq!(rig.now().ticks(), u64::MAX);
        assert_eq!(rig.state(), FlashState::Idle);

        rig.tick();
        assert_eq!(rig.now().ticks(), u64::MAX);
    }

    #[test]
    fn huge_advance_finishes_a_running_cycle_first() {
        let mut rig: BenchRig = BenchRig::powered(FlashProfile::STANDARD);
        rig.sound();

        assert_eq!(rig.advance_ticks(u64::MAX), 2);
        assert_eq!(rig.state(), FlashState::Idle);
        assert!(rig.armed());
        assert_eq!(rig.telemetry().total_recorded(), 4);
    }

    #[test]
    fn bench_clock_follows_tick_period() {
        let mut rig: BenchRig = BenchRig::powered(FlashProfile::SHORT);
        rig.advance_ticks(10);
        assert_eq!(rig.now().ticks(), 10);
        assert_eq!(rig.now().since_power_up(), Duration::from_micros(10_240));
        assert_eq!(rig.ticks_for(Duration::from_millis(10)), 10);
    }
}
