//! Interval timer arithmetic and the build-time flash presets.
//!
//! The interval timer is an 8-bit up-counter clocked from the system clock
//! through a prescaler; it fires when the counter matches a compare value.
//! Every duration the state machine schedules has to map onto a compare value
//! in `1..=COUNTER_MAX`. Presets are checked against that range at compile
//! time so an oversized duration never reaches the device as silent
//! truncation.

use core::fmt;
use core::time::Duration;

/// Largest compare value the timer counter can hold.
pub const COUNTER_MAX: u32 = u8::MAX as u32;

const MICROS_PER_SECOND: u128 = 1_000_000;

/// Reasons a duration cannot be programmed into the interval timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingError {
    /// Clock frequency or prescaler is zero.
    InvalidClock,
    /// The duration rounds to zero ticks.
    ZeroDuration,
    /// The duration needs more ticks than the counter can hold.
    CounterOverflow { required: u64, max: u32 },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingError::InvalidClock => f.write_str("clock frequency and prescaler must be non-zero"),
            TimingError::ZeroDuration => f.write_str("duration maps to zero timer ticks"),
            TimingError::CounterOverflow { required, max } => {
                write!(f, "duration needs {required} ticks, counter holds {max}")
            }
        }
    }
}

/// Clock domain of the interval timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerClock {
    pub clock_hz: u32,
    pub prescaler: u32,
}

impl TimerClock {
    #[must_use]
    pub const fn new(clock_hz: u32, prescaler: u32) -> Self {
        Self {
            clock_hz,
            prescaler,
        }
    }

    /// Computes the compare value for `duration`, rounding up so the timer
    /// never fires early.
    pub const fn compare_for(&self, duration: Duration) -> Result<u8, TimingError> {
        if self.clock_hz == 0 || self.prescaler == 0 {
            return Err(TimingError::InvalidClock);
        }

        let scaled = duration.as_micros() * self.clock_hz as u128;
        let divisor = self.prescaler as u128 * MICROS_PER_SECOND;
        let ticks = scaled.div_ceil(divisor);

        if ticks == 0 {
            Err(TimingError::ZeroDuration)
        } else if ticks > COUNTER_MAX as u128 {
            let required = if ticks > u64::MAX as u128 {
                u64::MAX
            } else {
                ticks as u64
            };
            Err(TimingError::CounterOverflow {
                required,
                max: COUNTER_MAX,
            })
        } else {
            Ok(ticks as u8)
        }
    }

    /// Wall-clock time covered by `ticks` counter increments.
    #[must_use]
    pub const fn ticks_to_duration(&self, ticks: u32) -> Duration {
        if self.clock_hz == 0 {
            return Duration::ZERO;
        }
        let micros = ticks as u128 * self.prescaler as u128 * MICROS_PER_SECOND;
        let micros = micros.div_ceil(self.clock_hz as u128);
        if micros > u64::MAX as u128 {
            Duration::from_micros(u64::MAX)
        } else {
            Duration::from_micros(micros as u64)
        }
    }

    /// Duration of a single counter increment.
    #[must_use]
    pub const fn tick_period(&self) -> Duration {
        self.ticks_to_duration(1)
    }

    /// Rounds `duration` up to the next whole tick, saturating at the counter
    /// range.
    #[must_use]
    pub const fn quantize(&self, duration: Duration) -> Duration {
        match self.compare_for(duration) {
            Ok(compare) => self.ticks_to_duration(compare as u32),
            Err(TimingError::ZeroDuration) => self.tick_period(),
            Err(TimingError::CounterOverflow { .. }) => self.ticks_to_duration(COUNTER_MAX),
            Err(TimingError::InvalidClock) => duration,
        }
    }
}

/// Lengths of the two timed phases.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseDurations {
    pub flash: Duration,
    pub deaf: Duration,
}

impl PhaseDurations {
    #[must_use]
    pub const fn new(flash: Duration, deaf: Duration) -> Self {
        Self { flash, deaf }
    }

    /// Minimum time the detector stays disarmed after a trigger.
    #[must_use]
    pub const fn refractory(&self) -> Duration {
        self.flash.saturating_add(self.deaf)
    }
}

/// Build-time deployment preset.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlashProfile {
    pub name: &'static str,
    pub clock: TimerClock,
    pub flash: Duration,
    pub deaf: Duration,
}

impl FlashProfile {
    /// Long flash with a generous refractory window.
    pub const STANDARD: FlashProfile = FlashProfile::new(
        "standard",
        TimerClock::new(1_000_000, 2_048),
        Duration::from_millis(100),
        Duration::from_millis(400),
    );

    /// Short strobe for fast rolls.
    pub const SHORT: FlashProfile = FlashProfile::new(
        "short",
        TimerClock::new(1_000_000, 1_024),
        Duration::from_millis(10),
        Duration::from_millis(190),
    );

    /// Every preset shipped with the firmware.
    pub const ALL: [FlashProfile; 2] = [FlashProfile::STANDARD, FlashProfile::SHORT];

    #[must_use]
    pub const fn new(
        name: &'static str,
        clock: TimerClock,
        flash: Duration,
        deaf: Duration,
    ) -> Self {
        Self {
            name,
            clock,
            flash,
            deaf,
        }
    }

    /// Checks that both phases fit the timer counter.
    pub const fn validate(&self) -> Result<(), TimingError> {
        if let Err(err) = self.clock.compare_for(self.flash) {
            return Err(err);
        }
        match self.clock.compare_for(self.deaf) {
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        }
    }

    #[must_use]
    pub const fn durations(&self) -> PhaseDurations {
        PhaseDurations::new(self.flash, self.deaf)
    }

    /// Looks a preset up by name, ignoring ASCII case.
    #[must_use]
    pub fn by_name(name: &str) -> Option<FlashProfile> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.name.eq_ignore_ascii_case(name))
    }
}

const _: () = assert!(
    FlashProfile::STANDARD.validate().is_ok(),
    "standard preset does not fit the timer counter"
);
const _: () = assert!(
    FlashProfile::SHORT.validate().is_ok(),
    "short preset does not fit the timer counter"
);
