#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Transition log backed by the embassy monotonic clock.
//!
//! Records land in the shared [`TransitionRecorder`] ring and are mirrored
//! to defmt (or stdout on the host) as they happen, so a probe attached over
//! RTT sees every state change with its timing.

use core::time::Duration as CoreDuration;

use drumflash_core::machine::{FlashState, Transition};
use drumflash_core::telemetry::{TelemetryInstant, TransitionRecord, TransitionRecorder};
use embassy_time::Instant;

/// Embassy instant usable by the shared recorder.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> CoreDuration {
        let delta = self.0.saturating_duration_since(earlier.0);
        CoreDuration::from_micros(delta.as_micros())
    }
}

/// Number of transitions kept on the device.
pub const FLASH_LOG_CAPACITY: usize = 16;

pub type FlashRecord = TransitionRecord<FirmwareInstant>;

/// Records transitions and mirrors them to the log sink.
pub struct FlashLog {
    recorder: TransitionRecorder<FirmwareInstant, FLASH_LOG_CAPACITY>,
}

impl FlashLog {
    pub const fn new() -> Self {
        Self {
            recorder: TransitionRecorder::new(),
        }
    }

    pub fn record(&mut self, transition: Transition, timestamp: FirmwareInstant) -> FlashRecord {
        let record = self.recorder.record(transition, timestamp);
        log_transition(&record);
        record
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&FlashRecord> {
        self.recorder.latest()
    }

    #[cfg(test)]
    pub fn total_recorded(&self) -> u32 {
        self.recorder.total_recorded()
    }
}

impl Default for FlashLog {
    fn default() -> Self {
        Self::new()
    }
}

fn log_transition(record: &FlashRecord) {
    let from = record.from.map_or("reset", FlashState::label);
    let to = record.to.label();
    let cause = record.cause.label();
    let timestamp_us = record.timestamp.into_embassy().as_micros();
    let elapsed_us = record
        .elapsed_since_previous
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));

    emit_log(record.id, from, to, cause, timestamp_us, elapsed_us);
}

#[cfg(target_os = "none")]
fn emit_log(
    id: u32,
    from: &'static str,
    to: &'static str,
    cause: &'static str,
    timestamp_us: u64,
    elapsed_us: Option<u64>,
) {
    if let Some(delta) = elapsed_us {
        defmt::info!(
            "flash#{} {} -> {} ({}) t={}us Δ={}us",
            id,
            from,
            to,
            cause,
            timestamp_us,
            delta
        );
    } else {
        defmt::info!(
            "flash#{} {} -> {} ({}) t={}us",
            id,
            from,
            to,
            cause,
            timestamp_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(
    id: u32,
    from: &'static str,
    to: &'static str,
    cause: &'static str,
    timestamp_us: u64,
    elapsed_us: Option<u64>,
) {
    if let Some(delta) = elapsed_us {
        println!("flash#{id} {from} -> {to} ({cause}) t={timestamp_us}us Δ={delta}us");
    } else {
        println!("flash#{id} {from} -> {to} ({cause}) t={timestamp_us}us");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drumflash_core::machine::TransitionCause;

    fn micros(value: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_micros(value))
    }

    #[test]
    fn records_elapsed_between_transitions() {
        let mut log = FlashLog::new();

        let boot = log.record(
            Transition {
                from: None,
                to: FlashState::Idle,
                cause: TransitionCause::Boot,
            },
            micros(100),
        );
        assert_eq!(boot.elapsed_since_previous, None);

        let trigger = log.record(
            Transition {
                from: Some(FlashState::Idle),
                to: FlashState::Triggered,
                cause: TransitionCause::SoundEdge,
            },
            micros(1_100),
        );
        assert_eq!(
            trigger.elapsed_since_previous,
            Some(CoreDuration::from_micros(1_000))
        );
        assert_eq!(log.latest(), Some(&trigger));
        assert_eq!(log.total_recorded(), 2);
    }

    #[test]
    fn instant_difference_saturates() {
        let earlier = micros(500);
        let later = micros(200);
        assert_eq!(later.saturating_duration_since(earlier), CoreDuration::ZERO);
    }
}
