//! Transition history shared by firmware and host targets.
//!
//! Every state change reported by the flash machine can be written into a
//! fixed-capacity ring together with its timestamp and the time elapsed since
//! the previous change. The firmware mirrors each record to defmt; the bench
//! emulator prints the ring on demand.

use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::machine::{FlashState, Transition, TransitionCause};

/// Default number of transitions retained.
pub const TRANSITION_RING_CAPACITY: usize = 32;

/// Identifier assigned to each recorded transition.
pub type RecordId = u32;

/// Monotonic timestamp usable by the recorder.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Single recorded transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransitionRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: RecordId,
    pub timestamp: TInstant,
    pub from: Option<FlashState>,
    pub to: FlashState,
    pub cause: TransitionCause,
    pub elapsed_since_previous: Option<Duration>,
}

/// Ring buffer type alias.
pub type TransitionRing<TInstant, const CAPACITY: usize = TRANSITION_RING_CAPACITY> =
    HistoryBuf<TransitionRecord<TInstant>, CAPACITY>;

/// Records transitions into a fixed-size ring.
pub struct TransitionRecorder<TInstant, const CAPACITY: usize = TRANSITION_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TransitionRing<TInstant, CAPACITY>,
    last_transition_at: Option<TInstant>,
    next_id: RecordId,
}

impl<TInstant, const CAPACITY: usize> TransitionRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_transition_at: None,
            next_id: 0,
        }
    }

    /// Stores `transition` and returns the stored record.
    pub fn record(
        &mut self,
        transition: Transition,
        timestamp: TInstant,
    ) -> TransitionRecord<TInstant> {
        let elapsed = self
            .last_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_transition_at = Some(timestamp);

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        let record = TransitionRecord {
            id,
            timestamp,
            from: transition.from,
            to: transition.to,
            cause: transition.cause,
            elapsed_since_previous: elapsed,
        };
        self.ring.write(record);
        record
    }

    /// Returns the recorded transitions in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TransitionRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TransitionRecord<TInstant>> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Total transitions recorded, including ones evicted from the ring.
    #[must_use]
    pub fn total_recorded(&self) -> RecordId {
        self.next_id
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.last_transition_at = None;
    }
}

impl<TInstant, const CAPACITY: usize> Default for TransitionRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
