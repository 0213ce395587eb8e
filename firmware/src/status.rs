#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status cells for the firmware target.
//!
//! The flash task publishes the current diagnostic code and trigger count
//! here so a debugger reading RAM can observe the device without borrowing
//! the state machine.

use drumflash_core::diagnostics::DiagnosticCode;
use drumflash_core::machine::{Transition, TransitionCause};
use portable_atomic::{AtomicU8, AtomicU32, Ordering};

/// Raw diagnostic code last published.
static DIAGNOSTIC: AtomicU8 = AtomicU8::new(DiagnosticCode::Started.to_raw());
/// Accepted triggers since power-up.
static TRIGGERS: AtomicU32 = AtomicU32::new(0);

/// Point-in-time view of the published status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlashStatus {
    pub code: DiagnosticCode,
    pub triggers: u32,
}

/// Publishes the effects of `transition`.
pub fn record_transition(transition: Transition) {
    DIAGNOSTIC.store(DiagnosticCode::from(transition.to).to_raw(), Ordering::Relaxed);
    if transition.cause == TransitionCause::SoundEdge {
        TRIGGERS.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn snapshot() -> FlashStatus {
    let code = DiagnosticCode::from_raw(DIAGNOSTIC.load(Ordering::Relaxed))
        .unwrap_or(DiagnosticCode::Started);
    FlashStatus {
        code,
        triggers: TRIGGERS.load(Ordering::Relaxed),
    }
}
