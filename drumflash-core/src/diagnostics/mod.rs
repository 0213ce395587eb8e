//! Two-line diagnostic status code.
//!
//! The code is what a logic probe on `debug0`/`debug1` sees, so the numeric
//! values are part of the external contract: bit 0 drives `debug0`, bit 1
//! drives `debug1`.

use core::fmt;

use crate::machine::FlashState;

/// Status values shown on the indicator lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticCode {
    /// Powered, hardware not yet configured.
    Started,
    Idle,
    Triggered,
    Deaf,
}

impl DiagnosticCode {
    /// Encodes the code into its two-bit wire value.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            DiagnosticCode::Started => 0b00,
            DiagnosticCode::Idle => 0b01,
            DiagnosticCode::Triggered => 0b10,
            DiagnosticCode::Deaf => 0b11,
        }
    }

    /// Decodes a two-bit value; higher bits are rejected.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0b00 => Some(DiagnosticCode::Started),
            0b01 => Some(DiagnosticCode::Idle),
            0b10 => Some(DiagnosticCode::Triggered),
            0b11 => Some(DiagnosticCode::Deaf),
            _ => None,
        }
    }

    /// Returns the levels for `(debug0, debug1)`.
    #[must_use]
    pub const fn lines(self) -> (bool, bool) {
        let raw = self.to_raw();
        (raw & 0b01 != 0, raw & 0b10 != 0)
    }

    /// Reassembles a code from sampled line levels.
    #[must_use]
    pub const fn from_lines(debug0: bool, debug1: bool) -> Self {
        match (debug0, debug1) {
            (false, false) => DiagnosticCode::Started,
            (true, false) => DiagnosticCode::Idle,
            (false, true) => DiagnosticCode::Triggered,
            (true, true) => DiagnosticCode::Deaf,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DiagnosticCode::Started => "started",
            DiagnosticCode::Idle => "idle",
            DiagnosticCode::Triggered => "triggered",
            DiagnosticCode::Deaf => "deaf",
        }
    }
}

impl From<FlashState> for DiagnosticCode {
    fn from(state: FlashState) -> Self {
        match state {
            FlashState::Idle => DiagnosticCode::Idle,
            FlashState::Triggered => DiagnosticCode::Triggered,
            FlashState::Deaf => DiagnosticCode::Deaf,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sink for diagnostic codes.
pub trait DiagnosticIndicator {
    fn report(&mut self, code: DiagnosticCode);
}

/// Indicator for builds with the diagnostic path disabled.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopIndicator;

impl NoopIndicator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DiagnosticIndicator for NoopIndicator {
    fn report(&mut self, _: DiagnosticCode) {}
}
