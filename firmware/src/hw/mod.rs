//! GPIO adapters implementing the `drumflash-core` output traits.

use drumflash_core::diagnostics::{DiagnosticCode, DiagnosticIndicator};
use drumflash_core::machine::LightOutput;
use embassy_stm32::gpio::Output;

/// Light driver pin; high == lit.
pub struct PinLight<'d> {
    pin: Output<'d>,
}

impl<'d> PinLight<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl LightOutput for PinLight<'_> {
    fn on(&mut self) {
        self.pin.set_high();
    }

    fn off(&mut self) {
        self.pin.set_low();
    }

    fn is_on(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Two-line diagnostic code output.
pub struct PinIndicator<'d> {
    debug0: Output<'d>,
    debug1: Output<'d>,
}

impl<'d> PinIndicator<'d> {
    pub fn new(debug0: Output<'d>, debug1: Output<'d>) -> Self {
        Self { debug0, debug1 }
    }
}

impl DiagnosticIndicator for PinIndicator<'_> {
    fn report(&mut self, code: DiagnosticCode) {
        let (debug0, debug1) = code.lines();
        self.debug0.set_level(debug0.into());
        self.debug1.set_level(debug1.into());
    }
}
