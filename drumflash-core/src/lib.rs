#![no_std]

// Shared logic for the drum flash controller.
//
// Everything that does not touch registers lives here so the MCU firmware and
// the host bench emulator drive the exact same state machine.

pub mod console;
pub mod diagnostics;
pub mod machine;
pub mod sim;
pub mod telemetry;
pub mod timing;
