//! # Device contract
//!
//! ```text
//!  Uninitialized ──start──▶ Started ──reset──▶ Running ──stop──▶ Stopped
//!                                               │   ▲
//!                                               └───┘ reset
//! ```
//!
//! `start` allocates tables and timers exactly once, `reset` puts the
//! power-on state back (any number of times), `stop` releases whatever the
//! device holds. Calling them out of order is a bug in the owning system and
//! panics.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::state::Stateful;

/// Static metadata, one per device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: &'static str,
    pub shortname: &'static str,
    pub family: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Started,
    Running,
    Stopped,
}

impl Lifecycle {
    pub fn start(&mut self, device: &str) {
        assert!(
            *self == Self::Uninitialized,
            "{device}: start called while {self:?}"
        );
        *self = Self::Started;
    }

    pub fn reset(&mut self, device: &str) {
        assert!(
            matches!(self, Self::Started | Self::Running),
            "{device}: reset called while {self:?}"
        );
        *self = Self::Running;
    }

    pub fn stop(&mut self, device: &str) {
        assert!(
            *self != Self::Uninitialized,
            "{device}: stop called before start"
        );
        *self = Self::Stopped;
    }

    pub fn check_running(self, device: &str) {
        assert!(
            self == Self::Running,
            "{device}: executed while {self:?}, reset it first"
        );
    }
}

pub trait Device: Stateful {
    fn info(&self) -> &'static DeviceInfo;

    fn lifecycle(&self) -> Lifecycle;

    fn start(&mut self);

    fn reset(&mut self);

    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputLineState {
    Clear,
    Assert,
    /// Assert immediately followed by clear.
    Pulse,
}

pub trait Execute: Device {
    /// Adds `cycles` to the budget and runs whole instructions while it is
    /// positive. Returns the cycles consumed by this call; the last
    /// instruction may overshoot, and the overshoot is repaid by the next
    /// call.
    fn execute_run(&mut self, bus: &mut dyn Bus, cycles: i32) -> i32;

    fn set_input_line(&mut self, line: u32, state: InputLineState);

    fn icount(&self) -> i32;
}

/// Whatever an interrupt controller drives: usually a core.
pub trait InterruptSink {
    fn signal(&mut self, line: u32, state: InputLineState);
}

impl<T: Execute> InterruptSink for T {
    fn signal(&mut self, line: u32, state: InputLineState) {
        self.set_input_line(line, state);
    }
}

/// Used by external tooling only, never by the execute loop.
pub trait Debugger {
    type Register: Copy + Display + 'static;

    const REGISTERS: &'static [Self::Register];

    fn export_register(&self, register: Self::Register) -> u64;

    fn import_register(&mut self, register: Self::Register, value: u64);

    fn export_string(&self, register: Self::Register) -> String;

    /// Returns the text and how many bytes of `opcode_bytes` it used.
    fn disassemble(&self, pc: u32, opcode_bytes: &[u8]) -> (String, usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_lifecycle_order() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.start("toy");
        lifecycle.reset("toy");
        lifecycle.check_running("toy");
        lifecycle.reset("toy");
        lifecycle.stop("toy");
        assert_eq!(lifecycle, Lifecycle::Stopped);
    }

    #[test]
    #[should_panic(expected = "start called while Started")]
    fn check_start_twice() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.start("toy");
        lifecycle.start("toy");
    }

    #[test]
    #[should_panic(expected = "reset it first")]
    fn check_execute_before_reset() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.start("toy");
        lifecycle.check_running("toy");
    }
}
