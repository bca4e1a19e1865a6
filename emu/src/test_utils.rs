//! Mocks shared by the unit tests.

use crate::bus::Bus;
use crate::device::{InputLineState, InterruptSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadByte(u32),
    ReadWord(u32),
    WriteByte(u32, u8),
    WriteWord(u32, u16),
}

/// Logs every access and answers reads with the low bits of the address.
#[derive(Debug, Default)]
pub struct RecordingBus {
    pub accesses: Vec<Access>,
}

impl Bus for RecordingBus {
    fn read_byte(&mut self, address: u32) -> u8 {
        self.accesses.push(Access::ReadByte(address));
        address.to_le_bytes()[0]
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        self.accesses.push(Access::WriteByte(address, value));
    }

    fn read_word(&mut self, address: u32) -> u16 {
        self.accesses.push(Access::ReadWord(address));
        let [low, high, ..] = address.to_le_bytes();
        u16::from_le_bytes([low, high])
    }

    fn write_word(&mut self, address: u32, value: u16) {
        self.accesses.push(Access::WriteWord(address, value));
    }
}

/// Counts what an interrupt controller drives into its core.
#[derive(Debug, Default)]
pub struct EdgeCounter {
    pub signals: Vec<(u32, InputLineState)>,
}

impl EdgeCounter {
    /// Rising edges seen on `line`.
    pub fn asserts(&self, line: u32) -> usize {
        self.signals
            .iter()
            .filter(|&&signal| signal == (line, InputLineState::Assert))
            .count()
    }
}

impl InterruptSink for EdgeCounter {
    fn signal(&mut self, line: u32, state: InputLineState) {
        self.signals.push((line, state));
    }
}
