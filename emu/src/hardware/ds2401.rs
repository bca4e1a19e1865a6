//! # Dallas DS2401 silicon serial number
//!
//! A 64-bit ROM read over 1-Wire: family code, 48-bit serial, CRC-8. The
//! owner drives the bus slot by slot.
//!
//! ```text
//!  reset ──▶ presence ──▶ 8 command bits ──▶ READ ROM: 64 bits, LSB first
//!                                       └──▶ anything else: back to idle
//! ```

use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceInfo, Lifecycle};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::state::{StateVisitor, Stateful};

pub static INFO: DeviceInfo = DeviceInfo {
    name: "DS2401",
    shortname: "ds2401",
    family: "Dallas 1-Wire",
    version: "1.0",
};

pub const ID_SIZE: usize = 8;

const READ_ROM: u8 = 0x33;
const READ_ROM_LEGACY: u8 = 0x0F;
const MATCH_ROM: u8 = 0x55;
const SEARCH_ROM: u8 = 0xF0;
const SKIP_ROM: u8 = 0xCC;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum Phase {
    #[default]
    Idle,
    Command,
    ReadRom,
}

impl Phase {
    const fn code(self) -> u8 {
        self as u8
    }

    const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Command,
            2 => Self::ReadRom,
            _ => Self::Idle,
        }
    }
}

/// Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1), as stored in the last ID byte.
#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0, |mut crc, &byte| {
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 1;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
        crc
    })
}

pub struct Ds2401 {
    sink: Box<dyn DiagnosticSink>,
    lifecycle: Lifecycle,
    region: Vec<u8>,
    id: [u8; ID_SIZE],
    phase: Phase,
    shift: u8,
    /// Bits shifted in or out in the current phase.
    bit: u8,
}

impl Ds2401 {
    /// `region` is the eight-byte ID, checked on reset.
    #[must_use]
    pub fn new(region: Vec<u8>, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            lifecycle: Lifecycle::default(),
            region,
            id: [0; ID_SIZE],
            phase: Phase::Idle,
            shift: 0,
            bit: 0,
        }
    }

    #[must_use]
    pub fn with_tracing(region: Vec<u8>) -> Self {
        Self::new(region, Box::new(TracingSink))
    }

    #[must_use]
    pub const fn id(&self) -> &[u8; ID_SIZE] {
        &self.id
    }

    /// Whether the last byte of the ID is the CRC of the first seven.
    #[must_use]
    pub fn id_is_valid(&self) -> bool {
        crc8(&self.id[..ID_SIZE - 1]) == self.id[ID_SIZE - 1]
    }

    /// Master reset pulse. Always answered with a presence pulse.
    pub const fn reset_pulse(&mut self) -> bool {
        self.phase = Phase::Command;
        self.shift = 0;
        self.bit = 0;
        true
    }

    pub fn write_bit(&mut self, level: bool) {
        if self.phase != Phase::Command {
            return;
        }
        self.shift = (self.shift >> 1) | (u8::from(level) << 7);
        self.bit += 1;
        if self.bit == 8 {
            self.command(self.shift);
        }
    }

    /// Read slot. Idle slots read as the pulled-up line.
    pub fn read_bit(&mut self) -> bool {
        if self.phase != Phase::ReadRom {
            return true;
        }
        let byte = self.id[usize::from(self.bit / 8)];
        let level = byte >> (self.bit % 8) & 1 != 0;
        self.bit += 1;
        if usize::from(self.bit) == ID_SIZE * 8 {
            self.phase = Phase::Idle;
        }
        level
    }

    fn command(&mut self, command: u8) {
        self.bit = 0;
        match command {
            READ_ROM | READ_ROM_LEGACY => {
                tracing::trace!(target: "emu::ds2401", "read rom");
                self.phase = Phase::ReadRom;
            }
            MATCH_ROM | SEARCH_ROM | SKIP_ROM => {
                let feature = match command {
                    MATCH_ROM => "match rom",
                    SEARCH_ROM => "search rom",
                    _ => "skip rom",
                };
                self.sink.report(Diagnostic::Unimplemented {
                    device: INFO.shortname,
                    feature,
                });
                self.phase = Phase::Idle;
            }
            _ => {
                tracing::warn!(target: "emu::ds2401", "unknown command {command:02X}");
                self.phase = Phase::Idle;
            }
        }
    }
}

impl Device for Ds2401 {
    fn info(&self) -> &'static DeviceInfo {
        &INFO
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn start(&mut self) {
        self.lifecycle.start(INFO.shortname);
    }

    fn reset(&mut self) {
        self.lifecycle.reset(INFO.shortname);

        self.id = match <[u8; ID_SIZE]>::try_from(self.region.as_slice()) {
            Ok(id) => id,
            Err(_) => {
                self.sink.report(Diagnostic::InvalidRegionSize {
                    device: INFO.shortname,
                    region: "id",
                    expected: ID_SIZE,
                    actual: self.region.len(),
                });
                [0; ID_SIZE]
            }
        };
        self.phase = Phase::Idle;
        self.shift = 0;
        self.bit = 0;
    }

    fn stop(&mut self) {
        self.lifecycle.stop(INFO.shortname);
    }
}

impl Stateful for Ds2401 {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        let mut phase = self.phase.code();
        visitor.item("state", &mut phase);
        self.phase = Phase::from_code(phase);
        visitor.item("shift", &mut self.shift);
        visitor.item("bit", &mut self.bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, RecordingSink};
    use pretty_assertions::assert_eq;

    const ID: [u8; 8] = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2];

    fn chip(region: &[u8], sink: RecordingSink) -> Ds2401 {
        let mut chip = Ds2401::new(region.to_vec(), Box::new(sink));
        chip.start();
        chip.reset();
        chip
    }

    fn send(chip: &mut Ds2401, command: u8) {
        for bit in 0..8 {
            chip.write_bit(command >> bit & 1 != 0);
        }
    }

    fn read_id(chip: &mut Ds2401) -> Vec<u8> {
        (0..8)
            .map(|_| (0..8).fold(0, |byte, bit| byte | u8::from(chip.read_bit()) << bit))
            .collect()
    }

    #[test]
    fn check_crc() {
        assert_eq!(crc8(&ID[..7]), 0xA2);
        assert!(chip(&ID, RecordingSink::new()).id_is_valid());
    }

    #[test]
    fn check_read_rom() {
        let mut chip = chip(&ID, RecordingSink::new());
        for command in [READ_ROM, READ_ROM_LEGACY] {
            assert!(chip.reset_pulse());
            send(&mut chip, command);
            assert_eq!(read_id(&mut chip), ID.to_vec());
            // Back to idle: the line floats high.
            assert!(chip.read_bit());
        }
    }

    #[test]
    fn check_invalid_region_size() {
        let sink = RecordingSink::new();
        let mut chip = chip(&ID[..6], sink.clone());
        assert_eq!(sink.count(DiagnosticKind::InvalidRegionSize), 1);
        assert_eq!(chip.id(), &[0; 8]);

        chip.reset_pulse();
        send(&mut chip, READ_ROM);
        assert_eq!(read_id(&mut chip), vec![0; 8]);
    }

    #[test]
    fn check_unimplemented_commands() {
        let sink = RecordingSink::new();
        let mut chip = chip(&ID, sink.clone());
        for command in [MATCH_ROM, SEARCH_ROM, SKIP_ROM] {
            chip.reset_pulse();
            send(&mut chip, command);
            assert!(chip.read_bit());
        }
        assert_eq!(sink.count(DiagnosticKind::Unimplemented), 3);
    }

    #[test]
    fn check_bits_without_reset_are_ignored() {
        let mut chip = chip(&ID, RecordingSink::new());
        send(&mut chip, READ_ROM);
        assert!(chip.read_bit());
        assert!(chip.read_bit());
    }
}
