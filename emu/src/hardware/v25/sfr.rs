//! # V25 special function registers
//!
//! Offsets are relative to `IDB + 0x100`.
//!
//! | Offset    | Register                | Offset    | Register           |
//! |-----------|-------------------------|-----------|--------------------|
//! | 0x00-0x12 | P0-P2, PM0-PM2, PMC0-2  | 0x90-0x91 | TMC0, TMC1         |
//! | 0x38/0x3B | PT, PMT                 | 0x9C-0x9E | TMIC0-2            |
//! | 0x40      | INTM                    | 0xAC-0xAD | DIC0-1             |
//! | 0x44-0x46 | EMS0-2                  | 0xE1      | RFM                |
//! | 0x4C-0x4E | EXIC0-2                 | 0xE8      | WTC (word)         |
//! | 0x6C-0x6E | SEIC0, SRIC0, STIC0     | 0xEA-0xEC | FLAG, PRC, TBIC    |
//! | 0x7C-0x7E | SEIC1, SRIC1, STIC1     | 0xEF      | IRQS               |
//! | 0x80-0x8B | TM0, MD0, TM1, MD1      | 0xFC/0xFF | ISPR, IDB          |

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::diagnostics::Diagnostic;
use crate::state::{StateVisitor, Stateful};

use super::{INFO, SfrBlock};
use super::interrupt_control::{Group, InterruptSource};

pub const P0: u32 = 0x00;
pub const PM0: u32 = 0x01;
pub const PMC0: u32 = 0x02;
pub const P1: u32 = 0x08;
pub const PM1: u32 = 0x09;
pub const PMC1: u32 = 0x0A;
pub const P2: u32 = 0x10;
pub const PM2: u32 = 0x11;
pub const PMC2: u32 = 0x12;
pub const PT: u32 = 0x38;
pub const PMT: u32 = 0x3B;
pub const INTM: u32 = 0x40;
pub const EMS0: u32 = 0x44;
pub const EMS2: u32 = 0x46;
pub const EXIC0: u32 = 0x4C;
pub const EXIC1: u32 = 0x4D;
pub const EXIC2: u32 = 0x4E;
pub const SEIC0: u32 = 0x6C;
pub const SRIC0: u32 = 0x6D;
pub const STIC0: u32 = 0x6E;
pub const SEIC1: u32 = 0x7C;
pub const SRIC1: u32 = 0x7D;
pub const STIC1: u32 = 0x7E;
pub const TM0: u32 = 0x80;
pub const MD0: u32 = 0x82;
pub const TM1: u32 = 0x88;
pub const MD1: u32 = 0x8A;
pub const TMC0: u32 = 0x90;
pub const TMC1: u32 = 0x91;
pub const TMIC0: u32 = 0x9C;
pub const TMIC1: u32 = 0x9D;
pub const TMIC2: u32 = 0x9E;
pub const DIC0: u32 = 0xAC;
pub const DIC1: u32 = 0xAD;
pub const RFM: u32 = 0xE1;
pub const WTC: u32 = 0xE8;
pub const FLAG: u32 = 0xEA;
pub const PRC: u32 = 0xEB;
pub const TBIC: u32 = 0xEC;
pub const IRQS: u32 = 0xEF;
pub const ISPR: u32 = 0xFC;
pub const IDB: u32 = 0xFF;

/// The interrupt control register at `offset`, and the group whose priority
/// it carries.
const fn irq_register(offset: u32) -> Option<(InterruptSource, Option<Group>)> {
    let register = match offset {
        EXIC0 => (InterruptSource::INTP0, Some(Group::External)),
        EXIC1 => (InterruptSource::INTP1, None),
        EXIC2 => (InterruptSource::INTP2, None),
        SEIC0 => (InterruptSource::INTSER0, Some(Group::Serial0)),
        SRIC0 => (InterruptSource::INTSR0, None),
        STIC0 => (InterruptSource::INTST0, None),
        SEIC1 => (InterruptSource::INTSER1, Some(Group::Serial1)),
        SRIC1 => (InterruptSource::INTSR1, None),
        STIC1 => (InterruptSource::INTST1, None),
        TMIC0 => (InterruptSource::INTTU0, Some(Group::TimerUnit)),
        TMIC1 => (InterruptSource::INTTU1, None),
        TMIC2 => (InterruptSource::INTTU2, None),
        DIC0 => (InterruptSource::INTD0, Some(Group::Dma)),
        DIC1 => (InterruptSource::INTD1, None),
        TBIC => (InterruptSource::INTTB, None),
        _ => return None,
    };
    Some(register)
}

/// Ports P0-P2 and the input-only PT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    pub(crate) latch: [u8; 3],
    /// PMn: 1 = input.
    pub(crate) mode: [u8; 3],
    /// PMCn: 1 = control function instead of port.
    pub(crate) control: [u8; 3],
    pub(crate) pmt: u8,
    /// Pin levels driven from outside, PT last.
    pub(crate) inputs: [u8; 4],
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            latch: [0; 3],
            mode: [0xFF; 3],
            control: [0; 3],
            pmt: 0,
            inputs: [0xFF; 4],
        }
    }
}

impl Ports {
    /// Output pins show the latch, input pins what is driven into them.
    #[must_use]
    pub const fn read(&self, port: usize) -> u8 {
        (self.latch[port] & !self.mode[port]) | (self.inputs[port] & self.mode[port])
    }
}

impl Stateful for Ports {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        visitor.item("port.latch", &mut self.latch);
        visitor.item("port.mode", &mut self.mode);
        visitor.item("port.control", &mut self.control);
        visitor.item("port.pmt", &mut self.pmt);
    }
}

impl SfrBlock {
    fn unhandled_read(&mut self, offset: u32) -> u8 {
        self.report(Diagnostic::UnhandledRegisterRead {
            device: INFO.shortname,
            register: offset,
            pc: self.pc,
        });
        0
    }

    fn unhandled_write(&mut self, offset: u32, data: u8) {
        self.report(Diagnostic::UnhandledRegisterWrite {
            device: INFO.shortname,
            register: offset,
            data: u32::from(data),
            pc: self.pc,
        });
    }

    pub(super) fn read_sfr(&mut self, offset: u32) -> u8 {
        if let Some((source, group)) = irq_register(offset) {
            return self.irq.read_control(source, group);
        }

        let port = (offset >> 3) as usize;
        let byte = (offset & 1) as u8;
        match offset {
            P0 | P1 | P2 => self.ports.read(port),
            PM0 | PM1 | PM2 => self.ports.mode[port],
            PMC0 | PMC1 | PMC2 => self.ports.control[port],
            PT => self.ports.inputs[3],
            PMT => self.ports.pmt,
            INTM => self.intm,
            EMS0..=EMS2 => self.ems[(offset - EMS0) as usize],
            0x80 | 0x81 => self.timers.tm0(self.now).get_byte(byte),
            0x82 | 0x83 => self.timers.md0.get_byte(byte),
            0x88 | 0x89 => self.timers.tm1(self.now).get_byte(byte),
            0x8A | 0x8B => self.timers.md1.get_byte(byte),
            TMC0 => self.timers.tmc0,
            TMC1 => self.timers.tmc1,
            RFM => self.rfm,
            0xE8 | 0xE9 => self.wtc.get_byte(byte),
            FLAG => self.flag,
            PRC => self.prc,
            IRQS => self.irq.irqs,
            ISPR => self.irq.ispr,
            IDB => (self.idb >> 12) as u8,
            _ => self.unhandled_read(offset),
        }
    }

    pub(super) fn write_sfr(&mut self, offset: u32, data: u8) {
        if let Some((source, group)) = irq_register(offset) {
            if self.irq.write_control(source, group, data) {
                self.report(Diagnostic::Unimplemented {
                    device: INFO.shortname,
                    feature: "macro service",
                });
            }
            return;
        }

        let port = (offset >> 3) as usize;
        let byte = (offset & 1) as u8;
        match offset {
            P0 | P1 | P2 => self.ports.latch[port] = data,
            PM0 | PM1 | PM2 => self.ports.mode[port] = data,
            PMC0 | PMC1 | PMC2 => self.ports.control[port] = data,
            PMT => self.ports.pmt = data,
            INTM => self.intm = data,
            EMS0..=EMS2 => self.ems[(offset - EMS0) as usize] = data,
            0x80 | 0x81 => self.timers.tm0.set_byte(byte, data),
            0x82 | 0x83 => self.timers.md0.set_byte(byte, data),
            0x88 | 0x89 => self.timers.tm1.set_byte(byte, data),
            0x8A | 0x8B => self.timers.md1.set_byte(byte, data),
            TMC0 => self.timers.write_tmc0(self.now, data),
            TMC1 => self.timers.write_tmc1(self.now, data),
            RFM => self.rfm = data,
            0xE8 | 0xE9 => self.wtc.set_byte(byte, data),
            FLAG => self.flag = data & 0x28,
            PRC => self.write_prc(data),
            IDB => self.idb = (u32::from(data) << 12) | 0xE00,
            _ => self.unhandled_write(offset, data),
        }
    }

    /// PRC: RAMEN in bit 6, time base in bits 3-2, prescaler in bits 1-0.
    pub(super) fn write_prc(&mut self, data: u8) {
        self.prc = data & 0x4F;
        if data & 3 == 3 {
            tracing::warn!(target: "emu::v25", prc = data, "reserved clock divider");
        }
        let pck = 8_u32 >> (data & 3);
        self.timers.set_prescaler(self.now, pck, data.get_bits(2..=3));
    }

    pub(super) fn read_sfr_word(&mut self, offset: u32) -> u16 {
        match offset {
            TM0 => self.timers.tm0(self.now),
            MD0 => self.timers.md0,
            TM1 => self.timers.tm1(self.now),
            MD1 => self.timers.md1,
            WTC => self.wtc,
            _ => {
                let low = self.read_sfr(offset);
                let high = self.read_sfr(offset + 1);
                u16::from_le_bytes([low, high])
            }
        }
    }

    pub(super) fn write_sfr_word(&mut self, offset: u32, data: u16) {
        match offset {
            TM0 => self.timers.tm0 = data,
            MD0 => self.timers.md0 = data,
            TM1 => self.timers.tm1 = data,
            MD1 => self.timers.md1 = data,
            WTC => self.wtc = data,
            _ => {
                let [low, high] = data.to_le_bytes();
                self.write_sfr(offset, low);
                self.write_sfr(offset + 1, high);
            }
        }
    }
}
