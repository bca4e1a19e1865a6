//! # ASAP RISC core
//!
//! A 32-bit load/store RISC with one delay slot after every taken branch.
//! Every instruction costs one cycle, and so does entering an exception.
//!
//! ```text
//!            ┌──────────── check IRQ ◀────────────┐
//!            ▼                                     │
//!   fetch ─▶ decode (table) ─▶ execute ─▶ icount -= 1
//! ```
//!
//! Exceptions jump to `0x40 * n` with `P := I`, `I := 0`, `r30` holding the
//! address to resume at and `r31` the one after it. When the exception hits
//! a delay slot, `r31` holds the pending branch target instead, so the
//! return sequence `jsr r30` / `jsr.c r31` is always correct.

pub mod condition;
mod disassembler;
pub mod flags;
pub mod opcode;
mod operations;
pub mod registers;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::device::{Debugger, Device, DeviceInfo, Execute, InputLineState, Lifecycle};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::state::{StateVisitor, Stateful};

use flags::Flags;
use opcode::OpcodeTable;
use registers::{REG_RESUME, REG_RESUME_NEXT, Registers};

pub static INFO: DeviceInfo = DeviceInfo {
    name: "ASAP",
    shortname: "asap",
    family: "Atari ASAP",
    version: "1.0",
};

/// The only interrupt input.
pub const IRQ0: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Reset = 0,
    Trap0 = 1,
    TrapF = 2,
    Interrupt = 3,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        0x40 * self as u32
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsapConfig {
    /// Where execution starts after reset.
    pub reset_vector: u32,
}

pub struct Asap {
    config: AsapConfig,
    sink: Box<dyn DiagnosticSink>,
    lifecycle: Lifecycle,
    table: Option<&'static OpcodeTable>,

    pub(crate) registers: Registers,
    pub(crate) flags: Flags,
    /// Next instruction to fetch.
    pub(crate) pc: u32,
    /// Address of the instruction being executed.
    pub(crate) ppc: u32,
    /// Target of a taken branch, applied after the delay slot is fetched.
    pub(crate) nextpc: Option<u32>,
    pub(crate) op: u32,
    pub(crate) icount: i32,

    irq_line: bool,
    /// Rising edges and pulses stay here until the interrupt is taken.
    irq_latched: bool,
}

impl Asap {
    #[must_use]
    pub fn new(config: AsapConfig, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            sink,
            lifecycle: Lifecycle::default(),
            table: None,
            registers: Registers::default(),
            flags: Flags::default(),
            pc: config.reset_vector,
            ppc: config.reset_vector,
            nextpc: None,
            op: 0,
            icount: 0,
            irq_line: false,
            irq_latched: false,
        }
    }

    #[must_use]
    pub fn with_tracing(config: AsapConfig) -> Self {
        Self::new(config, Box::new(TracingSink))
    }

    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    #[must_use]
    pub const fn register(&self, reg: usize) -> u32 {
        self.registers.register_at(reg)
    }

    #[must_use]
    pub const fn flags(&self) -> &Flags {
        &self.flags
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.sink.report(diagnostic);
    }

    pub(crate) fn generate_exception(&mut self, exception: Exception) {
        tracing::trace!("asap: exception {exception:?} at {:08X}", self.ppc);

        self.flags.prev_irq_enable = self.flags.irq_enable;
        self.flags.irq_enable = false;

        let resume_next = self.nextpc.unwrap_or_else(|| self.pc.wrapping_add(4));
        self.registers.set_register_at(REG_RESUME, self.pc);
        self.registers.set_register_at(REG_RESUME_NEXT, resume_next);

        self.pc = exception.vector();
        self.nextpc = None;
        self.icount -= 1;
    }

    fn check_irqs(&mut self) -> bool {
        if (self.irq_line || self.irq_latched) && self.flags.irq_enable {
            self.irq_latched = false;
            self.generate_exception(Exception::Interrupt);
            true
        } else {
            false
        }
    }

    fn step(&mut self, table: &OpcodeTable, bus: &mut dyn Bus) {
        self.ppc = self.pc;
        self.op = bus.read_opcode(self.pc);
        self.pc = self
            .nextpc
            .take()
            .unwrap_or_else(|| self.pc.wrapping_add(4));

        (table.lookup(self.op).handler)(self, bus);
        self.icount -= 1;
    }
}

impl Device for Asap {
    fn info(&self) -> &'static DeviceInfo {
        &INFO
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn start(&mut self) {
        self.lifecycle.start(INFO.shortname);
        self.table = Some(OpcodeTable::shared());
    }

    fn reset(&mut self) {
        self.lifecycle.reset(INFO.shortname);

        self.registers = Registers::default();
        self.flags = Flags::default();
        self.pc = self.config.reset_vector;
        self.ppc = self.pc;
        self.nextpc = None;
        self.op = 0;
        self.icount = 0;
        // The line itself is driven from outside, only our latch is ours.
        self.irq_latched = false;
    }

    fn stop(&mut self) {
        self.lifecycle.stop(INFO.shortname);
    }
}

impl Execute for Asap {
    fn execute_run(&mut self, bus: &mut dyn Bus, cycles: i32) -> i32 {
        self.lifecycle.check_running(INFO.shortname);
        let Some(table) = self.table else {
            unreachable!("a running ASAP always has its dispatch table");
        };

        self.icount += cycles;
        let budget = self.icount;

        while self.icount > 0 {
            if self.check_irqs() {
                continue;
            }
            self.step(table, bus);
        }

        if budget > 0 { budget - self.icount } else { 0 }
    }

    fn set_input_line(&mut self, line: u32, state: InputLineState) {
        assert!(line == IRQ0, "asap: no input line {line}");
        match state {
            InputLineState::Assert => {
                self.irq_latched |= !self.irq_line;
                self.irq_line = true;
            }
            InputLineState::Clear => self.irq_line = false,
            InputLineState::Pulse => {
                self.irq_latched = true;
                self.irq_line = false;
            }
        }
    }

    fn icount(&self) -> i32 {
        self.icount
    }
}

impl Stateful for Asap {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        visitor.item("pc", &mut self.pc);
        visitor.item("ppc", &mut self.ppc);
        visitor.item("nextpc", &mut self.nextpc);
        visitor.item("op", &mut self.op);
        visitor.item("icount", &mut self.icount);
        visitor.item("regs", self.registers.raw_mut());
        visitor.item("znflag", &mut self.flags.zn);
        visitor.item("cflag", &mut self.flags.carry);
        visitor.item("vflag", &mut self.flags.overflow);
        visitor.item("iflag", &mut self.flags.irq_enable);
        visitor.item("pflag", &mut self.flags.prev_irq_enable);
        visitor.item("irq_line", &mut self.irq_line);
        visitor.item("irq_latched", &mut self.irq_latched);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsapRegister {
    Pc,
    Ps,
    R(u8),
}

#[allow(clippy::cast_lossless)]
const ALL_REGISTERS: [AsapRegister; 34] = {
    let mut all = [AsapRegister::Pc; 34];
    all[1] = AsapRegister::Ps;
    let mut i: u8 = 0;
    while i < 32 {
        all[i as usize + 2] = AsapRegister::R(i);
        i += 1;
    }
    all
};

impl Display for AsapRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pc => write!(f, "PC"),
            Self::Ps => write!(f, "PS"),
            Self::R(n) => write!(f, "R{n}"),
        }
    }
}

impl Debugger for Asap {
    type Register = AsapRegister;

    const REGISTERS: &'static [AsapRegister] = &ALL_REGISTERS;

    fn export_register(&self, register: AsapRegister) -> u64 {
        u64::from(match register {
            AsapRegister::Pc => self.pc,
            AsapRegister::Ps => self.flags.ps(),
            AsapRegister::R(n) => self.registers.register_at(usize::from(n)),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn import_register(&mut self, register: AsapRegister, value: u64) {
        let value = value as u32;
        match register {
            AsapRegister::Pc => {
                self.pc = value;
                self.nextpc = None;
            }
            AsapRegister::Ps => self.flags.set_ps(value),
            AsapRegister::R(n) => self.registers.set_register_at(usize::from(n), value),
        }
    }

    fn export_string(&self, register: AsapRegister) -> String {
        match register {
            AsapRegister::Ps => {
                let ps = self.flags.ps();
                "PINZVC"
                    .chars()
                    .zip((0..6).rev())
                    .map(|(name, bit)| if ps.get_bit(bit) { name } else { '.' })
                    .collect()
            }
            other => format!("{:08X}", self.export_register(other)),
        }
    }

    fn disassemble(&self, pc: u32, opcode_bytes: &[u8]) -> (String, usize) {
        match opcode_bytes {
            [a, b, c, d, ..] => (
                disassembler::disassemble(pc, u32::from_le_bytes([*a, *b, *c, *d])),
                4,
            ),
            _ => ("???".to_string(), opcode_bytes.len()),
        }
    }
}
