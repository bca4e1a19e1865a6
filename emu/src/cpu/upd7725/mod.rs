//! # NEC uPD7725 / uPD96050 DSP
//!
//! A 16-bit fixed point DSP with a Harvard layout: 24-bit instructions
//! come over the bus, while data ROM, data RAM and the return stack are
//! internal. Every instruction takes one cycle and the K×L product is
//! refreshed after each of them.
//!
//! ```text
//!  23 22 21                                                  0
//! ┌─────┬─────────────────────────────────────────────────────┐
//! │ 0 0 │ OP: P  ALU  A  DPL  DPH-M  RPDCR  SRC  DST          │
//! │ 0 1 │ RT: as OP, then return                              │
//! │ 1 0 │ JP: BRCH(9)  NA(11)  BANK(2)                        │
//! │ 1 1 │ LD: ID(16)  DST(4)                                  │
//! └─────┴─────────────────────────────────────────────────────┘
//! ```
//!
//! The host talks to the chip through SR and DR only. When the program
//! waits for the host by spinning on RQM, the rest of the slice is given
//! up: nothing can change until the host runs.

mod disassembler;
pub mod flags;
mod operations;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::device::{Debugger, Device, DeviceInfo, Execute, InputLineState, Lifecycle};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::state::{StateVisitor, Stateful};

use flags::{AluFlags, sr};

pub static INFO: DeviceInfo = DeviceInfo {
    name: "uPD7725",
    shortname: "upd7725",
    family: "NEC uPD77xx",
    version: "1.0",
};

/// The INT input.
pub const INT_LINE: u32 = 0;

const INT_VECTOR: u16 = 0x100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Upd7725,
    Upd96050,
}

impl Variant {
    #[must_use]
    pub const fn program_words(self) -> usize {
        match self {
            Self::Upd7725 => 2048,
            Self::Upd96050 => 16384,
        }
    }

    #[must_use]
    pub const fn data_rom_words(self) -> usize {
        match self {
            Self::Upd7725 => 1024,
            Self::Upd96050 => 2048,
        }
    }

    #[must_use]
    pub const fn ram_words(self) -> usize {
        match self {
            Self::Upd7725 => 256,
            Self::Upd96050 => 2048,
        }
    }

    #[must_use]
    pub const fn stack_depth(self) -> usize {
        match self {
            Self::Upd7725 => 4,
            Self::Upd96050 => 16,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn mask(words: usize) -> u16 {
        (words - 1) as u16
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Upd7725Config {
    pub variant: Variant,
}

pub struct Upd7725 {
    config: Upd7725Config,
    sink: Box<dyn DiagnosticSink>,
    lifecycle: Lifecycle,
    /// As given; checked against the variant on reset.
    data_rom_region: Vec<u16>,

    pub(crate) data_rom: Vec<u16>,
    pub(crate) ram: Vec<u16>,
    pub(crate) stack: Vec<u16>,

    pub(crate) pc: u16,
    pub(crate) ppc: u16,
    pub(crate) rp: u16,
    pub(crate) dp: u16,
    pub(crate) a: u16,
    pub(crate) b: u16,
    pub(crate) flag_a: AluFlags,
    pub(crate) flag_b: AluFlags,
    pub(crate) tr: u16,
    pub(crate) trb: u16,
    pub(crate) k: u16,
    pub(crate) l: u16,
    pub(crate) m: u16,
    pub(crate) n: u16,
    pub(crate) sr: u16,
    pub(crate) dr: u16,
    pub(crate) si: u16,
    pub(crate) so: u16,
    pub(crate) icount: i32,

    int_line: bool,
    int_latched: bool,
}

impl Upd7725 {
    /// `data_rom` holds the coefficient ROM, one word per entry.
    #[must_use]
    pub fn new(config: Upd7725Config, data_rom: Vec<u16>, sink: Box<dyn DiagnosticSink>) -> Self {
        let variant = config.variant;
        Self {
            config,
            sink,
            lifecycle: Lifecycle::default(),
            data_rom_region: data_rom,
            data_rom: vec![0; variant.data_rom_words()],
            ram: vec![0; variant.ram_words()],
            stack: vec![0; variant.stack_depth()],
            pc: 0,
            ppc: 0,
            rp: 0,
            dp: 0,
            a: 0,
            b: 0,
            flag_a: AluFlags::default(),
            flag_b: AluFlags::default(),
            tr: 0,
            trb: 0,
            k: 0,
            l: 0,
            m: 0,
            n: 0,
            sr: 0,
            dr: 0,
            si: 0,
            so: 0,
            icount: 0,
            int_line: false,
            int_latched: false,
        }
    }

    #[must_use]
    pub fn with_tracing(config: Upd7725Config, data_rom: Vec<u16>) -> Self {
        Self::new(config, data_rom, Box::new(TracingSink))
    }

    #[must_use]
    pub const fn variant(&self) -> Variant {
        self.config.variant
    }

    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    pub(crate) const fn pc_mask(&self) -> u16 {
        Variant::mask(self.config.variant.program_words())
    }

    pub(crate) const fn rp_mask(&self) -> u16 {
        Variant::mask(self.config.variant.data_rom_words())
    }

    pub(crate) const fn dp_mask(&self) -> u16 {
        Variant::mask(self.config.variant.ram_words())
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.sink.report(diagnostic);
    }

    /// Host side: upper byte of SR.
    #[must_use]
    pub fn status_read(&self) -> u8 {
        self.sr.get_byte(1)
    }

    /// Host side DR read. In 16-bit mode the low byte comes first and the
    /// high byte hands DR back to the DSP.
    pub fn data_read(&mut self) -> u8 {
        if self.sr.get_bit(sr::DRC) {
            self.sr.set_bit(sr::RQM, false);
            return self.dr.get_byte(0);
        }
        if self.sr.get_bit(sr::DRS) {
            self.sr.set_bit(sr::RQM, false);
            self.sr.set_bit(sr::DRS, false);
            self.dr.get_byte(1)
        } else {
            self.sr.set_bit(sr::DRS, true);
            self.dr.get_byte(0)
        }
    }

    pub fn data_write(&mut self, data: u8) {
        if self.sr.get_bit(sr::DRC) {
            self.sr.set_bit(sr::RQM, false);
            self.dr.set_byte(0, data);
            return;
        }
        if self.sr.get_bit(sr::DRS) {
            self.sr.set_bit(sr::RQM, false);
            self.sr.set_bit(sr::DRS, false);
            self.dr.set_byte(1, data);
        } else {
            self.sr.set_bit(sr::DRS, true);
            self.dr.set_byte(0, data);
        }
    }

    /// P0 and P1 output pins.
    #[must_use]
    pub fn output_pins(&self) -> (bool, bool) {
        (self.sr.get_bit(sr::P0), self.sr.get_bit(sr::P1))
    }

    /// Shift-register stack: the oldest entry falls off the bottom.
    pub(crate) fn push(&mut self, pc: u16) {
        self.stack.rotate_right(1);
        self.stack[0] = pc;
    }

    pub(crate) fn pop(&mut self) -> u16 {
        let pc = self.stack[0];
        self.stack.rotate_left(1);
        if let Some(last) = self.stack.last_mut() {
            *last = 0;
        }
        pc
    }

    fn check_irq(&mut self) {
        if self.int_latched && self.sr.get_bit(sr::EI) {
            tracing::trace!(target: "emu::upd7725", "interrupt at {:04X}", self.pc);
            self.int_latched = false;
            self.push(self.pc);
            self.pc = INT_VECTOR & self.pc_mask();
            self.sr.set_bit(sr::EI, false);
        }
    }

    fn step(&mut self, bus: &mut dyn Bus) {
        self.ppc = self.pc;
        let opcode = bus.read_opcode(u32::from(self.pc) * 4) & 0xFF_FFFF;
        self.pc = self.pc.wrapping_add(1) & self.pc_mask();
        self.icount -= 1;

        match opcode >> 22 {
            0 => self.exec_op(opcode),
            1 => {
                self.exec_op(opcode);
                self.pc = self.pop() & self.pc_mask();
            }
            2 => self.exec_jp(opcode),
            _ => self.exec_ld(opcode),
        }

        self.update_product();
    }

    /// M and N are the high and low halves of the doubled signed product.
    fn update_product(&mut self) {
        #[allow(clippy::cast_possible_wrap)]
        let product = i32::from(self.k as i16) * i32::from(self.l as i16);
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (m, n) = ((product >> 15) as u16, (product << 1) as u16);
        self.m = m;
        self.n = n;
    }
}

impl Device for Upd7725 {
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

        let expected = self.config.variant.data_rom_words();
        if self.data_rom_region.len() == expected {
            self.data_rom.copy_from_slice(&self.data_rom_region);
        } else {
            self.report(Diagnostic::InvalidRegionSize {
                device: INFO.shortname,
                region: "data rom",
                expected,
                actual: self.data_rom_region.len(),
            });
            self.data_rom.fill(0);
        }

        self.ram.fill(0);
        self.stack.fill(0);
        self.pc = 0;
        self.ppc = 0;
        self.rp = 0;
        self.dp = 0;
        self.a = 0;
        self.b = 0;
        self.flag_a = AluFlags::default();
        self.flag_b = AluFlags::default();
        self.tr = 0;
        self.trb = 0;
        self.k = 0;
        self.l = 0;
        self.m = 0;
        self.n = 0;
        self.sr = 0;
        self.dr = 0;
        self.si = 0;
        self.so = 0;
        self.icount = 0;
        self.int_latched = false;
    }

    fn stop(&mut self) {
        self.lifecycle.stop(INFO.shortname);
    }
}

impl Execute for Upd7725 {
    fn execute_run(&mut self, bus: &mut dyn Bus, cycles: i32) -> i32 {
        self.lifecycle.check_running(INFO.shortname);

        self.icount += cycles;
        let budget = self.icount;

        while self.icount > 0 {
            self.check_irq();
            self.step(bus);
        }

        if budget > 0 { budget - self.icount } else { 0 }
    }

    fn set_input_line(&mut self, line: u32, state: InputLineState) {
        assert!(line == INT_LINE, "upd7725: no input line {line}");
        match state {
            InputLineState::Assert => {
                self.int_latched |= !self.int_line;
                self.int_line = true;
            }
            InputLineState::Clear => self.int_line = false,
            InputLineState::Pulse => {
                self.int_latched = true;
                self.int_line = false;
            }
        }
    }

    fn icount(&self) -> i32 {
        self.icount
    }
}

impl Stateful for Upd7725 {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        visitor.item("pc", &mut self.pc);
        visitor.item("ppc", &mut self.ppc);
        visitor.item("rp", &mut self.rp);
        visitor.item("dp", &mut self.dp);
        visitor.item("a", &mut self.a);
        visitor.item("b", &mut self.b);
        visitor.item("flaga", &mut self.flag_a);
        visitor.item("flagb", &mut self.flag_b);
        visitor.item("tr", &mut self.tr);
        visitor.item("trb", &mut self.trb);
        visitor.item("k", &mut self.k);
        visitor.item("l", &mut self.l);
        visitor.item("m", &mut self.m);
        visitor.item("n", &mut self.n);
        visitor.item("sr", &mut self.sr);
        visitor.item("dr", &mut self.dr);
        visitor.item("si", &mut self.si);
        visitor.item("so", &mut self.so);
        visitor.item("stack", &mut self.stack);
        visitor.item("ram", &mut self.ram);
        visitor.item("icount", &mut self.icount);
        visitor.item("int_line", &mut self.int_line);
        visitor.item("int_latched", &mut self.int_latched);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upd7725Register {
    Pc,
    Rp,
    Dp,
    A,
    B,
    FlagA,
    FlagB,
    Tr,
    Trb,
    K,
    L,
    M,
    N,
    Sr,
    Dr,
    Si,
    So,
}

impl Display for Upd7725Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pc => "PC",
            Self::Rp => "RP",
            Self::Dp => "DP",
            Self::A => "A",
            Self::B => "B",
            Self::FlagA => "FLAGA",
            Self::FlagB => "FLAGB",
            Self::Tr => "TR",
            Self::Trb => "TRB",
            Self::K => "K",
            Self::L => "L",
            Self::M => "M",
            Self::N => "N",
            Self::Sr => "SR",
            Self::Dr => "DR",
            Self::Si => "SI",
            Self::So => "SO",
        };
        f.write_str(name)
    }
}

fn flag_string(flags: AluFlags) -> String {
    [
        (flags.s1, 'S'),
        (flags.s0, 's'),
        (flags.c, 'C'),
        (flags.z, 'Z'),
        (flags.ov1, 'V'),
        (flags.ov0, 'v'),
    ]
    .iter()
    .map(|&(set, name)| if set { name } else { '.' })
    .collect()
}

impl Debugger for Upd7725 {
    type Register = Upd7725Register;

    const REGISTERS: &'static [Upd7725Register] = &[
        Upd7725Register::Pc,
        Upd7725Register::Rp,
        Upd7725Register::Dp,
        Upd7725Register::A,
        Upd7725Register::B,
        Upd7725Register::FlagA,
        Upd7725Register::FlagB,
        Upd7725Register::Tr,
        Upd7725Register::Trb,
        Upd7725Register::K,
        Upd7725Register::L,
        Upd7725Register::M,
        Upd7725Register::N,
        Upd7725Register::Sr,
        Upd7725Register::Dr,
        Upd7725Register::Si,
        Upd7725Register::So,
    ];

    fn export_register(&self, register: Upd7725Register) -> u64 {
        use Upd7725Register as R;
        let value = match register {
            R::Pc => self.pc,
            R::Rp => self.rp,
            R::Dp => self.dp,
            R::A => self.a,
            R::B => self.b,
            R::FlagA => u16::from(self.flag_a.packed()),
            R::FlagB => u16::from(self.flag_b.packed()),
            R::Tr => self.tr,
            R::Trb => self.trb,
            R::K => self.k,
            R::L => self.l,
            R::M => self.m,
            R::N => self.n,
            R::Sr => self.sr,
            R::Dr => self.dr,
            R::Si => self.si,
            R::So => self.so,
        };
        u64::from(value)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn import_register(&mut self, register: Upd7725Register, value: u64) {
        use Upd7725Register as R;
        let value = value as u16;
        match register {
            R::Pc => self.pc = value & self.pc_mask(),
            R::Rp => self.rp = value & self.rp_mask(),
            R::Dp => self.dp = value & self.dp_mask(),
            R::A => self.a = value,
            R::B => self.b = value,
            R::FlagA => self.flag_a = AluFlags::from_packed(value as u8),
            R::FlagB => self.flag_b = AluFlags::from_packed(value as u8),
            R::Tr => self.tr = value,
            R::Trb => self.trb = value,
            R::K => self.k = value,
            R::L => self.l = value,
            R::M => self.m = value,
            R::N => self.n = value,
            R::Sr => self.sr = value,
            R::Dr => self.dr = value,
            R::Si => self.si = value,
            R::So => self.so = value,
        }
    }

    fn export_string(&self, register: Upd7725Register) -> String {
        match register {
            Upd7725Register::FlagA => flag_string(self.flag_a),
            Upd7725Register::FlagB => flag_string(self.flag_b),
            _ => format!("{:04X}", self.export_register(register)),
        }
    }

    fn disassemble(&self, _pc: u32, opcode_bytes: &[u8]) -> (String, usize) {
        match opcode_bytes.get(..4) {
            Some(&[b0, b1, b2, _]) => (
                disassembler::disassemble(u32::from_le_bytes([b0, b1, b2, 0])),
                4,
            ),
            _ => ("???".to_string(), 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatMemory;
    use crate::diagnostics::{DiagnosticKind, RecordingSink};
    use crate::state::SaveState;
    use pretty_assertions::assert_eq;

    pub(super) mod asm {
        //! Hand assembly for the tests.

        pub const fn op(alu: u32, acc_b: bool, p: u32, src: u32, dst: u32) -> u32 {
            (p << 20) | (alu << 16) | ((acc_b as u32) << 15) | (src << 4) | dst
        }

        pub const fn rt(alu: u32, acc_b: bool, p: u32, src: u32, dst: u32) -> u32 {
            op(alu, acc_b, p, src, dst) | (1 << 22)
        }

        pub const fn jp(brch: u32, na: u32) -> u32 {
            (2 << 22) | (brch << 13) | (na << 2)
        }

        pub const fn ld(id: u32, dst: u32) -> u32 {
            (3 << 22) | (id << 6) | dst
        }

        /// DP modifiers on top of an OP.
        pub const fn dp(op: u32, dpl: u32, dphm: u32) -> u32 {
            op | (dpl << 13) | (dphm << 9)
        }

        pub const RPDEC: u32 = 1 << 8;

        // ALU
        pub const NOP: u32 = 0;
        pub const OR: u32 = 1;
        pub const SUB: u32 = 4;
        pub const ADD: u32 = 5;
        pub const DEC: u32 = 8;
        pub const SHL1: u32 = 12;
        pub const XCHG: u32 = 15;

        // P
        pub const RAM: u32 = 0;
        pub const IDB: u32 = 1;
        pub const M: u32 = 2;

        // sources
        pub const TRB: u32 = 0;
        pub const A: u32 = 1;
        pub const RO: u32 = 6;
        pub const SGN: u32 = 7;
        pub const DR: u32 = 8;
        pub const K: u32 = 13;
        pub const MEM: u32 = 15;

        // destinations
        pub const NON: u32 = 0;
        pub const DST_A: u32 = 1;
        pub const DST_B: u32 = 2;
        pub const DST_TR: u32 = 3;
        pub const DST_DP: u32 = 4;
        pub const DST_RP: u32 = 5;
        pub const DST_DR: u32 = 6;
        pub const DST_SR: u32 = 7;
        pub const DST_K: u32 = 10;
        pub const DST_KLR: u32 = 11;
        pub const DST_L: u32 = 13;
        pub const DST_MEM: u32 = 15;

        // branches
        pub const JMP: u32 = 0x100;
        pub const CALL: u32 = 0x140;
        pub const JNZA: u32 = 0x088;
        pub const JZA: u32 = 0x08A;
        pub const JNRQM: u32 = 0x0BC;
        pub const JRQM: u32 = 0x0BE;
        pub const JDPL0: u32 = 0x0B0;
    }

    use asm::*;

    pub(super) fn load(program: &[u32]) -> FlatMemory {
        let mut memory = FlatMemory::new(0x4000 * 4);
        for (i, word) in program.iter().enumerate() {
            memory.load((i * 4) as u32, &word.to_le_bytes());
        }
        memory
    }

    pub(super) fn dsp_with(variant: Variant, data_rom: Vec<u16>, sink: RecordingSink) -> Upd7725 {
        let mut dsp = Upd7725::new(Upd7725Config { variant }, data_rom, Box::new(sink));
        dsp.start();
        dsp.reset();
        dsp
    }

    pub(super) fn dsp() -> Upd7725 {
        dsp_with(Variant::Upd7725, vec![0; 1024], RecordingSink::new())
    }

    /// Loops `count` times adding TR to A, then hands A to the host and
    /// waits for it.
    fn summing_program(count: u16) -> Vec<u32> {
        vec![
            ld(u32::from(count), DST_B),
            ld(3, DST_TR),
            // 2: A += TR, B -= 1
            op(ADD, false, IDB, 3, NON),
            op(DEC, true, RAM, TRB, NON),
            jp(0x08C, 2), // jnzb
            op(NOP, false, RAM, A, DST_DR),
            // 6: wait for the host
            jp(JRQM, 6),
            jp(JMP, 6),
        ]
    }

    #[test]
    fn check_reset_state() {
        let mut dsp = dsp();
        let mut memory = load(&summing_program(4));
        dsp.execute_run(&mut memory, 5);
        dsp.reset();

        assert_eq!(dsp.pc(), 0);
        assert_eq!(dsp.status_read(), 0);
        assert_eq!(dsp.export_register(Upd7725Register::A), 0);

        let mut first = SaveState::new();
        first.capture("dsp", &mut dsp);
        dsp.reset();
        let mut second = SaveState::new();
        second.capture("dsp", &mut dsp);
        assert_eq!(first, second);
    }

    #[test]
    fn check_summing_program_and_host_read() {
        let mut dsp = dsp();
        let mut memory = load(&summing_program(4));

        let used = dsp.execute_run(&mut memory, 1_000);
        assert_eq!(used, 1_000);
        assert_eq!(dsp.a, 12);
        // RQM set by the move to DR, program parked on the JRQM.
        assert_eq!(dsp.status_read() & 0x80, 0x80);
        assert_eq!(dsp.pc(), 6);

        assert_eq!(dsp.data_read(), 12);
        assert_eq!(dsp.status_read() & 0x10, 0x10);
        assert_eq!(dsp.data_read(), 0);
        assert_eq!(dsp.status_read(), 0);

        dsp.execute_run(&mut memory, 2);
        assert_eq!(dsp.pc(), 6);
    }

    #[test]
    fn check_poll_loop_yields() {
        let mut dsp = dsp();
        let mut memory = load(&[op(NOP, false, RAM, TRB, DST_DR), jp(JRQM, 1)]);

        // Two instructions, then the rest of the slice is given up.
        assert_eq!(dsp.execute_run(&mut memory, 500), 500);
        assert_eq!(dsp.icount(), 0);
        assert_eq!(dsp.pc(), 1);
    }

    #[test]
    fn check_slices_match_one_run() {
        let program = summing_program(50);

        let mut whole = dsp();
        let mut memory = load(&program);
        whole.execute_run(&mut memory, 120);

        let mut sliced = dsp();
        let mut memory = load(&program);
        for _ in 0..120 {
            sliced.execute_run(&mut memory, 1);
        }

        let mut a = SaveState::new();
        a.capture("dsp", &mut whole);
        let mut b = SaveState::new();
        b.capture("dsp", &mut sliced);
        assert_eq!(a, b);
    }

    #[test]
    fn check_host_writes_in_both_widths() {
        let mut dsp = dsp();
        dsp.data_write(0x34);
        dsp.data_write(0x12);
        assert_eq!(dsp.dr, 0x1234);

        dsp.sr.set_bit(sr::DRC, true);
        dsp.sr.set_bit(sr::RQM, true);
        dsp.data_write(0x56);
        assert_eq!(dsp.dr, 0x1256);
        assert_eq!(dsp.status_read() & 0x80, 0);
    }

    #[test]
    fn check_call_and_return() {
        let mut dsp = dsp();
        let mut memory = load(&[
            jp(CALL, 3),
            ld(0x1111, DST_B),
            jp(JMP, 1),
            // 3: subroutine
            ld(0x2222, DST_A),
            rt(NOP, false, RAM, TRB, NON),
        ]);

        dsp.execute_run(&mut memory, 4);
        assert_eq!(dsp.a, 0x2222);
        assert_eq!(dsp.b, 0x1111);
        assert_eq!(dsp.stack, vec![0; 4]);
    }

    #[test]
    fn check_stack_overflow_drops_oldest() {
        let mut dsp = dsp();
        for pc in 1..=5 {
            dsp.push(pc);
        }
        assert_eq!(dsp.stack, vec![5, 4, 3, 2]);
        assert_eq!(dsp.pop(), 5);
        assert_eq!(dsp.stack, vec![4, 3, 2, 0]);
    }

    #[test]
    fn check_interrupt() {
        let mut dsp = dsp();
        let mut program = vec![ld(1 << sr::EI, DST_SR), jp(JMP, 1)];
        program.resize(0x100, jp(JMP, 0));
        program.push(ld(0xAAAA, DST_A));
        program.push(jp(JMP, 0x101));
        let mut memory = load(&program);

        // Latched until EI is set.
        dsp.set_input_line(INT_LINE, InputLineState::Pulse);
        dsp.execute_run(&mut memory, 1);
        assert_eq!(dsp.pc(), 1);

        dsp.execute_run(&mut memory, 2);
        assert_eq!(dsp.a, 0xAAAA);
        assert_eq!(dsp.stack[0], 1);
        assert!(!dsp.sr.get_bit(sr::EI));
    }

    #[test]
    fn check_multiplier() {
        let mut dsp = dsp();
        let mut memory = load(&[
            ld(0x4000, DST_K),
            ld(0xC000, DST_L),
            op(ADD, false, M, TRB, NON),
        ]);
        dsp.execute_run(&mut memory, 3);
        // 0.5 * -0.5 = -0.25
        assert_eq!(dsp.m, 0xE000);
        assert_eq!(dsp.n, 0);
        assert_eq!(dsp.a, 0xE000);
        assert!(dsp.flag_a.s0);
    }

    #[test]
    fn check_data_rom() {
        let rom = (0..1024).map(|i| i * 3).collect();
        let mut dsp = dsp_with(Variant::Upd7725, rom, RecordingSink::new());
        let mut memory = load(&[
            ld(10, DST_RP),
            op(NOP, false, RAM, RO, DST_A),
            op(NOP, false, RAM, RO, DST_B) | RPDEC,
            op(NOP, false, RAM, RO, DST_TR),
        ]);
        dsp.execute_run(&mut memory, 4);
        assert_eq!(dsp.a, 30);
        assert_eq!(dsp.b, 30);
        assert_eq!(dsp.tr, 27);
    }

    #[test]
    fn check_invalid_data_rom_size() {
        let sink = RecordingSink::new();
        let dsp = dsp_with(Variant::Upd96050, vec![1; 1024], sink.clone());
        assert_eq!(sink.count(DiagnosticKind::InvalidRegionSize), 1);
        assert!(dsp.data_rom.iter().all(|&word| word == 0));
        assert_eq!(dsp.data_rom.len(), 2048);
    }

    #[test]
    fn check_unknown_branch_falls_through() {
        let sink = RecordingSink::new();
        let mut dsp = dsp_with(Variant::Upd7725, vec![0; 1024], sink.clone());
        let mut memory = load(&[jp(0x1FF, 5), ld(7, DST_A)]);
        dsp.execute_run(&mut memory, 2);
        assert_eq!(dsp.a, 7);
        assert_eq!(sink.count(DiagnosticKind::IllegalOpcode), 1);
    }

    #[test]
    fn check_debugger() {
        let mut dsp = dsp();
        dsp.import_register(Upd7725Register::FlagA, 0b00_1100);
        assert_eq!(dsp.export_string(Upd7725Register::FlagA), "..CZ..");
        dsp.import_register(Upd7725Register::Pc, 0xFFFF);
        assert_eq!(dsp.export_register(Upd7725Register::Pc), 0x7FF);
        assert_eq!(dsp.export_string(Upd7725Register::Pc), "07FF");
        assert_eq!(
            dsp.disassemble(0, &ld(0x1234, DST_A).to_le_bytes()),
            ("ld      $1234,a".to_string(), 4)
        );
        assert_eq!(dsp.disassemble(0, &[0, 0]).1, 0);
    }
}
