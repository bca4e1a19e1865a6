//! # NEC V25 on-chip peripherals
//!
//! The V25 maps a 512-byte window over the top of its 20-bit address space:
//! internal RAM in the lower half, special function registers in the upper
//! half. The window moves with the IDB register; its last byte (and word)
//! is also reachable at the very top of memory so IDB can always be found.
//!
//! ```text
//!  IDB:000 ┌──────────────────────┐
//!          │ internal RAM (RAMEN) │  register banks 0-7
//!  IDB:100 ├──────────────────────┤
//!          │ SFRs                 │  ports, timers, interrupt control
//!  IDB:1FF └──────────────────────┘  IDB itself, also at 0xFFFFF
//! ```
//!
//! The core hands its bus to an [`OverlayBus`], which answers window
//! accesses from the [`SfrBlock`] and forwards everything else untouched.

pub mod interrupt_control;
pub mod register_bank;
pub mod sfr;
pub mod timers;

use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::device::{Device, DeviceInfo, InputLineState, Lifecycle};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::state::{StateVisitor, Stateful};

use interrupt_control::{InterruptControl, InterruptRequest};
use register_bank::InternalRam;
use sfr::Ports;
use timers::Timers;

pub static INFO: DeviceInfo = DeviceInfo {
    name: "V25 SFR",
    shortname: "v25",
    family: "NEC V25",
    version: "1.0",
};

pub const INT_LINE: u32 = 0;
pub const NMI_LINE: u32 = 1;
pub const INTP0_LINE: u32 = 2;
pub const INTP1_LINE: u32 = 3;
pub const INTP2_LINE: u32 = 4;

const ADDRESS_MASK: u32 = 0xF_FFFF;
const WINDOW_MASK: u32 = 0xF_FE00;
const BYTE_ALIAS: u32 = 0xF_FFFF;
const WORD_ALIAS: u32 = 0xF_FFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct V25Config {
    /// PRC after reset: RAM enabled, slowest time base, PCK = 2.
    pub prc: u8,
    /// IDB after reset; the window sits at `(idb << 12) | 0xE00`.
    pub idb: u8,
}

impl Default for V25Config {
    fn default() -> Self {
        Self {
            prc: 0x4E,
            idb: 0xFF,
        }
    }
}

enum Target {
    Ram(usize),
    Sfr(u32),
    External,
}

pub struct SfrBlock {
    config: V25Config,
    sink: Box<dyn DiagnosticSink>,
    lifecycle: Lifecycle,

    pub(crate) ram: InternalRam,
    /// Window base, always `xx E00`.
    pub(crate) idb: u32,
    pub(crate) prc: u8,
    pub(crate) irq: InterruptControl,
    pub(crate) timers: Timers,
    pub(crate) ports: Ports,
    pub(crate) intm: u8,
    pub(crate) ems: [u8; 3],
    pub(crate) rfm: u8,
    pub(crate) wtc: u16,
    pub(crate) flag: u8,

    /// Cycle time of the last [`advance_to`](Self::advance_to).
    now: u64,
    /// Address of the instruction being executed, for diagnostics.
    pub(crate) pc: Option<u32>,
}

impl SfrBlock {
    #[must_use]
    pub fn new(config: V25Config, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            config,
            sink,
            lifecycle: Lifecycle::default(),
            ram: InternalRam::default(),
            idb: (u32::from(config.idb) << 12) | 0xE00,
            prc: config.prc,
            irq: InterruptControl::default(),
            timers: Timers::default(),
            ports: Ports::default(),
            intm: 0,
            ems: [0; 3],
            rfm: 0,
            wtc: 0,
            flag: 0,
            now: 0,
            pc: None,
        }
    }

    #[must_use]
    pub fn with_tracing(config: V25Config) -> Self {
        Self::new(config, Box::new(TracingSink))
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.sink.report(diagnostic);
    }

    #[must_use]
    pub const fn window_base(&self) -> u32 {
        self.idb
    }

    #[must_use]
    pub const fn ram_enabled(&self) -> bool {
        self.prc & 0x40 != 0
    }

    #[must_use]
    pub const fn interrupts(&self) -> &InterruptControl {
        &self.irq
    }

    #[must_use]
    pub const fn internal_ram(&self) -> &InternalRam {
        &self.ram
    }

    /// Tags diagnostics with the address of the instruction in flight.
    pub const fn set_pc(&mut self, pc: u32) {
        self.pc = Some(pc);
    }

    fn decode(&self, address: u32, alias: u32) -> Target {
        let address = address & ADDRESS_MASK;
        if address & WINDOW_MASK != self.idb && address != alias {
            return Target::External;
        }

        let offset = address & 0x1FF;
        if offset >= 0x100 {
            Target::Sfr(offset & 0xFF)
        } else if self.ram_enabled() {
            Target::Ram(offset as usize)
        } else {
            Target::External
        }
    }

    pub fn read_byte(&mut self, external: &mut dyn Bus, address: u32) -> u8 {
        match self.decode(address, BYTE_ALIAS) {
            Target::Ram(offset) => self.ram.read_byte(offset),
            Target::Sfr(offset) => self.read_sfr(offset),
            Target::External => external.read_byte(address),
        }
    }

    pub fn write_byte(&mut self, external: &mut dyn Bus, address: u32, value: u8) {
        match self.decode(address, BYTE_ALIAS) {
            Target::Ram(offset) => self.ram.write_byte(offset, value),
            Target::Sfr(offset) => self.write_sfr(offset, value),
            Target::External => external.write_byte(address, value),
        }
    }

    /// An odd word touching the window is two byte accesses, either half
    /// may fall outside.
    pub fn read_word(&mut self, external: &mut dyn Bus, address: u32) -> u16 {
        if address & 1 != 0 {
            if !self.touches_window(address) {
                return external.read_word(address);
            }
            let low = self.read_byte(external, address);
            let high = self.read_byte(external, address.wrapping_add(1));
            return u16::from_le_bytes([low, high]);
        }

        match self.decode(address, WORD_ALIAS) {
            Target::External => external.read_word(address),
            Target::Ram(offset) => self.ram.read_word(offset),
            Target::Sfr(offset) => self.read_sfr_word(offset),
        }
    }

    pub fn write_word(&mut self, external: &mut dyn Bus, address: u32, value: u16) {
        if address & 1 != 0 {
            if !self.touches_window(address) {
                external.write_word(address, value);
                return;
            }
            let [low, high] = value.to_le_bytes();
            self.write_byte(external, address, low);
            self.write_byte(external, address.wrapping_add(1), high);
            return;
        }

        match self.decode(address, WORD_ALIAS) {
            Target::External => external.write_word(address, value),
            Target::Ram(offset) => self.ram.write_word(offset, value),
            Target::Sfr(offset) => self.write_sfr_word(offset, value),
        }
    }

    fn touches_window(&self, address: u32) -> bool {
        [address, address.wrapping_add(1)]
            .into_iter()
            .any(|byte| !matches!(self.decode(byte, BYTE_ALIAS), Target::External))
    }

    /// Fires the timers due by `now` and returns how many did.
    pub fn advance_to(&mut self, now: u64) -> usize {
        self.now = now;
        let (requests, fired) = self.timers.advance_to(now);
        self.irq.pending |= requests;
        fired
    }

    /// When the next timer fires, for the owner's scheduling.
    #[must_use]
    pub fn next_event(&self) -> Option<u64> {
        self.timers.next_expiry()
    }

    pub fn set_input_line(&mut self, line: u32, state: InputLineState) {
        match line {
            INT_LINE => self.irq.set_int_line(state),
            NMI_LINE => self.irq.set_nmi_line(state),
            INTP0_LINE..=INTP2_LINE => self.irq.set_intp_line((line - INTP0_LINE) as usize, state),
            _ => panic!("v25: no input line {line}"),
        }
    }

    pub fn assert_line(&mut self, line: u32) {
        self.set_input_line(line, InputLineState::Assert);
    }

    pub fn clear_line(&mut self, line: u32) {
        self.set_input_line(line, InputLineState::Clear);
    }

    /// Levels driven into port `port` (0-2, 3 for PT).
    pub const fn set_port_input(&mut self, port: usize, value: u8) {
        self.ports.inputs[port] = value;
    }

    #[must_use]
    pub const fn port_output(&self, port: usize) -> u8 {
        self.ports.read(port)
    }

    #[must_use]
    pub fn pending_interrupt(&self, interrupts_enabled: bool) -> Option<InterruptRequest> {
        self.irq.pending_interrupt(interrupts_enabled)
    }

    pub fn acknowledge(&mut self, request: &InterruptRequest) {
        tracing::trace!(target: "emu::v25", "taking {} ({:?})", request.source, request.vector);
        self.irq.acknowledge(request);
    }

    pub const fn finish_interrupt(&mut self) {
        self.irq.finish_interrupt();
    }

    /// See [`InternalRam::enter_bank`].
    pub const fn enter_bank(&mut self, bank: u8, psw: u16, pc: u16) -> u16 {
        self.ram.enter_bank(bank, psw, pc)
    }
}

impl Device for SfrBlock {
    fn info(&self) -> &'static DeviceInfo {
        &INFO
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn start(&mut self) {
        self.lifecycle.start(INFO.shortname);
        self.timers.start();
    }

    /// Internal RAM survives reset, everything else goes back to its
    /// power-on value.
    fn reset(&mut self) {
        self.lifecycle.reset(INFO.shortname);

        self.irq = InterruptControl::default();
        self.timers.reset();
        self.ports = Ports::default();
        self.intm = 0;
        self.ems = [0; 3];
        self.rfm = 0xFC;
        self.wtc = 0xFFFF;
        self.flag = 0;
        self.idb = (u32::from(self.config.idb) << 12) | 0xE00;
        self.pc = None;
        self.write_prc(self.config.prc);
    }

    fn stop(&mut self) {
        self.lifecycle.stop(INFO.shortname);
    }
}

impl Stateful for SfrBlock {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        visitor.item("iram", &mut self.ram.bytes);
        visitor.item("idb", &mut self.idb);
        visitor.item("prc", &mut self.prc);
        visitor.item("intm", &mut self.intm);
        visitor.item("ems", &mut self.ems);
        visitor.item("rfm", &mut self.rfm);
        visitor.item("wtc", &mut self.wtc);
        visitor.item("flag", &mut self.flag);
        visitor.item("now", &mut self.now);
        self.irq.visit_state(visitor);
        self.timers.visit_state(visitor);
        self.ports.visit_state(visitor);
    }
}

/// What a V25 core sees as its bus.
pub struct OverlayBus<'a> {
    sfr: &'a mut SfrBlock,
    external: &'a mut dyn Bus,
}

impl<'a> OverlayBus<'a> {
    pub fn new(sfr: &'a mut SfrBlock, external: &'a mut dyn Bus) -> Self {
        Self { sfr, external }
    }
}

impl Bus for OverlayBus<'_> {
    fn read_byte(&mut self, address: u32) -> u8 {
        self.sfr.read_byte(self.external, address)
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        self.sfr.write_byte(self.external, address, value);
    }

    fn read_word(&mut self, address: u32) -> u16 {
        self.sfr.read_word(self.external, address)
    }

    fn write_word(&mut self, address: u32, value: u16) {
        self.sfr.write_word(self.external, address, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, RecordingSink};
    use crate::state::SaveState;
    use crate::test_utils::{Access, RecordingBus};
    use interrupt_control::InterruptSource;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    const SFR: u32 = 0xF_FF00;

    fn block_with(sink: RecordingSink) -> SfrBlock {
        let mut block = SfrBlock::new(V25Config::default(), Box::new(sink));
        block.start();
        block.reset();
        block
    }

    fn block() -> SfrBlock {
        block_with(RecordingSink::new())
    }

    #[test]
    fn check_outside_window_is_forwarded_unchanged() {
        let mut block = block();
        let mut rng = rand::thread_rng();

        for _ in 0..1_000 {
            let address = rng.gen_range(0..=ADDRESS_MASK);
            if address & WINDOW_MASK == block.window_base() || address >= WORD_ALIAS {
                continue;
            }
            let value = rng.r#gen::<u16>();
            let mut external = RecordingBus::default();
            let mut bus = OverlayBus::new(&mut block, &mut external);

            bus.read_byte(address);
            bus.write_byte(address, value.to_le_bytes()[0]);
            bus.read_word(address);
            bus.write_word(address, value);

            assert_eq!(
                external.accesses,
                vec![
                    Access::ReadByte(address),
                    Access::WriteByte(address, value.to_le_bytes()[0]),
                    Access::ReadWord(address),
                    Access::WriteWord(address, value),
                ]
            );
        }
    }

    #[test]
    fn check_internal_ram() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        bus.write_word(0xF_FE10, 0xBEEF);
        assert_eq!(bus.read_byte(0xF_FE11), 0xBE);
        assert_eq!(bus.read_word(0xF_FE10), 0xBEEF);
        assert!(external.accesses.is_empty());
        assert_eq!(block.internal_ram().read_word(0x10), 0xBEEF);

        // RAMEN off: the lower half of the window is external again.
        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(SFR + sfr::PRC, 0x0E);
        bus.write_byte(0xF_FE10, 0x12);
        assert_eq!(external.accesses, vec![Access::WriteByte(0xF_FE10, 0x12)]);
    }

    #[test]
    fn check_external_interrupt_control() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        bus.write_byte(SFR + sfr::EXIC0, 0x80);
        assert!(block.interrupts().is_pending(InterruptSource::INTP0));

        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(SFR + sfr::EXIC0, 0x00);
        assert!(!block.interrupts().is_pending(InterruptSource::INTP0));

        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(SFR + sfr::EXIC0, 0x05);
        assert_eq!(bus.read_byte(SFR + sfr::EXIC0), 0x05);
        assert_eq!(
            block
                .interrupts()
                .priority(interrupt_control::Group::External),
            5
        );
    }

    #[test]
    fn check_unhandled_register() {
        let sink = RecordingSink::new();
        let mut block = block_with(sink.clone());
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        assert_eq!(bus.read_byte(SFR + 0x3C), 0);
        bus.write_byte(SFR + 0x3C, 0x80);
        assert_eq!(bus.read_byte(SFR + sfr::ISPR), 0);
        bus.write_byte(SFR + sfr::ISPR, 0xFF);
        assert_eq!(bus.read_byte(SFR + sfr::ISPR), 0);

        assert_eq!(sink.count(DiagnosticKind::UnhandledRegisterAccess), 3);
        assert!(external.accesses.is_empty());
    }

    #[test]
    fn check_macro_service_is_reported() {
        let sink = RecordingSink::new();
        let mut block = block_with(sink.clone());
        let mut external = RecordingBus::default();
        OverlayBus::new(&mut block, &mut external).write_byte(SFR + sfr::TMIC0, 0x27);
        assert_eq!(sink.count(DiagnosticKind::Unimplemented), 1);
    }

    #[test]
    fn check_idb_relocation() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        assert_eq!(bus.read_byte(0xF_FFFF), 0xFF);
        bus.write_byte(0xF_FFFF, 0x7F);
        assert_eq!(bus.read_byte(0x7_FFFF), 0x7F);
        // Still reachable through the alias.
        assert_eq!(bus.read_byte(0xF_FFFF), 0x7F);
        assert!(external.accesses.is_empty());

        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(0xF_FE10, 0x55);
        assert_eq!(external.accesses, vec![Access::WriteByte(0xF_FE10, 0x55)]);
        assert_eq!(block.window_base(), 0x7_FE00);
    }

    #[test]
    fn check_odd_word_splits() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        bus.write_word(SFR + sfr::PM0, 0x0FF0);
        assert_eq!(bus.read_byte(SFR + sfr::PM0), 0xF0);
        assert_eq!(bus.read_byte(SFR + sfr::PMC0), 0x0F);

        // Straddling RAM and the SFRs.
        bus.write_word(0xF_FEFF, 0x1234);
        assert_eq!(block.internal_ram().read_byte(0xFF), 0x34);
        assert_eq!(block.ports.latch[0], 0x12);
        assert!(external.accesses.is_empty());

        // Straddling the end of a relocated window.
        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(0xF_FFFF, 0x7F);
        bus.write_word(0x7_FFFF, 0x127F);
        assert_eq!(external.accesses, vec![Access::WriteByte(0x8_0000, 0x12)]);
        assert_eq!(block.window_base(), 0x7_FE00);
    }

    #[test]
    fn check_odd_word_entering_window() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        // Low byte below the window, high byte on the first RAM byte.
        bus.write_word(0xF_FDFF, 0xAB12);
        assert_eq!(bus.read_byte(0xF_FE00), 0xAB);
        assert_eq!(bus.read_word(0xF_FDFF) >> 8, 0xAB);
        assert_eq!(block.internal_ram().read_byte(0), 0xAB);
        assert_eq!(
            external.accesses,
            vec![
                Access::WriteByte(0xF_FDFF, 0x12),
                Access::ReadByte(0xF_FDFF),
            ]
        );

        // Nowhere near the window: one external word.
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_word(0x1_0001, 0x3456);
        assert_eq!(external.accesses, vec![Access::WriteWord(0x1_0001, 0x3456)]);

        // Low byte on the IDB alias after relocation.
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(0xF_FFFF, 0x7F);
        bus.write_word(0xF_FFFF, 0x127F);
        assert_eq!(external.accesses, vec![Access::WriteByte(0x10_0000, 0x12)]);
        assert_eq!(block.window_base(), 0x7_FE00);
    }

    #[test]
    fn check_word_timer_registers() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        bus.write_word(SFR + sfr::MD1, 300);
        assert_eq!(bus.read_byte(SFR + sfr::MD1 + 1), 1);
        bus.write_byte(SFR + sfr::TMC1, 0x80);
        // PCK = 2, scale 6: one count every 12 cycles.
        block.advance_to(12 * 100);
        let mut bus = OverlayBus::new(&mut block, &mut external);
        assert_eq!(bus.read_word(SFR + sfr::TM1), 200);
    }

    #[test]
    fn check_timer_sets_request() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        bus.write_byte(SFR + sfr::TMIC0, 0x01);
        bus.write_word(SFR + sfr::TM0, 10);
        bus.write_byte(SFR + sfr::TMC0, 0x81);

        assert_eq!(block.advance_to(239), 0);
        assert_eq!(block.pending_interrupt(true), None);
        assert_eq!(block.advance_to(240), 1);

        let request = block.pending_interrupt(true).unwrap();
        assert_eq!(request.source, InterruptSource::INTTU0);
        assert_eq!(request.vector, Some(28));
        assert_eq!(request.level, Some(1));
    }

    #[test]
    fn check_time_base_runs_from_reset() {
        let mut block = block();
        // PRC 0x4E: PCK = 2, time base 2^20.
        assert_eq!(block.next_event(), Some(2 << 20));

        let mut external = RecordingBus::default();
        OverlayBus::new(&mut block, &mut external).write_byte(SFR + sfr::PRC, 0x40);
        assert_eq!(block.next_event(), Some(8 << 10));
        assert_eq!(block.advance_to(8 << 10), 1);
        assert!(block.interrupts().is_pending(InterruptSource::INTTB));
    }

    #[test]
    fn check_bank_switching_interrupt() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        // Vector PC of bank 3.
        bus.write_word(0xF_FE00 + 3 * 32 + 2, 0x0400);
        bus.write_byte(SFR + sfr::EXIC0, 0x13);
        block.assert_line(INTP0_LINE);

        let request = block.pending_interrupt(true).unwrap();
        assert_eq!(request.bank, Some(3));
        block.acknowledge(&request);
        assert_eq!(block.enter_bank(3, 0xF202, 0x1234), 0x0400);
        assert_eq!(block.internal_ram().leave_bank(3), (0xF202, 0x1234));

        let mut bus = OverlayBus::new(&mut block, &mut external);
        assert_eq!(bus.read_byte(SFR + sfr::ISPR), 0x08);
        assert_eq!(bus.read_byte(SFR + sfr::IRQS), 24);
        block.finish_interrupt();
        assert_eq!(block.interrupts().ispr, 0);
    }

    #[test]
    fn check_ports() {
        let mut block = block();
        block.set_port_input(1, 0xA5);
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);

        assert_eq!(bus.read_byte(SFR + sfr::P1), 0xA5);
        bus.write_byte(SFR + sfr::PM1, 0x0F);
        bus.write_byte(SFR + sfr::P1, 0x3C);
        assert_eq!(bus.read_byte(SFR + sfr::P1), 0x35);
        assert_eq!(block.port_output(1), 0x35);
    }

    #[test]
    fn check_reset_is_idempotent() {
        let mut block = block();
        let mut external = RecordingBus::default();
        let mut bus = OverlayBus::new(&mut block, &mut external);
        bus.write_byte(SFR + sfr::TMIC1, 0x80);
        bus.write_byte(SFR + sfr::IDB, 0x12);

        block.reset();
        let mut first = SaveState::new();
        first.capture("v25", &mut block);
        block.reset();
        let mut second = SaveState::new();
        second.capture("v25", &mut block);

        assert_eq!(first, second);
        assert_eq!(block.window_base(), 0xF_FE00);
        assert!(!block.interrupts().is_pending(InterruptSource::INTTU1));
    }
}
