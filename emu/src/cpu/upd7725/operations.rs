use crate::bitwise::Bits;
use crate::diagnostics::Diagnostic;

use super::flags::{AluFlags, sr};
use super::{INFO, Upd7725};

/// Flag tested by the conditional jumps, from bits 3-5 of BRCH.
const fn flag_of(flags: AluFlags, index: u16) -> Option<bool> {
    match index {
        0 => Some(flags.c),
        1 => Some(flags.z),
        2 => Some(flags.ov0),
        3 => Some(flags.ov1),
        4 => Some(flags.s0),
        5 => Some(flags.s1),
        _ => None,
    }
}

/// Result of an ALU operation on Q with P. `carry` is the carry in.
/// Returns the result with the flags of the destination updated.
pub(crate) fn alu(op: u32, p: u16, q: u16, carry: bool, flags: &mut AluFlags) -> u16 {
    let c = u16::from(carry);
    let (p, r) = match op {
        1 => (p, q | p),
        2 => (p, q & p),
        3 => (p, q ^ p),
        4 => (p, q.wrapping_sub(p)),
        5 => (p, q.wrapping_add(p)),
        6 => (p, q.wrapping_sub(p).wrapping_sub(c)),
        7 => (p, q.wrapping_add(p).wrapping_add(c)),
        8 => (1, q.wrapping_sub(1)),
        9 => (1, q.wrapping_add(1)),
        10 => (p, !q),
        11 => (p, (q >> 1) | (q & 0x8000)),
        12 => (p, (q << 1) | c),
        13 => (p, (q << 2) | 3),
        14 => (p, (q << 4) | 0xF),
        15 => (p, q.rotate_left(8)),
        _ => return q,
    };

    flags.set_result(r);
    match op {
        // Odd codes add, even ones subtract.
        4..=9 if op & 1 == 1 => {
            flags.c = r < q;
            flags.set_overflow(((q ^ r) & (p ^ r)).get_bit(15), r);
        }
        4..=9 => {
            flags.c = r > q;
            flags.set_overflow(((q ^ r) & (q ^ p)).get_bit(15), r);
        }
        11 => flags.clear_overflow(q.get_bit(0)),
        12 => flags.clear_overflow(q.get_bit(15)),
        _ => flags.clear_overflow(false),
    }
    r
}

impl Upd7725 {
    fn read_source(&mut self, src: u16) -> u16 {
        match src {
            0 => self.trb,
            1 => self.a,
            2 => self.b,
            3 => self.tr,
            4 => self.dp,
            5 => self.rp,
            6 => self.data_rom[usize::from(self.rp & self.rp_mask())],
            7 => {
                if self.flag_a.s1 {
                    0x7FFF
                } else {
                    0x8000
                }
            }
            8 => {
                self.sr.set_bit(sr::RQM, true);
                self.dr
            }
            9 => self.dr,
            10 => self.sr,
            11 => self.si,
            12 => self.si.reverse_bits(),
            13 => self.k,
            14 => self.l,
            _ => self.ram[usize::from(self.dp & self.dp_mask())],
        }
    }

    fn write_destination(&mut self, dst: u16, id: u16) {
        match dst {
            1 => self.a = id,
            2 => self.b = id,
            3 => self.tr = id,
            4 => self.dp = id & self.dp_mask(),
            5 => self.rp = id & self.rp_mask(),
            6 => {
                self.dr = id;
                self.sr.set_bit(sr::RQM, true);
            }
            7 => self.sr = (self.sr & sr::READ_ONLY) | (id & !sr::READ_ONLY),
            8 => self.so = id.reverse_bits(),
            9 => self.so = id,
            10 => self.k = id,
            11 => {
                self.k = id;
                self.l = self.data_rom[usize::from(self.rp & self.rp_mask())];
            }
            12 => {
                self.l = id;
                self.k = self.ram[usize::from((self.dp | 0x40) & self.dp_mask())];
            }
            13 => self.l = id,
            14 => self.trb = id,
            15 => {
                let index = usize::from(self.dp & self.dp_mask());
                self.ram[index] = id;
            }
            _ => {}
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn exec_op(&mut self, opcode: u32) {
        let pselect = opcode.get_bits(20..=21);
        let op = opcode.get_bits(16..=19);
        let acc_b = opcode.get_bit(15);
        let dpl = opcode.get_bits(13..=14);
        let dphm = opcode.get_bits(9..=12) as u16;
        let rpdcr = opcode.get_bit(8);
        let src = opcode.get_bits(4..=7) as u16;
        let dst = opcode.get_bits(0..=3) as u16;

        let idb = self.read_source(src);

        if op != 0 {
            let p = match pselect {
                0 => self.ram[usize::from(self.dp & self.dp_mask())],
                1 => idb,
                2 => self.m,
                _ => self.n,
            };
            if acc_b {
                let carry = self.flag_a.c;
                self.b = alu(op, p, self.b, carry, &mut self.flag_b);
            } else {
                let carry = self.flag_b.c;
                self.a = alu(op, p, self.a, carry, &mut self.flag_a);
            }
        }

        self.write_destination(dst, idb);

        if dst != 4 {
            let low = self.dp & 0xF;
            let low = match dpl {
                1 => (low + 1) & 0xF,
                2 => low.wrapping_sub(1) & 0xF,
                3 => 0,
                _ => low,
            };
            self.dp = (self.dp & !0xF) | low;
        }
        self.dp = (self.dp ^ (dphm << 4)) & self.dp_mask();

        if rpdcr && dst != 5 {
            self.rp = self.rp.wrapping_sub(1) & self.rp_mask();
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn exec_ld(&mut self, opcode: u32) {
        let id = opcode.get_bits(6..=21) as u16;
        let dst = opcode.get_bits(0..=3) as u16;
        self.write_destination(dst, id);
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn exec_jp(&mut self, opcode: u32) {
        let brch = opcode.get_bits(13..=21) as u16;
        let na = opcode.get_bits(2..=12) as u16;
        let bank = opcode.get_bits(0..=1) as u16;
        let target = (self.pc & 0x2000) | (bank << 11) | na;

        let taken = match brch {
            0x000 => {
                self.pc = self.so & self.pc_mask();
                return;
            }
            0x100 | 0x101 => {
                self.pc = ((target & !0x2000) | ((brch & 1) << 13)) & self.pc_mask();
                return;
            }
            0x140 | 0x141 => {
                self.push(self.pc);
                self.pc = ((target & !0x2000) | ((brch & 1) << 13)) & self.pc_mask();
                return;
            }
            0x080..=0x0AF if brch & 1 == 0 => {
                let flags = if brch.get_bit(2) {
                    self.flag_b
                } else {
                    self.flag_a
                };
                flag_of(flags, (brch >> 3) & 7).map(|flag| flag == brch.get_bit(1))
            }
            0x0B0 => Some(self.dp & 0xF == 0),
            0x0B1 => Some(self.dp & 0xF != 0),
            0x0B2 => Some(self.dp & 0xF == 0xF),
            0x0B3 => Some(self.dp & 0xF != 0xF),
            // No serial peripheral: SI/SO acknowledges are never raised.
            0x0B4 | 0x0B8 => Some(true),
            0x0B6 | 0x0BA => Some(false),
            0x0BC => Some(!self.sr.get_bit(sr::RQM)),
            0x0BE => Some(self.sr.get_bit(sr::RQM)),
            _ => None,
        };

        match taken {
            Some(true) => {
                self.pc = target & self.pc_mask();
                // Spinning on RQM: only the host can end the loop.
                if matches!(brch, 0x0BC | 0x0BE) && self.pc == self.ppc && self.icount > 0 {
                    self.icount = 0;
                }
            }
            Some(false) => {}
            None => self.report(Diagnostic::IllegalOpcode {
                device: INFO.shortname,
                pc: u32::from(self.ppc),
                opcode,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::asm::*;
    use super::super::tests::{dsp, load};
    use super::*;
    use crate::device::Execute;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    #[test]
    fn check_add_and_subtract_flags() {
        let mut flags = AluFlags::default();
        assert_eq!(alu(ADD, 0x0001, 0x7FFF, false, &mut flags), 0x8000);
        assert!(flags.ov0 && flags.ov1 && flags.s0);
        assert!(!flags.c);

        assert_eq!(alu(ADD, 0x0001, 0xFFFF, false, &mut flags), 0);
        assert!(flags.c && flags.z);
        assert!(!flags.ov0);

        assert_eq!(alu(SUB, 0x0001, 0x0000, false, &mut flags), 0xFFFF);
        assert!(flags.c && flags.s0);
    }

    #[test]
    fn check_logic_and_shifts_clear_overflow() {
        let mut flags = AluFlags {
            ov0: true,
            ov1: true,
            c: true,
            ..AluFlags::default()
        };
        assert_eq!(alu(OR, 0x00F0, 0x0F00, false, &mut flags), 0x0FF0);
        assert_eq!(flags, AluFlags::default());

        assert_eq!(alu(SHL1, 0, 0x8001, true, &mut flags), 0x0003);
        assert!(flags.c);
        assert_eq!(alu(11, 0, 0x8001, false, &mut flags), 0xC000);
        assert!(flags.c && flags.s0);
        assert_eq!(alu(XCHG, 0, 0x1234, false, &mut flags), 0x3412);
        assert_eq!(alu(10, 0, 0xFFFF, false, &mut flags), 0);
        assert!(flags.z);
    }

    #[test]
    fn check_add_with_carry_chain() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let x: u32 = rng.r#gen();
            let y: u32 = rng.r#gen();
            let (mut low, mut high) = (AluFlags::default(), AluFlags::default());
            let lo = alu(ADD, y as u16, x as u16, false, &mut low);
            let hi = alu(7, (y >> 16) as u16, (x >> 16) as u16, low.c, &mut high);
            assert_eq!(u32::from(hi) << 16 | u32::from(lo), x.wrapping_add(y));
        }
    }

    #[test]
    fn check_flag_branches() {
        let mut dsp = dsp();
        let mut memory = load(&[
            op(DEC, false, RAM, TRB, NON),
            jp(JZA, 4),
            jp(JNZA, 5),
            ld(1, DST_B),
            ld(2, DST_B),
            ld(3, DST_TR),
        ]);
        dsp.execute_run(&mut memory, 4);
        // 0 - 1 is not zero: JZA falls through, JNZA is taken.
        assert_eq!(dsp.a, 0xFFFF);
        assert_eq!(dsp.b, 0);
        assert_eq!(dsp.tr, 3);
    }

    #[test]
    fn check_serial_acknowledges_stay_low() {
        let mut dsp = dsp();
        let mut memory = load(&[
            jp(0x0B4, 3), // jnsiak
            ld(1, DST_A),
            ld(2, DST_A),
            jp(0x0B6, 1), // jsiak
            jp(0x0B8, 6), // jnsoak
            ld(3, DST_A),
            jp(0x0BA, 1), // jsoak
            ld(7, DST_B),
        ]);
        dsp.execute_run(&mut memory, 5);
        assert_eq!(dsp.a, 0);
        assert_eq!(dsp.b, 7);
        assert_eq!(dsp.pc(), 8);
    }

    #[test]
    fn check_dp_modifiers() {
        let mut dsp = dsp();
        let mut memory = load(&[
            ld(0x1F, DST_DP),
            // low nibble wraps inside its own four bits
            dp(op(NOP, false, RAM, TRB, NON), 1, 0),
            jp(JDPL0, 4),
            ld(0xDEAD, DST_A),
            dp(op(NOP, false, RAM, K, DST_MEM), 2, 0b0011),
        ]);
        dsp.execute_run(&mut memory, 4);
        assert_eq!(dsp.a, 0);
        assert_eq!(dsp.ram[0x10], 0);
        // decrement to F, then flip bits 4 and 5 of DP
        assert_eq!(dsp.dp, 0x2F);
    }

    #[test]
    fn check_ram_and_klm() {
        let mut dsp = dsp();
        let mut memory = load(&[
            ld(0x45, DST_DP),
            ld(0x1234, DST_MEM),
            ld(0x05, DST_DP),
            ld(0x2000, 12),
            op(NOP, false, RAM, MEM, DST_A),
        ]);
        dsp.execute_run(&mut memory, 5);
        assert_eq!(dsp.k, 0x1234);
        assert_eq!(dsp.l, 0x2000);
        assert_eq!(dsp.a, 0);
    }

    #[test]
    fn check_status_register_moves() {
        let mut dsp = dsp();
        let mut memory = load(&[ld(0xFFFF, DST_SR), op(NOP, false, RAM, SGN, DST_B)]);
        dsp.execute_run(&mut memory, 2);
        assert_eq!(dsp.sr, !sr::READ_ONLY);
        assert_eq!(dsp.output_pins(), (true, true));
        assert_eq!(dsp.b, 0x8000);
    }

    #[test]
    fn check_dr_source_requests_the_host() {
        let mut dsp = dsp();
        dsp.data_write(0xCD);
        dsp.data_write(0xAB);
        let mut memory = load(&[op(NOP, false, RAM, DR, DST_A), jp(JNRQM, 0)]);
        dsp.execute_run(&mut memory, 2);
        assert_eq!(dsp.a, 0xABCD);
        assert_eq!(dsp.status_read() & 0x80, 0x80);
        // RQM set: JNRQM falls through
        assert_eq!(dsp.pc(), 2);
    }

    #[test]
    fn check_klr_and_shift_with_idb() {
        let mut dsp = dsp();
        let mut memory = load(&[
            ld(0x0040, DST_KLR),
            ld(0x0003, DST_A),
            op(SHL1, false, IDB, A, DST_TR),
            ld(0x0100, DST_SR),
        ]);
        dsp.execute_run(&mut memory, 4);
        assert_eq!(dsp.k, 0x0040);
        assert_eq!(dsp.l, 0);
        // the move sees A before the shift
        assert_eq!(dsp.tr, 0x0003);
        assert_eq!(dsp.a, 0x0006);
        assert_eq!(dsp.status_read(), 0x01);
    }
}
