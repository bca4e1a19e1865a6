use crate::bitwise::Bits;
use crate::bus::Bus;
use crate::diagnostics::Diagnostic;

use super::condition::Condition;
use super::{Asap, Exception, INFO};

/// Result, carry out and overflow of a shift by `count`. Counts of 32 and
/// up leave C and V clear.
pub(crate) struct Shifted {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(crate) fn arithmetic_shift_right(value: u32, count: u32) -> Shifted {
    let (result, carry) = match count {
        0 => (value, false),
        1..32 => (
            ((value as i32) >> count) as u32,
            value.get_bit((count - 1) as u8),
        ),
        _ => (((value as i32) >> 31) as u32, false),
    };
    Shifted {
        result,
        carry,
        overflow: false,
    }
}

pub(crate) fn logical_shift_right(value: u32, count: u32) -> Shifted {
    let (result, carry) = match count {
        0 => (value, false),
        1..32 => (value >> count, value.get_bit((count - 1) as u8)),
        _ => (0, false),
    };
    Shifted {
        result,
        carry,
        overflow: false,
    }
}

/// V is set when the shift lost significant bits.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub(crate) fn arithmetic_shift_left(value: u32, count: u32) -> Shifted {
    match count {
        0 => Shifted {
            result: value,
            carry: false,
            overflow: false,
        },
        1..32 => {
            let result = value << count;
            Shifted {
                result,
                carry: value.get_bit((32 - count) as u8),
                overflow: ((result as i32) >> count) as u32 != value,
            }
        }
        _ => Shifted {
            result: 0,
            carry: false,
            overflow: false,
        },
    }
}

impl Asap {
    fn src1(&self) -> u32 {
        self.registers
            .register_at(self.op.get_bits(16..=20) as usize)
    }

    fn src2(&self) -> u32 {
        let src2 = self.op.get_bits(0..=15);
        if src2 >= 0xFFE0 {
            self.registers.register_at((src2 & 31) as usize)
        } else {
            src2
        }
    }

    const fn dst(&self) -> usize {
        ((self.op >> 22) & 31) as usize
    }

    const fn dst_value(&self) -> u32 {
        self.registers.register_at(self.dst())
    }

    fn set_dst(&mut self, value: u32) {
        self.registers.set_register_at(self.dst(), value);
    }

    /// Relative to the branch itself, not to the delay slot.
    fn branch_target(&self) -> u32 {
        let words = self.op.get_bits(0..=21).sign_extended(22);
        self.ppc.wrapping_add(words << 2)
    }

    fn set_shifted<const C: bool>(&mut self, shifted: &Shifted) {
        if C {
            self.flags.set_zn(shifted.result);
            self.flags.carry = shifted.carry;
            self.flags.overflow = shifted.overflow;
        }
        self.set_dst(shifted.result);
    }

    pub(crate) fn illegal(&mut self, _bus: &mut dyn Bus) {
        self.report(Diagnostic::IllegalOpcode {
            device: INFO.shortname,
            pc: self.ppc,
            opcode: self.op,
        });
    }

    pub(crate) fn trap0(&mut self, _bus: &mut dyn Bus) {
        self.generate_exception(Exception::Trap0);
    }

    pub(crate) fn trapf(&mut self, _bus: &mut dyn Bus) {
        self.generate_exception(Exception::TrapF);
    }

    /// Return address skips the delay slot.
    pub(crate) fn bsr(&mut self, _bus: &mut dyn Bus) {
        self.set_dst(self.pc.wrapping_add(4));
        self.nextpc = Some(self.branch_target());
    }

    pub(crate) fn bcc<const COND: u32>(&mut self, _bus: &mut dyn Bus) {
        match Condition::try_from(COND) {
            Ok(cond) if self.flags.can_branch(cond) => {
                self.nextpc = Some(self.branch_target());
            }
            Ok(_) => {}
            Err(_) => unreachable!("reserved conditions go to the illegal handler"),
        }
    }

    pub(crate) fn lea<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b) = (self.src1(), self.src2() << 2);
        let result = a.wrapping_add(b);
        if C {
            self.flags.set_add(a, b, result);
        }
        self.set_dst(result);
    }

    pub(crate) fn leah<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b) = (self.src1(), self.src2() << 1);
        let result = a.wrapping_add(b);
        if C {
            self.flags.set_add(a, b, result);
        }
        self.set_dst(result);
    }

    pub(crate) fn subr<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b) = (self.src2(), self.src1());
        let result = a.wrapping_sub(b);
        if C {
            self.flags.set_sub(a, b, result);
        }
        self.set_dst(result);
    }

    fn logical<const C: bool>(&mut self, result: u32) {
        if C {
            self.flags.set_zn(result);
        }
        self.set_dst(result);
    }

    pub(crate) fn xor<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.logical::<C>(self.src1() ^ self.src2());
    }

    pub(crate) fn xorn<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.logical::<C>(self.src1() ^ !self.src2());
    }

    pub(crate) fn and<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.logical::<C>(self.src1() & self.src2());
    }

    pub(crate) fn andn<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.logical::<C>(self.src1() & !self.src2());
    }

    pub(crate) fn or<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.logical::<C>(self.src1() | self.src2());
    }

    pub(crate) fn orn<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.logical::<C>(self.src1() | !self.src2());
    }

    pub(crate) fn add<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b) = (self.src1(), self.src2());
        let result = a.wrapping_add(b);
        if C {
            self.flags.set_add(a, b, result);
        }
        self.set_dst(result);
    }

    pub(crate) fn sub<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b) = (self.src1(), self.src2());
        let result = a.wrapping_sub(b);
        if C {
            self.flags.set_sub(a, b, result);
        }
        self.set_dst(result);
    }

    pub(crate) fn addc<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b, carry) = (self.src1(), self.src2(), self.flags.carry);
        let result = a.wrapping_add(b).wrapping_add(u32::from(carry));
        if C {
            self.flags.set_add_carry(a, b, carry, result);
        }
        self.set_dst(result);
    }

    pub(crate) fn subc<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let (a, b, carry) = (self.src1(), self.src2(), self.flags.carry);
        let result = a.wrapping_sub(b).wrapping_sub(u32::from(!carry));
        if C {
            self.flags.set_sub_carry(a, b, carry, result);
        }
        self.set_dst(result);
    }

    // Loads into r0 still hit the bus, reads can have side effects.

    fn loaded<const C: bool>(&mut self, value: u32) {
        if C {
            self.flags.set_zn(value);
        }
        self.set_dst(value);
    }

    pub(crate) fn ld<const C: bool>(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2() << 2);
        let value = bus.read_long(address);
        self.loaded::<C>(value);
    }

    pub(crate) fn ldh<const C: bool>(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2() << 1);
        let value = u32::from(bus.read_word(address)).sign_extended(16);
        self.loaded::<C>(value);
    }

    pub(crate) fn lduh<const C: bool>(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2() << 1);
        let value = u32::from(bus.read_word(address));
        self.loaded::<C>(value);
    }

    pub(crate) fn ldb<const C: bool>(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2());
        let value = u32::from(bus.read_byte(address)).sign_extended(8);
        self.loaded::<C>(value);
    }

    pub(crate) fn ldub<const C: bool>(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2());
        let value = u32::from(bus.read_byte(address));
        self.loaded::<C>(value);
    }

    pub(crate) fn st(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2() << 2);
        bus.write_long(address, self.dst_value());
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn sth(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2() << 1);
        bus.write_word(address, self.dst_value() as u16);
    }

    pub(crate) fn stb(&mut self, bus: &mut dyn Bus) {
        let address = self.src1().wrapping_add(self.src2());
        bus.write_byte(address, self.dst_value().get_byte(0));
    }

    pub(crate) fn ashr<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let shifted = arithmetic_shift_right(self.src1(), self.src2());
        self.set_shifted::<C>(&shifted);
    }

    pub(crate) fn lshr<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let shifted = logical_shift_right(self.src1(), self.src2());
        self.set_shifted::<C>(&shifted);
    }

    pub(crate) fn ashl<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let shifted = arithmetic_shift_left(self.src1(), self.src2());
        self.set_shifted::<C>(&shifted);
    }

    /// Only the low five bits of the count matter; C only updates Z and N.
    pub(crate) fn rotl<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        let result = self.src1().rotate_left(self.src2() & 31);
        self.logical::<C>(result);
    }

    pub(crate) fn getps(&mut self, _bus: &mut dyn Bus) {
        self.set_dst(self.flags.ps());
    }

    /// A newly enabled interrupt is taken before the next instruction.
    pub(crate) fn putps(&mut self, _bus: &mut dyn Bus) {
        self.flags.set_ps(self.src2());
    }

    /// `jsr.c` also restores I from P, which makes it the return from an
    /// exception.
    pub(crate) fn jsr<const C: bool>(&mut self, _bus: &mut dyn Bus) {
        self.set_dst(self.pc.wrapping_add(4));
        self.nextpc = Some(self.src1().wrapping_add(self.src2() << 2));
        if C {
            self.flags.irq_enable = self.flags.prev_irq_enable;
        }
    }
}
