//! # ASAP Processor Status
//!
//! Flags are kept decomposed so arithmetic handlers can update them without
//! packing. Z and N share one word: the last result that set them. The
//! packed PS form only exists for `getps`/`putps` and the debugger.
//!
//! ```text
//!  5 4 3 2 1 0
//! ┌─┬─┬─┬─┬─┬─┐
//! │P│I│N│Z│V│C│
//! └─┴─┴─┴─┴─┴─┘
//! ```
//!
//! - **C**: carry out of an add, "no borrow" out of a subtract
//! - **I**: interrupts enabled
//! - **P**: value of I before the last exception

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

use super::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    /// Zero when Z is set; bit 31 is N.
    pub(crate) zn: u32,
    pub(crate) carry: bool,
    pub(crate) overflow: bool,
    pub(crate) irq_enable: bool,
    pub(crate) prev_irq_enable: bool,
}

impl Default for Flags {
    /// Power-on value, which reads back as PS = 0.
    fn default() -> Self {
        Self {
            zn: 1,
            carry: false,
            overflow: false,
            irq_enable: false,
            prev_irq_enable: false,
        }
    }
}

impl Flags {
    #[must_use]
    pub const fn zero(&self) -> bool {
        self.zn == 0
    }

    #[must_use]
    pub fn negative(&self) -> bool {
        self.zn.get_bit(31)
    }

    pub const fn set_zn(&mut self, result: u32) {
        self.zn = result;
    }

    pub const fn set_add(&mut self, a: u32, b: u32, result: u32) {
        self.zn = result;
        self.carry = result < a;
        self.overflow = ((a ^ result) & (b ^ result)) >> 31 != 0;
    }

    /// Add with carry in: `result = a + b + carry_in`.
    pub const fn set_add_carry(&mut self, a: u32, b: u32, carry_in: bool, result: u32) {
        self.zn = result;
        self.carry = if carry_in { result <= a } else { result < a };
        self.overflow = ((a ^ result) & (b ^ result)) >> 31 != 0;
    }

    /// `result = a - b`; C is set when no borrow happened.
    pub const fn set_sub(&mut self, a: u32, b: u32, result: u32) {
        self.zn = result;
        self.carry = a >= b;
        self.overflow = ((a ^ b) & (a ^ result)) >> 31 != 0;
    }

    /// `result = a - b - !carry_in`.
    pub const fn set_sub_carry(&mut self, a: u32, b: u32, carry_in: bool, result: u32) {
        self.zn = result;
        self.carry = if carry_in { a >= b } else { a > b };
        self.overflow = ((a ^ b) & (a ^ result)) >> 31 != 0;
    }

    pub fn can_branch(&self, cond: Condition) -> bool {
        use Condition::{Bcc, Bcs, Beq, Bge, Bgt, Bhi, Ble, Bls, Blt, Bmi, Bmz, Bne, Bpl, Bsp, Bvc, Bvs};
        let (z, n, c, v) = (self.zero(), self.negative(), self.carry, self.overflow);
        match cond {
            Bsp => !n && !z,
            Bmz => n || z,
            Bgt => !z && n == v,
            Ble => z || n != v,
            Bge => n == v,
            Blt => n != v,
            Bhi => c && !z,
            Bls => !c || z,
            Bcc => !c,
            Bcs => c,
            Bpl => !n,
            Bmi => n,
            Bne => !z,
            Beq => z,
            Bvc => !v,
            Bvs => v,
        }
    }

    #[must_use]
    pub fn ps(&self) -> u32 {
        let mut ps = 0_u32;
        ps.set_bit(0, self.carry);
        ps.set_bit(1, self.overflow);
        ps.set_bit(2, self.zero());
        ps.set_bit(3, self.negative());
        ps.set_bit(4, self.irq_enable);
        ps.set_bit(5, self.prev_irq_enable);
        ps
    }

    /// Z and N can't both hold in the decomposed form; Z wins.
    pub fn set_ps(&mut self, ps: u32) {
        self.carry = ps.get_bit(0);
        self.overflow = ps.get_bit(1);
        self.zn = if ps.get_bit(2) {
            0
        } else if ps.get_bit(3) {
            0x8000_0000
        } else {
            1
        };
        self.irq_enable = ps.get_bit(4);
        self.prev_irq_enable = ps.get_bit(5);
    }
}
