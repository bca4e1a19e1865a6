//! # Accumulator flags and status register
//!
//! Each accumulator has its own flag set:
//!
//! ```text
//!   5    4    3   2    1     0
//! ┌────┬────┬───┬───┬─────┬─────┐
//! │ S1 │ S0 │ C │ Z │ OV1 │ OV0 │
//! └────┴────┴───┴───┴─────┴─────┘
//! ```
//!
//! - **OV0**: the last add/subtract overflowed
//! - **OV1**: odd number of overflows since the last clear
//! - **S0**: sign of the result
//! - **S1**: sign the result would have without the overflows
//!
//! The status register is shared with the host, which sees its upper byte.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::state::StateItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluFlags {
    pub ov0: bool,
    pub ov1: bool,
    pub z: bool,
    pub c: bool,
    pub s0: bool,
    pub s1: bool,
}

impl AluFlags {
    #[must_use]
    pub fn packed(self) -> u8 {
        let mut value = 0_u8;
        value.set_bit(0, self.ov0);
        value.set_bit(1, self.ov1);
        value.set_bit(2, self.z);
        value.set_bit(3, self.c);
        value.set_bit(4, self.s0);
        value.set_bit(5, self.s1);
        value
    }

    #[must_use]
    pub fn from_packed(value: u8) -> Self {
        Self {
            ov0: value.get_bit(0),
            ov1: value.get_bit(1),
            z: value.get_bit(2),
            c: value.get_bit(3),
            s0: value.get_bit(4),
            s1: value.get_bit(5),
        }
    }

    pub fn set_result(&mut self, result: u16) {
        self.s0 = result.get_bit(15);
        self.z = result == 0;
    }

    /// Logical operations and shifts.
    pub const fn clear_overflow(&mut self, carry: bool) {
        self.c = carry;
        self.ov0 = false;
        self.ov1 = false;
    }

    /// Records an overflow out of an add or subtract. S1 keeps the true
    /// sign across a chain of overflows.
    pub fn set_overflow(&mut self, overflow: bool, result: u16) {
        self.ov0 = overflow;
        if overflow {
            self.s1 = self.ov1 ^ !result.get_bit(15);
            self.ov1 = !self.ov1;
        }
    }
}

impl StateItem for AluFlags {
    fn size(&self) -> usize {
        1
    }

    fn save(&self, out: &mut Vec<u8>) {
        out.push(self.packed());
    }

    fn load(&mut self, bytes: &[u8]) {
        *self = Self::from_packed(bytes[0]);
    }
}

/// Status register bits.
pub mod sr {
    /// Request for master: the host may access DR.
    pub const RQM: u8 = 15;
    pub const USF1: u8 = 14;
    pub const USF0: u8 = 13;
    /// Which half of a 16-bit DR transfer comes next.
    pub const DRS: u8 = 12;
    pub const DMA: u8 = 11;
    /// DR transfers are 8 bits wide.
    pub const DRC: u8 = 10;
    pub const SOC: u8 = 9;
    pub const SIC: u8 = 8;
    pub const EI: u8 = 7;
    pub const P1: u8 = 1;
    pub const P0: u8 = 0;

    /// Bits a move to SR leaves alone: RQM, DRS and the unused ones.
    pub const READ_ONLY: u16 = 0x907C;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_packing() {
        for value in 0..64 {
            assert_eq!(AluFlags::from_packed(value).packed(), value);
        }
        let flags = AluFlags {
            c: true,
            s1: true,
            ..AluFlags::default()
        };
        assert_eq!(flags.packed(), 0b10_1000);
    }

    #[test]
    fn check_overflow_chain() {
        let mut flags = AluFlags::default();
        // 0x7FFF + 1: one overflow, the true sign is positive.
        flags.set_overflow(true, 0x8000);
        assert!(flags.ov0);
        assert!(flags.ov1);
        assert!(!flags.s1);

        // Overflowing back: even count, the result is right again.
        flags.set_overflow(true, 0x7FFF);
        assert!(!flags.ov1);

        flags.set_overflow(false, 0x1234);
        assert!(!flags.ov0);
        assert!(!flags.ov1);
    }
}
