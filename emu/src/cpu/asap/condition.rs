//! # ASAP Branch Conditions
//!
//! Conditional branches keep their condition in the destination field
//! (bits 26-22). Only the values 0-15 exist; 16-31 are reserved encodings.
//!
//! ```text
//! ┌──────┬──────┬──────────────────────┬──────────────────┐
//! │ Code │ Name │ Meaning              │ Flags tested     │
//! ├──────┼──────┼──────────────────────┼──────────────────┤
//! │  0   │ BSP  │ strictly positive    │ N=0 AND Z=0      │
//! │  1   │ BMZ  │ minus or zero        │ N=1 OR Z=1       │
//! │  2   │ BGT  │ > (signed)           │ Z=0 AND N=V      │
//! │  3   │ BLE  │ ≤ (signed)           │ Z=1 OR N≠V       │
//! │  4   │ BGE  │ ≥ (signed)           │ N=V              │
//! │  5   │ BLT  │ < (signed)           │ N≠V              │
//! │  6   │ BHI  │ > (unsigned)         │ C=1 AND Z=0      │
//! │  7   │ BLS  │ ≤ (unsigned)         │ C=0 OR Z=1       │
//! │  8   │ BCC  │ carry clear          │ C=0              │
//! │  9   │ BCS  │ carry set            │ C=1              │
//! │ 10   │ BPL  │ plus                 │ N=0              │
//! │ 11   │ BMI  │ minus                │ N=1              │
//! │ 12   │ BNE  │ not equal            │ Z=0              │
//! │ 13   │ BEQ  │ equal                │ Z=1              │
//! │ 14   │ BVC  │ overflow clear       │ V=0              │
//! │ 15   │ BVS  │ overflow set         │ V=1              │
//! └──────┴──────┴──────────────────────┴──────────────────┘
//! ```

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    Bsp = 0x0,
    Bmz = 0x1,
    Bgt = 0x2,
    Ble = 0x3,
    Bge = 0x4,
    Blt = 0x5,
    Bhi = 0x6,
    Bls = 0x7,
    Bcc = 0x8,
    Bcs = 0x9,
    Bpl = 0xA,
    Bmi = 0xB,
    Bne = 0xC,
    Beq = 0xD,
    Bvc = 0xE,
    Bvs = 0xF,
}

impl TryFrom<u32> for Condition {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use Condition::{Bcc, Bcs, Beq, Bge, Bgt, Bhi, Ble, Bls, Blt, Bmi, Bmz, Bne, Bpl, Bsp, Bvc, Bvs};
        Ok(match value {
            0x0 => Bsp,
            0x1 => Bmz,
            0x2 => Bgt,
            0x3 => Ble,
            0x4 => Bge,
            0x5 => Blt,
            0x6 => Bhi,
            0x7 => Bls,
            0x8 => Bcc,
            0x9 => Bcs,
            0xA => Bpl,
            0xB => Bmi,
            0xC => Bne,
            0xD => Beq,
            0xE => Bvc,
            0xF => Bvs,
            reserved => return Err(reserved),
        })
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bsp => "bsp",
            Self::Bmz => "bmz",
            Self::Bgt => "bgt",
            Self::Ble => "ble",
            Self::Bge => "bge",
            Self::Blt => "blt",
            Self::Bhi => "bhi",
            Self::Bls => "bls",
            Self::Bcc => "bcc",
            Self::Bcs => "bcs",
            Self::Bpl => "bpl",
            Self::Bmi => "bmi",
            Self::Bne => "bne",
            Self::Beq => "beq",
            Self::Bvc => "bvc",
            Self::Bvs => "bvs",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_reserved_conditions() {
        for value in 0..16 {
            assert_eq!(Condition::try_from(value).map(|c| c as u32), Ok(value));
        }
        for value in 16..32 {
            assert_eq!(Condition::try_from(value), Err(value));
        }
    }
}
