//! # ASAP Dispatch Table
//!
//! ```text
//!  31    27 26    22 21 20    16 15              0
//! ┌────────┬────────┬──┬────────┬────────────────┐
//! │ opcode │  dst   │C │  src1  │      src2      │
//! └────────┴────────┴──┴────────┴────────────────┘
//! ```
//!
//! The table is indexed by the top 11 bits, which is enough to pick a
//! handler specialised for the opcode, for a write to `r0` and for the C
//! (update flags) bit. `src2` values from `0xFFE0` up select register
//! `src2 & 31`; anything below is a zero-extended immediate.
//!
//! Branches reuse bits 21-0 as a signed word offset, and conditional
//! branches keep their condition in `dst`. Conditions 16-31 are reserved and
//! land on the illegal-opcode handler.

use std::sync::OnceLock;

use crate::bitwise::Bits;
use crate::bus::Bus;

use super::Asap;
use super::condition::Condition;

pub const TABLE_SIZE: usize = 1 << 11;

pub type Handler = fn(&mut Asap, &mut dyn Bus);

#[derive(Clone, Copy)]
pub struct Entry {
    pub handler: Handler,
    pub mnemonic: &'static str,
}

pub struct OpcodeTable {
    entries: [Entry; TABLE_SIZE],
}

/// Handlers per major opcode, without and with the C bit.
const HANDLERS: [(&str, [Handler; 2]); 32] = [
    ("trap0", [Asap::trap0, Asap::trap0]),
    ("bsr", [Asap::bsr, Asap::bsr]),
    ("b", [Asap::illegal, Asap::illegal]),
    ("lea", [Asap::lea::<false>, Asap::lea::<true>]),
    ("leah", [Asap::leah::<false>, Asap::leah::<true>]),
    ("subr", [Asap::subr::<false>, Asap::subr::<true>]),
    ("xor", [Asap::xor::<false>, Asap::xor::<true>]),
    ("xorn", [Asap::xorn::<false>, Asap::xorn::<true>]),
    ("add", [Asap::add::<false>, Asap::add::<true>]),
    ("sub", [Asap::sub::<false>, Asap::sub::<true>]),
    ("addc", [Asap::addc::<false>, Asap::addc::<true>]),
    ("subc", [Asap::subc::<false>, Asap::subc::<true>]),
    ("and", [Asap::and::<false>, Asap::and::<true>]),
    ("andn", [Asap::andn::<false>, Asap::andn::<true>]),
    ("or", [Asap::or::<false>, Asap::or::<true>]),
    ("orn", [Asap::orn::<false>, Asap::orn::<true>]),
    ("ld", [Asap::ld::<false>, Asap::ld::<true>]),
    ("ldh", [Asap::ldh::<false>, Asap::ldh::<true>]),
    ("lduh", [Asap::lduh::<false>, Asap::lduh::<true>]),
    ("sth", [Asap::sth, Asap::sth]),
    ("st", [Asap::st, Asap::st]),
    ("ldb", [Asap::ldb::<false>, Asap::ldb::<true>]),
    ("ldub", [Asap::ldub::<false>, Asap::ldub::<true>]),
    ("stb", [Asap::stb, Asap::stb]),
    ("ashr", [Asap::ashr::<false>, Asap::ashr::<true>]),
    ("lshr", [Asap::lshr::<false>, Asap::lshr::<true>]),
    ("ashl", [Asap::ashl::<false>, Asap::ashl::<true>]),
    ("rotl", [Asap::rotl::<false>, Asap::rotl::<true>]),
    ("getps", [Asap::getps, Asap::getps]),
    ("putps", [Asap::putps, Asap::putps]),
    ("jsr", [Asap::jsr::<false>, Asap::jsr::<true>]),
    ("trapf", [Asap::trapf, Asap::trapf]),
];

const BRANCHES: [Handler; 16] = [
    Asap::bcc::<0x0>,
    Asap::bcc::<0x1>,
    Asap::bcc::<0x2>,
    Asap::bcc::<0x3>,
    Asap::bcc::<0x4>,
    Asap::bcc::<0x5>,
    Asap::bcc::<0x6>,
    Asap::bcc::<0x7>,
    Asap::bcc::<0x8>,
    Asap::bcc::<0x9>,
    Asap::bcc::<0xA>,
    Asap::bcc::<0xB>,
    Asap::bcc::<0xC>,
    Asap::bcc::<0xD>,
    Asap::bcc::<0xE>,
    Asap::bcc::<0xF>,
];

const ILLEGAL: Entry = Entry {
    handler: Asap::illegal,
    mnemonic: "illegal",
};

const BRANCH_NAMES: [&str; 16] = [
    "bsp", "bmz", "bgt", "ble", "bge", "blt", "bhi", "bls", "bcc", "bcs", "bpl", "bmi", "bne",
    "beq", "bvc", "bvs",
];

impl OpcodeTable {
    fn build() -> Self {
        let mut entries = [ILLEGAL; TABLE_SIZE];

        for (index, entry) in entries.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let index = index as u32;
            let opcode = index.get_bits(6..=10) as usize;
            let dst = index.get_bits(1..=5);
            let update_flags = usize::from(index.get_bit(0));

            *entry = if opcode == 2 {
                match Condition::try_from(dst) {
                    Ok(cond) => Entry {
                        handler: BRANCHES[cond as usize],
                        mnemonic: BRANCH_NAMES[cond as usize],
                    },
                    Err(_) => ILLEGAL,
                }
            } else {
                let (mnemonic, handlers) = HANDLERS[opcode];
                Entry {
                    handler: handlers[update_flags],
                    mnemonic,
                }
            };
        }

        Self { entries }
    }

    /// The table every ASAP instance shares. It is built by the first
    /// device to start and never changes afterwards.
    pub fn shared() -> &'static Self {
        static TABLE: OnceLock<OpcodeTable> = OnceLock::new();
        TABLE.get_or_init(Self::build)
    }

    #[must_use]
    pub const fn index(op: u32) -> usize {
        (op >> 21) as usize
    }

    #[must_use]
    pub const fn lookup(&self, op: u32) -> &Entry {
        &self.entries[Self::index(op)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }
}
