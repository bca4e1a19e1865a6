//! # Internal RAM and register banks
//!
//! The 256 bytes of internal RAM double as eight register banks of sixteen
//! words. Bank `n` starts at byte `n * 32`; the core keeps its general
//! registers in the upper words, and the first words hold what a
//! bank-switching interrupt needs:
//!
//! ```text
//! word 0  reserved
//! word 1  vector PC, loaded as the new PC when the bank is entered
//! word 2  PSW saved on entry
//! word 3  PC saved on entry
//! ```

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

pub const RAM_SIZE: usize = 256;
pub const BANK_COUNT: u8 = 8;
const BANK_SIZE: usize = RAM_SIZE / BANK_COUNT as usize;

const VECTOR_PC: usize = 1;
const PSW_SAVE: usize = 2;
const PC_SAVE: usize = 3;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalRam {
    #[serde_as(as = "[_; 256]")]
    pub(crate) bytes: [u8; RAM_SIZE],
}

impl Default for InternalRam {
    fn default() -> Self {
        Self {
            bytes: [0; RAM_SIZE],
        }
    }
}

impl InternalRam {
    #[must_use]
    pub const fn read_byte(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub const fn write_byte(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    /// `offset` is even.
    #[must_use]
    pub const fn read_word(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    pub const fn write_word(&mut self, offset: usize, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.bytes[offset] = low;
        self.bytes[offset + 1] = high;
    }

    const fn slot(bank: u8, word: usize) -> usize {
        assert!(bank < BANK_COUNT, "register bank out of range");
        bank as usize * BANK_SIZE + word * 2
    }

    #[must_use]
    pub const fn bank_word(&self, bank: u8, word: usize) -> u16 {
        self.read_word(Self::slot(bank, word))
    }

    pub const fn set_bank_word(&mut self, bank: u8, word: usize, value: u16) {
        self.write_word(Self::slot(bank, word), value);
    }

    /// Register bank switch on interrupt: saves `psw` and `pc` in `bank`
    /// and returns the PC to continue at.
    pub const fn enter_bank(&mut self, bank: u8, psw: u16, pc: u16) -> u16 {
        self.set_bank_word(bank, PSW_SAVE, psw);
        self.set_bank_word(bank, PC_SAVE, pc);
        self.bank_word(bank, VECTOR_PC)
    }

    /// RETRBI: the PSW and PC saved by [`enter_bank`](Self::enter_bank).
    #[must_use]
    pub const fn leave_bank(&self, bank: u8) -> (u16, u16) {
        (self.bank_word(bank, PSW_SAVE), self.bank_word(bank, PC_SAVE))
    }
}
