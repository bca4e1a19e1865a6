//! # Memory/Bus Interface
//!
//! Every core talks to the outside world through [`Bus`]. The owning system
//! hands a `&mut dyn Bus` to [`execute_run`](crate::device::Execute::execute_run)
//! for the duration of one slice; cores never keep it.
//!
//! ```text
//!   core ── read_opcode ──────────────▶ direct fetch path
//!        ── read_byte / read_word ... ─▶ full bus decode
//! ```
//!
//! Multi-byte accesses are little-endian compositions of byte accesses unless
//! an implementation overrides them. Each call is atomic from the caller's
//! point of view; nothing more is promised across devices.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

pub trait Bus {
    fn read_byte(&mut self, address: u32) -> u8;

    fn write_byte(&mut self, address: u32, value: u8);

    fn read_word(&mut self, address: u32) -> u16 {
        let mut value = 0_u16;
        value.set_byte(0, self.read_byte(address));
        value.set_byte(1, self.read_byte(address.wrapping_add(1)));
        value
    }

    fn write_word(&mut self, address: u32, value: u16) {
        self.write_byte(address, value.get_byte(0));
        self.write_byte(address.wrapping_add(1), value.get_byte(1));
    }

    fn read_long(&mut self, address: u32) -> u32 {
        let mut value = 0_u32;
        for i in 0..4 {
            value.set_byte(i, self.read_byte(address.wrapping_add(u32::from(i))));
        }
        value
    }

    fn write_long(&mut self, address: u32, value: u32) {
        for i in 0..4 {
            self.write_byte(address.wrapping_add(u32::from(i)), value.get_byte(i));
        }
    }

    /// Opcode fetch. Implementations backed by plain memory override this to
    /// skip their usual decode.
    fn read_opcode(&mut self, address: u32) -> u32 {
        self.read_long(address)
    }
}

/// Plain RAM mirrored across the whole address space.
#[derive(Serialize, Deserialize, Clone)]
pub struct FlatMemory {
    data: Vec<u8>,
    mask: u32,
}

impl FlatMemory {
    /// `size` is rounded up to the next power of two so that every address
    /// mirrors into the backing store.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(4).next_power_of_two();
        assert!(
            u32::try_from(size - 1).is_ok(),
            "flat memory larger than the 32-bit address space"
        );

        #[allow(clippy::cast_possible_truncation)]
        let mask = (size - 1) as u32;
        Self {
            data: vec![0; size],
            mask,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copies `bytes` in starting at `address`, wrapping at the end of memory.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        for (offset, byte) in bytes.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let target = address.wrapping_add(offset as u32);
            self.write_byte(target, *byte);
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    const fn index(&self, address: u32) -> usize {
        (address & self.mask) as usize
    }
}

impl Bus for FlatMemory {
    fn read_byte(&mut self, address: u32) -> u8 {
        self.data[self.index(address)]
    }

    fn write_byte(&mut self, address: u32, value: u8) {
        let index = self.index(address);
        self.data[index] = value;
    }

    fn read_opcode(&mut self, address: u32) -> u32 {
        let start = self.index(address);
        match self.data.get(start..start + 4) {
            Some(&[a, b, c, d]) => u32::from_le_bytes([a, b, c, d]),
            // Straddles the end of memory, take the slow path.
            _ => self.read_long(address),
        }
    }
}
