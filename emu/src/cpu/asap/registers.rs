//! # ASAP Register File
//!
//! 32 general-purpose registers. `r0` is hardwired to zero, so writes to it
//! are dropped and it can be used as a sink for results nobody wants.
//!
//! By convention the exception entry sequence uses the top two:
//!
//! - **R30**: address to resume at
//! - **R31**: address following it (or the delay-slot branch target)

use serde::{Deserialize, Serialize};

pub const REG_RESUME: usize = 30;
pub const REG_RESUME_NEXT: usize = 31;

#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Registers([u32; 32]);

impl Registers {
    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        assert!(reg < 32, "Invalid register index: {reg}");
        if reg != 0 {
            self.0[reg] = new_value;
        }
    }

    #[must_use]
    pub const fn register_at(&self, reg: usize) -> u32 {
        self.0[reg]
    }

    pub(crate) const fn raw_mut(&mut self) -> &mut [u32; 32] {
        &mut self.0
    }
}
