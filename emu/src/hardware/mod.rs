//! Peripherals that sit next to a core: the V25's on-chip block, an
//! interrupt priority encoder and a 1-Wire serial number.

pub mod ds2401;
pub mod i8214;
pub mod v25;
