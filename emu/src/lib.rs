#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::missing_panics_doc)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::unreadable_literal)]
pub mod bus;

pub mod cpu;

#[allow(clippy::module_name_repetitions)]
pub mod device;

#[allow(clippy::module_name_repetitions)]
pub mod diagnostics;

#[allow(clippy::cast_possible_truncation)]
pub mod hardware;

#[allow(clippy::missing_panics_doc)]
pub mod scheduler;

#[allow(clippy::missing_panics_doc)]
pub mod state;

#[cfg(test)]
mod test_utils;
