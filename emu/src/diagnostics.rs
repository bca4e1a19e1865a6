//! Structured "log and continue" events.
//!
//! Devices never unwind the scheduler. Illegal opcodes, unhandled SFR
//! accesses and bad regions become [`Diagnostic`] values delivered to the
//! [`DiagnosticSink`] each device receives at construction.

use std::fmt::{self, Display};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    IllegalOpcode,
    UnhandledRegisterAccess,
    InvalidRegionSize,
    Unimplemented,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    IllegalOpcode {
        device: &'static str,
        pc: u32,
        opcode: u32,
    },
    UnhandledRegisterRead {
        device: &'static str,
        register: u32,
        pc: Option<u32>,
    },
    UnhandledRegisterWrite {
        device: &'static str,
        register: u32,
        data: u32,
        pc: Option<u32>,
    },
    InvalidRegionSize {
        device: &'static str,
        region: &'static str,
        expected: usize,
        actual: usize,
    },
    Unimplemented {
        device: &'static str,
        feature: &'static str,
    },
}

impl Diagnostic {
    #[must_use]
    pub const fn kind(&self) -> DiagnosticKind {
        match self {
            Self::IllegalOpcode { .. } => DiagnosticKind::IllegalOpcode,
            Self::UnhandledRegisterRead { .. } | Self::UnhandledRegisterWrite { .. } => {
                DiagnosticKind::UnhandledRegisterAccess
            }
            Self::InvalidRegionSize { .. } => DiagnosticKind::InvalidRegionSize,
            Self::Unimplemented { .. } => DiagnosticKind::Unimplemented,
        }
    }

    #[must_use]
    pub const fn device(&self) -> &'static str {
        match self {
            Self::IllegalOpcode { device, .. }
            | Self::UnhandledRegisterRead { device, .. }
            | Self::UnhandledRegisterWrite { device, .. }
            | Self::InvalidRegionSize { device, .. }
            | Self::Unimplemented { device, .. } => device,
        }
    }
}

struct Pc(Option<u32>);

impl Display for Pc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pc) => write!(f, " (PC={pc:08X})"),
            None => Ok(()),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalOpcode { device, pc, opcode } => {
                write!(f, "{device}: illegal opcode {opcode:08X} at {pc:08X}")
            }
            Self::UnhandledRegisterRead {
                device,
                register,
                pc,
            } => write!(f, "{device}: read unmapped register {register:02X}{}", Pc(*pc)),
            Self::UnhandledRegisterWrite {
                device,
                register,
                data,
                pc,
            } => write!(
                f,
                "{device}: write {data:02X} to unmapped register {register:02X}{}",
                Pc(*pc)
            ),
            Self::InvalidRegionSize {
                device,
                region,
                expected,
                actual,
            } => write!(
                f,
                "{device}: region '{region}' is {actual} bytes, expected {expected}; using zeros"
            ),
            Self::Unimplemented { device, feature } => {
                write!(f, "{device}: {feature} is not implemented")
            }
        }
    }
}

pub trait DiagnosticSink: Send {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Forwards everything to `tracing` at warn level.
#[derive(Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(target: "emu::diagnostics", kind = ?diagnostic.kind(), "{diagnostic}");
    }
}

/// Keeps every event in a shared list. Clones share the same list, so the
/// owner can keep one handle and give another to a device.
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(target: "emu::diagnostics", "{diagnostic}");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}
