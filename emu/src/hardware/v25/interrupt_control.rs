//! # V25 interrupt controller
//!
//! Every maskable source has a control register with the same layout:
//!
//! ```text
//!   7    6    5    4    3   2 1 0
//! ┌────┬────┬────┬────┬───┬─────┐
//! │ IF │ MK │ MS │ ENCS│ 0 │ PR  │
//! └────┴────┴────┴────┴───┴─────┘
//! ```
//!
//! - **IF**: request pending
//! - **MK**: masked
//! - **MS**: service the request with a macro instead of a vector
//! - **ENCS**: switch register bank instead of pushing PSW/PC
//! - **PR**: priority, shared by every source of the group and only
//!   writable through the group's first register
//!
//! Levels are scanned from 0 (highest) to 7. A level that is already in
//! service (its ISPR bit is set) stops the scan, so nothing of equal or
//! lower priority can nest.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::device::InputLineState;
use crate::state::{StateVisitor, Stateful};

/// One bit per request source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterruptSource(pub u32);

impl InterruptSource {
    pub const INT: Self = Self(1 << 0);
    pub const NMI: Self = Self(1 << 1);
    pub const INTTU0: Self = Self(1 << 2);
    pub const INTTU1: Self = Self(1 << 3);
    pub const INTTU2: Self = Self(1 << 4);
    pub const INTD0: Self = Self(1 << 5);
    pub const INTD1: Self = Self(1 << 6);
    pub const INTP0: Self = Self(1 << 7);
    pub const INTP1: Self = Self(1 << 8);
    pub const INTP2: Self = Self(1 << 9);
    pub const INTSER0: Self = Self(1 << 10);
    pub const INTSR0: Self = Self(1 << 11);
    pub const INTST0: Self = Self(1 << 12);
    pub const INTSER1: Self = Self(1 << 13);
    pub const INTSR1: Self = Self(1 << 14);
    pub const INTST1: Self = Self(1 << 15);
    pub const INTTB: Self = Self(1 << 16);

    const NAMES: [&'static str; 17] = [
        "INT", "NMI", "INTTU0", "INTTU1", "INTTU2", "INTD0", "INTD1", "INTP0", "INTP1", "INTP2",
        "INTSER0", "INTSR0", "INTST0", "INTSER1", "INTSR1", "INTST1", "INTTB",
    ];

    const fn shifted(self, by: u32) -> Self {
        Self(self.0 << by)
    }
}

impl Display for InterruptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMES.get(self.0.trailing_zeros() as usize) {
            Some(name) if self.0.is_power_of_two() => f.write_str(name),
            _ => write!(f, "{:#x}", self.0),
        }
    }
}

/// Sources that share one priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Group {
    TimerUnit,
    Dma,
    External,
    Serial0,
    Serial1,
}

struct GroupSources {
    group: Group,
    first: InterruptSource,
    count: u32,
    vector: u8,
}

/// Scan order inside one priority level.
const GROUPS: [GroupSources; 5] = [
    GroupSources {
        group: Group::TimerUnit,
        first: InterruptSource::INTTU0,
        count: 3,
        vector: 28,
    },
    GroupSources {
        group: Group::Dma,
        first: InterruptSource::INTD0,
        count: 2,
        vector: 20,
    },
    GroupSources {
        group: Group::External,
        first: InterruptSource::INTP0,
        count: 3,
        vector: 24,
    },
    GroupSources {
        group: Group::Serial0,
        first: InterruptSource::INTSER0,
        count: 3,
        vector: 12,
    },
    GroupSources {
        group: Group::Serial1,
        first: InterruptSource::INTSER1,
        count: 3,
        vector: 16,
    },
];

pub const NMI_VECTOR: u8 = 2;
pub const INTTB_VECTOR: u8 = 31;
const LOWEST_LEVEL: u8 = 7;

/// What the core should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptRequest {
    pub source: InterruptSource,
    /// `None` for INT, whose vector comes from the external acknowledge
    /// cycle.
    pub vector: Option<u8>,
    /// `None` for NMI and INT, which don't take part in ISPR nesting.
    pub level: Option<u8>,
    /// Register bank to switch to instead of pushing PSW and PC.
    pub bank: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptControl {
    pub(crate) pending: u32,
    pub(crate) unmasked: u32,
    pub(crate) bank_switch: u32,
    pub(crate) macro_service: u32,
    /// Indexed by [`Group`].
    pub(crate) priorities: [u8; 5],
    /// In-service priority levels, bit n for level n.
    pub(crate) ispr: u8,
    /// Vector of the last acknowledged request.
    pub(crate) irqs: u8,
    nmi_line: bool,
    intp_lines: [bool; 3],
}

impl Default for InterruptControl {
    /// Every maskable source masked at the lowest priority; NMI and INT
    /// can't be masked.
    fn default() -> Self {
        Self {
            pending: 0,
            unmasked: InterruptSource::INT.0 | InterruptSource::NMI.0,
            bank_switch: 0,
            macro_service: 0,
            priorities: [LOWEST_LEVEL; 5],
            ispr: 0,
            irqs: 0,
            nmi_line: false,
            intp_lines: [false; 3],
        }
    }
}

impl InterruptControl {
    #[must_use]
    pub const fn is_pending(&self, source: InterruptSource) -> bool {
        self.pending & source.0 != 0
    }

    #[must_use]
    pub const fn is_masked(&self, source: InterruptSource) -> bool {
        self.unmasked & source.0 == 0
    }

    #[must_use]
    pub const fn priority(&self, group: Group) -> u8 {
        self.priorities[group as usize]
    }

    pub fn set_priority(&mut self, group: Group, level: u8) {
        self.priorities[group as usize] = level & 7;
    }

    pub fn request(&mut self, source: InterruptSource) {
        self.pending |= source.0;
    }

    /// Control register write. `group` is set for the register that also
    /// carries the group priority. Returns true when macro service was
    /// asked for.
    pub fn write_control(
        &mut self,
        source: InterruptSource,
        group: Option<Group>,
        data: u8,
    ) -> bool {
        let set = |mask: &mut u32, on: bool| {
            if on {
                *mask |= source.0;
            } else {
                *mask &= !source.0;
            }
        };
        set(&mut self.pending, data.get_bit(7));
        set(&mut self.unmasked, !data.get_bit(6));
        set(&mut self.macro_service, data.get_bit(5));
        set(&mut self.bank_switch, data.get_bit(4));

        if let Some(group) = group {
            self.set_priority(group, data.get_bits(0..=2));
        }
        data.get_bit(5)
    }

    /// Registers without a priority field read it back as all ones.
    #[must_use]
    pub fn read_control(&self, source: InterruptSource, group: Option<Group>) -> u8 {
        let mut data = group.map_or(LOWEST_LEVEL, |group| self.priority(group));
        data.set_bit(7, self.is_pending(source));
        data.set_bit(6, self.is_masked(source));
        data.set_bit(5, self.macro_service & source.0 != 0);
        data.set_bit(4, self.bank_switch & source.0 != 0);
        data
    }

    /// NMI latches on a rising edge, INT follows the line level.
    pub fn set_nmi_line(&mut self, state: InputLineState) {
        if Self::edge(&mut self.nmi_line, state) {
            self.request(InterruptSource::NMI);
        }
    }

    pub fn set_int_line(&mut self, state: InputLineState) {
        match state {
            InputLineState::Clear => self.pending &= !InterruptSource::INT.0,
            InputLineState::Assert | InputLineState::Pulse => self.request(InterruptSource::INT),
        }
    }

    /// INTP0-2, `pin` 0 to 2.
    pub fn set_intp_line(&mut self, pin: usize, state: InputLineState) {
        if Self::edge(&mut self.intp_lines[pin], state) {
            #[allow(clippy::cast_possible_truncation)]
            self.request(InterruptSource::INTP0.shifted(pin as u32));
        }
    }

    /// Tracks the line and returns true on a rising edge. A pulse is always
    /// an edge and leaves the line low.
    fn edge(line: &mut bool, state: InputLineState) -> bool {
        match state {
            InputLineState::Clear => {
                *line = false;
                false
            }
            InputLineState::Assert => !std::mem::replace(line, true),
            InputLineState::Pulse => {
                *line = false;
                true
            }
        }
    }

    fn request_for(&self, source: InterruptSource, vector: u8, level: u8) -> InterruptRequest {
        InterruptRequest {
            source,
            vector: Some(vector),
            level: Some(level),
            bank: (self.bank_switch & source.0 != 0).then_some(level),
        }
    }

    /// The request the core should take now, if any. `interrupts_enabled`
    /// is the core's IE flag; only NMI gets through without it.
    #[must_use]
    pub fn pending_interrupt(&self, interrupts_enabled: bool) -> Option<InterruptRequest> {
        let pending = self.pending & self.unmasked;

        if pending & InterruptSource::NMI.0 != 0 {
            return Some(InterruptRequest {
                source: InterruptSource::NMI,
                vector: Some(NMI_VECTOR),
                level: None,
                bank: None,
            });
        }
        if !interrupts_enabled {
            return None;
        }

        for level in 0..=LOWEST_LEVEL {
            if self.ispr.get_bit(level) {
                return None;
            }
            for sources in GROUPS.iter().filter(|g| self.priority(g.group) == level) {
                for n in 0..sources.count {
                    let source = sources.first.shifted(n);
                    if pending & source.0 != 0 {
                        #[allow(clippy::cast_possible_truncation)]
                        let vector = sources.vector + n as u8;
                        return Some(self.request_for(source, vector, level));
                    }
                }
            }
            if level == LOWEST_LEVEL && pending & InterruptSource::INTTB.0 != 0 {
                return Some(self.request_for(InterruptSource::INTTB, INTTB_VECTOR, level));
            }
        }

        (pending & InterruptSource::INT.0 != 0).then_some(InterruptRequest {
            source: InterruptSource::INT,
            vector: None,
            level: None,
            bank: None,
        })
    }

    /// The core has taken `request`. INT stays requested for as long as the
    /// line is held.
    pub fn acknowledge(&mut self, request: &InterruptRequest) {
        if request.source != InterruptSource::INT {
            self.pending &= !request.source.0;
        }
        if let Some(level) = request.level {
            self.ispr.set_bit(level, true);
        }
        if let Some(vector) = request.vector {
            self.irqs = vector;
        }
    }

    /// FINT: the highest-priority service in progress is over.
    pub const fn finish_interrupt(&mut self) {
        if self.ispr != 0 {
            self.ispr &= self.ispr - 1;
        }
    }
}

impl Stateful for InterruptControl {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        visitor.item("irq.pending", &mut self.pending);
        visitor.item("irq.unmasked", &mut self.unmasked);
        visitor.item("irq.bank_switch", &mut self.bank_switch);
        visitor.item("irq.macro_service", &mut self.macro_service);
        visitor.item("irq.priorities", &mut self.priorities);
        visitor.item("irq.ispr", &mut self.ispr);
        visitor.item("irq.irqs", &mut self.irqs);
        visitor.item("irq.nmi_line", &mut self.nmi_line);
        visitor.item("irq.intp_lines", &mut self.intp_lines);
    }
}
