//! # Intel 8214 priority interrupt control unit
//!
//! Eight request inputs are scanned for the most urgent one, which is
//! compared against the current status register when status group select
//! (SGS) is set. Every change of winner pulses the output line once and
//! latches the new level as the vector.
//!
//! ```text
//!  R0..R7 ──▶ scan ──▶ [> status?] ──▶ vector ──▶ INT pulse
//!              ▲            ▲
//!       INTE, ETLG         SGS
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::device::{Device, DeviceInfo, InputLineState, InterruptSink, Lifecycle};
use crate::state::{StateVisitor, Stateful};

pub static INFO: DeviceInfo = DeviceInfo {
    name: "Intel 8214",
    shortname: "i8214",
    family: "Intel 8214",
    version: "1.0",
};

/// Which end of R0..R7 wins. Boards differ in how they wire the inputs, so
/// this is part of the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOrder {
    #[default]
    HighToLow,
    LowToHigh,
}

impl ScanOrder {
    fn levels(self) -> impl Iterator<Item = u8> {
        let low_first = self == Self::LowToHigh;
        (0..8).map(move |n| if low_first { n } else { 7 - n })
    }

    /// True when `level` outranks `status`.
    const fn outranks(self, level: u8, status: u8) -> bool {
        match self {
            Self::HighToLow => level > status,
            Self::LowToHigh => level < status,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct I8214Config {
    pub scan_order: ScanOrder,
    /// Input line of the core driven by INT.
    pub output_line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct I8214 {
    config: I8214Config,
    lifecycle: Lifecycle,
    /// Bit n set while Rn requests.
    requests: u8,
    inte: bool,
    etlg: bool,
    sgs: bool,
    current_status: u8,
    selected: Option<u8>,
}

impl I8214 {
    #[must_use]
    pub fn new(config: I8214Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn set_request(&mut self, level: u8, asserted: bool) {
        self.requests.set_bit(level, asserted);
    }

    pub const fn set_requests(&mut self, requests: u8) {
        self.requests = requests;
    }

    pub const fn set_inte(&mut self, enabled: bool) {
        self.inte = enabled;
    }

    pub const fn set_etlg(&mut self, enabled: bool) {
        self.etlg = enabled;
    }

    /// B0-B2 current status, B3 SGS. The next update reports the winner
    /// again, even if it did not change.
    pub fn write_status(&mut self, data: u8) {
        self.current_status = data.get_bits(0..=2);
        self.sgs = data.get_bit(3);
        self.selected = None;
    }

    /// Level of the request that raised INT, for the RST instruction the
    /// owner puts on the data bus.
    #[must_use]
    pub const fn vector(&self) -> Option<u8> {
        self.selected
    }

    /// Enable-next-level-group output for cascading: high when this unit is
    /// enabled and has nothing to report.
    #[must_use]
    pub const fn enlg(&self) -> bool {
        self.etlg && self.requests == 0
    }

    fn winner(&self) -> Option<u8> {
        if !self.inte || !self.etlg {
            return None;
        }
        let order = self.config.scan_order;
        order
            .levels()
            .find(|&level| self.requests.get_bit(level))
            .filter(|&level| !self.sgs || order.outranks(level, self.current_status))
    }

    /// Rescans the inputs and pulses `sink` if a different level won.
    pub fn update(&mut self, sink: &mut dyn InterruptSink) {
        let winner = self.winner();
        if winner == self.selected {
            return;
        }

        self.selected = winner;
        if let Some(level) = winner {
            tracing::trace!(target: "emu::i8214", "request on level {level}");
            sink.signal(self.config.output_line, InputLineState::Assert);
            sink.signal(self.config.output_line, InputLineState::Clear);
        }
    }
}

impl Device for I8214 {
    fn info(&self) -> &'static DeviceInfo {
        &INFO
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn start(&mut self) {
        self.lifecycle.start(INFO.shortname);
    }

    /// The request inputs are driven from outside and survive reset.
    fn reset(&mut self) {
        self.lifecycle.reset(INFO.shortname);
        self.inte = false;
        self.etlg = true;
        self.sgs = false;
        self.current_status = 0;
        self.selected = None;
    }

    fn stop(&mut self) {
        self.lifecycle.stop(INFO.shortname);
    }
}

impl Stateful for I8214 {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        visitor.item("requests", &mut self.requests);
        visitor.item("inte", &mut self.inte);
        visitor.item("etlg", &mut self.etlg);
        visitor.item("sgs", &mut self.sgs);
        visitor.item("current_status", &mut self.current_status);
        visitor.item("selected", &mut self.selected);
    }
}
