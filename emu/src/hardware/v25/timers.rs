//! # V25 timer unit
//!
//! | Timer | Counter | Fires   | Armed by                                  |
//! |-------|---------|---------|-------------------------------------------|
//! | 0     | TM0     | INTTU0  | TMC0 (one-shot from TM0, interval of MD0) |
//! | 1     | MD0     | INTTU1  | TMC0 in one-shot mode                     |
//! | 2     | TM1     | INTTU2  | TMC1 (interval of MD1)                    |
//! | 3     | -       | INTTB   | PRC, always running                       |
//!
//! Counters tick every `PCK * scale` cycles, where PCK is the prescaler
//! programmed through PRC. Nothing counts cycle by cycle: writing a control
//! register schedules the underflow on the [`TimerQueue`] and a read of TM0
//! or TM1 is worked out from the time left.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::scheduler::{TimerId, TimerQueue};
use crate::state::{StateVisitor, Stateful};

use super::interrupt_control::InterruptSource;

/// Time base periods are `PCK << shift`.
const TIME_BASE_SHIFTS: [u32; 4] = [10, 13, 16, 20];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timers {
    queue: TimerQueue,
    ids: Option<[TimerId; 4]>,
    pub(crate) tmc0: u8,
    pub(crate) tmc1: u8,
    pub(crate) tm0: u16,
    pub(crate) md0: u16,
    pub(crate) tm1: u16,
    pub(crate) md1: u16,
    /// Cycles per count of timers 0 and 2.
    ticks: [u64; 2],
    pub(crate) pck: u32,
}

impl Timers {
    pub fn start(&mut self) {
        self.ids = Some(std::array::from_fn(|_| self.queue.allocate()));
    }

    fn id(&self, timer: usize) -> TimerId {
        let Some(ids) = self.ids else {
            panic!("v25 timers used before start");
        };
        ids[timer]
    }

    pub fn reset(&mut self) {
        self.queue.cancel_all();
        self.tmc0 = 0;
        self.tmc1 = 0;
        self.tm0 = 0;
        self.md0 = 0;
        self.tm1 = 0;
        self.md1 = 0;
        self.ticks = [0; 2];
    }

    fn cycles(&self, count: u16, scale: u32) -> u64 {
        u64::from(self.pck) * u64::from(count) * u64::from(scale)
    }

    pub fn write_tmc0(&mut self, now: u64, data: u8) {
        self.tmc0 = data;
        let (tu0, tu1) = (self.id(0), self.id(1));
        self.queue.cancel(tu0);
        self.queue.cancel(tu1);

        if data.get_bit(0) {
            if data.get_bit(7) {
                let scale = if data.get_bit(6) { 128 } else { 12 };
                self.ticks[0] = u64::from(self.pck * scale);
                let delay = self.cycles(self.tm0, scale);
                self.queue.adjust(tu0, now, delay, InterruptSource::INTTU0.0, 0);
            }
            if data.get_bit(5) {
                let scale = if data.get_bit(4) { 128 } else { 12 };
                let delay = self.cycles(self.md0, scale);
                self.queue.adjust(tu1, now, delay, InterruptSource::INTTU1.0, 0);
            }
        } else if data.get_bit(7) {
            let scale = if data.get_bit(6) { 128 } else { 6 };
            self.ticks[0] = u64::from(self.pck * scale);
            let period = self.cycles(self.md0, scale);
            self.queue.adjust(tu0, now, period, InterruptSource::INTTU0.0, period);
            self.tm0 = self.md0;
        }
    }

    pub fn write_tmc1(&mut self, now: u64, data: u8) {
        self.tmc1 = data & 0xC0;
        let tu2 = self.id(2);
        self.queue.cancel(tu2);

        if data.get_bit(7) {
            let scale = if data.get_bit(6) { 128 } else { 6 };
            self.ticks[1] = u64::from(self.pck * scale);
            let period = self.cycles(self.md1, scale);
            self.queue.adjust(tu2, now, period, InterruptSource::INTTU2.0, period);
            self.tm1 = self.md1;
        }
    }

    /// Re-arms the time base after a PRC write. `pck` takes effect for the
    /// other timers the next time they are programmed.
    pub fn set_prescaler(&mut self, now: u64, pck: u32, time_base: u8) {
        self.pck = pck;
        let period = u64::from(pck) << TIME_BASE_SHIFTS[usize::from(time_base & 3)];
        let tb = self.id(3);
        self.queue.adjust(tb, now, period, InterruptSource::INTTB.0, period);
    }

    fn live_count(&self, timer: usize, now: u64, stored: u16) -> u16 {
        let tick = self.ticks[timer / 2];
        match self.queue.remaining(self.id(timer), now) {
            #[allow(clippy::cast_possible_truncation)]
            Some(remaining) if tick > 0 => remaining.div_ceil(tick) as u16,
            _ => stored,
        }
    }

    #[must_use]
    pub fn tm0(&self, now: u64) -> u16 {
        self.live_count(0, now, self.tm0)
    }

    #[must_use]
    pub fn tm1(&self, now: u64) -> u16 {
        self.live_count(2, now, self.tm1)
    }

    /// Request bits for everything that fired up to `now`, and how many
    /// firings that was.
    pub fn advance_to(&mut self, now: u64) -> (u32, usize) {
        let fired = self.queue.expire(now);
        let requests = fired.iter().fold(0, |acc, timer| acc | timer.param);
        (requests, fired.len())
    }

    #[must_use]
    pub fn next_expiry(&self) -> Option<u64> {
        self.queue.next_expiry()
    }
}

impl Stateful for Timers {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        self.queue.visit_state(visitor);
        visitor.item("tmc0", &mut self.tmc0);
        visitor.item("tmc1", &mut self.tmc1);
        visitor.item("tm0", &mut self.tm0);
        visitor.item("md0", &mut self.md0);
        visitor.item("tm1", &mut self.tm1);
        visitor.item("md1", &mut self.md1);
        visitor.item("ticks", &mut self.ticks);
        visitor.item("pck", &mut self.pck);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn started(pck: u32) -> Timers {
        let mut timers = Timers::default();
        timers.start();
        timers.reset();
        timers.pck = pck;
        timers
    }

    #[test]
    fn check_one_shot() {
        let mut timers = started(2);
        timers.tm0 = 10;
        timers.write_tmc0(0, 0x81);

        assert_eq!(timers.tm0(120), 5);
        assert_eq!(timers.advance_to(239), (0, 0));
        assert_eq!(timers.advance_to(240), (InterruptSource::INTTU0.0, 1));
        assert_eq!(timers.advance_to(10_000), (0, 0));
    }

    #[test]
    fn check_one_shot_pair() {
        let mut timers = started(1);
        timers.tm0 = 2;
        timers.md0 = 1;
        timers.write_tmc0(0, 0xA1);

        assert_eq!(timers.advance_to(12), (InterruptSource::INTTU1.0, 1));
        assert_eq!(timers.advance_to(24), (InterruptSource::INTTU0.0, 1));
    }

    #[test]
    fn check_interval_reprogramming() {
        let mut timers = started(2);
        timers.md1 = 10;
        timers.write_tmc1(0, 0x80);
        assert_eq!(timers.advance_to(60), (0, 0));

        // New period from here; the old firing at 120 must not happen.
        timers.md1 = 20;
        timers.write_tmc1(60, 0x80);
        assert_eq!(timers.advance_to(299), (0, 0));
        assert_eq!(timers.advance_to(300), (InterruptSource::INTTU2.0, 1));
        assert_eq!(timers.advance_to(540), (InterruptSource::INTTU2.0, 1));
    }

    #[test]
    fn check_stop() {
        let mut timers = started(2);
        timers.md0 = 4;
        timers.write_tmc0(0, 0x80);
        assert_eq!(timers.tm0(0), 4);
        timers.write_tmc0(10, 0x00);
        assert_eq!(timers.advance_to(1_000), (0, 0));
    }

    #[test]
    fn check_time_base() {
        let mut timers = started(8);
        timers.set_prescaler(0, 8, 0);
        assert_eq!(timers.next_expiry(), Some(8 << 10));
        assert_eq!(timers.advance_to(3 * (8 << 10)), (InterruptSource::INTTB.0, 3));
    }
}
