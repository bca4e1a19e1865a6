//! Device-owned timers in cycle time.
//!
//! A device allocates its timers once at start and then re-arms them as
//! often as it likes. The owner feeds the current time to
//! [`TimerQueue::expire`], which hands back what fired together with the
//! parameter the device attached when arming, so one handler can tell its
//! timers apart.

use serde::{Deserialize, Serialize};

use crate::state::{StateVisitor, Stateful};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub param: u32,
    pub when: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Slot {
    due: Option<u64>,
    param: u32,
    /// 0 for one-shot timers.
    period: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerQueue {
    slots: Vec<Slot>,
}

impl TimerQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn allocate(&mut self) -> TimerId {
        self.slots.push(Slot::default());
        TimerId(self.slots.len() - 1)
    }

    /// Arms `id` to fire `delay` cycles after `now`, then every `period`
    /// cycles if `period` is not zero. Whatever was scheduled before is
    /// dropped.
    pub fn adjust(&mut self, id: TimerId, now: u64, delay: u64, param: u32, period: u64) {
        let slot = &mut self.slots[id.0];
        slot.due = Some(now.saturating_add(delay));
        slot.param = param;
        slot.period = period;
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.slots[id.0].due = None;
    }

    pub fn cancel_all(&mut self) {
        for slot in &mut self.slots {
            slot.due = None;
        }
    }

    #[must_use]
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.slots[id.0].due.is_some()
    }

    /// Cycles left before `id` fires.
    #[must_use]
    pub fn remaining(&self, id: TimerId, now: u64) -> Option<u64> {
        self.slots[id.0].due.map(|due| due.saturating_sub(now))
    }

    #[must_use]
    pub fn next_expiry(&self) -> Option<u64> {
        self.slots.iter().filter_map(|slot| slot.due).min()
    }

    /// Fires everything due at or before `now`, oldest first, ties broken by
    /// allocation order. Periodic timers are re-armed from their previous
    /// due time, so a late call doesn't drift or drop periods.
    pub fn expire(&mut self, now: u64) -> Vec<TimerFired> {
        let mut fired = Vec::new();

        while let Some((index, due)) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.due.map(|due| (index, due)))
            .filter(|&(_, due)| due <= now)
            .min_by_key(|&(index, due)| (due, index))
        {
            let slot = &mut self.slots[index];
            fired.push(TimerFired {
                id: TimerId(index),
                param: slot.param,
                when: due,
            });
            slot.due = (slot.period > 0).then(|| due + slot.period);
        }

        fired
    }
}

impl Stateful for TimerQueue {
    fn visit_state(&mut self, visitor: &mut dyn StateVisitor) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            visitor.item(&format!("timer{index}.due"), &mut slot.due);
            visitor.item(&format!("timer{index}.param"), &mut slot.param);
            visitor.item(&format!("timer{index}.period"), &mut slot.period);
        }
    }
}
