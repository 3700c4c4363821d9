//! The Farmer's trigger reorder buffer.
//!
//! Grounded on `TriggerSorter.cpp`'s `addItem`/`flush` pair: collapse *W*
//! per-worker monotonic subsequences into one strictly increasing sequence,
//! tolerating gaps left by workers that deliberately drop events.

use std::collections::BTreeMap;

use crate::message::{Message, ParameterHeader, ParameterValue};

/// One event pending emission, keyed by trigger number in the caller's map.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub trigger: u64,
    pub values: Vec<ParameterValue>,
}

/// Reassembles a multiplexed, per-worker-monotonic event stream into one
/// sequence strictly increasing in trigger number, starting from 0.
pub struct ReorderBuffer {
    next_expected_trigger: u64,
    pending: BTreeMap<u64, Vec<ParameterValue>>,
    workers_remaining: usize,
    high_water_mark: usize,
}

impl ReorderBuffer {
    pub fn new(worker_count: usize) -> Self {
        Self { next_expected_trigger: 0, pending: BTreeMap::new(), workers_remaining: worker_count, high_water_mark: 0 }
    }

    /// Largest the pending set has ever grown to; exposed for counters.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Record one event. Returns the events now ready to emit, in trigger
    /// order (zero, one, or a contiguous run if this fill closed a gap).
    pub fn accept(&mut self, trigger: u64, values: Vec<ParameterValue>) -> Vec<PendingEvent> {
        if trigger != self.next_expected_trigger {
            self.pending.insert(trigger, values);
            self.high_water_mark = self.high_water_mark.max(self.pending.len());
            return Vec::new();
        }

        let mut ready = vec![PendingEvent { trigger, values }];
        self.next_expected_trigger += 1;

        loop {
            let next_key = match self.pending.keys().next() {
                Some(&k) => k,
                None => break,
            };
            if next_key != self.next_expected_trigger {
                break;
            }
            let values = self.pending.remove(&next_key).expect("key just peeked from the map");
            ready.push(PendingEvent { trigger: next_key, values });
            self.next_expected_trigger += 1;
        }
        ready
    }

    /// Record one worker's end sentinel. Once every worker has reported
    /// in, flushes all still-pending events in key order (tolerating
    /// gaps) and returns them; `None` while workers remain.
    pub fn worker_ended(&mut self) -> Option<Vec<PendingEvent>> {
        self.workers_remaining = self.workers_remaining.saturating_sub(1);
        if self.workers_remaining > 0 {
            return None;
        }
        let flushed = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(trigger, values)| PendingEvent { trigger, values })
            .collect();
        Some(flushed)
    }
}

/// Render a [`PendingEvent`] as the wire message the Farmer sends downstream.
pub fn emit_message(event: &PendingEvent) -> Message {
    Message::Parameters {
        header: ParameterHeader { trigger_number: event.trigger, count: event.values.len() as u32, end_flag: false },
        values: event.values.clone(),
    }
}
