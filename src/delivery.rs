//! Immediate or smoothed delivery of change events to the sink.
//!
//! In smoothed mode a batch is parked in a pending queue and handed out one
//! event per drain tick. The drain rate is chosen so the whole batch fits in
//! one poll interval; whatever is still queued when the next cycle starts is
//! flushed at once, newest first.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::debug;

use crate::model::ChangeEvent;
use crate::sink::ObservationSink;

/// Drain intervals are computed in 100 ns units.
const TICKS_PER_SECOND_RESOLUTION: u64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Emit every event inside the diff pass.
    Immediate,
    /// Spread each batch across the poll interval.
    #[default]
    Smoothed,
}

/// Number of drain ticks per second needed to empty `pending` events within
/// `poll_interval_secs`. Zero when there is nothing to deliver.
pub fn ticks_per_second(pending: usize, poll_interval_secs: u64) -> u64 {
    if poll_interval_secs == 0 {
        return pending as u64;
    }
    (pending as u64).div_ceil(poll_interval_secs)
}

/// Period of the drain timer for a given rate, never zero.
pub fn drain_interval(ticks_per_second: u64) -> Option<Duration> {
    if ticks_per_second == 0 {
        return None;
    }
    let units = (TICKS_PER_SECOND_RESOLUTION / ticks_per_second).max(1);
    Some(Duration::from_nanos(units * 100))
}

/// Delivery state for one pipeline instance.
#[derive(Debug)]
pub struct DeliveryScheduler {
    mode: DeliveryMode,
    poll_interval_secs: u64,
    pending: VecDeque<ChangeEvent>,
}

impl DeliveryScheduler {
    pub fn new(mode: DeliveryMode, poll_interval_secs: u64) -> Self {
        Self {
            mode,
            poll_interval_secs,
            pending: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Emits every queued event, most recently enqueued first, and empties
    /// the queue. Returns how many were emitted.
    pub fn flush_leftovers(&mut self, sink: &dyn ObservationSink) -> usize {
        let mut flushed = 0;
        while let Some(event) = self.pending.pop_back() {
            sink.on_observation(&event);
            flushed += 1;
        }
        if flushed > 0 {
            debug!(flushed, "Flushed leftover observations from previous cycle");
        }
        flushed
    }

    /// Takes one event as soon as the diff pass detects it.
    ///
    /// Immediate mode emits it to the sink right away; smoothed mode appends
    /// it to the pending queue.
    pub fn accept(&mut self, event: ChangeEvent, sink: &dyn ObservationSink) {
        match self.mode {
            DeliveryMode::Immediate => sink.on_observation(&event),
            DeliveryMode::Smoothed => self.pending.push_back(event),
        }
    }

    /// Recomputes the drain rate for the current queue.
    ///
    /// Returns the drain period to arm, or `None` in immediate mode and when
    /// nothing is pending.
    pub fn rearm(&self) -> Option<Duration> {
        if self.mode == DeliveryMode::Immediate {
            return None;
        }
        let rate = ticks_per_second(self.pending.len(), self.poll_interval_secs);
        let interval = drain_interval(rate);
        if let Some(period) = interval {
            debug!(
                pending = self.pending.len(),
                ticks_per_second = rate,
                period_us = period.as_micros() as u64,
                "Smoothing rate recomputed"
            );
        }
        interval
    }

    /// Accepts a whole batch, then returns the drain period to arm.
    pub fn deliver(
        &mut self,
        events: Vec<ChangeEvent>,
        sink: &dyn ObservationSink,
    ) -> Option<Duration> {
        for event in events {
            self.accept(event, sink);
        }
        self.rearm()
    }

    /// Emits the most recently enqueued event, if any.
    pub fn drain_one(&mut self, sink: &dyn ObservationSink) -> bool {
        match self.pending.pop_back() {
            Some(event) => {
                sink.on_observation(&event);
                true
            }
            None => false,
        }
    }

    /// Drops queued events without emitting them.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
