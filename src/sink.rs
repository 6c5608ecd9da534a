//! Consumers of pipeline output.
//!
//! The pipeline calls an [`ObservationSink`] synchronously from its own
//! execution context while holding the pipeline state lock. A slow sink
//! delays the next drain tick and the next poll cycle, so implementations
//! that do real work should hand off through [`ChannelSink`].

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::model::{ChangeEvent, StationSnapshot};

/// Receives new-entity notifications and change observations.
pub trait ObservationSink: Send + Sync {
    /// Called when the pipeline connects, before the first poll of the new
    /// session. Every station will be reported as new again afterwards.
    fn on_connect(&self) {}

    /// Called once per station id, the first time it is seen after connect.
    fn on_new_entity(&self, snapshot: &StationSnapshot);

    /// Called once per emitted change event.
    fn on_observation(&self, event: &ChangeEvent);
}

impl<S: ObservationSink + ?Sized> ObservationSink for std::sync::Arc<S> {
    fn on_connect(&self) {
        (**self).on_connect()
    }

    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        (**self).on_new_entity(snapshot)
    }

    fn on_observation(&self, event: &ChangeEvent) {
        (**self).on_observation(event)
    }
}

/// Logs every call through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        debug!(
            station_id = %snapshot.id,
            name = %snapshot.name,
            bikes = snapshot.bikes_available,
            empty_slots = snapshot.empty_slots,
            "New station"
        );
    }

    fn on_observation(&self, event: &ChangeEvent) {
        let s = &event.snapshot;
        info!(
            station_id = %s.id,
            name = %s.name,
            bikes = s.bikes_available,
            empty_slots = s.empty_slots,
            change = s.inventory_change,
            "Inventory changed"
        );
    }
}

/// Message form of a sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkMessage {
    NewEntity(StationSnapshot),
    Observation(ChangeEvent),
}

/// Forwards calls over an unbounded channel so the consumer runs on its own
/// task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ObservationSink for ChannelSink {
    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(SinkMessage::NewEntity(snapshot.clone()));
    }

    fn on_observation(&self, event: &ChangeEvent) {
        let _ = self.tx.send(SinkMessage::Observation(event.clone()));
    }
}

/// Running total of bikes available across all known stations.
///
/// Seeded from each new station's `bikes_available`, then moved by every
/// observation's `inventory_change`.
#[derive(Debug, Default)]
pub struct InventoryTracker {
    bikes_available: AtomicI64,
    bikes_added: AtomicU64,
    bikes_taken: AtomicU64,
    stations: AtomicU64,
}

impl InventoryTracker {
    pub fn bikes_available(&self) -> i64 {
        self.bikes_available.load(Ordering::Relaxed)
    }

    pub fn bikes_added(&self) -> u64 {
        self.bikes_added.load(Ordering::Relaxed)
    }

    pub fn bikes_taken(&self) -> u64 {
        self.bikes_taken.load(Ordering::Relaxed)
    }

    pub fn stations(&self) -> u64 {
        self.stations.load(Ordering::Relaxed)
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.bikes_available.store(0, Ordering::Relaxed);
        self.bikes_added.store(0, Ordering::Relaxed);
        self.bikes_taken.store(0, Ordering::Relaxed);
        self.stations.store(0, Ordering::Relaxed);
    }
}

impl ObservationSink for InventoryTracker {
    /// A new session re-reports every station, so the total starts over.
    fn on_connect(&self) {
        self.reset();
    }

    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        self.stations.fetch_add(1, Ordering::Relaxed);
        self.bikes_available
            .fetch_add(i64::from(snapshot.bikes_available), Ordering::Relaxed);
    }

    fn on_observation(&self, event: &ChangeEvent) {
        let change = event.inventory_change();
        if change == 0 {
            return;
        }
        self.bikes_available.fetch_add(change, Ordering::Relaxed);
        if change > 0 {
            self.bikes_added.fetch_add(change as u64, Ordering::Relaxed);
        } else {
            self.bikes_taken
                .fetch_add(change.unsigned_abs(), Ordering::Relaxed);
        }
    }
}

/// Forwards every call to each inner sink in order.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn ObservationSink>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ObservationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl ObservationSink for FanOut {
    fn on_connect(&self) {
        for sink in &self.sinks {
            sink.on_connect();
        }
    }

    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        for sink in &self.sinks {
            sink.on_new_entity(snapshot);
        }
    }

    fn on_observation(&self, event: &ChangeEvent) {
        for sink in &self.sinks {
            sink.on_observation(event);
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    messages: std::sync::Mutex<Vec<SinkMessage>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn messages(&self) -> Vec<SinkMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Ids of emitted observations, in emission order.
    pub fn observed_ids(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::Observation(e) => Some(e.snapshot.id),
                SinkMessage::NewEntity(_) => None,
            })
            .collect()
    }

    fn push(&self, message: SinkMessage) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }
}

#[cfg(test)]
impl ObservationSink for RecordingSink {
    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        self.push(SinkMessage::NewEntity(snapshot.clone()));
    }

    fn on_observation(&self, event: &ChangeEvent) {
        self.push(SinkMessage::Observation(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;
    use std::sync::Arc;

    fn snapshot(id: &str, bikes: u32, change: i64) -> StationSnapshot {
        StationSnapshot {
            id: id.to_string(),
            name: String::new(),
            address: String::new(),
            location: Location::default(),
            bikes_available: bikes,
            empty_slots: 0,
            inventory_change: change,
        }
    }

    #[test]
    fn test_inventory_tracker_totals() {
        let tracker = InventoryTracker::default();
        tracker.on_new_entity(&snapshot("a", 5, 0));
        tracker.on_new_entity(&snapshot("b", 3, 0));
        tracker.on_observation(&ChangeEvent { snapshot: snapshot("a", 8, 3) });
        tracker.on_observation(&ChangeEvent { snapshot: snapshot("b", 1, -2) });

        assert_eq!(tracker.stations(), 2);
        assert_eq!(tracker.bikes_available(), 9);
        assert_eq!(tracker.bikes_added(), 3);
        assert_eq!(tracker.bikes_taken(), 2);
    }

    #[test]
    fn test_inventory_tracker_resets_on_connect() {
        let tracker = InventoryTracker::default();
        tracker.on_new_entity(&snapshot("a", 5, 0));
        tracker.on_observation(&ChangeEvent { snapshot: snapshot("a", 2, -3) });

        tracker.on_connect();
        tracker.on_new_entity(&snapshot("a", 2, 0));

        assert_eq!(tracker.stations(), 1);
        assert_eq!(tracker.bikes_available(), 2);
        assert_eq!(tracker.bikes_taken(), 0);
    }

    #[test]
    fn test_fan_out_forwards_connect() {
        let tracker = Arc::new(InventoryTracker::default());
        tracker.on_new_entity(&snapshot("a", 5, 0));
        let fan_out = FanOut::new().with(tracker.clone());

        fan_out.on_connect();

        assert_eq!(tracker.bikes_available(), 0);
    }

    #[test]
    fn test_channel_sink_forwards_and_ignores_closed_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_new_entity(&snapshot("a", 1, 0));

        assert_eq!(
            rx.try_recv().unwrap(),
            SinkMessage::NewEntity(snapshot("a", 1, 0))
        );

        drop(rx);
        sink.on_observation(&ChangeEvent { snapshot: snapshot("a", 2, 1) });
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());
        let fan_out = FanOut::new().with(first.clone()).with(second.clone());

        fan_out.on_observation(&ChangeEvent { snapshot: snapshot("a", 2, 1) });

        assert_eq!(fan_out.len(), 2);
        assert_eq!(first.observed_ids(), vec!["a"]);
        assert_eq!(second.observed_ids(), vec!["a"]);
    }
}
