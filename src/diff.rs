//! Change detection between a fetched status batch and the snapshot store.

use tracing::debug;

use crate::catalog::StationCatalog;
use crate::model::{ChangeEvent, StationSnapshot, StationStatus};
use crate::snapshot::SnapshotStore;

/// Result of one diff pass.
#[derive(Debug, Default, PartialEq)]
pub struct DiffOutcome {
    /// Change events in input record order.
    pub events: Vec<ChangeEvent>,
    /// Stations seen for the first time in this pass.
    pub new_entities: usize,
    /// Stations whose `bikes_available` changed.
    pub changed_stations: usize,
    /// Sum of all `inventory_change` values in `events`.
    pub total_inventory_change: i64,
    /// Records dropped because the catalog had no metadata for them.
    pub unknown_stations: usize,
}

/// Compares `records` against `store`, updating the store in place.
///
/// A station without a prior snapshot is stored as a baseline and passed to
/// `on_new_entity`; it never produces a [`ChangeEvent`]. Only a change in
/// `bikes_available` produces an event, which is handed to `on_change` as
/// soon as it is detected, so callbacks interleave in record order. The
/// stored snapshot always ends up holding the latest status.
pub fn diff<N, C>(
    records: &[StationStatus],
    catalog: &StationCatalog,
    store: &mut SnapshotStore,
    mut on_new_entity: N,
    mut on_change: C,
) -> DiffOutcome
where
    N: FnMut(&StationSnapshot),
    C: FnMut(&ChangeEvent),
{
    let mut outcome = DiffOutcome::default();

    for status in records {
        let Some(metadata) = catalog.get(&status.id) else {
            debug!(station_id = %status.id, "Status record has no station metadata, dropping");
            outcome.unknown_stations += 1;
            continue;
        };

        let mut candidate = StationSnapshot::from_parts(metadata, status);

        let previous_bikes = store.get(&status.id).map(|s| s.bikes_available);
        match previous_bikes {
            None => {
                on_new_entity(&candidate);
                outcome.new_entities += 1;
            }
            Some(previous) if previous != candidate.bikes_available => {
                let change = i64::from(candidate.bikes_available) - i64::from(previous);
                candidate.inventory_change = change;
                outcome.total_inventory_change += change;
                outcome.changed_stations += 1;
                let event = ChangeEvent {
                    snapshot: candidate.clone(),
                };
                on_change(&event);
                outcome.events.push(event);
            }
            Some(_) => {}
        }

        store.upsert(candidate);
    }

    outcome
}
