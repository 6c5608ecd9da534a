//! CSV persistence of emitted observations.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, error};

use crate::model::{ChangeEvent, StationSnapshot};
use crate::sink::ObservationSink;

/// One CSV row.
#[derive(Debug, Serialize)]
pub struct ObservationRecord {
    pub timestamp: DateTime<Utc>,
    pub station_id: String,
    pub name: String,
    pub address: String,
    pub lon: f64,
    pub lat: f64,
    pub bikes_available: u32,
    pub empty_slots: u32,
    pub inventory_change: i64,
}

impl ObservationRecord {
    pub fn from_snapshot(snapshot: &StationSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            station_id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            address: snapshot.address.clone(),
            lon: snapshot.location.lon,
            lat: snapshot.location.lat,
            bikes_available: snapshot.bikes_available,
            empty_slots: snapshot.empty_slots,
            inventory_change: snapshot.inventory_change,
        }
    }
}

/// Appends an [`ObservationRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, record: &ObservationRecord) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on a fresh file
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

/// Writes every observation to a CSV file. New-entity notifications are not
/// recorded.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ObservationSink for CsvSink {
    fn on_new_entity(&self, _snapshot: &StationSnapshot) {}

    fn on_observation(&self, event: &ChangeEvent) {
        let record = ObservationRecord::from_snapshot(&event.snapshot);
        if let Err(e) = append_record(&self.path, &record) {
            error!(path = %self.path.display(), error = %e, "Failed to write observation");
        }
    }
}
