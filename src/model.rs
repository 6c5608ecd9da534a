//! Station records flowing through the pipeline.

/// WGS84 position of a station.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

impl Location {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Static identity of one station, loaded once before the first poll.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMetadata {
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: Location,
}

/// One status record as returned by the status feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationStatus {
    pub id: String,
    pub bikes_available: u32,
    pub empty_slots: u32,
}

impl StationStatus {
    pub fn new(id: impl Into<String>, bikes_available: u32, empty_slots: u32) -> Self {
        Self {
            id: id.into(),
            bikes_available,
            empty_slots,
        }
    }
}

/// Last observed attribute set for a station.
///
/// `inventory_change` is zero for a baseline and carries the signed delta of
/// `bikes_available` for a snapshot produced by a change.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSnapshot {
    pub id: String,
    pub name: String,
    pub address: String,
    pub location: Location,
    pub bikes_available: u32,
    pub empty_slots: u32,
    pub inventory_change: i64,
}

impl StationSnapshot {
    /// Joins a status record with its station metadata.
    pub fn from_parts(metadata: &StationMetadata, status: &StationStatus) -> Self {
        Self {
            id: status.id.clone(),
            name: metadata.name.clone(),
            address: metadata.address.clone(),
            location: metadata.location,
            bikes_available: status.bikes_available,
            empty_slots: status.empty_slots,
            inventory_change: 0,
        }
    }
}

/// A detected change in available bikes for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub snapshot: StationSnapshot,
}

impl ChangeEvent {
    pub fn id(&self) -> &str {
        &self.snapshot.id
    }

    pub fn location(&self) -> Location {
        self.snapshot.location
    }

    pub fn inventory_change(&self) -> i64 {
        self.snapshot.inventory_change
    }
}
