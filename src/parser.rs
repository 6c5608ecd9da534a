//! JSON parser for GBFS station documents.

use serde::{Deserialize, Deserializer};

use crate::error::{PipelineError, Result};
use crate::model::{Location, StationMetadata, StationStatus};

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<StationList<T>>,
}

#[derive(Deserialize)]
struct StationList<T> {
    stations: Vec<T>,
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(deserialize_with = "station_id")]
    station_id: String,
    num_bikes_available: u32,
    num_docks_available: u32,
}

#[derive(Deserialize)]
struct RawStation {
    #[serde(deserialize_with = "station_id")]
    station_id: String,
    name: String,
    #[serde(default)]
    address: Option<String>,
    lat: f64,
    lon: f64,
}

/// Some feeds publish ids as numbers.
fn station_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

fn stations<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<Vec<T>> {
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;
    envelope
        .data
        .map(|d| d.stations)
        .ok_or_else(|| PipelineError::Parse("document has no data.stations".to_string()))
}

/// Decodes a GBFS `station_status.json` document.
///
/// # Errors
///
/// Returns [`PipelineError::Parse`] if the bytes are not valid JSON or lack a
/// `data.stations` array.
pub fn parse_station_status(bytes: &[u8]) -> Result<Vec<StationStatus>> {
    Ok(stations::<RawStatus>(bytes)?
        .into_iter()
        .map(|raw| StationStatus {
            id: raw.station_id,
            bikes_available: raw.num_bikes_available,
            empty_slots: raw.num_docks_available,
        })
        .collect())
}

/// Decodes a GBFS `station_information.json` document.
pub fn parse_station_information(bytes: &[u8]) -> Result<Vec<StationMetadata>> {
    Ok(stations::<RawStation>(bytes)?
        .into_iter()
        .map(|raw| StationMetadata {
            id: raw.station_id,
            name: raw.name,
            address: raw.address.unwrap_or_default(),
            location: Location::new(raw.lon, raw.lat),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        let json = br#"{
            "last_updated": 1700000000,
            "ttl": 60,
            "data": {"stations": [
                {"station_id": "100", "num_bikes_available": 4, "num_docks_available": 6, "is_renting": true},
                {"station_id": 101, "num_bikes_available": 0, "num_docks_available": 10}
            ]}
        }"#;

        let records = parse_station_status(json).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], StationStatus::new("100", 4, 6));
        assert_eq!(records[1].id, "101");
    }

    #[test]
    fn test_parse_information() {
        let json = br#"{"data": {"stations": [
            {"station_id": "7", "name": "Tokyo Station", "lat": 35.68, "lon": 139.76, "address": "Marunouchi"},
            {"station_id": "8", "name": "No Address", "lat": 35.0, "lon": 139.0}
        ]}}"#;

        let stations = parse_station_information(json).unwrap();

        assert_eq!(stations[0].name, "Tokyo Station");
        assert_eq!(stations[0].location, Location::new(139.76, 35.68));
        assert_eq!(stations[1].address, "");
    }

    #[test]
    fn test_missing_stations_is_parse_error() {
        let err = parse_station_status(br#"{"data": {}}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));

        let err = parse_station_status(br#"{"last_updated": 1}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_invalid_bytes() {
        let err = parse_station_information(&[0xFF, 0xFE, 0x00]).unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_negative_count_rejected() {
        let json = br#"{"data": {"stations": [
            {"station_id": "1", "num_bikes_available": -1, "num_docks_available": 0}
        ]}}"#;
        assert!(parse_station_status(json).is_err());
    }
}
