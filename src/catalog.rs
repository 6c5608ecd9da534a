//! Read-only station id → metadata lookup.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::StationMetadata;
use crate::services::feed_api::MetadataFetcher;

/// Static station lookup populated once at startup.
#[derive(Debug, Default)]
pub struct StationCatalog {
    stations: HashMap<String, StationMetadata>,
}

impl StationCatalog {
    /// Builds a catalog from metadata records. Later duplicates replace
    /// earlier ones.
    pub fn from_stations(stations: impl IntoIterator<Item = StationMetadata>) -> Self {
        let mut map = HashMap::new();
        for station in stations {
            if let Some(prev) = map.insert(station.id.clone(), station) {
                warn!(station_id = %prev.id, "Duplicate station id in metadata feed");
            }
        }
        Self { stations: map }
    }

    /// Loads the catalog from a metadata collaborator.
    pub async fn load<M: MetadataFetcher + ?Sized>(fetcher: &M) -> Result<Self> {
        let stations = fetcher.fetch_stations().await?;
        let catalog = Self::from_stations(stations);
        info!(stations = catalog.len(), "Station catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&StationMetadata> {
        self.stations.get(id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Iterates stations sorted by id.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &StationMetadata> {
        let mut stations: Vec<_> = self.stations.values().collect();
        stations.sort_by(|a, b| a.id.cmp(&b.id));
        stations.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;

    fn station(id: &str, name: &str) -> StationMetadata {
        StationMetadata {
            id: id.to_string(),
            name: name.to_string(),
            address: String::new(),
            location: Location::new(139.7, 35.6),
        }
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = StationCatalog::from_stations(vec![station("a", "A"), station("b", "B")]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("b").unwrap().name, "B");
        assert!(catalog.get("c").is_none());
    }

    #[test]
    fn test_duplicate_id_keeps_last() {
        let catalog = StationCatalog::from_stations(vec![station("a", "first"), station("a", "second")]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("a").unwrap().name, "second");
    }

    #[test]
    fn test_iter_sorted() {
        let catalog = StationCatalog::from_stations(vec![station("z", "Z"), station("m", "M")]);
        let ids: Vec<_> = catalog.iter_sorted().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }
}
