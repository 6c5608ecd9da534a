//! Traits for the feed collaborators the pipeline reads from.

use crate::error::Result;
use crate::model::{StationMetadata, StationStatus};

/// Source of the periodically refreshed station status list.
#[async_trait::async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Returns the current status of every station.
    async fn fetch_status(&self) -> Result<Vec<StationStatus>>;
}

/// Source of static station metadata, read once before the first poll.
#[async_trait::async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch_stations(&self) -> Result<Vec<StationMetadata>>;
}
