use async_trait::async_trait;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::Result;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::model::{StationMetadata, StationStatus};
use crate::parser::{parse_station_information, parse_station_status};
use crate::services::feed_api::{MetadataFetcher, StatusFetcher};

/// Reads a GBFS system's `station_status` and `station_information` feeds.
pub struct GbfsClient<C = BasicClient> {
    http: C,
    config: FeedConfig,
}

impl GbfsClient<BasicClient> {
    pub fn new(config: FeedConfig) -> Result<Self> {
        Ok(Self::with_client(BasicClient::new()?, config))
    }
}

impl<C: HttpClient> GbfsClient<C> {
    pub fn with_client(http: C, config: FeedConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

#[async_trait]
impl<C: HttpClient> StatusFetcher for GbfsClient<C> {
    async fn fetch_status(&self) -> Result<Vec<StationStatus>> {
        let bytes = fetch_bytes(&self.http, &self.config.status_url).await?;
        let records = parse_station_status(&bytes)?;
        debug!(records = records.len(), "Station status parsed");
        Ok(records)
    }
}

#[async_trait]
impl<C: HttpClient> MetadataFetcher for GbfsClient<C> {
    async fn fetch_stations(&self) -> Result<Vec<StationMetadata>> {
        let bytes = fetch_bytes(&self.http, &self.config.station_url).await?;
        let stations = parse_station_information(&bytes)?;
        debug!(stations = stations.len(), "Station information parsed");
        Ok(stations)
    }
}
