//! HTTP retrieval of raw feed documents.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Fetches `url` and returns the response body.
///
/// Transport errors and non-success status codes are both reported as
/// [`PipelineError::Fetch`].
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let parsed = url
        .parse::<reqwest::Url>()
        .map_err(|e| PipelineError::Fetch(format!("invalid url '{url}': {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let started = Instant::now();
    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PipelineError::Fetch(format!(
            "{url} returned status {status}"
        )));
    }

    let bytes = resp.bytes().await?.to_vec();
    let elapsed = started.elapsed();
    if elapsed.as_secs() > 15 {
        warn!(url, elapsed_secs = elapsed.as_secs(), "Feed fetch was slow");
    }
    debug!(url, bytes = bytes.len(), "Feed bytes received");
    Ok(bytes)
}
