#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bike_availability::catalog::StationCatalog;
use bike_availability::error::{PipelineError, Result};
use bike_availability::model::{ChangeEvent, Location, StationMetadata, StationSnapshot, StationStatus};
use bike_availability::services::feed_api::StatusFetcher;
use bike_availability::sink::{ObservationSink, SinkMessage};

/// One scripted response of [`ScriptedFetcher`].
pub enum Step {
    Records(Vec<StationStatus>),
    Delayed(Duration, Vec<StationStatus>),
    Fail,
}

/// Returns scripted responses in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(&self) -> Result<Vec<StationStatus>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Records(records)) => Ok(records),
            Some(Step::Delayed(delay, records)) => {
                tokio::time::sleep(delay).await;
                Ok(records)
            }
            Some(Step::Fail) => Err(PipelineError::Fetch("connection refused".to_string())),
            None => Err(PipelineError::Fetch("script exhausted".to_string())),
        }
    }
}

pub fn catalog(ids: &[&str]) -> StationCatalog {
    StationCatalog::from_stations(ids.iter().enumerate().map(|(i, id)| StationMetadata {
        id: id.to_string(),
        name: format!("Station {id}"),
        address: format!("{i}-chome"),
        location: Location::new(139.7 + i as f64 * 0.01, 35.6),
    }))
}

pub fn status(id: &str, bikes: u32, empty: u32) -> StationStatus {
    StationStatus::new(id, bikes, empty)
}

/// Lets spawned tasks run without crossing any timer boundary that matters.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Keeps every sink call in memory, in call order.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<SinkMessage>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<SinkMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn observed_ids(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::Observation(e) => Some(e.snapshot.id),
                SinkMessage::NewEntity(_) => None,
            })
            .collect()
    }

    pub fn new_entity_ids(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SinkMessage::NewEntity(s) => Some(s.id),
                SinkMessage::Observation(_) => None,
            })
            .collect()
    }

    /// Every call as `new:<id>` or `obs:<id>`.
    pub fn call_log(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .map(|m| match m {
                SinkMessage::NewEntity(s) => format!("new:{}", s.id),
                SinkMessage::Observation(e) => format!("obs:{}", e.snapshot.id),
            })
            .collect()
    }
}

impl ObservationSink for RecordingSink {
    fn on_new_entity(&self, snapshot: &StationSnapshot) {
        self.messages
            .lock()
            .unwrap()
            .push(SinkMessage::NewEntity(snapshot.clone()));
    }

    fn on_observation(&self, event: &ChangeEvent) {
        self.messages
            .lock()
            .unwrap()
            .push(SinkMessage::Observation(event.clone()));
    }
}
