//! Station inventory observation pipeline.
//!
//! Polls a bike-share status feed, diffs each snapshot against the previous
//! one, and delivers per-station inventory changes to an [`sink::ObservationSink`]
//! either immediately or spread across the poll interval.

pub mod catalog;
pub mod config;
pub mod delivery;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod model;
pub mod output;
pub mod parser;
pub mod poller;
pub mod services;
pub mod sink;
pub mod snapshot;
