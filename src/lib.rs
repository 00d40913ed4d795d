//! Climate reading ingestion.
//!
//! Readings are published to a Pub/Sub topic, pushed to the adapter's HTTP
//! endpoint, translated into a `climate_summary` row and written to Bigtable.

pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod publish;
pub mod server;
pub mod status;
pub mod store;
