//! Publishes one sample climate reading to the configured Pub/Sub topic.
//!
//! Topic and project default to compiled-in values; `PUBSUB_PROJECT`,
//! `PUBSUB_TOPIC`, `PUBSUB_ENDPOINT` and `PUBSUB_EMULATOR_HOST` override them.

use climate_service::config::PublisherConfig;
use climate_service::logging;
use climate_service::publish::{Publisher, sample_reading};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let config = match PublisherConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logger(&config.log) {
        eprintln!("Unable to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(topic = %config.topic, project = %config.project, "Starting to publish the message");

    let result = Publisher::new(&config).and_then(|publisher| publisher.publish(&sample_reading()));
    match result {
        Ok(id) => {
            println!("Published the message successfully with the id: {}", id);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Publishing failed");
            ExitCode::FAILURE
        }
    }
}
