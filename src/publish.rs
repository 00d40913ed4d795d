//! Pub/Sub publisher for climate readings.
//!
//! Publishes through the REST `topics.publish` method:
//! https://cloud.google.com/pubsub/docs/reference/rest/v1/projects.topics/publish
//!
//! The reading is serialized with the same `Reading` type the adapter decodes,
//! so a published payload always round-trips through `ingest::decode_reading`.

use crate::auth::TokenSource;
use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::model::Reading;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The reading published by the `publisher` binary.
pub fn sample_reading() -> Reading {
    Reading {
        state: "IL".to_string(),
        county: "Will".to_string(),
        city: "Joliet".to_string(),
        pollution_index: 100,
        temperature: 39.6,
        air_pressure: 30.0,
        week_of_year: 1,
        year: 2023,
    }
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutboundMessage>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    message_ids: Vec<String>,
}

pub struct Publisher {
    endpoint: String,
    project: String,
    topic: String,
    token_source: TokenSource,
    http: reqwest::blocking::Client,
}

impl Publisher {
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(PublishError::Client)?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            topic: config.topic.clone(),
            token_source: config.token_source.clone(),
            http,
        })
    }

    /// `projects/{project}/topics/{topic}`
    pub fn topic_name(&self) -> String {
        format!("projects/{}/topics/{}", self.project, self.topic)
    }

    pub fn publish_url(&self) -> String {
        format!("{}/v1/{}:publish", self.endpoint, self.topic_name())
    }

    pub fn encode_payload(reading: &Reading) -> Result<Vec<u8>, PublishError> {
        Ok(serde_json::to_vec(reading)?)
    }

    /// Publish one message and wait for its server-assigned id.
    ///
    /// No idempotency key is attached; every call enqueues a new message.
    pub fn publish(&self, reading: &Reading) -> Result<String, PublishError> {
        let payload = Self::encode_payload(reading)?;
        debug!(payload = %String::from_utf8_lossy(&payload), "encoded reading");

        let body = PublishRequest {
            messages: vec![OutboundMessage {
                data: STANDARD.encode(&payload),
            }],
        };

        let request = self.http.post(self.publish_url()).json(&body);
        let request = self.token_source.authorize(&self.http, request)?;
        let response = request.send().map_err(PublishError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PublishResponse = response.json().map_err(PublishError::Transport)?;
        let id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or(PublishError::EmptyResponse)?;

        info!(topic = %self.topic_name(), message_id = %id, "published reading");
        Ok(id)
    }
}
