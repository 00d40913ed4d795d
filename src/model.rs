//! Core data types for the climate ingestion service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the reading payload, the push envelope it travels in, and the names of the
//! cells a reading becomes. It contains no I/O.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Table layout
// ---------------------------------------------------------------------------

/// Column family holding every cell written by the adapter.
pub const COLUMN_FAMILY: &str = "climate_summary";

/// Pollution status label, e.g. `SEVERE`.
pub const COLUMN_POLLUTION: &str = "pollution";

/// Temperature as six-decimal text.
pub const COLUMN_TEMPERATURE: &str = "temperature";

/// Air pressure as six-decimal text.
pub const COLUMN_PRESSURE: &str = "pressure";

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One location/time-stamped climate and pollution observation.
///
/// The wire form is a flat JSON object with PascalCase keys
/// (`State`, `County`, `City`, `PollutionIndex`, `Temperature`,
/// `AirPressure`, `WeekOfYear`, `Year`). Every key is required; keys outside
/// that set are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reading {
    pub state: String,
    pub county: String,
    pub city: String,
    pub pollution_index: i32,
    pub temperature: f64,
    pub air_pressure: f64,
    pub week_of_year: i32,
    pub year: i32,
}

impl Reading {
    /// Composite row key `state#county#city#year#week`.
    pub fn row_key(&self) -> String {
        format!(
            "{}#{}#{}#{}#{}",
            self.state, self.county, self.city, self.year, self.week_of_year
        )
    }
}

// ---------------------------------------------------------------------------
// Push envelope
// ---------------------------------------------------------------------------

/// Body of a Pub/Sub push request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: String,
}

/// The pushed message. `data` carries the serialized `Reading`, base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "messageId", default)]
    pub message_id: String,
}

impl PushMessage {
    /// Transport-assigned delivery identifier, empty if the sender gave none.
    pub fn delivery_id(&self) -> &str {
        if self.id.is_empty() {
            &self.message_id
        } else {
            &self.id
        }
    }
}
