//! Push-to-row pipeline.
//!
//! Each step is a hard gate, in order: decode the envelope, decode the
//! embedded reading, look up the pollution status, format the measurements,
//! build the row key, apply one mutation. Nothing touches the table unless
//! every step before the write succeeded.
//!
//! # Clock injection
//! `Ingestor::process_at` takes `now` instead of reading the clock, so cell
//! timestamps are deterministic in tests.

use crate::error::IngestError;
use crate::model::{
    COLUMN_FAMILY, COLUMN_POLLUTION, COLUMN_PRESSURE, COLUMN_TEMPERATURE, PushEnvelope,
    PushMessage, Reading,
};
use crate::status::{PollutionStatus, StatusTable};
use crate::store::{MutationSink, RowMutation, cell_timestamp};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub fn decode_envelope(body: &[u8]) -> Result<PushEnvelope, IngestError> {
    serde_json::from_slice(body).map_err(IngestError::Envelope)
}

/// Base64-decode `message.data` and parse it as a `Reading`.
pub fn decode_reading(message: &PushMessage) -> Result<Reading, IngestError> {
    let payload = STANDARD.decode(message.data.trim())?;
    serde_json::from_slice(&payload).map_err(IngestError::Payload)
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Fixed-point text with six decimals, e.g. `21.6` -> `21.600000`.
pub fn format_measurement(value: f64) -> String {
    format!("{:.6}", value)
}

/// The three-cell mutation for `reading`, all cells sharing `timestamp_micros`.
///
/// Fails without building anything if the pollution code is unknown.
pub fn build_mutation(
    reading: &Reading,
    statuses: &StatusTable,
    timestamp_micros: i64,
) -> Result<(RowMutation, PollutionStatus), IngestError> {
    let status = statuses.lookup(reading.pollution_index)?;
    let temperature = format_measurement(reading.temperature);
    let pressure = format_measurement(reading.air_pressure);

    let mut mutation = RowMutation::new(reading.row_key());
    mutation
        .set_cell(COLUMN_FAMILY, COLUMN_POLLUTION, timestamp_micros, status.label())
        .set_cell(COLUMN_FAMILY, COLUMN_TEMPERATURE, timestamp_micros, temperature)
        .set_cell(COLUMN_FAMILY, COLUMN_PRESSURE, timestamp_micros, pressure);

    Ok((mutation, status))
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Result of a successfully stored push.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub delivery_id: String,
    pub subscription: String,
    pub row_key: String,
    pub status: PollutionStatus,
}

/// Stateless pipeline shared by all requests.
#[derive(Clone)]
pub struct Ingestor {
    statuses: Arc<StatusTable>,
    sink: Arc<dyn MutationSink>,
}

impl Ingestor {
    pub fn new(statuses: StatusTable, sink: Arc<dyn MutationSink>) -> Self {
        Self {
            statuses: Arc::new(statuses),
            sink,
        }
    }

    pub fn process(&self, body: &[u8]) -> Result<IngestOutcome, IngestError> {
        self.process_at(body, Utc::now())
    }

    pub fn process_at(&self, body: &[u8], now: DateTime<Utc>) -> Result<IngestOutcome, IngestError> {
        let envelope = decode_envelope(body)?;
        let reading = decode_reading(&envelope.message)?;
        self.store_at(&reading, now).map(|(row_key, status)| IngestOutcome {
            delivery_id: envelope.message.delivery_id().to_string(),
            subscription: envelope.subscription,
            row_key,
            status,
        })
    }

    /// Write an already-decoded reading. Returns the row key and status written.
    pub fn store_at(
        &self,
        reading: &Reading,
        now: DateTime<Utc>,
    ) -> Result<(String, PollutionStatus), IngestError> {
        let (mutation, status) = build_mutation(reading, &self.statuses, cell_timestamp(now))?;
        debug!(row_key = %mutation.row_key, status = %status, "applying mutation");
        self.sink.apply(&mutation)?;
        Ok((mutation.row_key, status))
    }
}
