//! Cloud Bigtable Data API client
//!
//! Writes go through the REST `mutateRow` method:
//! https://cloud.google.com/bigtable/docs/reference/data/rest/v2/projects.instances.tables/mutateRow
//!
//! Byte fields (row key, qualifier, value) are base64 in the JSON body and
//! `timestampMicros` is an int64, so it travels as a string.

use super::{MutationSink, RowMutation};
use crate::auth::TokenSource;
use crate::error::StoreError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://bigtable.googleapis.com";

/// A single Bigtable table addressed by project, instance and table id.
#[derive(Debug, Clone)]
pub struct BigtableTable {
    endpoint: String,
    project: String,
    instance: String,
    table: String,
    token_source: TokenSource,
    timeout: Option<Duration>,
}

impl BigtableTable {
    pub fn new(
        endpoint: &str,
        project: &str,
        instance: &str,
        table: &str,
        token_source: TokenSource,
    ) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            instance: instance.to_string(),
            table: table.to_string(),
            token_source,
            timeout: None,
        }
    }

    /// Bound each write request. Unset, a hung backend blocks its caller.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `projects/{project}/instances/{instance}/tables/{table}`
    pub fn table_name(&self) -> String {
        format!(
            "projects/{}/instances/{}/tables/{}",
            self.project, self.instance, self.table
        )
    }

    pub fn mutate_row_url(&self) -> String {
        format!("{}/v2/{}:mutateRow", self.endpoint, self.table_name())
    }

    /// JSON body of a `mutateRow` request.
    pub fn mutate_row_body(mutation: &RowMutation) -> Value {
        let mutations: Vec<Value> = mutation
            .cells
            .iter()
            .map(|cell| {
                json!({
                    "setCell": {
                        "familyName": cell.family,
                        "columnQualifier": STANDARD.encode(cell.qualifier.as_bytes()),
                        "timestampMicros": cell.timestamp_micros.to_string(),
                        "value": STANDARD.encode(&cell.value),
                    }
                })
            })
            .collect();

        json!({
            "rowKey": STANDARD.encode(mutation.row_key.as_bytes()),
            "mutations": mutations,
        })
    }

    fn client(&self) -> Result<reqwest::blocking::Client, StoreError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(StoreError::Client)
    }
}

impl MutationSink for BigtableTable {
    /// One connection per call: the client is built and dropped here.
    fn apply(&self, mutation: &RowMutation) -> Result<(), StoreError> {
        let client = self.client()?;
        let url = self.mutate_row_url();

        let request = client
            .post(&url)
            .header("Accept", "application/json")
            .json(&Self::mutate_row_body(mutation));
        let request = self.token_source.authorize(&client, request)?;

        let response = request.send().map_err(|source| StoreError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(row_key = %mutation.row_key, table = %self.table, "mutateRow acknowledged");
        Ok(())
    }
}
