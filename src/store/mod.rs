//! Wide-column row mutations and the sinks that apply them.
//!
//! Submodules:
//! - `bigtable`: Cloud Bigtable Data API client.
//! - `memory`: in-process versioned table.

pub mod bigtable;
pub mod memory;

use crate::error::StoreError;
use chrono::{DateTime, Utc};

pub use bigtable::BigtableTable;
pub use memory::MemoryTable;

/// One `setCell` within a row mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub family: String,
    pub qualifier: String,
    pub timestamp_micros: i64,
    pub value: Vec<u8>,
}

/// Cell writes applied atomically to a single row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMutation {
    pub row_key: String,
    pub cells: Vec<Cell>,
}

impl RowMutation {
    pub fn new(row_key: impl Into<String>) -> Self {
        Self {
            row_key: row_key.into(),
            cells: Vec::new(),
        }
    }

    pub fn set_cell(
        &mut self,
        family: &str,
        qualifier: &str,
        timestamp_micros: i64,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.cells.push(Cell {
            family: family.to_string(),
            qualifier: qualifier.to_string(),
            timestamp_micros,
            value: value.into(),
        });
        self
    }
}

/// Destination for row mutations.
///
/// `apply` blocks until the backend has acknowledged the write. Implementations
/// must not read existing cells before writing.
pub trait MutationSink: Send + Sync {
    fn apply(&self, mutation: &RowMutation) -> Result<(), StoreError>;
}

/// Cell timestamp for `now`, in microseconds truncated to whole milliseconds.
///
/// Bigtable tables default to millisecond granularity and reject finer
/// timestamps.
pub fn cell_timestamp(now: DateTime<Utc>) -> i64 {
    now.timestamp_millis() * 1_000
}
