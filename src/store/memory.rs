//! In-process table with Bigtable-like cell versioning.
//!
//! Every `(row, family, qualifier)` keeps all written versions keyed by
//! timestamp. A write at an existing timestamp replaces that version, a write
//! at a new timestamp adds one. Backs the pipeline and endpoint tests.

use super::{MutationSink, RowMutation};
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

type ColumnKey = (String, String);
type Versions = BTreeMap<i64, Vec<u8>>;

#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: Mutex<BTreeMap<String, BTreeMap<ColumnKey, Versions>>>,
    applied: Mutex<usize>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<String, BTreeMap<ColumnKey, Versions>>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of mutations applied so far.
    pub fn mutation_count(&self) -> usize {
        *self.applied.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn row_keys(&self) -> Vec<String> {
        self.rows().keys().cloned().collect()
    }

    /// All versions of one cell, newest first.
    pub fn cell_versions(&self, row_key: &str, family: &str, qualifier: &str) -> Vec<(i64, Vec<u8>)> {
        self.rows()
            .get(row_key)
            .and_then(|columns| columns.get(&(family.to_string(), qualifier.to_string())))
            .map(|versions| {
                versions
                    .iter()
                    .rev()
                    .map(|(ts, value)| (*ts, value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Newest value of one cell as text.
    pub fn latest(&self, row_key: &str, family: &str, qualifier: &str) -> Option<String> {
        self.cell_versions(row_key, family, qualifier)
            .into_iter()
            .next()
            .map(|(_, value)| String::from_utf8_lossy(&value).into_owned())
    }
}

impl MutationSink for MemoryTable {
    fn apply(&self, mutation: &RowMutation) -> Result<(), StoreError> {
        let mut rows = self.rows();
        let columns = rows.entry(mutation.row_key.clone()).or_default();
        for cell in &mutation.cells {
            columns
                .entry((cell.family.clone(), cell.qualifier.clone()))
                .or_default()
                .insert(cell.timestamp_micros, cell.value.clone());
        }
        drop(rows);

        *self.applied.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        Ok(())
    }
}
