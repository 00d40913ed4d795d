//! Pollution status code registry.
//!
//! `STATUS_CODES` is the single source of truth for which `PollutionIndex`
//! values the adapter accepts. Any other code is rejected, never defaulted.

use crate::error::IngestError;
use std::collections::HashMap;
use std::fmt;

/// Severity label written to the `pollution` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollutionStatus {
    Severe,
    Moderate,
    Low,
    Nil,
}

impl PollutionStatus {
    pub fn label(self) -> &'static str {
        match self {
            PollutionStatus::Severe => "SEVERE",
            PollutionStatus::Moderate => "MODERATE",
            PollutionStatus::Low => "LOW",
            PollutionStatus::Nil => "NIL",
        }
    }
}

impl fmt::Display for PollutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepted pollution codes, most severe first.
pub static STATUS_CODES: &[(i32, PollutionStatus)] = &[
    (100, PollutionStatus::Severe),
    (101, PollutionStatus::Moderate),
    (102, PollutionStatus::Low),
    (103, PollutionStatus::Nil),
];

/// Immutable code-to-status map, built once at startup and shared by every
/// request.
#[derive(Debug, Clone)]
pub struct StatusTable {
    by_code: HashMap<i32, PollutionStatus>,
}

impl StatusTable {
    /// The table built from `STATUS_CODES`.
    pub fn standard() -> Self {
        Self {
            by_code: STATUS_CODES.iter().copied().collect(),
        }
    }

    pub fn lookup(&self, code: i32) -> Result<PollutionStatus, IngestError> {
        self.by_code
            .get(&code)
            .copied()
            .ok_or(IngestError::UnknownPollutionCode(code))
    }
}
