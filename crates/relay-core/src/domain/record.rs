//! Record model: what the record source hands to consuming tasks.
//!
//! The scheduler never looks inside `data`; it only moves batches from the
//! source onto the task that will write them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StreamId;

/// One record read from the source side of the sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub stream: StreamId,

    /// Record body (connector specific, kept as JSON).
    pub data: serde_json::Value,

    pub emitted_at: DateTime<Utc>,
}

impl Record {
    pub fn new(stream: StreamId, data: serde_json::Value) -> Self {
        Self {
            stream,
            data,
            emitted_at: Utc::now(),
        }
    }
}

/// A batch drained from the source in one `take` call. May be empty.
pub type Batch = Vec<Record>;
