//! Records returned by the store

use crate::storage::codec::Document;
use crate::storage::ids::{QueryId, ResultId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored result together with the query it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The query document, as first written
    pub query: Document,
    /// The result document captured at `sample_time`
    pub result: Document,
    /// Capture time, second resolution
    pub sample_time: NaiveDateTime,
    pub query_id: QueryId,
    pub result_id: ResultId,
}

/// File counts of a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub query_count: usize,
    pub result_count: usize,
    /// Extension used by this store (`json` or `json.gz`)
    pub extension: &'static str,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queries: {}, Results: {}, Format: .{}",
            self.query_count, self.result_count, self.extension
        )
    }
}
