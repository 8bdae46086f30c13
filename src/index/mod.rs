//! Index structures over a result store
//!
//! - **ResultIndex**: in-memory query → results map built from one scan
//!
//! # Architecture
//!
//! ```text
//! ResultStore::find_result_ids()
//!        ↓
//! parse each id → (sample_time, query_id)
//!        ↓
//! query_id → [result ids], query_id → [sample times]
//! ```

mod result_index;

pub use result_index::ResultIndex;

use serde::Serialize;
use std::fmt;

/// Statistics about an index snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of query files found
    pub queries: usize,
    /// Number of result files found
    pub results: usize,
    /// Number of distinct query ids referenced by results
    pub queries_with_results: usize,
    /// Query files no result refers to (e.g. left by an interrupted save)
    pub orphan_queries: usize,
    /// Results whose query file is missing
    pub dangling_results: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Queries: {}, Results: {}, Answered: {}, Orphans: {}, Dangling: {}",
            self.queries,
            self.results,
            self.queries_with_results,
            self.orphan_queries,
            self.dangling_results
        )
    }
}
