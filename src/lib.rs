//! # qrstore
//!
//! Content-addressed archive of query/result document pairs on the local
//! filesystem.
//!
//! Each query document is identified by the SHA-1 of its canonical JSON
//! rendering; each result is identified by the second it was captured plus
//! the id of its query. Saving the same query again only adds a result file.
//!
//! ## Modules
//!
//! - [`storage`]: codec, identifiers and the file-backed [`ResultStore`]
//! - [`index`]: in-memory query → results view over a store
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qrstore::{ResultIndex, ResultStore, StoreConfig};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ResultStore::open(StoreConfig::new("./archive"))?;
//!
//!     let query = json!({"id": "test", "query_str": "some query string"});
//!     store.save_query_and_result(&query, &json!({"id": "res1"}), None)?;
//!
//!     let index = ResultIndex::build(&store)?;
//!     let (matching, _) = index.filter_query_ids(|q| q["id"] == "test", None)?;
//!     for result_id in index.get_result_ids_for_queries(&matching) {
//!         let loaded = store.load_result(&result_id)?;
//!         println!("{} {}", loaded.sample_time, loaded.result);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod index;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    Document, QueryId, QueryResult, ResultId, ResultStore, StorageError, StorageResult,
    StoreConfig, StoreStats,
};

pub use index::{IndexStats, ResultIndex};

pub use config::{generate_default_config, Config, ConfigError, ConfigSearch, LoggingConfig};
