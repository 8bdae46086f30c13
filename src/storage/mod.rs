//! Storage layer
//!
//! - **codec**: canonical JSON rendering and content hashing
//! - **ids**: query and result identifiers
//! - **compression**: plain or gzip file formats
//! - **store**: the file-backed `ResultStore`
//! - **types**: records returned by the store
//! - **error**: error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   query → canonical text → SHA-1 → queries/<id>.<ext> (if absent)
//!   result → canonical text → results/<YYYYMMDD_HHMMSS>_<id>.<ext>
//!
//! Read Path:
//!   result id → parse + verify → load query file + result file
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use qrstore::storage::{ResultStore, StoreConfig};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ResultStore::open(StoreConfig::new("./data"))?;
//!
//!     let (query_id, result_id) = store.save_query_and_result(
//!         &json!({"q": "rust"}),
//!         &json!({"hits": 42}),
//!         None,
//!     )?;
//!
//!     let loaded = store.load_result(&result_id)?;
//!     assert_eq!(loaded.query_id, query_id);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod compression;
pub mod error;
pub mod ids;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use codec::{content_hash, deserialize, serialize, serialize_compact, Document};
pub use compression::{select_format, FileFormat, GzipJson, PlainJson};
pub use error::{StorageError, StorageResult};
pub use ids::{format_timestamp, parse_result_id, parse_timestamp, QueryId, ResultId};
pub use store::{ResultStore, StoreConfig, QUERIES_DIR, RESULTS_DIR};
pub use types::{QueryResult, StoreStats};
