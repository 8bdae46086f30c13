//! File-backed result store
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/queries/<query id>.<ext>
//! <root>/results/<YYYYMMDD_HHMMSS>_<query id>.<ext>
//! ```
//!
//! Query files are written once per distinct content (first writer wins).
//! Result files are written once per save and never rewritten.
//!
//! Every file is written to a temporary file in the target directory and then
//! renamed into place, so a file under its final name is always complete.

use crate::storage::codec::{self, Document};
use crate::storage::compression::{select_format, FileFormat};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::ids::{QueryId, ResultId};
use crate::storage::types::{QueryResult, StoreStats};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::Span;

/// Prefix of in-flight temporary files; never matches a store extension
const PARTIAL_PREFIX: &str = ".partial-";

/// Directory holding one file per distinct query
pub const QUERIES_DIR: &str = "queries";
/// Directory holding one file per saved result
pub const RESULTS_DIR: &str = "results";

/// Configuration for a result store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory for all data
    pub root: PathBuf,
    /// Gzip every stored file (`.json.gz` instead of `.json`)
    pub compress: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("qrstore_data"),
            compress: true,
        }
    }
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Builder method: toggle compression
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Get path to the queries directory
    pub fn queries_dir(&self) -> PathBuf {
        self.root.join(QUERIES_DIR)
    }

    /// Get path to the results directory
    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }
}

/// Archive of query/result pairs on the local filesystem
#[derive(Debug)]
pub struct ResultStore {
    config: StoreConfig,
    format: Box<dyn FileFormat>,
    span: Span,
}

impl ResultStore {
    /// Open (and if needed create) a store rooted at `config.root`
    ///
    /// Opening the same root twice is safe; nothing existing is touched.
    pub fn open(config: StoreConfig) -> StorageResult<Self> {
        fs::create_dir_all(config.queries_dir())?;
        fs::create_dir_all(config.results_dir())?;

        let format = select_format(config.compress);
        let span = tracing::debug_span!(
            "result_store",
            root = %config.root.display(),
            ext = format.extension()
        );

        Ok(Self {
            config,
            format,
            span,
        })
    }

    /// Replace the span all events of this store are recorded under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub fn path_query(&self, query_id: &QueryId) -> PathBuf {
        self.config
            .queries_dir()
            .join(self.format.file_name(query_id.as_str()))
    }

    pub fn path_result(&self, result_id: &ResultId) -> PathBuf {
        self.config
            .results_dir()
            .join(self.format.file_name(result_id.as_str()))
    }

    /// Persist a query and the result it produced at `sample_time`
    ///
    /// `sample_time` defaults to the current local time. The query file is
    /// only written if no readable file exists yet for its id; the result
    /// file is always new. Returns both identifiers.
    pub fn save_query_and_result<Q, R>(
        &self,
        query: &Q,
        result: &R,
        sample_time: Option<NaiveDateTime>,
    ) -> StorageResult<(QueryId, ResultId)>
    where
        Q: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let _guard = self.span.enter();

        let sample_time = sample_time.unwrap_or_else(|| Local::now().naive_local());

        let query_text = codec::serialize(query)?;
        let query_id = QueryId::from_canonical_text(&query_text);
        let result_id = ResultId::new(sample_time, &query_id);

        tracing::debug!(result_id = %result_id, "Saving result");

        // Encode before creating anything so a bad result leaves no orphan
        let result_bytes = self.format.encode(&codec::serialize(result)?)?;

        let query_path = self.path_query(&query_id);
        if self.query_file_is_valid(&query_path) {
            tracing::trace!(query_id = %query_id, "Query already stored");
        } else {
            let query_bytes = self.format.encode(&query_text)?;
            if query_path.exists() {
                tracing::warn!(query_id = %query_id, "Replacing unreadable query file");
                publish(&query_path, &query_bytes, true)?;
            } else {
                match publish(&query_path, &query_bytes, false) {
                    Ok(()) => tracing::debug!(query_id = %query_id, "Stored new query"),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        tracing::debug!(query_id = %query_id, "Query stored concurrently, keeping first copy");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let result_path = self.path_result(&result_id);
        match publish(&result_path, &result_bytes, false) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(result_id = %result_id, "Result id already taken");
                return Err(StorageError::Collision(result_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        Ok((query_id, result_id))
    }

    /// Load a query document by id
    pub fn load_query(&self, query_id: &QueryId) -> StorageResult<Document> {
        let _guard = self.span.enter();

        let query = self.read_document("query", query_id.as_str(), &self.path_query(query_id))?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let compact = codec::serialize_compact(&query)?;
            tracing::debug!("{}: {}", query_id, compact);
        }

        Ok(query)
    }

    /// Load several query documents, preserving the order of `query_ids`
    pub fn load_queries(&self, query_ids: &[QueryId]) -> StorageResult<Vec<Document>> {
        query_ids.iter().map(|id| self.load_query(id)).collect()
    }

    /// Load a result and its query from a result id given as text
    ///
    /// The id is parsed and verified before any file is opened; a result id
    /// whose embedded query id does not check out fails with
    /// [`StorageError::Integrity`].
    pub fn load_result_id(&self, result_id: &str) -> StorageResult<QueryResult> {
        let result_id = ResultId::parse(result_id)?;
        self.load_result(&result_id)
    }

    /// Load a result and its query
    pub fn load_result(&self, result_id: &ResultId) -> StorageResult<QueryResult> {
        let _guard = self.span.enter();

        let query_id = result_id.query_id();
        let query = self.read_document("query", query_id.as_str(), &self.path_query(query_id))?;
        let result =
            self.read_document("result", result_id.as_str(), &self.path_result(result_id))?;

        tracing::debug!(result_id = %result_id, "Loaded result");

        Ok(QueryResult {
            query,
            result,
            sample_time: result_id.sample_time(),
            query_id: query_id.clone(),
            result_id: result_id.clone(),
        })
    }

    /// Ids of every stored query (unordered)
    pub fn find_query_ids(&self) -> StorageResult<Vec<QueryId>> {
        let _guard = self.span.enter();

        let names = self.list_ids(&self.config.queries_dir())?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match QueryId::parse(&name) {
                Ok(id) => ids.push(id),
                Err(_) => tracing::warn!(file = %name, "Skipping stray file in queries"),
            }
        }
        Ok(ids)
    }

    /// Ids of every stored result (unordered)
    pub fn find_result_ids(&self) -> StorageResult<Vec<ResultId>> {
        let _guard = self.span.enter();

        let names = self.list_ids(&self.config.results_dir())?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match ResultId::parse(&name) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(file = %name, error = %e, "Skipping stray file in results"),
            }
        }
        Ok(ids)
    }

    /// Recover the result id from the path of a result file
    pub fn parse_result_path(&self, path: &Path) -> StorageResult<ResultId> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StorageError::Format(format!("not a file name: {:?}", path)))?;

        let id = self.format.strip_extension(file_name).ok_or_else(|| {
            StorageError::Format(format!(
                "{:?} does not end in .{}",
                file_name,
                self.format.extension()
            ))
        })?;

        ResultId::parse(id)
    }

    /// Count stored queries and results
    pub fn stats(&self) -> StorageResult<StoreStats> {
        Ok(StoreStats {
            query_count: self.find_query_ids()?.len(),
            result_count: self.find_result_ids()?.len(),
            extension: self.format.extension(),
        })
    }

    /// File names in `dir` that carry this store's extension, extension removed
    fn list_ids(&self, dir: &Path) -> StorageResult<Vec<String>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if let Some(id) = self.format.strip_extension(file_name) {
                ids.push(id.to_string());
            }
        }

        Ok(ids)
    }

    /// Whether a query file exists and decodes to a document
    fn query_file_is_valid(&self, path: &Path) -> bool {
        let Ok(bytes) = fs::read(path) else {
            return false;
        };
        self.format
            .decode(&bytes)
            .and_then(|text| codec::deserialize::<Document>(&text))
            .is_ok()
    }

    fn read_document(&self, kind: &'static str, id: &str, path: &Path) -> StorageResult<Document> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound {
                    kind,
                    id: id.to_string(),
                    path: path.to_path_buf(),
                }
            } else {
                StorageError::Filesystem(e)
            }
        })?;

        let text = self.format.decode(&bytes)?;
        codec::deserialize(&text)
    }
}

/// Write `bytes` to a temporary file next to `path`, then rename it into place
///
/// Without `overwrite` the rename fails with `AlreadyExists` when `path` is
/// taken. On any failure the temporary file is removed and `path` is untouched.
fn publish(path: &Path, bytes: &[u8], overwrite: bool) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "path has no parent directory"))?;

    let mut file = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;

    if overwrite {
        file.persist(path).map_err(|e| e.error)?;
    } else {
        file.persist_noclobber(path).map_err(|e| e.error)?;
    }
    Ok(())
}
