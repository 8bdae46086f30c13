//! Result Index - in-memory query → results view
//!
//! Built from one directory scan of a [`ResultStore`]. The index is a
//! snapshot: files written after [`ResultIndex::build`] are invisible until
//! the index is built again.

use crate::index::IndexStats;
use crate::storage::{Document, QueryId, ResultId, ResultStore, StorageError, StorageResult};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tracing::Span;

/// Read-only view of which results exist for which query
#[derive(Debug)]
pub struct ResultIndex<'a> {
    store: &'a ResultStore,
    query_ids: Vec<QueryId>,
    result_ids: Vec<ResultId>,
    /// query_id → sample times, in enumeration order
    dates: HashMap<QueryId, Vec<NaiveDateTime>>,
    /// query_id → result ids, in enumeration order
    results: HashMap<QueryId, Vec<ResultId>>,
    span: Span,
}

impl<'a> ResultIndex<'a> {
    /// Scan `store` once and build the index
    pub fn build(store: &'a ResultStore) -> StorageResult<Self> {
        let span = tracing::debug_span!(parent: store.span(), "result_index");
        let guard = span.enter();

        let query_ids = store.find_query_ids()?;
        let result_ids = store.find_result_ids()?;

        tracing::info!(
            "Discovered - Queries: {}; Results: {}",
            query_ids.len(),
            result_ids.len()
        );

        let mut dates: HashMap<QueryId, Vec<NaiveDateTime>> = HashMap::new();
        let mut results: HashMap<QueryId, Vec<ResultId>> = HashMap::new();

        for result_id in &result_ids {
            let query_id = result_id.query_id();
            dates
                .entry(query_id.clone())
                .or_default()
                .push(result_id.sample_time());
            results
                .entry(query_id.clone())
                .or_default()
                .push(result_id.clone());
        }

        drop(guard);

        Ok(Self {
            store,
            query_ids,
            result_ids,
            dates,
            results,
            span,
        })
    }

    pub fn store(&self) -> &ResultStore {
        self.store
    }

    /// Every query id found at build time (enumeration order)
    pub fn query_ids(&self) -> &[QueryId] {
        &self.query_ids
    }

    /// Every result id found at build time (enumeration order)
    pub fn result_ids(&self) -> &[ResultId] {
        &self.result_ids
    }

    /// Ids of the queries whose document satisfies `predicate`
    ///
    /// `queries` must line up with [`Self::query_ids`], one document per id;
    /// a list of any other length fails with [`StorageError::Format`]. When
    /// `None`, every known query is loaded from the store. The loaded (or
    /// supplied) list is returned alongside the matches so callers can reuse it.
    pub fn filter_query_ids<F>(
        &self,
        mut predicate: F,
        queries: Option<Vec<Document>>,
    ) -> StorageResult<(Vec<QueryId>, Vec<Document>)>
    where
        F: FnMut(&Document) -> bool,
    {
        let _guard = self.span.enter();

        let queries = match queries {
            Some(queries) if queries.len() != self.query_ids.len() => {
                return Err(StorageError::Format(format!(
                    "got {} query documents for {} query ids",
                    queries.len(),
                    self.query_ids.len()
                )));
            }
            Some(queries) => queries,
            None => self.store.load_queries(&self.query_ids)?,
        };

        let matching: Vec<QueryId> = self
            .query_ids
            .iter()
            .zip(&queries)
            .filter(|(_, query)| predicate(*query))
            .map(|(id, _)| id.clone())
            .collect();

        tracing::info!("Found {} queries for given filter", matching.len());

        Ok((matching, queries))
    }

    /// Result ids of all given queries, concatenated in request order
    ///
    /// Queries without results contribute nothing.
    pub fn get_result_ids_for_queries(&self, query_ids: &[QueryId]) -> Vec<ResultId> {
        let _guard = self.span.enter();

        let result_ids: Vec<ResultId> = query_ids
            .iter()
            .filter_map(|id| self.results.get(id))
            .flatten()
            .cloned()
            .collect();

        tracing::debug!("Found a total of {} results", result_ids.len());

        result_ids
    }

    /// Sample times recorded for a query (enumeration order)
    pub fn sample_times(&self, query_id: &QueryId) -> &[NaiveDateTime] {
        self.dates.get(query_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Results of a query, oldest first
    pub fn history(&self, query_id: &QueryId) -> Vec<(NaiveDateTime, &ResultId)> {
        let mut history: Vec<(NaiveDateTime, &ResultId)> = self
            .results
            .get(query_id)
            .map(|ids| ids.iter().map(|id| (id.sample_time(), id)).collect())
            .unwrap_or_default();

        history.sort();
        history
    }

    /// Most recent result of a query
    pub fn latest(&self, query_id: &QueryId) -> Option<&ResultId> {
        self.results
            .get(query_id)?
            .iter()
            .max_by_key(|id| id.sample_time())
    }

    pub fn result_count(&self, query_id: &QueryId) -> usize {
        self.results.get(query_id).map(Vec::len).unwrap_or(0)
    }

    pub fn stats(&self) -> IndexStats {
        let orphan_queries = self
            .query_ids
            .iter()
            .filter(|id| !self.results.contains_key(*id))
            .count();
        let dangling_results = self
            .results
            .iter()
            .filter(|(id, _)| !self.query_ids.contains(*id))
            .map(|(_, ids)| ids.len())
            .sum::<usize>();

        IndexStats {
            queries: self.query_ids.len(),
            results: self.result_ids.len(),
            queries_with_results: self.results.len(),
            orphan_queries,
            dangling_results,
        }
    }
}
