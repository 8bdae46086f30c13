//! Identifier scheme
//!
//! - `QueryId`: 40 lowercase hex chars, the SHA-1 of a query's canonical text
//! - `ResultId`: `YYYYMMDD_HHMMSS_<query id>`, the capture second plus the query
//!
//! Result ids for one query sort lexicographically in capture order.

use crate::storage::codec;
use crate::storage::error::{StorageError, StorageResult};
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// strftime pattern of the timestamp prefix of a result id
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Length of a rendered timestamp (`YYYYMMDD_HHMMSS`)
pub const TIMESTAMP_LEN: usize = 15;

/// Length of a hex-encoded SHA-1 digest
pub const QUERY_ID_LEN: usize = 40;

/// Content-derived identifier of a query document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueryId(String);

impl QueryId {
    /// Derive the identifier of a query document from its content
    pub fn derive<T: Serialize + ?Sized>(query: &T) -> StorageResult<Self> {
        Ok(Self(codec::content_hash(query)?))
    }

    /// Identifier of already-canonical query text
    pub(crate) fn from_canonical_text(text: &str) -> Self {
        Self(codec::hash_text(text))
    }

    /// Validate an identifier supplied as text
    pub fn parse(text: &str) -> StorageResult<Self> {
        if Self::is_well_formed(text) {
            Ok(Self(text.to_string()))
        } else {
            Err(StorageError::Format(format!(
                "query id must be {} lowercase hex chars, got {:?}",
                QUERY_ID_LEN, text
            )))
        }
    }

    pub fn is_well_formed(text: &str) -> bool {
        text.len() == QUERY_ID_LEN
            && text
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for QueryId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for QueryId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<QueryId> for String {
    fn from(id: QueryId) -> Self {
        id.0
    }
}

/// Render a sample time as `YYYYMMDD_HHMMSS`
pub fn format_timestamp(sample_time: NaiveDateTime) -> String {
    sample_time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse `YYYYMMDD_HHMMSS`; anything but an exact match is rejected
pub fn parse_timestamp(text: &str) -> StorageResult<NaiveDateTime> {
    let bytes = text.as_bytes();
    let shape_ok = bytes.len() == TIMESTAMP_LEN
        && bytes.iter().enumerate().all(|(i, b)| {
            if i == 8 {
                *b == b'_'
            } else {
                b.is_ascii_digit()
            }
        });

    if !shape_ok {
        return Err(StorageError::Format(format!(
            "timestamp must match YYYYMMDD_HHMMSS, got {:?}",
            text
        )));
    }

    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|e| StorageError::Format(format!("invalid timestamp {:?}: {}", text, e)))
}

/// Split a result id into its sample time and the raw query-id remainder
///
/// The remainder is returned verbatim; it is not validated here.
pub fn parse_result_id(text: &str) -> StorageResult<(NaiveDateTime, &str)> {
    let mut fields = text.splitn(3, '_');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(date), Some(time), Some(query_id)) => {
            let sample_time = parse_timestamp(&text[..date.len() + 1 + time.len()])?;
            Ok((sample_time, query_id))
        }
        _ => Err(StorageError::Format(format!(
            "result id needs date, time and query id fields: {:?}",
            text
        ))),
    }
}

/// Identifier of one captured result: capture second plus query id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResultId {
    text: String,
    sample_time: NaiveDateTime,
    query_id: QueryId,
}

impl ResultId {
    /// Build the id for a result captured at `sample_time` (sub-seconds dropped)
    pub fn new(sample_time: NaiveDateTime, query_id: &QueryId) -> Self {
        let sample_time = sample_time.trunc_subsecs(0);
        Self {
            text: format!("{}_{}", format_timestamp(sample_time), query_id),
            sample_time,
            query_id: query_id.clone(),
        }
    }

    /// Parse and verify a result id supplied as text
    ///
    /// A structurally broken id is a `Format` error. An id whose embedded
    /// query id is not a canonical digest, or which does not re-render to
    /// exactly the same text, is an `Integrity` error.
    pub fn parse(text: &str) -> StorageResult<Self> {
        let (sample_time, embedded) = parse_result_id(text)?;

        let query_id = QueryId::parse(embedded)
            .map_err(|_| StorageError::Integrity(text.to_string()))?;

        let rebuilt = Self::new(sample_time, &query_id);
        if rebuilt.text != text {
            return Err(StorageError::Integrity(text.to_string()));
        }

        Ok(rebuilt)
    }

    pub fn sample_time(&self) -> NaiveDateTime {
        self.sample_time
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for ResultId {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl FromStr for ResultId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResultId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResultId> for String {
    fn from(id: ResultId) -> Self {
        id.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    fn sample_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn query_id() -> QueryId {
        QueryId::derive(&json!({"id": "test", "query_str": "some query string"})).unwrap()
    }

    #[test]
    fn test_format_timestamp_zero_padded() {
        assert_eq!(format_timestamp(sample_time()), "20240102_030405");
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let parsed = parse_timestamp("20240102_030405").unwrap();
        assert_eq!(parsed, sample_time());
    }

    #[test]
    fn test_parse_timestamp_rejects_near_misses() {
        for bad in [
            "2024012_030405",
            "20240102-030405",
            "20240102_03040",
            "20240102_0304055",
            "20241302_030405",
            "2024o102_030405",
            "",
        ] {
            let err = parse_timestamp(bad).unwrap_err();
            assert!(matches!(err, StorageError::Format(_)), "{:?}", bad);
        }
    }

    #[test]
    fn test_query_id_derive_is_idempotent() {
        assert_eq!(query_id(), query_id());
        assert!(QueryId::is_well_formed(query_id().as_str()));
    }

    #[test]
    fn test_query_id_parse_rejects_bad_text() {
        assert!(QueryId::parse("abc").is_err());
        assert!(QueryId::parse(&"A".repeat(QUERY_ID_LEN)).is_err());
        assert!(QueryId::parse(&"a".repeat(QUERY_ID_LEN)).is_ok());
    }

    #[test]
    fn test_result_id_layout() {
        let id = ResultId::new(sample_time(), &query_id());
        assert_eq!(id.as_str(), format!("20240102_030405_{}", query_id()));
    }

    #[test]
    fn test_result_id_round_trip() {
        let id = ResultId::new(sample_time(), &query_id());

        let (time, raw) = parse_result_id(id.as_str()).unwrap();
        assert_eq!(time, sample_time());
        assert_eq!(raw, query_id().as_str());

        let parsed = ResultId::parse(id.as_str()).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.sample_time(), sample_time());
        assert_eq!(parsed.query_id(), &query_id());
    }

    #[test]
    fn test_result_id_drops_subseconds() {
        let precise = sample_time() + Duration::milliseconds(750);
        let id = ResultId::new(precise, &query_id());
        assert_eq!(id.sample_time(), sample_time());
    }

    #[test]
    fn test_result_ids_sort_chronologically() {
        let qid = query_id();
        let earlier = ResultId::new(sample_time(), &qid);
        let later = ResultId::new(sample_time() + Duration::seconds(1), &qid);
        let much_later = ResultId::new(sample_time() + Duration::days(40), &qid);

        let mut ids = vec![much_later.clone(), earlier.clone(), later.clone()];
        ids.sort();
        assert_eq!(ids, vec![earlier, later, much_later]);
    }

    #[test]
    fn test_parse_result_id_too_few_fields() {
        let err = parse_result_id("20240102_030405").unwrap_err();
        assert!(matches!(err, StorageError::Format(_)));

        let err = ResultId::parse("nounderscores").unwrap_err();
        assert!(matches!(err, StorageError::Format(_)));
    }

    #[test]
    fn test_parse_result_id_keeps_remainder_verbatim() {
        let (_, raw) = parse_result_id("20240102_030405_abc_def").unwrap();
        assert_eq!(raw, "abc_def");
    }

    #[test]
    fn test_tampered_query_component_is_integrity_error() {
        let tampered = format!("20240102_030405_{}", query_id().as_str().to_uppercase());
        let err = ResultId::parse(&tampered).unwrap_err();
        assert!(matches!(err, StorageError::Integrity(_)));

        let truncated = format!("20240102_030405_{}", &query_id().as_str()[1..]);
        let err = ResultId::parse(&truncated).unwrap_err();
        assert!(matches!(err, StorageError::Integrity(_)));
    }

    #[test]
    fn test_serde_as_plain_strings() {
        let id = ResultId::new(sample_time(), &query_id());
        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, format!("\"{}\"", id));

        let decoded: ResultId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, id);

        assert!(serde_json::from_str::<QueryId>("\"not-a-digest\"").is_err());
    }
}
