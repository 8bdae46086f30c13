//! Canonical document codec
//!
//! Documents are rendered as JSON with object keys sorted at every level,
//! four-space indentation and non-ASCII text left unescaped. Because the
//! rendering is canonical, hashing it gives an identifier that depends only
//! on the content of a document, never on the order its fields were set.
//!
//! Timestamps (`chrono::NaiveDateTime`, `chrono::DateTime<Tz>`) go through
//! chrono's serde support and come out as ISO-8601 strings.
//!
//! NaN and infinite floats have no JSON form. serde_json would quietly write
//! them as `null`, so they are rejected with [`StorageError::Encoding`].

use crate::storage::error::{StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::ser::{self, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use std::fmt;

/// A stored query or result document
pub type Document = Value;

const INDENT: &[u8] = b"    ";

/// Render a document to canonical pretty-printed text
pub fn serialize<T: Serialize + ?Sized>(document: &T) -> StorageResult<String> {
    let value = to_canonical_value(document)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| StorageError::Encoding(e.to_string()))?;

    String::from_utf8(buf).map_err(|e| StorageError::Encoding(e.to_string()))
}

/// Render a document to canonical single-line text (for log output)
pub fn serialize_compact<T: Serialize + ?Sized>(document: &T) -> StorageResult<String> {
    let value = to_canonical_value(document)?;
    serde_json::to_string(&value).map_err(|e| StorageError::Encoding(e.to_string()))
}

/// Parse text produced by [`serialize`] (or any JSON text)
pub fn deserialize<T: DeserializeOwned>(text: &str) -> StorageResult<T> {
    Ok(serde_json::from_str(text)?)
}

/// SHA-1 hex digest of the canonical rendering of a document
pub fn content_hash<T: Serialize + ?Sized>(document: &T) -> StorageResult<String> {
    Ok(hash_text(&serialize(document)?))
}

/// SHA-1 hex digest of already-canonical text
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn to_canonical_value<T: Serialize + ?Sized>(document: &T) -> StorageResult<Value> {
    document
        .serialize(FiniteCheck)
        .map_err(|e| StorageError::Encoding(e.0))?;

    let value = serde_json::to_value(document).map_err(|e| StorageError::Encoding(e.to_string()))?;
    Ok(sort_keys(value))
}

/// Recursively sort object keys (must hold even with serde_json's `preserve_order`)
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[derive(Debug)]
struct CheckError(String);

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CheckError {}

impl ser::Error for CheckError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CheckError(msg.to_string())
    }
}

/// Walks a document without producing output, failing on non-finite floats
struct FiniteCheck;

impl FiniteCheck {
    fn float(value: f64) -> Result<(), CheckError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(CheckError(format!("{} cannot be represented in JSON", value)))
        }
    }
}

impl Serializer for FiniteCheck {
    type Ok = ();
    type Error = CheckError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, _: bool) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i8(self, _: i8) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i16(self, _: i16) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i32(self, _: i32) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i64(self, _: i64) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_i128(self, _: i128) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u8(self, _: u8) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u16(self, _: u16) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u32(self, _: u32) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u64(self, _: u64) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_u128(self, _: u128) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<(), CheckError> {
        Self::float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<(), CheckError> {
        Self::float(v)
    }

    fn serialize_char(self, _: char) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_str(self, _: &str) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_bytes(self, _: &[u8]) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_none(self) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), CheckError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<(), CheckError> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<(), CheckError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<(), CheckError> {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self, CheckError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), CheckError> {
        key.serialize(FiniteCheck)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> Result<(), CheckError> {
        value.serialize(FiniteCheck)
    }

    fn end(self) -> Result<(), CheckError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_keys_sorted_at_every_level() {
        let doc = json!({
            "zeta": 1,
            "alpha": {"y": true, "b": [{"d": 1, "c": 2}]},
        });

        let text = serialize(&doc).unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);

        let b = text.find("\"b\"").unwrap();
        let y = text.find("\"y\"").unwrap();
        assert!(b < y);

        let c = text.find("\"c\"").unwrap();
        let d = text.find("\"d\"").unwrap();
        assert!(c < d);
    }

    #[test]
    fn test_pretty_layout() {
        let text = serialize(&json!({"b": 2, "a": "x"})).unwrap();
        assert_eq!(text, "{\n    \"a\": \"x\",\n    \"b\": 2\n}");
    }

    #[test]
    fn test_compact_layout() {
        let text = serialize_compact(&json!({"b": 2, "a": [1, 2]})).unwrap();
        assert_eq!(text, r#"{"a":[1,2],"b":2}"#);
    }

    #[test]
    fn test_non_ascii_not_escaped() {
        let text = serialize(&json!({"name": "Zürich 東京"})).unwrap();
        assert!(text.contains("Zürich 東京"));
    }

    #[test]
    fn test_round_trip() {
        let doc = json!({
            "id": "test",
            "nested": {"list": [1, 2.5, null, "s"], "flag": false},
            "empty": {},
        });

        let text = serialize(&doc).unwrap();
        let back: Document = deserialize(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let mut first = Map::new();
        first.insert("query_str".to_string(), json!("some query string"));
        first.insert("id".to_string(), json!("test"));

        let mut second = Map::new();
        second.insert("id".to_string(), json!("test"));
        second.insert("query_str".to_string(), json!("some query string"));

        let h1 = content_hash(&Value::Object(first)).unwrap();
        let h2 = content_hash(&Value::Object(second)).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 40);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_differs_for_different_content() {
        let h1 = content_hash(&json!({"id": "a"})).unwrap();
        let h2 = content_hash(&json!({"id": "b"})).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_text_known_value() {
        // sha1("abc")
        assert_eq!(hash_text("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_timestamp_rendered_as_iso8601() {
        #[derive(Serialize)]
        struct Sample {
            at: chrono::NaiveDateTime,
        }

        let at = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap();
        let text = serialize(&Sample { at }).unwrap();
        assert!(text.contains("\"2024-03-05T14:07:09\""));
    }

    #[test]
    fn test_unsupported_value_is_encoding_error() {
        let mut doc = BTreeMap::new();
        doc.insert((1u8, 2u8), "tuple keys have no JSON form");

        let err = serialize(&doc).unwrap_err();
        assert!(matches!(err, StorageError::Encoding(_)));
    }

    #[test]
    fn test_non_finite_floats_are_encoding_errors() {
        #[derive(Serialize)]
        struct Reading {
            label: &'static str,
            values: Vec<f64>,
            single: Option<f32>,
        }

        let bad = [
            Reading { label: "nan", values: vec![1.0, f64::NAN], single: None },
            Reading { label: "inf", values: vec![f64::INFINITY], single: None },
            Reading { label: "-inf", values: vec![f64::NEG_INFINITY], single: None },
            Reading { label: "f32", values: vec![], single: Some(f32::NAN) },
        ];
        for reading in &bad {
            assert!(matches!(serialize(reading), Err(StorageError::Encoding(_))));
            assert!(matches!(serialize_compact(reading), Err(StorageError::Encoding(_))));
            assert!(matches!(content_hash(reading), Err(StorageError::Encoding(_))));
        }

        let mut keyed = BTreeMap::new();
        keyed.insert("x", f64::INFINITY);
        assert!(matches!(serialize(&keyed), Err(StorageError::Encoding(_))));
    }

    #[test]
    fn test_nan_and_null_do_not_share_a_hash() {
        #[derive(Serialize)]
        struct Sample {
            v: f64,
            w: Option<f64>,
        }

        assert!(content_hash(&Some(f64::NAN)).is_err());
        assert_eq!(serialize(&None::<f64>).unwrap(), "null");

        let finite = Sample { v: 0.25, w: None };
        assert_eq!(serialize_compact(&finite).unwrap(), r#"{"v":0.25,"w":null}"#);
    }

    #[test]
    fn test_malformed_text_is_decoding_error() {
        let err = deserialize::<Document>("{\"id\": ").unwrap_err();
        assert!(matches!(err, StorageError::Decoding(_)));
    }
}
