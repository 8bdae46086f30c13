//! On-disk file formats
//!
//! A store picks one [`FileFormat`] when it is opened and uses it for every
//! file it reads or writes. The format only decides the file extension and
//! the byte transform around the canonical text; identifiers never depend
//! on it.

use crate::storage::error::{StorageError, StorageResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt::Debug;
use std::io::{Read, Write};

/// Byte-level encoding of a stored document
pub trait FileFormat: Debug + Send + Sync {
    /// Extension appended to identifiers, without the leading dot
    fn extension(&self) -> &'static str;

    /// Turn canonical UTF-8 text into the bytes written to disk
    fn encode(&self, text: &str) -> StorageResult<Vec<u8>>;

    /// Recover the UTF-8 text from bytes read from disk
    fn decode(&self, bytes: &[u8]) -> StorageResult<String>;

    /// `<id>.<extension>`
    fn file_name(&self, id: &str) -> String {
        format!("{}.{}", id, self.extension())
    }

    /// Strip `.<extension>` from a file name, `None` if it does not carry it
    fn strip_extension<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        file_name
            .strip_suffix(self.extension())
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|id| !id.is_empty())
    }
}

/// Plain UTF-8 JSON files (`.json`)
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainJson;

impl FileFormat for PlainJson {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn encode(&self, text: &str) -> StorageResult<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> StorageResult<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| StorageError::Decoding(format!("invalid UTF-8: {}", e)))
    }
}

/// Gzip-compressed JSON files (`.json.gz`)
#[derive(Debug, Clone, Copy)]
pub struct GzipJson {
    level: Compression,
}

impl GzipJson {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for GzipJson {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl FileFormat for GzipJson {
    fn extension(&self) -> &'static str {
        "json.gz"
    }

    fn encode(&self, text: &str) -> StorageResult<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(text.as_bytes())?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, bytes: &[u8]) -> StorageResult<String> {
        let mut decoder = GzDecoder::new(bytes);
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|e| StorageError::Decoding(format!("gzip stream: {}", e)))?;
        Ok(text)
    }
}

/// Select the format for a store
pub fn select_format(compress: bool) -> Box<dyn FileFormat> {
    if compress {
        Box::new(GzipJson::default())
    } else {
        Box::new(PlainJson)
    }
}
