//! Parsing of the `Key: Value` text records served by a binary cache.
//!
//! Two record kinds matter for garbage collection: the `nix-cache-info`
//! descriptor at the root of the cache, and one narinfo per cache entry.
//! Only `StoreDir` and `URL` are read; every other key is carried along
//! unvalidated.

use crate::store_path::BlobRef;
use std::path::PathBuf;

/// A parsed `Key: Value` record, fields kept in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Parse a record. Blank lines are skipped; any other line must be `Key: Value`.
    ///
    /// A key with nothing after the colon (`References: ` is common in
    /// narinfos) has an empty value.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut fields = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = match line.split_once(": ") {
                Some(pair) => pair,
                None => line
                    .strip_suffix(':')
                    .map(|key| (key, ""))
                    .ok_or_else(|| {
                        format!("line {}: expected 'Key: Value', got '{line}'", index + 1)
                    })?,
            };

            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(format!("line {}: invalid key '{key}'", index + 1));
            }

            fields.push((key.to_string(), value.trim().to_string()));
        }

        Ok(Self { fields })
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The part of a narinfo that garbage collection needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarInfo {
    /// Key of the NAR blob this narinfo points at.
    pub url: BlobRef,
}

impl NarInfo {
    /// Parse from narinfo text format. A missing or empty `URL` is an error.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let record = Record::parse(text).map_err(crate::Error::NarInfoParse)?;

        let url = record
            .get("URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| crate::Error::NarInfoParse("missing URL".to_string()))?;

        Ok(Self {
            url: BlobRef::new(url),
        })
    }
}

/// The `nix-cache-info` descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheInfo {
    /// Store directory the cached paths live under (usually `/nix/store`).
    pub store_dir: PathBuf,
}

impl CacheInfo {
    /// Parse from `nix-cache-info` text. `StoreDir` is required.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let record = Record::parse(text).map_err(crate::Error::CacheInfoParse)?;

        let store_dir = record
            .get("StoreDir")
            .filter(|dir| !dir.is_empty())
            .ok_or_else(|| crate::Error::CacheInfoParse("missing StoreDir".to_string()))?;

        Ok(Self {
            store_dir: PathBuf::from(store_dir),
        })
    }
}
