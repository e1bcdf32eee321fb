//! Cache entry identifiers and blob references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifier of one cache entry: the hash part of a store path basename.
///
/// A basename `<hash>-<name>` yields `<hash>`. The hash part must be a
/// non-empty run of word characters (alphanumerics or `_`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap an already-derived identifier without validation.
    ///
    /// Used for identifiers recovered from object keys, which are taken as-is.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from a store path basename (`<hash>-<name>`).
    pub fn from_basename(basename: &str) -> crate::Result<Self> {
        let (hash, _name) = basename.split_once('-').ok_or_else(|| {
            crate::Error::InvalidStorePath(format!("expected '<hash>-<name>', got '{basename}'"))
        })?;

        if hash.is_empty() {
            return Err(crate::Error::InvalidStorePath(format!(
                "empty hash part in '{basename}'"
            )));
        }

        if let Some(c) = hash.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
            return Err(crate::Error::InvalidStorePath(format!(
                "invalid character '{c}' in hash part of '{basename}'"
            )));
        }

        Ok(Self(hash.to_string()))
    }

    /// Derive the identifier from the basename of a full path.
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let basename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                crate::Error::InvalidStorePath(format!("no basename in '{}'", path.display()))
            })?;
        Self::from_basename(basename)
    }

    /// Recover an identifier from a narinfo object key, if the key has the suffix.
    pub fn from_narinfo_key(key: &str, suffix: &str) -> Option<Self> {
        key.strip_suffix(suffix)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_string()))
    }

    /// The object key of this entry's narinfo.
    pub fn narinfo_key(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }

    /// Get the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key of a NAR blob, as referenced by a narinfo `URL:` line.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({self})")
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
