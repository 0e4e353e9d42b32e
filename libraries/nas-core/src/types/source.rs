//! Playable source locators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use url::Url;

/// Where a track's audio can be read from
///
/// Wraps the locator string exactly as the catalog or library produced it.
/// Backends receive it unchanged; `kind()` is only a hint for adapters that
/// open local files differently from network streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocator(String);

/// Classification of a [`SourceLocator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    /// Absolute filesystem path, or a `file://` / `content://` URI
    Local,

    /// Any other URI (http, https, smb, ...)
    Remote,

    /// Neither an absolute path nor a parseable URI
    Unrecognized,
}

impl SourceLocator {
    /// Wrap a locator string
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// The locator exactly as received
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the locator
    pub fn kind(&self) -> LocatorKind {
        if self.0.starts_with('/') || Path::new(&self.0).is_absolute() {
            return LocatorKind::Local;
        }

        match Url::parse(&self.0) {
            // Windows drive letters parse as one-letter schemes
            Ok(url) if url.scheme().len() == 1 => LocatorKind::Local,
            Ok(url) if matches!(url.scheme(), "file" | "content") => LocatorKind::Local,
            Ok(_) => LocatorKind::Remote,
            Err(_) => LocatorKind::Unrecognized,
        }
    }

    /// Check if the locator points at local storage
    pub fn is_local(&self) -> bool {
        self.kind() == LocatorKind::Local
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceLocator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceLocator {
    fn from(value: String) -> Self {
        Self(value)
    }
}
