//! Path value objects consumed by file-based watermarks.
//!
//! Both wrappers are purely syntactic: nothing here touches the filesystem.
//! Paths are stored normalized (single `/` separators, no empty or `.`
//! segments); `..` and `~` segments are rejected outright.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HwmError;

fn split_segments(raw: &str, original: &str) -> Result<Vec<String>, HwmError> {
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." || segment == "~" {
            return Err(HwmError::InvalidPath {
                path: original.to_string(),
                reason: "'..' and '~' segments are not allowed".to_string(),
            });
        }
        segments.push(segment.to_string());
    }
    Ok(segments)
}

/// A normalized path relative to some directory scope.
///
/// Cannot be empty and cannot start with `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Validate and normalize a relative path.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::InvalidPath`] if the path is empty, absolute, or
    /// contains `..` / `~` segments.
    pub fn new(raw: impl Into<String>) -> Result<Self, HwmError> {
        let raw = raw.into();
        if raw.starts_with('/') {
            return Err(HwmError::InvalidPath {
                path: raw,
                reason: "relative path cannot start with '/'".to_string(),
            });
        }
        let segments = split_segments(&raw, &raw)?;
        if segments.is_empty() {
            return Err(HwmError::InvalidPath {
                path: raw,
                reason: "relative path cannot be empty".to_string(),
            });
        }
        Ok(Self(segments.join("/")))
    }

    /// The normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = HwmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}

/// A normalized absolute path.
///
/// Must start with `/`; the filesystem root itself (`/`) is allowed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AbsolutePath(String);

impl AbsolutePath {
    /// Validate and normalize an absolute path.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::InvalidPath`] if the path does not start with `/`
    /// or contains `..` / `~` segments.
    pub fn new(raw: impl Into<String>) -> Result<Self, HwmError> {
        let raw = raw.into();
        if !raw.starts_with('/') {
            return Err(HwmError::InvalidPath {
                path: raw,
                reason: "absolute path must start with '/'".to_string(),
            });
        }
        let segments = split_segments(&raw, &raw)?;
        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// The normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a relative path, producing the absolute projection.
    #[must_use]
    pub fn join(&self, relative: &RelativePath) -> Self {
        if self.0 == "/" {
            Self(format!("/{}", relative.as_str()))
        } else {
            Self(format!("{}/{}", self.0, relative.as_str()))
        }
    }

    /// Express this path relative to `base`, or `None` if it does not
    /// resolve underneath `base`.
    #[must_use]
    pub fn relative_to(&self, base: &Self) -> Option<RelativePath> {
        let remainder = if base.0 == "/" {
            self.0.strip_prefix('/')?
        } else {
            let tail = self.0.strip_prefix(base.0.as_str())?;
            tail.strip_prefix('/')?
        };
        RelativePath::new(remainder).ok()
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AbsolutePath {
    type Error = HwmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AbsolutePath> for String {
    fn from(value: AbsolutePath) -> Self {
        value.0
    }
}
