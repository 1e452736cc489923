//! File-set watermark: the set of already-read files under a directory.
//!
//! Only file names are tracked, never content, so this variant is wrong for
//! sources whose files change between runs.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HwmError;
use crate::hwm::{check_record_tag, de_name, default_now, tag_record, HwmKind};
use crate::path::{AbsolutePath, RelativePath};

/// Set-of-files watermark scoped to an optional directory.
///
/// Members are stored relative to the directory; absolute inputs are
/// accepted only when they resolve underneath it. Set algebra goes through
/// [`add`](Self::add) / [`remove`](Self::remove) / [`update`](Self::update);
/// a union or difference that changes nothing is a no-op that leaves
/// `modified_time` untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListHwm {
    #[serde(deserialize_with = "de_name")]
    name: String,
    #[serde(default)]
    value: BTreeSet<RelativePath>,
    #[serde(default, alias = "directory")]
    entity: Option<AbsolutePath>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_now")]
    modified_time: DateTime<Utc>,
}

impl FileListHwm {
    pub(crate) const KIND: HwmKind = HwmKind::FileList;

    /// Create an empty watermark.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::EmptyName`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, HwmError> {
        let name = name.into();
        if name.is_empty() {
            return Err(HwmError::EmptyName);
        }
        Ok(Self {
            name,
            value: BTreeSet::new(),
            entity: None,
            expression: None,
            description: String::new(),
            modified_time: Utc::now(),
        })
    }

    /// Scope the watermark to a directory.
    #[must_use]
    pub fn with_directory(mut self, directory: AbsolutePath) -> Self {
        self.entity = Some(directory);
        self
    }

    /// Attach the expression tag.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Attach a free-text description (not part of identity).
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Seed the set at construction time.
    #[must_use]
    pub fn with_files(mut self, files: impl IntoIterator<Item = RelativePath>) -> Self {
        self.value = files.into_iter().collect();
        self
    }

    /// Unique checkpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The set of already-read files, relative to the directory.
    #[must_use]
    pub fn value(&self) -> &BTreeSet<RelativePath> {
        &self.value
    }

    /// Directory scope, if set.
    #[must_use]
    pub fn directory(&self) -> Option<&AbsolutePath> {
        self.entity.as_ref()
    }

    /// Expression tag.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// When the set was last effectively mutated.
    #[must_use]
    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    /// Whether `path` is already covered. Relative inputs are tested
    /// against the set directly; absolute inputs are tested through the
    /// directory-qualified projection. Invalid or out-of-scope paths are
    /// simply not covered.
    #[must_use]
    pub fn covers(&self, path: &str) -> bool {
        if path.starts_with('/') {
            let Some(directory) = &self.entity else {
                return false;
            };
            AbsolutePath::new(path)
                .ok()
                .and_then(|absolute| absolute.relative_to(directory))
                .is_some_and(|relative| self.value.contains(&relative))
        } else {
            RelativePath::new(path).is_ok_and(|relative| self.value.contains(&relative))
        }
    }

    /// Add one path to the set. Returns `true` if the set grew;
    /// `modified_time` advances only in that case.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::InvalidPath`] for syntactically invalid paths and
    /// [`HwmError::PathOutsideDirectory`] for absolute paths that do not
    /// resolve underneath the directory.
    pub fn add(&mut self, path: &str) -> Result<bool, HwmError> {
        let relative = self.to_relative(path)?;
        if self.value.insert(relative) {
            self.touch();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Remove one path from the set. Returns `true` if the set shrank.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`add`](Self::add).
    pub fn remove(&mut self, path: &str) -> Result<bool, HwmError> {
        let relative = self.to_relative(path)?;
        if self.value.remove(&relative) {
            self.touch();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Union a batch of observed paths into the set. Validates every path
    /// before touching the set, so a failed call changes nothing.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`add`](Self::add).
    pub fn update<I, S>(&mut self, paths: I) -> Result<bool, HwmError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut incoming = Vec::new();
        for path in paths {
            incoming.push(self.to_relative(path.as_ref())?);
        }
        let mut changed = false;
        for relative in incoming {
            changed |= self.value.insert(relative);
        }
        if changed {
            self.touch();
        }
        Ok(changed)
    }

    /// Replace the set outright. Returns `true` if it changed.
    pub fn set_value(&mut self, value: BTreeSet<RelativePath>) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.touch();
        true
    }

    /// Clear the set. Returns `true` if it was non-empty.
    pub fn reset(&mut self) -> bool {
        if self.value.is_empty() {
            return false;
        }
        self.value.clear();
        self.touch();
        true
    }

    /// Serialize to the tagged record form.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::Codec`] if encoding fails.
    pub fn to_record(&self) -> Result<serde_json::Value, HwmError> {
        Ok(tag_record(serde_json::to_value(self)?, Self::KIND))
    }

    /// Rehydrate from a record, rejecting records whose declared `type`
    /// resolves to a different variant.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::TagMismatch`] on a foreign `type` tag and
    /// [`HwmError::Codec`] if field decoding fails.
    pub fn from_record(record: serde_json::Value) -> Result<Self, HwmError> {
        check_record_tag(&record, Self::KIND)?;
        serde_json::from_value(record).map_err(HwmError::from)
    }

    fn to_relative(&self, path: &str) -> Result<RelativePath, HwmError> {
        if path.starts_with('/') {
            let absolute = AbsolutePath::new(path)?;
            let Some(directory) = &self.entity else {
                return Err(HwmError::InvalidPath {
                    path: path.to_string(),
                    reason: "absolute path given but watermark has no directory".to_string(),
                });
            };
            absolute
                .relative_to(directory)
                .ok_or_else(|| HwmError::PathOutsideDirectory {
                    path: path.to_string(),
                    directory: directory.to_string(),
                })
        } else {
            RelativePath::new(path)
        }
    }

    fn touch(&mut self) {
        self.modified_time = Utc::now();
    }
}

impl PartialEq for FileListHwm {
    // modified_time is volatile and deliberately excluded
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.entity == other.entity
            && self.expression == other.expression
            && self.description == other.description
    }
}

impl Eq for FileListHwm {}
