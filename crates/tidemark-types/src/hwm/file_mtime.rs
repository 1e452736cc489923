//! File modification-time watermark: the most recent mtime seen.
//!
//! Some filesystems round `mtime` to whole seconds or worse, which can make
//! a file created after a run indistinguishable from the last file of that
//! run. This variant is also wrong when file modification times can change
//! after a file was already handled.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HwmError;
use crate::hwm::{check_record_tag, de_name, default_now, tag_record, HwmKind};
use crate::path::AbsolutePath;

/// Interpret a naive timestamp as local wall-clock time.
fn naive_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(local) | LocalResult::Ambiguous(local, _) => {
            local.with_timezone(&Utc)
        }
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

fn coerce_timestamp(raw: &serde_json::Value) -> Result<DateTime<Utc>, String> {
    match raw {
        serde_json::Value::String(text) => {
            if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
                return Ok(aware.with_timezone(&Utc));
            }
            text.parse::<NaiveDateTime>()
                .map(naive_to_utc)
                .map_err(|err| format!("{text:?} is not an ISO-8601 timestamp: {err}"))
        }
        serde_json::Value::Number(number) => {
            // raw stat() mtimes arrive as epoch seconds
            let epoch = number
                .as_f64()
                .ok_or_else(|| format!("{number} is not a valid epoch timestamp"))?;
            DateTime::from_timestamp(
                epoch.trunc() as i64,
                (epoch.fract() * 1e9).abs() as u32,
            )
            .ok_or_else(|| format!("{number} is out of timestamp range"))
        }
        other => Err(format!("expected a timestamp, got {other}")),
    }
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => coerce_timestamp(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Watermark tracking the most recent file modification instant.
///
/// All comparisons happen in UTC; naive inputs are coerced to the local
/// zone first, so the watermark never mixes offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModifiedTimeHwm {
    #[serde(deserialize_with = "de_name")]
    name: String,
    #[serde(default, deserialize_with = "de_timestamp")]
    value: Option<DateTime<Utc>>,
    #[serde(default, alias = "directory")]
    entity: Option<AbsolutePath>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_now")]
    modified_time: DateTime<Utc>,
}

impl FileModifiedTimeHwm {
    pub(crate) const KIND: HwmKind = HwmKind::FileModifiedTime;

    /// Create an empty watermark (value unset).
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
            value: None,
            entity: None,
            expression: None,
            description: String::new(),
            modified_time: Utc::now(),
        })
    }

    /// Set the initial value.
    #[must_use]
    pub fn with_value(mut self, value: DateTime<Utc>) -> Self {
        self.value = Some(value);
        self
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

    /// Unique checkpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Most recent modification instant seen, if any.
    #[must_use]
    pub fn value(&self) -> Option<DateTime<Utc>> {
        self.value
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

    /// When the value was last effectively mutated.
    #[must_use]
    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    /// Whether the value is set.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Whether `candidate` is already covered: the value is set and is not
    /// older than `candidate`.
    #[must_use]
    pub fn covers(&self, candidate: DateTime<Utc>) -> bool {
        self.value.is_some_and(|current| current >= candidate)
    }

    /// Whether the file at `path` is already covered. Missing paths and
    /// non-regular files are never covered.
    #[must_use]
    pub fn covers_path(&self, path: &Path) -> bool {
        Self::path_mtime(path).is_some_and(|mtime| self.covers(mtime))
    }

    /// Advance to `observed` if it is newer than the current value.
    /// Returns `true` if the value advanced.
    pub fn update(&mut self, observed: DateTime<Utc>) -> bool {
        match self.value {
            Some(current) if current >= observed => false,
            _ => {
                self.value = Some(observed);
                self.touch();
                true
            }
        }
    }

    /// Advance to the modification time of the file at `path`. Missing
    /// paths and non-regular files are skipped.
    pub fn update_from_path(&mut self, path: &Path) -> bool {
        Self::path_mtime(path).is_some_and(|mtime| self.update(mtime))
    }

    /// Advance to the newest modification time across `paths`, skipping
    /// entries that are missing or not regular files.
    pub fn update_from_paths<I, P>(&mut self, paths: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let newest = paths
            .into_iter()
            .filter_map(|path| Self::path_mtime(path.as_ref()))
            .max();
        newest.is_some_and(|mtime| self.update(mtime))
    }

    /// Replace the value outright. Returns `true` if it changed.
    pub fn set_value(&mut self, value: Option<DateTime<Utc>>) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.touch();
        true
    }

    /// Replace the value from a raw serialized form (ISO-8601 string with
    /// or without offset, or epoch seconds).
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::InvalidValue`] when `raw` is not a usable
    /// timestamp; the watermark is left untouched.
    pub fn set_raw_value(&mut self, raw: &serde_json::Value) -> Result<bool, HwmError> {
        let value = match raw {
            serde_json::Value::Null => None,
            other => Some(coerce_timestamp(other).map_err(|reason| {
                HwmError::InvalidValue {
                    kind: Self::KIND,
                    reason,
                }
            })?),
        };
        Ok(self.set_value(value))
    }

    /// Clear the value back to unset. Returns `true` if it was set.
    pub fn reset(&mut self) -> bool {
        self.set_value(None)
    }

    /// Order two watermarks by value.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::IdentityMismatch`] when `name`, directory or
    /// `expression` differ.
    pub fn try_compare(&self, other: &Self) -> Result<Ordering, HwmError> {
        if self.name != other.name
            || self.entity != other.entity
            || self.expression != other.expression
        {
            return Err(HwmError::IdentityMismatch { kind: Self::KIND });
        }
        Ok(self.value.cmp(&other.value))
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

    fn path_mtime(path: &Path) -> Option<DateTime<Utc>> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }

    fn touch(&mut self) {
        self.modified_time = Utc::now();
    }
}

impl PartialEq for FileModifiedTimeHwm {
    // modified_time is volatile and deliberately excluded
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.entity == other.entity
            && self.expression == other.expression
            && self.description == other.description
    }
}

impl Eq for FileModifiedTimeHwm {}
