//! High-water-mark variant family.
//!
//! Each variant records "how much has been processed" for one logical data
//! source: a scalar column maximum ([`column::ColumnHwm`]), a set of
//! already-read files ([`file_list::FileListHwm`]), the most recent file
//! modification instant ([`file_mtime::FileModifiedTimeHwm`]), or
//! per-partition offsets ([`key_value::KeyValueIntHwm`]).
//!
//! All variants share the same field contract: `name` is the unique identity
//! key; `entity` and `expression` are opaque identity tags; `description` is
//! free text; `modified_time` advances on every effective value mutation and
//! is excluded from equality and ordering. Mutating operations return `bool`
//! ("did the value change") so the no-op vs. mutated distinction is explicit
//! at every call site.

pub mod column;
pub mod file_list;
pub mod file_mtime;
pub mod key_value;
pub mod registry;

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HwmError;

use self::column::{ColumnDateHwm, ColumnDateTimeHwm, ColumnIntHwm};
use self::file_list::FileListHwm;
use self::file_mtime::FileModifiedTimeHwm;
use self::key_value::KeyValueIntHwm;

/// Discriminant of a concrete HWM variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwmKind {
    ColumnInt,
    ColumnDate,
    ColumnDateTime,
    FileList,
    FileModifiedTime,
    KeyValueInt,
}

impl HwmKind {
    /// All built-in variants, in registration order.
    pub const ALL: [Self; 6] = [
        Self::ColumnInt,
        Self::ColumnDate,
        Self::ColumnDateTime,
        Self::FileList,
        Self::FileModifiedTime,
        Self::KeyValueInt,
    ];

    /// The `type` tag this variant carries in its serialized form.
    #[must_use]
    pub fn wire_tag(self) -> &'static str {
        match self {
            Self::ColumnInt => "column_int",
            Self::ColumnDate => "column_date",
            Self::ColumnDateTime => "column_datetime",
            Self::FileList => "file_list",
            Self::FileModifiedTime => "file_modification_time",
            Self::KeyValueInt => "key_value_int",
        }
    }
}

impl fmt::Display for HwmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag())
    }
}

/// Tagged union over all HWM variants.
///
/// The serialized form is a flat record carrying the variant tag in a
/// `type` field: `{"type": "column_int", "name": ..., "value": ...}`.
/// Equality across variants is always `false`; ordering across variants is
/// an error (see [`Hwm::try_compare`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Hwm {
    #[serde(rename = "column_int")]
    ColumnInt(ColumnIntHwm),
    #[serde(rename = "column_date")]
    ColumnDate(ColumnDateHwm),
    #[serde(rename = "column_datetime")]
    ColumnDateTime(ColumnDateTimeHwm),
    #[serde(rename = "file_list")]
    FileList(FileListHwm),
    #[serde(rename = "file_modification_time")]
    FileModifiedTime(FileModifiedTimeHwm),
    #[serde(rename = "key_value_int")]
    KeyValueInt(KeyValueIntHwm),
}

impl Hwm {
    /// Unique checkpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ColumnInt(hwm) => hwm.name(),
            Self::ColumnDate(hwm) => hwm.name(),
            Self::ColumnDateTime(hwm) => hwm.name(),
            Self::FileList(hwm) => hwm.name(),
            Self::FileModifiedTime(hwm) => hwm.name(),
            Self::KeyValueInt(hwm) => hwm.name(),
        }
    }

    /// Variant discriminant.
    #[must_use]
    pub fn kind(&self) -> HwmKind {
        match self {
            Self::ColumnInt(_) => HwmKind::ColumnInt,
            Self::ColumnDate(_) => HwmKind::ColumnDate,
            Self::ColumnDateTime(_) => HwmKind::ColumnDateTime,
            Self::FileList(_) => HwmKind::FileList,
            Self::FileModifiedTime(_) => HwmKind::FileModifiedTime,
            Self::KeyValueInt(_) => HwmKind::KeyValueInt,
        }
    }

    /// When the value was last effectively mutated.
    #[must_use]
    pub fn modified_time(&self) -> DateTime<Utc> {
        match self {
            Self::ColumnInt(hwm) => hwm.modified_time(),
            Self::ColumnDate(hwm) => hwm.modified_time(),
            Self::ColumnDateTime(hwm) => hwm.modified_time(),
            Self::FileList(hwm) => hwm.modified_time(),
            Self::FileModifiedTime(hwm) => hwm.modified_time(),
            Self::KeyValueInt(hwm) => hwm.modified_time(),
        }
    }

    /// Serialize to the tagged record form.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::Codec`] if encoding fails.
    pub fn to_record(&self) -> Result<serde_json::Value, HwmError> {
        serde_json::to_value(self).map_err(HwmError::from)
    }

    /// Rehydrate from a tagged record, dispatching on its `type` tag
    /// through [`registry::HwmTypeRegistry`].
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::MissingTag`] if the record carries no string
    /// `type` field, [`HwmError::UnknownTag`] for an unregistered tag, or
    /// [`HwmError::Codec`] if field decoding fails.
    pub fn from_record(record: serde_json::Value) -> Result<Self, HwmError> {
        registry::HwmTypeRegistry::parse(record)
    }

    /// Order two watermarks by value.
    ///
    /// Defined only for same-typed scalar and modification-time watermarks
    /// sharing all identity fields except `value`.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::TypeMismatch`] for two different variants,
    /// [`HwmError::IdentityMismatch`] for same-typed watermarks tracking
    /// different sources, and [`HwmError::UnsupportedOrdering`] for the
    /// set- and map-valued variants, which have no ordering at all.
    pub fn try_compare(&self, other: &Self) -> Result<Ordering, HwmError> {
        match (self, other) {
            (Self::ColumnInt(a), Self::ColumnInt(b)) => a.try_compare(b),
            (Self::ColumnDate(a), Self::ColumnDate(b)) => a.try_compare(b),
            (Self::ColumnDateTime(a), Self::ColumnDateTime(b)) => a.try_compare(b),
            (Self::FileModifiedTime(a), Self::FileModifiedTime(b)) => a.try_compare(b),
            (Self::FileList(_), Self::FileList(_)) => Err(HwmError::UnsupportedOrdering {
                kind: HwmKind::FileList,
            }),
            (Self::KeyValueInt(_), Self::KeyValueInt(_)) => Err(HwmError::UnsupportedOrdering {
                kind: HwmKind::KeyValueInt,
            }),
            _ => Err(HwmError::TypeMismatch {
                left: self.kind(),
                right: other.kind(),
            }),
        }
    }
}

impl From<ColumnIntHwm> for Hwm {
    fn from(hwm: ColumnIntHwm) -> Self {
        Self::ColumnInt(hwm)
    }
}

impl From<ColumnDateHwm> for Hwm {
    fn from(hwm: ColumnDateHwm) -> Self {
        Self::ColumnDate(hwm)
    }
}

impl From<ColumnDateTimeHwm> for Hwm {
    fn from(hwm: ColumnDateTimeHwm) -> Self {
        Self::ColumnDateTime(hwm)
    }
}

impl From<FileListHwm> for Hwm {
    fn from(hwm: FileListHwm) -> Self {
        Self::FileList(hwm)
    }
}

impl From<FileModifiedTimeHwm> for Hwm {
    fn from(hwm: FileModifiedTimeHwm) -> Self {
        Self::FileModifiedTime(hwm)
    }
}

impl From<KeyValueIntHwm> for Hwm {
    fn from(hwm: KeyValueIntHwm) -> Self {
        Self::KeyValueInt(hwm)
    }
}

pub(crate) fn default_now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn de_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    if name.is_empty() {
        return Err(serde::de::Error::custom("HWM name cannot be empty"));
    }
    Ok(name)
}

/// Check a record's declared `type` tag against the statically requested
/// variant. Records without a tag pass (the caller already knows the type).
pub(crate) fn check_record_tag(
    record: &serde_json::Value,
    expected: HwmKind,
) -> Result<(), HwmError> {
    match record.get("type") {
        None => Ok(()),
        Some(serde_json::Value::String(tag)) => {
            let kind = registry::HwmTypeRegistry::resolve(tag)?;
            if kind == expected {
                Ok(())
            } else {
                Err(HwmError::TagMismatch {
                    expected,
                    found: tag.clone(),
                })
            }
        }
        Some(_) => Err(HwmError::MissingTag),
    }
}

/// Attach the variant's wire tag to a serialized record.
pub(crate) fn tag_record(mut record: serde_json::Value, kind: HwmKind) -> serde_json::Value {
    if let serde_json::Value::Object(map) = &mut record {
        map.insert(
            "type".to_string(),
            serde_json::Value::String(kind.wire_tag().to_string()),
        );
    }
    record
}
