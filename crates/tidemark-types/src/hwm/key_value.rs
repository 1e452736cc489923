//! Partition-offset watermark: a `key -> monotonic counter` map.
//!
//! The canonical use is broker offsets (partition number to last consumed
//! offset). Each key advances independently and never decreases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HwmError;
use crate::hwm::{check_record_tag, de_name, default_now, tag_record, HwmKind};

fn decode_offset_key(key: &str) -> Result<i64, String> {
    key.trim()
        .parse::<i64>()
        .map_err(|err| format!("offset key {key:?} is not an integer: {err}"))
}

fn decode_offset_value(raw: &serde_json::Value) -> Result<i64, String> {
    match raw {
        serde_json::Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| format!("offset {number} is not a whole number")),
        serde_json::Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|err| format!("offset {text:?} is not an integer: {err}")),
        other => Err(format!("expected an integer offset, got {other}")),
    }
}

fn de_offsets<'de, D>(deserializer: D) -> Result<BTreeMap<i64, i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(BTreeMap::new());
    };
    match raw {
        serde_json::Value::Null => Ok(BTreeMap::new()),
        serde_json::Value::Object(entries) => {
            let mut offsets = BTreeMap::new();
            for (key, value) in &entries {
                let key = decode_offset_key(key).map_err(serde::de::Error::custom)?;
                let value = decode_offset_value(value).map_err(serde::de::Error::custom)?;
                offsets.insert(key, value);
            }
            Ok(offsets)
        }
        other => Err(serde::de::Error::custom(format!(
            "expected an offset map, got {other}"
        ))),
    }
}

/// Per-partition offset watermark.
///
/// The map has replace-on-write semantics: [`update`](Self::update) builds
/// the merged map first and swaps it in only when at least one key actually
/// advanced, so a shared snapshot of `value` is never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueIntHwm {
    #[serde(deserialize_with = "de_name")]
    name: String,
    #[serde(default, deserialize_with = "de_offsets")]
    value: BTreeMap<i64, i64>,
    #[serde(default, alias = "topic")]
    entity: Option<String>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_now")]
    modified_time: DateTime<Utc>,
}

impl KeyValueIntHwm {
    pub(crate) const KIND: HwmKind = HwmKind::KeyValueInt;

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
            value: BTreeMap::new(),
            entity: None,
            expression: None,
            description: String::new(),
            modified_time: Utc::now(),
        })
    }

    /// Seed the offset map at construction time.
    #[must_use]
    pub fn with_offsets(mut self, offsets: impl IntoIterator<Item = (i64, i64)>) -> Self {
        self.value = offsets.into_iter().collect();
        self
    }

    /// Attach the source identity tag (e.g. a topic name).
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Attach the expression tag (e.g. `offset`).
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

    /// The offset map.
    #[must_use]
    pub fn value(&self) -> &BTreeMap<i64, i64> {
        &self.value
    }

    /// The offset recorded for `key`, if any.
    #[must_use]
    pub fn offset(&self, key: i64) -> Option<i64> {
        self.value.get(&key).copied()
    }

    /// Source identity tag.
    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
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

    /// When the map was last effectively mutated.
    #[must_use]
    pub fn modified_time(&self) -> DateTime<Utc> {
        self.modified_time
    }

    /// Whether `offset` for `key` is already covered: the key is present
    /// and its recorded offset is not smaller.
    #[must_use]
    pub fn covers(&self, key: i64, offset: i64) -> bool {
        self.value.get(&key).is_some_and(|current| offset <= *current)
    }

    /// Merge a batch of observed offsets: for every key in `observed`,
    /// keep the maximum of the current and observed offset; keys absent
    /// from `observed` are untouched. The whole map is replaced only when
    /// at least one key actually changed. Returns `true` in that case.
    pub fn update(&mut self, observed: impl IntoIterator<Item = (i64, i64)>) -> bool {
        let mut merged = self.value.clone();
        let mut changed = false;
        for (key, offset) in observed {
            match merged.get(&key) {
                Some(current) if *current >= offset => {}
                _ => {
                    merged.insert(key, offset);
                    changed = true;
                }
            }
        }
        if changed {
            self.value = merged;
            self.touch();
        }
        changed
    }

    /// Replace the map outright. Returns `true` if it changed.
    pub fn set_value(&mut self, value: BTreeMap<i64, i64>) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.touch();
        true
    }

    /// Clear the map. Returns `true` if it was non-empty.
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

    fn touch(&mut self) {
        self.modified_time = Utc::now();
    }
}

impl PartialEq for KeyValueIntHwm {
    // modified_time is volatile and deliberately excluded
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.entity == other.entity
            && self.expression == other.expression
            && self.description == other.description
    }
}

impl Eq for KeyValueIntHwm {}
