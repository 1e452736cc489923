//! Scalar column watermarks: the largest column value seen so far.
//!
//! Used for `WHERE col > :hwm` incremental extraction. The value only moves
//! forward through [`ColumnHwm::update`]; feeding an already-covered value
//! back in is a no-op that leaves `modified_time` untouched.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::HwmError;
use crate::hwm::{check_record_tag, de_name, default_now, tag_record, HwmKind};

/// Scalar payload of a [`ColumnHwm`].
///
/// Implementations define how raw serialized values decode and what one
/// unit of [`ColumnHwm::advance`] means: integer steps for integers, days
/// for dates, seconds for datetimes.
pub trait ColumnScalar:
    Clone + fmt::Debug + PartialEq + Ord + Serialize + DeserializeOwned
{
    /// Variant discriminant for registry lookups and error reporting.
    const KIND: HwmKind;

    /// Decode a raw serialized value, accepting the lenient historic forms
    /// (numbers carried as strings, ISO-8601 date/datetime strings).
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the raw value cannot represent
    /// this scalar.
    fn decode(raw: &serde_json::Value) -> Result<Self, String>;

    /// Shift by `delta` units, or `None` on overflow.
    #[must_use]
    fn shift(&self, delta: i64) -> Option<Self>;
}

impl ColumnScalar for i64 {
    const KIND: HwmKind = HwmKind::ColumnInt;

    fn decode(raw: &serde_json::Value) -> Result<Self, String> {
        match raw {
            serde_json::Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    return Ok(int);
                }
                // accept whole-valued floats ("1.0" in older stored records)
                match number.as_f64() {
                    Some(float) if float.fract() == 0.0 && float.abs() < 9.2e18 => Ok(float as i64),
                    _ => Err(format!("{number} is not a whole number")),
                }
            }
            serde_json::Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|err| format!("{text:?} is not an integer: {err}")),
            other => Err(format!("expected an integer, got {other}")),
        }
    }

    fn shift(&self, delta: i64) -> Option<Self> {
        self.checked_add(delta)
    }
}

impl ColumnScalar for NaiveDate {
    const KIND: HwmKind = HwmKind::ColumnDate;

    fn decode(raw: &serde_json::Value) -> Result<Self, String> {
        match raw {
            serde_json::Value::String(text) => text
                .parse::<NaiveDate>()
                .map_err(|err| format!("{text:?} is not an ISO-8601 date: {err}")),
            other => Err(format!("expected an ISO-8601 date string, got {other}")),
        }
    }

    fn shift(&self, delta: i64) -> Option<Self> {
        Duration::try_days(delta).and_then(|days| self.checked_add_signed(days))
    }
}

impl ColumnScalar for NaiveDateTime {
    const KIND: HwmKind = HwmKind::ColumnDateTime;

    fn decode(raw: &serde_json::Value) -> Result<Self, String> {
        match raw {
            serde_json::Value::String(text) => text
                .parse::<NaiveDateTime>()
                .map_err(|err| format!("{text:?} is not an ISO-8601 datetime: {err}")),
            other => Err(format!("expected an ISO-8601 datetime string, got {other}")),
        }
    }

    fn shift(&self, delta: i64) -> Option<Self> {
        Duration::try_seconds(delta).and_then(|seconds| self.checked_add_signed(seconds))
    }
}

fn de_scalar<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: ColumnScalar,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        // older stored records spell an unset value as the string "null"
        Some(serde_json::Value::String(text)) if text == "null" => Ok(None),
        Some(value) => T::decode(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Scalar-ordered column watermark.
///
/// Monotonic: `update` keeps the maximum of the current and observed value
/// and never decreases. An unset value covers nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: ColumnScalar")]
pub struct ColumnHwm<T: ColumnScalar> {
    #[serde(deserialize_with = "de_name")]
    name: String,
    #[serde(default, deserialize_with = "de_scalar")]
    value: Option<T>,
    #[serde(default, alias = "source")]
    entity: Option<String>,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_now")]
    modified_time: DateTime<Utc>,
}

/// Integer column watermark.
pub type ColumnIntHwm = ColumnHwm<i64>;

/// Date column watermark; `advance`/`retreat` move in whole days.
pub type ColumnDateHwm = ColumnHwm<NaiveDate>;

/// Datetime column watermark; `advance`/`retreat` move in whole seconds.
pub type ColumnDateTimeHwm = ColumnHwm<NaiveDateTime>;

impl<T: ColumnScalar> ColumnHwm<T> {
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
    pub fn with_value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach the source identity tag (e.g. a table name).
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Attach the expression tag (e.g. a column name or `CAST(...)`).
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

    /// Current value, if set.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
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

    /// Whether `candidate` is already covered: the value is set and
    /// `candidate` does not exceed it.
    #[must_use]
    pub fn covers(&self, candidate: &T) -> bool {
        self.value
            .as_ref()
            .is_some_and(|current| candidate <= current)
    }

    /// Replace the value outright. Returns `true` if the value changed;
    /// `modified_time` advances only in that case.
    pub fn set_value(&mut self, value: Option<T>) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.touch();
        true
    }

    /// Replace the value from a raw serialized form, validating it against
    /// this variant's value rules.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::InvalidValue`] when `raw` cannot represent this
    /// scalar; the watermark is left untouched.
    pub fn set_raw_value(&mut self, raw: &serde_json::Value) -> Result<bool, HwmError> {
        let value = match raw {
            serde_json::Value::Null => None,
            other => Some(T::decode(other).map_err(|reason| HwmError::InvalidValue {
                kind: T::KIND,
                reason,
            })?),
        };
        Ok(self.set_value(value))
    }

    /// Monotonic merge: keep the maximum of the current and observed value.
    /// Returns `true` if the value advanced.
    pub fn update(&mut self, observed: T) -> bool {
        match &self.value {
            Some(current) if *current >= observed => false,
            _ => {
                self.value = Some(observed);
                self.touch();
                true
            }
        }
    }

    /// Clear the value back to unset. Returns `true` if it was set.
    pub fn reset(&mut self) -> bool {
        self.set_value(None)
    }

    /// A copy shifted forward by `delta` units. A zero delta returns an
    /// unchanged copy (same `modified_time`).
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::UnsetValue`] if the value is unset and
    /// [`HwmError::InvalidValue`] if the shift overflows.
    pub fn advance(&self, delta: i64) -> Result<Self, HwmError> {
        let Some(current) = &self.value else {
            return Err(HwmError::UnsetValue { kind: T::KIND });
        };
        if delta == 0 {
            return Ok(self.clone());
        }
        let shifted = current.shift(delta).ok_or_else(|| HwmError::InvalidValue {
            kind: T::KIND,
            reason: format!("shift by {delta} overflows"),
        })?;
        let mut copy = self.clone();
        copy.value = Some(shifted);
        copy.touch();
        Ok(copy)
    }

    /// A copy shifted backward by `delta` units.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`advance`](Self::advance).
    pub fn retreat(&self, delta: i64) -> Result<Self, HwmError> {
        let negated = delta.checked_neg().ok_or_else(|| HwmError::InvalidValue {
            kind: T::KIND,
            reason: format!("shift by -{delta} overflows"),
        })?;
        self.advance(negated)
    }

    /// Order two watermarks by value.
    ///
    /// Defined only when both track the same source: same `name`, `entity`
    /// and `expression`. An unset value orders before any set value.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::IdentityMismatch`] when the identity fields
    /// differ.
    pub fn try_compare(&self, other: &Self) -> Result<Ordering, HwmError> {
        if self.name != other.name
            || self.entity != other.entity
            || self.expression != other.expression
        {
            return Err(HwmError::IdentityMismatch { kind: T::KIND });
        }
        Ok(self.value.cmp(&other.value))
    }

    /// Serialize to the tagged record form.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::Codec`] if encoding fails.
    pub fn to_record(&self) -> Result<serde_json::Value, HwmError> {
        Ok(tag_record(serde_json::to_value(self)?, T::KIND))
    }

    /// Rehydrate from a record, rejecting records whose declared `type`
    /// resolves to a different variant.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::TagMismatch`] on a foreign `type` tag and
    /// [`HwmError::Codec`] if field decoding fails.
    pub fn from_record(record: serde_json::Value) -> Result<Self, HwmError> {
        check_record_tag(&record, T::KIND)?;
        serde_json::from_value(record).map_err(HwmError::from)
    }

    fn touch(&mut self) {
        self.modified_time = Utc::now();
    }
}

impl<T: ColumnScalar> PartialEq for ColumnHwm<T> {
    // modified_time is volatile and deliberately excluded
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.entity == other.entity
            && self.expression == other.expression
            && self.description == other.description
    }
}

impl<T: ColumnScalar> Eq for ColumnHwm<T> {}
