//! Bidirectional `tag ⇄ variant` registry for tagged (de)serialization.
//!
//! The registry is a process-wide static table, pre-populated with the
//! built-in variants at first use. It exists so that persisted records can
//! be rehydrated without the caller knowing the concrete variant ahead of
//! time, and so that historic alias tags can keep resolving.
//!
//! A variant may carry several tags (aliases); the first registered tag is
//! its primary. Registering an already-taken tag is rejected; replacing a
//! registration is an explicit, separate call.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::HwmError;
use crate::hwm::{Hwm, HwmKind};

struct RegistryInner {
    by_tag: HashMap<String, HwmKind>,
    // insertion order, so the primary tag of a kind is well defined
    order: Vec<(String, HwmKind)>,
}

impl RegistryInner {
    fn insert(&mut self, tag: String, kind: HwmKind) {
        self.by_tag.insert(tag.clone(), kind);
        self.order.push((tag, kind));
    }
}

static REGISTRY: LazyLock<RwLock<RegistryInner>> = LazyLock::new(|| {
    let mut inner = RegistryInner {
        by_tag: HashMap::new(),
        order: Vec::new(),
    };
    for kind in HwmKind::ALL {
        inner.insert(kind.wire_tag().to_string(), kind);
    }
    RwLock::new(inner)
});

fn read_registry() -> RwLockReadGuard<'static, RegistryInner> {
    match REGISTRY.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_registry() -> RwLockWriteGuard<'static, RegistryInner> {
    match REGISTRY.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Process-wide HWM type registry.
pub struct HwmTypeRegistry;

impl HwmTypeRegistry {
    /// Resolve a tag to its variant.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::UnknownTag`] (naming the offending tag) when
    /// nothing is registered under `tag`.
    pub fn resolve(tag: &str) -> Result<HwmKind, HwmError> {
        read_registry()
            .by_tag
            .get(tag)
            .copied()
            .ok_or_else(|| HwmError::UnknownTag {
                tag: tag.to_string(),
            })
    }

    /// The primary (first registered) tag of a variant.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::UnknownKind`] when every tag of `kind` has been
    /// overridden away.
    pub fn tag_of(kind: HwmKind) -> Result<String, HwmError> {
        let registry = read_registry();
        registry
            .order
            .iter()
            // skip order entries whose tag has since been overridden away
            .find(|(tag, registered)| {
                *registered == kind && registry.by_tag.get(tag) == Some(&kind)
            })
            .map(|(tag, _)| tag.clone())
            .ok_or(HwmError::UnknownKind { kind })
    }

    /// Register an additional tag for a variant.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::DuplicateTag`] when `tag` is already taken; use
    /// [`register_override`](Self::register_override) to replace a
    /// registration deliberately.
    pub fn register(tag: impl Into<String>, kind: HwmKind) -> Result<(), HwmError> {
        let tag = tag.into();
        let mut registry = write_registry();
        if registry.by_tag.contains_key(&tag) {
            return Err(HwmError::DuplicateTag { tag });
        }
        registry.insert(tag, kind);
        Ok(())
    }

    /// Register a tag, replacing any existing registration under it.
    pub fn register_override(tag: impl Into<String>, kind: HwmKind) {
        let tag = tag.into();
        let mut registry = write_registry();
        registry.order.retain(|(existing, _)| *existing != tag);
        registry.by_tag.remove(&tag);
        registry.insert(tag, kind);
    }

    /// All currently registered tags, in registration order.
    #[must_use]
    pub fn known_tags() -> Vec<String> {
        read_registry()
            .order
            .iter()
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    /// Rehydrate a serialized record, dispatching on its `type` tag.
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::MissingTag`] if the record carries no string
    /// `type` field, [`HwmError::UnknownTag`] for an unregistered tag, and
    /// [`HwmError::Codec`] if field decoding fails.
    pub fn parse(record: serde_json::Value) -> Result<Hwm, HwmError> {
        let tag = record
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(HwmError::MissingTag)?;
        let kind = Self::resolve(tag)?;
        // normalize alias tags to the wire tag the tagged union expects
        let record = crate::hwm::tag_record(record, kind);
        serde_json::from_value(record).map_err(HwmError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwm::column::{ColumnDateHwm, ColumnIntHwm};
    use crate::hwm::file_list::FileListHwm;
    use chrono::NaiveDate;

    #[test]
    fn builtin_tags_form_a_bijection() {
        for kind in HwmKind::ALL {
            let tag = HwmTypeRegistry::tag_of(kind).unwrap();
            assert_eq!(tag, kind.wire_tag());
            assert_eq!(HwmTypeRegistry::resolve(&tag).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_tag_error_names_the_tag() {
        let err = HwmTypeRegistry::resolve("no_such_type").unwrap_err();
        assert!(matches!(err, HwmError::UnknownTag { ref tag } if tag == "no_such_type"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = HwmTypeRegistry::register("column_int", HwmKind::ColumnDate).unwrap_err();
        assert!(matches!(err, HwmError::DuplicateTag { .. }));
        // the original registration is untouched
        assert_eq!(
            HwmTypeRegistry::resolve("column_int").unwrap(),
            HwmKind::ColumnInt
        );
    }

    #[test]
    fn alias_tags_resolve_to_the_same_kind() {
        HwmTypeRegistry::register("integer_alias_test", HwmKind::ColumnInt).unwrap();
        assert_eq!(
            HwmTypeRegistry::resolve("integer_alias_test").unwrap(),
            HwmKind::ColumnInt
        );
        // primary tag stays the first registered one
        assert_eq!(
            HwmTypeRegistry::tag_of(HwmKind::ColumnInt).unwrap(),
            "column_int"
        );
    }

    #[test]
    fn register_override_replaces() {
        HwmTypeRegistry::register("override_test", HwmKind::ColumnInt).unwrap();
        HwmTypeRegistry::register_override("override_test", HwmKind::ColumnDate);
        assert_eq!(
            HwmTypeRegistry::resolve("override_test").unwrap(),
            HwmKind::ColumnDate
        );
    }

    #[test]
    fn parse_dispatches_on_tag() {
        let hwm = ColumnIntHwm::new("orders.id").unwrap().with_value(42);
        let parsed = HwmTypeRegistry::parse(hwm.to_record().unwrap()).unwrap();
        assert_eq!(parsed, Hwm::ColumnInt(hwm));
    }

    #[test]
    fn parse_resolves_alias_tags() {
        HwmTypeRegistry::register("date_alias_test", HwmKind::ColumnDate).unwrap();
        let hwm = ColumnDateHwm::new("d")
            .unwrap()
            .with_value(NaiveDate::from_ymd_opt(2021, 12, 1).unwrap());
        let mut record = hwm.to_record().unwrap();
        record["type"] = "date_alias_test".into();
        let parsed = HwmTypeRegistry::parse(record).unwrap();
        assert_eq!(parsed, Hwm::ColumnDate(hwm));
    }

    #[test]
    fn parse_unknown_tag_fails() {
        let record = serde_json::json!({"type": "unknown", "name": "x"});
        assert!(matches!(
            HwmTypeRegistry::parse(record),
            Err(HwmError::UnknownTag { .. })
        ));
    }

    #[test]
    fn parse_without_tag_fails() {
        let record = serde_json::json!({"name": "x", "value": 1});
        assert!(matches!(
            HwmTypeRegistry::parse(record),
            Err(HwmError::MissingTag)
        ));
    }

    #[test]
    fn parse_roundtrips_every_builtin_variant() {
        let mut files = FileListHwm::new("f").unwrap();
        files.update(["a.csv"]).unwrap();
        let watermarks: Vec<Hwm> = vec![
            ColumnIntHwm::new("i").unwrap().with_value(5).into(),
            ColumnDateHwm::new("d")
                .unwrap()
                .with_value(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
                .into(),
            crate::hwm::column::ColumnDateTimeHwm::new("dt")
                .unwrap()
                .with_value(
                    NaiveDate::from_ymd_opt(2024, 2, 29)
                        .unwrap()
                        .and_hms_opt(23, 59, 59)
                        .unwrap(),
                )
                .into(),
            files.into(),
            crate::hwm::file_mtime::FileModifiedTimeHwm::new("m")
                .unwrap()
                .with_value(chrono::Utc::now())
                .into(),
            crate::hwm::key_value::KeyValueIntHwm::new("o")
                .unwrap()
                .with_offsets([(0, 10)])
                .into(),
        ];
        for hwm in watermarks {
            let record = hwm.to_record().unwrap();
            let parsed = HwmTypeRegistry::parse(record).unwrap();
            assert_eq!(parsed, hwm);
        }
    }
}
