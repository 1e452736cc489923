//! In-memory reference implementation of [`HwmStore`].
//!
//! Checkpoints are held only for the lifetime of the store instance, which
//! makes this backend suitable for tests and single-run pipelines; durable
//! persistence belongs to external store implementations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tidemark_types::hwm::registry::HwmTypeRegistry;
use tidemark_types::hwm::Hwm;

use crate::backend::HwmStore;
use crate::context::ProcessStack;
use crate::error::{self, StoreError};

/// In-memory HWM store.
///
/// Records are kept in *serialized* form: `set` snapshots the watermark, so
/// mutating the caller's object afterwards cannot retroactively change what
/// a later `get` returns.
#[derive(Debug, Default)]
pub struct MemoryHwmStore {
    data: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryHwmStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a previous holder panicked.
    pub fn clear(&self) -> error::Result<()> {
        self.lock_data()?.clear();
        Ok(())
    }

    fn lock_data(&self) -> error::Result<MutexGuard<'_, HashMap<String, serde_json::Value>>> {
        self.data.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl HwmStore for MemoryHwmStore {
    fn get(&self, name: &str) -> error::Result<Option<Hwm>> {
        let record = match self.lock_data()?.get(name) {
            Some(record) => record.clone(),
            None => return Ok(None),
        };
        let hwm = HwmTypeRegistry::parse(record)?;
        Ok(Some(hwm))
    }

    fn set(&self, hwm: &Hwm) -> error::Result<()> {
        let record = hwm.to_record()?;
        self.lock_data()?.insert(hwm.name().to_string(), record);
        tracing::debug!(
            name = hwm.name(),
            kind = %hwm.kind(),
            process = %ProcessStack::current().qualified_name(),
            "stored HWM checkpoint"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::hwm::column::ColumnIntHwm;
    use tidemark_types::hwm::key_value::KeyValueIntHwm;

    fn int_hwm(name: &str, value: i64) -> Hwm {
        ColumnIntHwm::new(name).unwrap().with_value(value).into()
    }

    #[test]
    fn get_absent_name_is_none() {
        let store = MemoryHwmStore::new();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let store = MemoryHwmStore::new();
        let hwm = int_hwm("orders.id", 42);
        store.set(&hwm).unwrap();
        assert_eq!(store.get("orders.id").unwrap(), Some(hwm));
    }

    #[test]
    fn set_overwrites_unconditionally() {
        let store = MemoryHwmStore::new();
        store.set(&int_hwm("t", 10)).unwrap();
        store.set(&int_hwm("t", 3)).unwrap();
        let Some(Hwm::ColumnInt(current)) = store.get("t").unwrap() else {
            panic!("expected a column_int checkpoint");
        };
        assert_eq!(current.value(), Some(&3));
    }

    #[test]
    fn stored_record_is_isolated_from_caller_mutation() {
        let store = MemoryHwmStore::new();
        let mut hwm = ColumnIntHwm::new("t").unwrap().with_value(10);
        store.set(&hwm.clone().into()).unwrap();

        hwm.update(99);

        let Some(Hwm::ColumnInt(stored)) = store.get("t").unwrap() else {
            panic!("expected a column_int checkpoint");
        };
        assert_eq!(stored.value(), Some(&10));
    }

    #[test]
    fn different_variants_coexist_by_name() {
        let store = MemoryHwmStore::new();
        store.set(&int_hwm("a", 1)).unwrap();
        store
            .set(&KeyValueIntHwm::new("b").unwrap().with_offsets([(0, 5)]).into())
            .unwrap();
        assert!(matches!(store.get("a").unwrap(), Some(Hwm::ColumnInt(_))));
        assert!(matches!(store.get("b").unwrap(), Some(Hwm::KeyValueInt(_))));
    }

    #[test]
    fn clear_drops_everything() {
        let store = MemoryHwmStore::new();
        store.set(&int_hwm("t", 1)).unwrap();
        store.clear().unwrap();
        assert!(store.get("t").unwrap().is_none());
    }
}
