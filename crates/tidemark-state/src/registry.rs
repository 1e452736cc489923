//! Registry of HWM store constructors.
//!
//! Maps a short string tag (the form stores appear under in configuration)
//! to a constructor function. The built-in `"memory"` store is registered at
//! first use; external backends register theirs at program start.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::HwmStore;
use crate::error::StoreError;
use crate::memory::MemoryHwmStore;

/// Constructor arguments parsed from a store-selection config fragment.
#[derive(Debug, Clone, Default)]
pub struct StoreArgs {
    /// Positional arguments (`tag: [a, b]` or a bare scalar).
    pub positional: Vec<serde_yaml::Value>,
    /// Keyword arguments (`tag: {url: ..., user: ...}`).
    pub named: BTreeMap<String, serde_yaml::Value>,
}

impl StoreArgs {
    /// Whether no arguments were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Constructor signature for registered stores.
pub type StoreConstructor = fn(&StoreArgs) -> Result<Arc<dyn HwmStore>, StoreError>;

fn construct_memory(args: &StoreArgs) -> Result<Arc<dyn HwmStore>, StoreError> {
    if !args.is_empty() {
        return Err(StoreError::InvalidStoreArgs {
            tag: "memory".to_string(),
            reason: "the memory store takes no arguments".to_string(),
        });
    }
    Ok(Arc::new(MemoryHwmStore::new()))
}

static STORES: LazyLock<RwLock<BTreeMap<String, StoreConstructor>>> = LazyLock::new(|| {
    let mut stores = BTreeMap::new();
    stores.insert("memory".to_string(), construct_memory as StoreConstructor);
    RwLock::new(stores)
});

fn read_stores() -> RwLockReadGuard<'static, BTreeMap<String, StoreConstructor>> {
    match STORES.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_stores() -> RwLockWriteGuard<'static, BTreeMap<String, StoreConstructor>> {
    match STORES.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Process-wide registry of HWM store constructors.
pub struct HwmStoreRegistry;

impl HwmStoreRegistry {
    /// Register a store constructor under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateStore`] when `tag` is already taken;
    /// use [`register_override`](Self::register_override) to replace a
    /// registration deliberately.
    pub fn register(tag: impl Into<String>, constructor: StoreConstructor) -> Result<(), StoreError> {
        let tag = tag.into();
        let mut stores = write_stores();
        if stores.contains_key(&tag) {
            return Err(StoreError::DuplicateStore { tag });
        }
        stores.insert(tag, constructor);
        Ok(())
    }

    /// Register a store constructor, replacing any existing registration.
    pub fn register_override(tag: impl Into<String>, constructor: StoreConstructor) {
        write_stores().insert(tag.into(), constructor);
    }

    /// Look up the constructor registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStore`] (naming the offending tag) when
    /// nothing is registered.
    pub fn get(tag: &str) -> Result<StoreConstructor, StoreError> {
        read_stores()
            .get(tag)
            .copied()
            .ok_or_else(|| StoreError::UnknownStore {
                tag: tag.to_string(),
            })
    }

    /// All registered tags.
    #[must_use]
    pub fn known_tags() -> Vec<String> {
        read_stores().keys().cloned().collect()
    }

    /// Construct the store registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownStore`] for an unregistered tag, or
    /// whatever the constructor itself rejects.
    pub fn construct(tag: &str, args: &StoreArgs) -> Result<Arc<dyn HwmStore>, StoreError> {
        Self::get(tag)?(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use tidemark_types::hwm::Hwm;

    #[derive(Debug)]
    struct NullStore;

    impl HwmStore for NullStore {
        fn get(&self, _name: &str) -> error::Result<Option<Hwm>> {
            Ok(None)
        }

        fn set(&self, _hwm: &Hwm) -> error::Result<()> {
            Ok(())
        }
    }

    fn construct_null(_args: &StoreArgs) -> Result<Arc<dyn HwmStore>, StoreError> {
        Ok(Arc::new(NullStore))
    }

    #[test]
    fn memory_store_is_preregistered() {
        assert!(HwmStoreRegistry::known_tags().contains(&"memory".to_string()));
        let store = HwmStoreRegistry::construct("memory", &StoreArgs::default()).unwrap();
        assert!(store.get("anything").unwrap().is_none());
    }

    #[test]
    fn memory_store_rejects_arguments() {
        let args = StoreArgs {
            positional: vec![serde_yaml::Value::from("path")],
            named: BTreeMap::new(),
        };
        assert!(matches!(
            HwmStoreRegistry::construct("memory", &args),
            Err(StoreError::InvalidStoreArgs { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(matches!(
            HwmStoreRegistry::get("atlas"),
            Err(StoreError::UnknownStore { .. })
        ));
    }

    #[test]
    fn third_party_stores_can_register() {
        HwmStoreRegistry::register("null_store_test", construct_null).unwrap();
        let store = HwmStoreRegistry::construct("null_store_test", &StoreArgs::default()).unwrap();
        assert!(store.get("x").unwrap().is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        assert!(matches!(
            HwmStoreRegistry::register("memory", construct_null),
            Err(StoreError::DuplicateStore { .. })
        ));
    }

    #[test]
    fn register_override_replaces() {
        HwmStoreRegistry::register("override_store_test", construct_memory).unwrap();
        HwmStoreRegistry::register_override("override_store_test", construct_null);
        let args = StoreArgs {
            positional: vec![serde_yaml::Value::from(1)],
            named: BTreeMap::new(),
        };
        // the null constructor ignores arguments the memory one rejects
        assert!(HwmStoreRegistry::construct("override_store_test", &args).is_ok());
    }
}
