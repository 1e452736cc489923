//! Store, context-stack, and store-selection error types.

use tidemark_types::error::HwmError;

/// Errors produced by store operations, ambient stacks, and config-driven
/// store selection.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Watermark encode/decode or domain failure inside a store operation.
    #[error(transparent)]
    Hwm(#[from] HwmError),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("HWM store lock poisoned")]
    LockPoisoned,

    /// Popping an ambient context stack with nothing pushed.
    ///
    /// An unmatched pop is a programming bug in the caller, not an
    /// environmental condition.
    #[error("cannot pop the empty {stack} stack")]
    EmptyStack {
        stack: &'static str,
    },

    /// Store-selection tag nobody registered.
    #[error("unknown HWM store type {tag:?}")]
    UnknownStore {
        tag: String,
    },

    /// Registering a store tag that is already taken.
    #[error("HWM store type {tag:?} is already registered")]
    DuplicateStore {
        tag: String,
    },

    /// More than one store tag in a selection fragment.
    #[error("multiple HWM store types provided: {tags}; only one is allowed")]
    MultipleStoreTypes {
        tags: String,
    },

    /// Selection fragment has the wrong shape.
    #[error("malformed HWM store config: {reason}")]
    MalformedConfig {
        reason: String,
    },

    /// Dot-path key absent from the configuration document.
    #[error("configuration does not contain required key {key:?}")]
    MissingConfigKey {
        key: String,
    },

    /// Constructor arguments rejected by the selected store.
    #[error("invalid arguments for HWM store {tag:?}: {reason}")]
    InvalidStoreArgs {
        tag: String,
        reason: String,
    },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_store_names_the_tag() {
        let err = StoreError::UnknownStore { tag: "atlas".into() };
        assert!(err.to_string().contains("\"atlas\""));
    }

    #[test]
    fn hwm_error_passes_through_transparently() {
        let err = StoreError::from(HwmError::EmptyName);
        assert_eq!(err.to_string(), HwmError::EmptyName.to_string());
    }

    #[test]
    fn empty_stack_names_the_stack() {
        let err = StoreError::EmptyStack { stack: "store" };
        assert!(err.to_string().contains("store stack"));
    }
}
