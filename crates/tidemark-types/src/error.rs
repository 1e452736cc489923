//! Error model for HWM construction, mutation, and registry lookups.

use crate::hwm::HwmKind;

/// Errors produced by HWM operations and registry lookups.
///
/// Every variant is local to the operation that detected it; a failed call
/// leaves the watermark it was invoked on untouched.
#[derive(Debug, thiserror::Error)]
pub enum HwmError {
    /// HWM names are identity keys and may not be empty.
    #[error("HWM name cannot be empty")]
    EmptyName,

    /// A raw value failed the variant's validation rules.
    #[error("invalid value for {kind} HWM: {reason}")]
    InvalidValue {
        kind: HwmKind,
        reason: String,
    },

    /// A path failed syntactic validation.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        path: String,
        reason: String,
    },

    /// An absolute path does not resolve underneath the HWM directory.
    #[error("path {path:?} is not within directory {directory:?}")]
    PathOutsideDirectory {
        path: String,
        directory: String,
    },

    /// Malformed process identity fields.
    #[error("invalid process identity: {reason}")]
    InvalidProcess {
        reason: String,
    },

    /// Arithmetic was attempted on a watermark whose value is unset.
    #[error("{kind} HWM value is not set")]
    UnsetValue {
        kind: HwmKind,
    },

    /// Ordering of two same-typed HWMs that track different sources.
    #[error("cannot order {kind} HWMs with different name, entity or expression")]
    IdentityMismatch {
        kind: HwmKind,
    },

    /// Ordering across two different HWM variants.
    #[error("cannot order {left} HWM against {right} HWM")]
    TypeMismatch {
        left: HwmKind,
        right: HwmKind,
    },

    /// Ordering is not defined for this variant.
    #[error("{kind} HWMs do not have a defined ordering")]
    UnsupportedOrdering {
        kind: HwmKind,
    },

    /// Registry lookup for a tag nobody registered.
    #[error("unknown HWM type tag {tag:?}")]
    UnknownTag {
        tag: String,
    },

    /// Registry lookup for a kind with no registered tag.
    #[error("no tag registered for HWM kind {kind}")]
    UnknownKind {
        kind: HwmKind,
    },

    /// Registering a tag that is already taken.
    ///
    /// Use `HwmTypeRegistry::register_override` to replace an existing
    /// registration deliberately.
    #[error("HWM type tag {tag:?} is already registered")]
    DuplicateTag {
        tag: String,
    },

    /// A serialized record declares a different variant than requested.
    #[error("record type {found:?} does not match expected {expected}")]
    TagMismatch {
        expected: HwmKind,
        found: String,
    },

    /// A serialized record is missing a usable string `type` tag.
    #[error("serialized HWM record has no \"type\" tag")]
    MissingTag,

    /// Record encoding or decoding failure.
    #[error("failed to encode or decode HWM record: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, HwmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_includes_offending_tag() {
        let err = HwmError::UnknownTag { tag: "bogus".into() };
        assert!(err.to_string().contains("\"bogus\""));
    }

    #[test]
    fn type_mismatch_names_both_kinds() {
        let err = HwmError::TypeMismatch {
            left: HwmKind::ColumnInt,
            right: HwmKind::FileList,
        };
        let msg = err.to_string();
        assert!(msg.contains("column_int"), "got: {msg}");
        assert!(msg.contains("file_list"), "got: {msg}");
    }

    #[test]
    fn codec_error_wraps_serde_json() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = HwmError::Codec(inner);
        assert!(err.to_string().contains("decode"));
    }
}
