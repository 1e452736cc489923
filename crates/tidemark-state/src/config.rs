//! Config-driven store selection.
//!
//! A store-selection fragment is either a bare tag string (no-argument
//! construction) or a single-key mapping `{tag: args}`, where `args` is
//! null (no arguments), a scalar (one positional argument), a sequence
//! (positional arguments), or a mapping (keyword arguments):
//!
//! ```yaml
//! # no-arg store
//! hwm_store: memory
//!
//! # keyword arguments
//! hwm_store:
//!   atlas:
//!     url: http://some.atlas.url
//!     user: username
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::HwmStore;
use crate::error::StoreError;
use crate::registry::{HwmStoreRegistry, StoreArgs};

/// Resolve a `.`-delimited key path inside a config document.
///
/// # Errors
///
/// Returns [`StoreError::MissingConfigKey`] when any path segment is
/// absent.
pub fn resolve_config_key<'a>(
    config: &'a serde_yaml::Value,
    key: &str,
) -> Result<&'a serde_yaml::Value, StoreError> {
    let mut current = config;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| StoreError::MissingConfigKey {
                key: key.to_string(),
            })?;
    }
    Ok(current)
}

fn parse_store_args(raw: &serde_yaml::Value) -> Result<StoreArgs, StoreError> {
    match raw {
        serde_yaml::Value::Null => Ok(StoreArgs::default()),
        serde_yaml::Value::Mapping(mapping) => {
            let mut named = BTreeMap::new();
            for (key, value) in mapping {
                let key = key
                    .as_str()
                    .ok_or_else(|| StoreError::MalformedConfig {
                        reason: format!("store argument name must be a string, got {key:?}"),
                    })?;
                named.insert(key.to_string(), value.clone());
            }
            Ok(StoreArgs {
                positional: Vec::new(),
                named,
            })
        }
        serde_yaml::Value::Sequence(sequence) => Ok(StoreArgs {
            positional: sequence.clone(),
            named: BTreeMap::new(),
        }),
        scalar @ (serde_yaml::Value::Bool(_)
        | serde_yaml::Value::Number(_)
        | serde_yaml::Value::String(_)) => Ok(StoreArgs {
            positional: vec![scalar.clone()],
            named: BTreeMap::new(),
        }),
        other => Err(StoreError::MalformedConfig {
            reason: format!("unsupported store argument shape: {other:?}"),
        }),
    }
}

/// Parse a store-selection fragment into a `(tag, args)` pair.
///
/// # Errors
///
/// Returns [`StoreError::MultipleStoreTypes`] when the fragment names more
/// than one store and [`StoreError::MalformedConfig`] for any other wrong
/// shape.
pub fn parse_store_fragment(
    fragment: &serde_yaml::Value,
) -> Result<(String, StoreArgs), StoreError> {
    match fragment {
        serde_yaml::Value::String(tag) => Ok((tag.clone(), StoreArgs::default())),
        serde_yaml::Value::Mapping(mapping) => {
            if mapping.len() > 1 {
                let tags = mapping
                    .keys()
                    .map(|key| key.as_str().unwrap_or("<non-string>").to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(StoreError::MultipleStoreTypes { tags });
            }
            let (key, value) = mapping
                .iter()
                .next()
                .ok_or_else(|| StoreError::MalformedConfig {
                    reason: "store fragment mapping is empty".to_string(),
                })?;
            let tag = key.as_str().ok_or_else(|| StoreError::MalformedConfig {
                reason: format!("store tag must be a string, got {key:?}"),
            })?;
            Ok((tag.to_string(), parse_store_args(value)?))
        }
        other => Err(StoreError::MalformedConfig {
            reason: format!("expected a store tag or single-key mapping, got {other:?}"),
        }),
    }
}

/// Select and construct the store configured at `key` inside `config`.
///
/// # Errors
///
/// Returns the [`parse_store_fragment`] and [`resolve_config_key`] failure
/// modes, plus [`StoreError::UnknownStore`] for an unregistered tag and
/// whatever the selected constructor rejects.
pub fn store_from_config(
    config: &serde_yaml::Value,
    key: &str,
) -> Result<Arc<dyn HwmStore>, StoreError> {
    let fragment = resolve_config_key(config, key)?;
    let (tag, args) = parse_store_fragment(fragment)?;
    tracing::debug!(tag, key, "selecting HWM store from config");
    HwmStoreRegistry::construct(&tag, &args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn yaml(text: &str) -> serde_yaml::Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn bare_tag_means_no_args() {
        let (tag, args) = parse_store_fragment(&yaml("memory")).unwrap();
        assert_eq!(tag, "memory");
        assert!(args.is_empty());
    }

    #[test]
    fn null_args_mean_no_args() {
        let (tag, args) = parse_store_fragment(&yaml("memory:")).unwrap();
        assert_eq!(tag, "memory");
        assert!(args.is_empty());
    }

    #[test]
    fn scalar_arg_is_one_positional() {
        let (tag, args) = parse_store_fragment(&yaml("files: /var/lib/hwm.yml")).unwrap();
        assert_eq!(tag, "files");
        assert_eq!(args.positional, vec![serde_yaml::Value::from("/var/lib/hwm.yml")]);
        assert!(args.named.is_empty());
    }

    #[test]
    fn sequence_args_are_positional() {
        let (_, args) = parse_store_fragment(&yaml("files: [a, b]")).unwrap();
        assert_eq!(args.positional.len(), 2);
    }

    #[test]
    fn mapping_args_are_named() {
        let (tag, args) = parse_store_fragment(&yaml(
            "atlas:\n  url: http://some.atlas.url\n  user: username",
        ))
        .unwrap();
        assert_eq!(tag, "atlas");
        assert_eq!(
            args.named.get("url"),
            Some(&serde_yaml::Value::from("http://some.atlas.url"))
        );
        assert_eq!(args.named.len(), 2);
    }

    #[test]
    fn multiple_tags_are_a_hard_error() {
        let fragment = yaml("memory:\natlas:\n  url: x");
        let err = parse_store_fragment(&fragment).unwrap_err();
        assert!(matches!(err, StoreError::MultipleStoreTypes { .. }));
    }

    #[rstest]
    #[case::sequence("[memory]")]
    #[case::number("42")]
    fn wrong_fragment_shapes_are_malformed(#[case] text: &str) {
        assert!(matches!(
            parse_store_fragment(&yaml(text)),
            Err(StoreError::MalformedConfig { .. })
        ));
    }

    #[test]
    fn config_key_resolution_walks_dot_paths() {
        let config = yaml("myetl:\n  env:\n    hwm_store: memory");
        let fragment = resolve_config_key(&config, "myetl.env.hwm_store").unwrap();
        assert_eq!(fragment, &serde_yaml::Value::from("memory"));
    }

    #[test]
    fn missing_config_key_names_the_key() {
        let config = yaml("myetl: {}");
        let err = resolve_config_key(&config, "myetl.env.hwm_store").unwrap_err();
        assert!(matches!(
            err,
            StoreError::MissingConfigKey { ref key } if key == "myetl.env.hwm_store"
        ));
    }

    #[test]
    fn store_from_config_builds_the_memory_store() {
        let config = yaml("hwm_store: memory");
        let store = store_from_config(&config, "hwm_store").unwrap();
        assert!(store.get("anything").unwrap().is_none());
    }

    #[test]
    fn store_from_config_rejects_unknown_tags() {
        let config = yaml("hwm_store: warehouse");
        assert!(matches!(
            store_from_config(&config, "hwm_store"),
            Err(StoreError::UnknownStore { .. })
        ));
    }

    #[test]
    fn store_from_config_rejects_memory_with_args() {
        let config = yaml("hwm_store:\n  memory:\n    path: /tmp/x");
        assert!(matches!(
            store_from_config(&config, "hwm_store"),
            Err(StoreError::InvalidStoreArgs { .. })
        ));
    }
}
