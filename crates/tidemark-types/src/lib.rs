//! High-water-mark (HWM) checkpoint types for incremental ETL pipelines.
//!
//! A watermark is a named, typed marker recording how much of one data
//! source has already been consumed: the largest column value seen, the set
//! of already-read files, the most recent file modification instant, or
//! per-partition offsets. Pipelines feed observations through the variant's
//! `covers` / `update` operations and persist the result through a store
//! (see the `tidemark-state` crate).
//!
//! Variants close over the tagged [`hwm::Hwm`] union; serialized records
//! are rehydrated through [`hwm::registry::HwmTypeRegistry`].

#![warn(clippy::pedantic)]

pub mod error;
pub mod hwm;
pub mod path;
pub mod process;
