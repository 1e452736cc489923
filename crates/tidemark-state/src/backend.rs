//! HWM store trait definition.
//!
//! [`HwmStore`] defines the storage contract for named checkpoints. The
//! in-memory reference implementation lives in [`crate::memory`]; external
//! backends implement the same trait and register through
//! [`crate::registry::HwmStoreRegistry`].

use tidemark_types::hwm::Hwm;

use crate::error;

/// Storage contract for named HWM checkpoints.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn HwmStore>`.
/// Each `get`/`set` call is atomic only with respect to itself: the contract
/// provides no read-modify-write isolation, so concurrent writers to the
/// same checkpoint name must be serialized by the caller.
pub trait HwmStore: std::fmt::Debug + Send + Sync {
    /// Read the checkpoint named `name`.
    ///
    /// Returns `Ok(None)` when nothing has been persisted under that name;
    /// a missing checkpoint is never synthesized.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::error::StoreError) on storage or
    /// decode failure.
    fn get(&self, name: &str) -> error::Result<Option<Hwm>>;

    /// Persist `hwm` under its name, unconditionally overwriting any
    /// previous record (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::error::StoreError) on storage or
    /// encode failure.
    fn set(&self, hwm: &Hwm) -> error::Result<()>;
}
