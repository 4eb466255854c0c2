//! The rendezvous store port.

use crate::correlation::CorrelationId;
use crate::error::StoreError;
use std::future::Future;
use std::pin::Pin;

/// Port for reading results from the rendezvous key-value store.
///
/// The gateway only ever reads: the out-of-process consumer writes the result
/// under the correlation key (with whatever TTL the operator configured), and
/// the poller looks for it here. Absence is a normal answer — the key may not
/// have been written yet, or may never be.
///
/// Implementations must be safe for concurrent use by many request tasks and
/// must bound each `get` with a per-operation timeout so a hung store cannot
/// silently consume the whole poll budget.
///
/// # Dyn compatibility
///
/// Explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so the
/// orchestrator can hold `Arc<dyn ResultStore>`.
pub trait ResultStore: Send + Sync {
    /// Look up the value at the correlation key.
    ///
    /// `Ok(None)` means the key is absent, which is not an error.
    ///
    /// # Errors
    ///
    /// [`StoreError`] when the store itself fails: connection problems,
    /// per-operation timeout, or pool exhaustion. Callers must treat these
    /// differently from absence.
    fn get(
        &self,
        key: CorrelationId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, StoreError>> + Send + '_>>;
}
