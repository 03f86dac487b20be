//! Detached execution scope for compensations.

use std::future::Future;

use tokio::task::JoinHandle;

/// Runs `future` on its own task.
///
/// The task does not belong to the caller: canceling or dropping the caller,
/// or the returned handle, does not stop it. Compensations run here so they
/// finish even while the scope that triggered them is unwinding.
pub fn detached<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future)
}
