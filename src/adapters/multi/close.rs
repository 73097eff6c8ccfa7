//! Close dispatch. Both policies attempt every backend.

use std::sync::Arc;

use super::fanout::{parallel_all, sequential_all};
use super::policy::ClosePolicy;
use crate::{Result, Store};

pub(super) async fn dispatch<S>(
    policy: ClosePolicy,
    backends: &[Arc<S>],
    limit: usize,
) -> Result<()>
where
    S: Store + 'static,
{
    let call = |backend: Arc<S>| async move { backend.close().await };
    let result = match policy {
        ClosePolicy::SequentialWaitAll => sequential_all(backends, "close", None, call).await,
        ClosePolicy::ParallelWaitAll => parallel_all(backends, limit, "close", None, call).await,
    };
    match &result {
        Ok(()) => tracing::debug!(backends = backends.len(), "Closed every backend"),
        Err(e) => tracing::warn!(error = %e, "Some backends failed to close"),
    }
    result
}
