//! Set and Delete dispatch.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::fanout::{Workers, continue_in_background, parallel_all, sequential_all};
use super::policy::UpdatePolicy;
use crate::{Error, MultiError, Result, Store};

/// Run one update (`op` is `"set"` or `"delete"`) against `backends`
/// according to `policy`.
///
/// Every failure returned to the caller is wrapped in [`Error::Multi`].
/// `backends` holds at least two entries; parallel policies run at most
/// `limit` backend calls at once.
pub(super) async fn dispatch<S, F, Fut>(
    policy: UpdatePolicy,
    backends: &[Arc<S>],
    limit: usize,
    op: &'static str,
    key: &str,
    call: F,
) -> Result<()>
where
    S: Store + 'static,
    F: Fn(Arc<S>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    match policy {
        UpdatePolicy::SequentialWaitAll => sequential_all(backends, op, Some(key), call).await,

        UpdatePolicy::ParallelWaitAll => parallel_all(backends, limit, op, Some(key), call).await,

        UpdatePolicy::SequentialWaitErrorThenContinue => {
            for (idx, backend) in backends.iter().enumerate() {
                if let Err(e) = call(Arc::clone(backend)).await {
                    tracing::warn!(op, key, backend_index = idx, error = %e, "Backend call failed");
                    continue_in_background(&backends[idx + 1..], idx + 1, op, key, call);
                    return Err(first_error(e));
                }
            }
            Ok(())
        }

        UpdatePolicy::SequentialWaitErrorThenSkip => {
            for (idx, backend) in backends.iter().enumerate() {
                if let Err(e) = call(Arc::clone(backend)).await {
                    tracing::warn!(
                        op,
                        key,
                        backend_index = idx,
                        skipped = backends.len() - (idx + 1),
                        error = %e,
                        "Backend call failed, skipping the rest"
                    );
                    return Err(first_error(e));
                }
            }
            Ok(())
        }

        UpdatePolicy::ParallelWaitErrorThenContinue => {
            wait_error(backends, limit, None, op, key, call).await
        }

        UpdatePolicy::ParallelWaitErrorThenSkip => {
            let cancel = CancellationToken::new();
            wait_error(backends, limit, Some(&cancel), op, key, call).await
        }

        UpdatePolicy::SequentialWaitNoError => {
            let mut errors = MultiError::new();
            for (idx, backend) in backends.iter().enumerate() {
                match call(Arc::clone(backend)).await {
                    Ok(()) => {
                        if !errors.is_empty() {
                            tracing::warn!(
                                op,
                                key,
                                backend_index = idx,
                                failed = errors.len(),
                                "Succeeded after earlier backends failed"
                            );
                        }
                        continue_in_background(&backends[idx + 1..], idx + 1, op, key, call);
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::warn!(op, key, backend_index = idx, error = %e, "Backend call failed");
                        errors.push(e);
                    }
                }
            }
            tracing::error!(op, key, "Every backend failed");
            Err(Error::Multi(errors))
        }

        UpdatePolicy::SequentialWaitFirst => {
            let result = call(Arc::clone(&backends[0])).await;
            continue_in_background(&backends[1..], 1, op, key, call);
            result.map_err(|e| {
                tracing::warn!(op, key, backend_index = 0, error = %e, "Backend call failed");
                first_error(e)
            })
        }
    }
}

/// Spawn every backend call and return on the first failure, leaving the
/// workers still running detached.
async fn wait_error<S, F, Fut>(
    backends: &[Arc<S>],
    limit: usize,
    cancel: Option<&CancellationToken>,
    op: &'static str,
    key: &str,
    call: F,
) -> Result<()>
where
    S: Store + 'static,
    F: Fn(Arc<S>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut workers = Workers::spawn(backends, limit, cancel, &call);
    while let Some((idx, result)) = workers.next().await {
        if let Err(e) = result {
            tracing::warn!(op, key, backend_index = ?idx, error = %e, "Backend call failed");
            if let Some(cancel) = cancel {
                cancel.cancel();
            }
            workers.detach();
            return Err(first_error(e));
        }
    }
    Ok(())
}

fn first_error(e: Error) -> Error {
    Error::Multi(MultiError::from(e))
}
