//! Task plumbing shared by the Set, Delete and Close dispatchers.
//!
//! A backend call is described by a closure `Fn(Arc<S>) -> Future` that owns
//! everything it needs, so the same call can run inline on the caller's task,
//! in a per-backend worker task, or in a detached background continuation.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{Error, MultiError, Result, Store};

/// What a worker task reports back.
pub(super) enum Outcome {
    Finished { index: usize, result: Result<()> },
    Skipped { index: usize },
}

/// Per-backend worker tasks of one dispatch.
pub(super) struct Workers {
    tasks: JoinSet<Outcome>,
}

impl Workers {
    /// Spawn one task per backend.
    ///
    /// At most `limit` tasks call their backend at once. The limiter belongs
    /// to this dispatch alone, so detached tasks never hold back later calls.
    /// When `cancel` is given, a task cancels it on failure before releasing
    /// its permit, and a task that finds it cancelled after acquiring its
    /// permit skips its backend.
    pub(super) fn spawn<S, F, Fut>(
        backends: &[Arc<S>],
        limit: usize,
        cancel: Option<&CancellationToken>,
        call: &F,
    ) -> Self
    where
        S: Store + 'static,
        F: Fn(Arc<S>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let limiter = Arc::new(Semaphore::new(limit.max(1)));
        let mut tasks = JoinSet::new();
        for (index, backend) in backends.iter().enumerate() {
            let backend = Arc::clone(backend);
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.cloned();
            let call = call.clone();
            tasks.spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Outcome::Finished {
                            index,
                            result: Err(Error::Generic("concurrency limiter closed".to_string())),
                        };
                    }
                };
                if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                    return Outcome::Skipped { index };
                }
                let result = call(backend).await;
                if result.is_err() {
                    if let Some(cancel) = &cancel {
                        cancel.cancel();
                    }
                }
                Outcome::Finished { index, result }
            });
        }
        Self { tasks }
    }

    /// Wait for the next task to end. `None` once every task has ended.
    ///
    /// A panicked task surfaces as a failure with [`Error::Join`].
    pub(super) async fn next(&mut self) -> Option<(Option<usize>, Result<()>)> {
        let joined = self.tasks.join_next().await?;
        Some(match joined {
            Ok(Outcome::Finished { index, result }) => (Some(index), result),
            Ok(Outcome::Skipped { index }) => {
                tracing::debug!(backend_index = index, "Backend skipped after cancellation");
                (Some(index), Ok(()))
            }
            Err(e) => (None, Err(Error::Join(e))),
        })
    }

    /// Let the remaining tasks run to completion unsupervised.
    pub(super) fn detach(mut self) {
        self.tasks.detach_all();
    }
}

/// Call every backend in order, collecting every failure.
///
/// `key` is `None` for operations that do not address a key.
pub(super) async fn sequential_all<S, F, Fut>(
    backends: &[Arc<S>],
    op: &'static str,
    key: Option<&str>,
    call: F,
) -> Result<()>
where
    S: Store + 'static,
    F: Fn(Arc<S>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut errors = MultiError::new();
    for (idx, backend) in backends.iter().enumerate() {
        if let Err(e) = call(Arc::clone(backend)).await {
            tracing::warn!(op, key, backend_index = idx, error = %e, "Backend call failed");
            errors.push(e);
        }
    }
    finish(errors, backends.len(), op, key)
}

/// Call every backend concurrently, collecting every failure.
pub(super) async fn parallel_all<S, F, Fut>(
    backends: &[Arc<S>],
    limit: usize,
    op: &'static str,
    key: Option<&str>,
    call: F,
) -> Result<()>
where
    S: Store + 'static,
    F: Fn(Arc<S>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut workers = Workers::spawn(backends, limit, None, &call);
    let mut errors = MultiError::new();
    while let Some((idx, result)) = workers.next().await {
        if let Err(e) = result {
            tracing::warn!(op, key, backend_index = ?idx, error = %e, "Backend call failed");
            errors.push(e);
        }
    }
    finish(errors, backends.len(), op, key)
}

/// Call `backends` in order from a detached task. Results are discarded.
///
/// `offset` is the index of `backends[0]` in the combiner, for logging.
pub(super) fn continue_in_background<S, F, Fut>(
    backends: &[Arc<S>],
    offset: usize,
    op: &'static str,
    key: &str,
    call: F,
) where
    S: Store + 'static,
    F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if backends.is_empty() {
        return;
    }
    tracing::debug!(op, key, remaining = backends.len(), "Continuing in background");
    let remaining: Vec<Arc<S>> = backends.to_vec();
    let key = key.to_string();
    tokio::spawn(async move {
        for (rel_idx, backend) in remaining.into_iter().enumerate() {
            if let Err(e) = call(backend).await {
                tracing::debug!(
                    op,
                    key = key.as_str(),
                    backend_index = offset + rel_idx,
                    error = %e,
                    "Background call failed, result discarded"
                );
            }
        }
    });
}

fn finish(errors: MultiError, total: usize, op: &'static str, key: Option<&str>) -> Result<()> {
    if errors.len() == total {
        tracing::error!(op, key, "Every backend failed");
    }
    errors.into_result()
}
