//! Get dispatch. Every Get policy runs sequentially on the caller's task.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::policy::GetPolicy;
use crate::{Error, MultiError, Result, Store};

/// `backends` holds at least two entries.
pub(super) async fn dispatch<S, V>(
    policy: GetPolicy,
    backends: &[Arc<S>],
    key: &str,
) -> Result<Option<V>>
where
    S: Store,
    V: DeserializeOwned + PartialEq + Send,
{
    match policy {
        GetPolicy::SequentialWaitAll => wait_all(backends, key).await,

        GetPolicy::SequentialWaitFirst => get_one(&backends[0], 0, key).await,

        GetPolicy::SequentialWaitSuccess => {
            let mut errors = MultiError::new();
            for (idx, backend) in backends.iter().enumerate() {
                match backend.get(key).await {
                    Ok(found) => return Ok(found),
                    Err(e) => {
                        tracing::warn!(key, backend_index = idx, error = %e, "Backend get failed");
                        errors.push(e);
                    }
                }
            }
            tracing::error!(key, "Every backend failed");
            Err(Error::Multi(errors))
        }

        GetPolicy::SequentialWaitResult => {
            let mut errors = MultiError::new();
            for (idx, backend) in backends.iter().enumerate() {
                match backend.get(key).await {
                    Ok(Some(value)) => return Ok(Some(value)),
                    Ok(None) => {
                        tracing::trace!(key, backend_index = idx, "Not found, trying next backend");
                    }
                    Err(e) => {
                        tracing::warn!(key, backend_index = idx, error = %e, "Backend get failed");
                        errors.push(e);
                    }
                }
            }
            if errors.len() == backends.len() {
                tracing::error!(key, "Every backend failed");
                Err(Error::Multi(errors))
            } else {
                Ok(None)
            }
        }
    }
}

/// Read from every backend and require agreement with the first one.
async fn wait_all<S, V>(backends: &[Arc<S>], key: &str) -> Result<Option<V>>
where
    S: Store,
    V: DeserializeOwned + PartialEq + Send,
{
    let reference = get_one::<S, V>(&backends[0], 0, key).await?;

    for (offset, backend) in backends[1..].iter().enumerate() {
        let idx = offset + 1;
        let found = get_one::<S, V>(backend, idx, key).await?;
        match (&reference, &found) {
            (Some(expected), Some(found)) if expected != found => {
                tracing::warn!(key, backend_index = idx, "Backends returned different values");
                return Err(Error::ValueMismatch { index: idx });
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(key, backend_index = idx, "Backends disagree on presence");
                return Err(Error::FoundMismatch { index: idx });
            }
            _ => {}
        }
    }
    Ok(reference)
}

async fn get_one<S, V>(backend: &Arc<S>, idx: usize, key: &str) -> Result<Option<V>>
where
    S: Store,
    V: DeserializeOwned + PartialEq + Send,
{
    backend.get(key).await.map_err(|e| {
        tracing::warn!(key, backend_index = idx, error = %e, "Backend get failed");
        Error::Multi(MultiError::from(e))
    })
}
