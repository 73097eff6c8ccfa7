use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::policy::{ClosePolicy, GetPolicy, UpdatePolicy};
use super::{close, get, update};
use crate::{Error, MultiError, Result, Store, validate_key};

/// Configuration for a [`Combiner`].
///
/// Construct with `CombinerOptions::default()` and override the fields you
/// care about, or deserialize it from configuration. Missing fields take their
/// defaults and policy names are parsed leniently:
///
/// ```
/// # use kvcombine::{CombinerOptions, GetPolicy, UpdatePolicy};
/// let options: CombinerOptions = serde_json::from_str(
///     r#"{ "set_policy": "ParallelWaitAll", "get_policy": "sequential_wait_first" }"#,
/// )
/// .unwrap();
/// assert_eq!(options.set_policy, UpdatePolicy::ParallelWaitAll);
/// assert_eq!(options.get_policy, GetPolicy::SequentialWaitFirst);
/// assert_eq!(options.delete_policy, UpdatePolicy::SequentialWaitAll);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinerOptions {
    /// Strategy for `set`. Default: [`UpdatePolicy::SequentialWaitAll`].
    pub set_policy: UpdatePolicy,

    /// Strategy for `get`. Default: [`GetPolicy::SequentialWaitAll`].
    pub get_policy: GetPolicy,

    /// Strategy for `delete`. Default: [`UpdatePolicy::SequentialWaitAll`].
    pub delete_policy: UpdatePolicy,

    /// Strategy for `close`. Default: [`ClosePolicy::SequentialWaitAll`].
    pub close_policy: ClosePolicy,

    /// Upper bound on concurrent backend calls within one parallel dispatch.
    ///
    /// `None` uses the number of available processing units. Values of 0 are
    /// clamped to 1. Each call gets its own allowance, so calls left running
    /// by an earlier dispatch do not count against a later one.
    pub max_concurrency: Option<usize>,
}

impl CombinerOptions {
    fn concurrency_limit(&self) -> usize {
        match self.max_concurrency {
            Some(limit) => limit.max(1),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

/// Fans every operation out to a fixed list of backends.
///
/// Each operation kind follows its own policy (see [`UpdatePolicy`],
/// [`GetPolicy`] and [`ClosePolicy`]). A combiner is itself a [`Store`], so
/// combiners can be nested.
///
/// The combiner owns its backends: call [`close`](Store::close) once to
/// close all of them. Parallel policies and background continuations spawn
/// Tokio tasks, so they must run inside a Tokio runtime.
///
/// ```
/// # use kvcombine::{Combiner, MemoryStore, Store, UpdatePolicy};
/// # async fn example() -> kvcombine::Result<()> {
/// let first = MemoryStore::new();
/// let second = MemoryStore::new();
///
/// let combiner = Combiner::builder()
///     .add_backend(first.clone())
///     .add_backend(second.clone())
///     .set_policy(UpdatePolicy::ParallelWaitAll)
///     .build()?;
///
/// combiner.set("answer", &42).await?;
/// assert_eq!(combiner.get::<i32>("answer").await?, Some(42));
/// assert!(first.contains_key("answer") && second.contains_key("answer"));
///
/// combiner.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Combiner<S: Store + 'static> {
    backends: Vec<Arc<S>>,
    options: CombinerOptions,
    limit: usize,
}

impl<S: Store + 'static> Combiner<S> {
    /// Create a builder for configuring a combiner.
    pub fn builder() -> CombinerBuilder<S> {
        CombinerBuilder::new()
    }

    /// Create a combiner from backend construction results.
    ///
    /// The first construction error is returned unchanged. Fewer than two
    /// backends fails with [`Error::NotEnoughStores`].
    pub fn new<I>(options: CombinerOptions, backends: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<S>>,
    {
        let backends = backends
            .into_iter()
            .map(|backend| backend.map(Arc::new))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| tracing::error!(error = %e, "Backend construction failed"))?;

        if backends.len() < 2 {
            return Err(Error::NotEnoughStores(backends.len()));
        }

        let limit = options.concurrency_limit();
        tracing::debug!(
            backends = backends.len(),
            set_policy = %options.set_policy,
            get_policy = %options.get_policy,
            delete_policy = %options.delete_policy,
            close_policy = %options.close_policy,
            max_concurrency = limit,
            "Combiner created"
        );

        Ok(Self {
            backends,
            options,
            limit,
        })
    }

    /// Get the number of backends.
    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Get a reference to a specific backend by index.
    pub fn backend(&self, index: usize) -> Option<&S> {
        self.backends.get(index).map(|arc| arc.as_ref())
    }

    /// Iterate over the backends in order.
    pub fn backends(&self) -> impl Iterator<Item = &S> + '_ {
        self.backends.iter().map(|arc| arc.as_ref())
    }

    /// Get the configured options.
    pub fn options(&self) -> &CombinerOptions {
        &self.options
    }

    /// Get the set policy.
    pub fn set_policy(&self) -> UpdatePolicy {
        self.options.set_policy
    }

    /// Get the get policy.
    pub fn get_policy(&self) -> GetPolicy {
        self.options.get_policy
    }

    /// Get the delete policy.
    pub fn delete_policy(&self) -> UpdatePolicy {
        self.options.delete_policy
    }

    /// Get the close policy.
    pub fn close_policy(&self) -> ClosePolicy {
        self.options.close_policy
    }

    /// Upper bound on concurrent backend calls within one parallel dispatch.
    pub fn max_concurrency(&self) -> usize {
        self.limit
    }
}

impl<S: Store + 'static> Store for Combiner<S> {
    async fn set<V>(&self, key: &str, value: &V) -> Result<()>
    where
        V: Serialize + Clone + Send + Sync + 'static,
    {
        validate_key(key).map_err(|e| Error::Multi(MultiError::from(e)))?;

        let shared_key: Arc<str> = Arc::from(key);
        let value = Arc::new(value.clone());
        let call = move |backend: Arc<S>| {
            let key = Arc::clone(&shared_key);
            let value = Arc::clone(&value);
            async move { backend.set(&key, &*value).await }
        };
        update::dispatch(
            self.options.set_policy,
            &self.backends,
            self.limit,
            "set",
            key,
            call,
        )
        .await
    }

    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: DeserializeOwned + PartialEq + Send,
    {
        validate_key(key)?;
        get::dispatch(self.options.get_policy, &self.backends, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key).map_err(|e| Error::Multi(MultiError::from(e)))?;

        let shared_key: Arc<str> = Arc::from(key);
        let call = move |backend: Arc<S>| {
            let key = Arc::clone(&shared_key);
            async move { backend.delete(&key).await }
        };
        update::dispatch(
            self.options.delete_policy,
            &self.backends,
            self.limit,
            "delete",
            key,
            call,
        )
        .await
    }

    async fn close(&self) -> Result<()> {
        close::dispatch(self.options.close_policy, &self.backends, self.limit).await
    }
}

/// Builder for [`Combiner`].
pub struct CombinerBuilder<S: Store + 'static> {
    backends: Vec<Result<S>>,
    options: CombinerOptions,
}

impl<S: Store + 'static> CombinerBuilder<S> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            options: CombinerOptions::default(),
        }
    }

    /// Add a backend to the combiner.
    pub fn add_backend(mut self, backend: S) -> Self {
        self.backends.push(Ok(backend));
        self
    }

    /// Add the outcome of constructing a backend.
    ///
    /// An `Err` makes [`build`](Self::build) fail with that error.
    pub fn add_backend_result(mut self, backend: Result<S>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Replace every option at once.
    pub fn options(mut self, options: CombinerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the set policy (default: SequentialWaitAll).
    pub fn set_policy(mut self, policy: UpdatePolicy) -> Self {
        self.options.set_policy = policy;
        self
    }

    /// Set the get policy (default: SequentialWaitAll).
    pub fn get_policy(mut self, policy: GetPolicy) -> Self {
        self.options.get_policy = policy;
        self
    }

    /// Set the delete policy (default: SequentialWaitAll).
    pub fn delete_policy(mut self, policy: UpdatePolicy) -> Self {
        self.options.delete_policy = policy;
        self
    }

    /// Set the close policy (default: SequentialWaitAll).
    pub fn close_policy(mut self, policy: ClosePolicy) -> Self {
        self.options.close_policy = policy;
        self
    }

    /// Bound concurrent backend calls per dispatch (default: available
    /// processing units).
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.options.max_concurrency = Some(limit);
        self
    }

    /// Build the combiner.
    pub fn build(self) -> Result<Combiner<S>> {
        Combiner::new(self.options, self.backends)
    }
}

impl<S: Store + 'static> Default for CombinerBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store + 'static> Debug for CombinerBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinerBuilder")
            .field("backend_count", &self.backends.len())
            .field("options", &self.options)
            .finish()
    }
}
