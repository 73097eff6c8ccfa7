//! Common test utilities and reusable test suite for stores
//!
//! This module provides:
//! - `TestStore`, an instrumented in-memory store with call counters,
//!   failure switches, an optional delay and an in-flight gauge
//! - a macro `store_test_suite!` that generates the Store contract tests
//!   for any Store implementation
#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kvcombine::{Error, Result, Store, validate_key};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Macro to generate the Store contract tests for a Store implementation.
///
/// # Usage
///
/// ```ignore
/// store_test_suite!(setup = async { MyStore::new() });
/// ```
#[macro_export]
macro_rules! store_test_suite {
    (setup = $setup:expr) => {
        mod store_test_suite {
            use super::*;
            use $crate::test_common::*;

            #[tokio::test]
            async fn test_set_and_get() {
                let store = $setup.await;
                run_test_set_and_get(&store).await;
            }

            #[tokio::test]
            async fn test_get_missing() {
                let store = $setup.await;
                run_test_get_missing(&store).await;
            }

            #[tokio::test]
            async fn test_overwrite() {
                let store = $setup.await;
                run_test_overwrite(&store).await;
            }

            #[tokio::test]
            async fn test_delete_existing() {
                let store = $setup.await;
                run_test_delete_existing(&store).await;
            }

            #[tokio::test]
            async fn test_delete_idempotent() {
                let store = $setup.await;
                run_test_delete_idempotent(&store).await;
            }

            #[tokio::test]
            async fn test_structured_value() {
                let store = $setup.await;
                run_test_structured_value(&store).await;
            }

            #[tokio::test]
            async fn test_empty_key_rejected() {
                let store = $setup.await;
                run_test_empty_key_rejected(&store).await;
            }

            #[tokio::test]
            async fn test_close() {
                let store = $setup.await;
                run_test_close(&store).await;
            }
        }
    };
}

// Individual test implementations that can be reused

#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct Profile {
    pub name: String,
    pub age: u32,
    pub tags: Vec<String>,
}

impl Profile {
    pub fn sample() -> Self {
        Self {
            name: "Alice".to_string(),
            age: 30,
            tags: vec!["admin".to_string(), "ops".to_string()],
        }
    }
}

pub async fn run_test_set_and_get<S: Store>(store: &S) {
    store.set("answer", &42i64).await.unwrap();
    assert_eq!(store.get::<i64>("answer").await.unwrap(), Some(42));
}

pub async fn run_test_get_missing<S: Store>(store: &S) {
    assert_eq!(store.get::<String>("missing").await.unwrap(), None);
}

pub async fn run_test_overwrite<S: Store>(store: &S) {
    store.set("k", &"original".to_string()).await.unwrap();
    store.set("k", &"updated".to_string()).await.unwrap();
    assert_eq!(
        store.get::<String>("k").await.unwrap().as_deref(),
        Some("updated")
    );
}

pub async fn run_test_delete_existing<S: Store>(store: &S) {
    store.set("k", &true).await.unwrap();
    assert_eq!(store.get::<bool>("k").await.unwrap(), Some(true));

    store.delete("k").await.unwrap();
    assert_eq!(store.get::<bool>("k").await.unwrap(), None);
}

pub async fn run_test_delete_idempotent<S: Store>(store: &S) {
    // Deleting an absent key should not error
    store.delete("never-set").await.unwrap();
    store.delete("never-set").await.unwrap();
}

pub async fn run_test_structured_value<S: Store>(store: &S) {
    let profile = Profile::sample();
    store.set("profile:alice", &profile).await.unwrap();
    assert_eq!(
        store.get::<Profile>("profile:alice").await.unwrap(),
        Some(profile)
    );
}

pub async fn run_test_empty_key_rejected<S: Store>(store: &S) {
    assert!(is_empty_key(&store.set("", &1).await.unwrap_err()));
    assert!(is_empty_key(&store.get::<i32>("").await.unwrap_err()));
    assert!(is_empty_key(&store.delete("").await.unwrap_err()));
}

pub async fn run_test_close<S: Store>(store: &S) {
    store.close().await.unwrap();
}

/// True for `EmptyKey`, bare or as the only entry of an aggregate.
pub fn is_empty_key(error: &Error) -> bool {
    match error {
        Error::EmptyKey => true,
        Error::Multi(errors) => errors.len() == 1 && matches!(errors.errors()[0], Error::EmptyKey),
        _ => false,
    }
}

/// Number of errors inside an `Error::Multi`, panicking on anything else.
pub fn multi_len(error: &Error) -> usize {
    match error {
        Error::Multi(errors) => errors.len(),
        other => panic!("expected Error::Multi, got {other:?}"),
    }
}

/// Give detached background work time to finish.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Tracks how many backend calls are running at the same time.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

struct InFlight(Option<Arc<Gauge>>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(gauge) = &self.0 {
            gauge.current.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct Inner {
    name: String,
    data: Mutex<HashMap<String, Vec<u8>>>,
    fail_set: AtomicBool,
    fail_get: AtomicBool,
    fail_delete: AtomicBool,
    fail_close: AtomicBool,
    panic_set: AtomicBool,
    set_calls: AtomicUsize,
    get_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    close_calls: AtomicUsize,
    delay_ms: AtomicU64,
    gauge: Mutex<Option<Arc<Gauge>>>,
}

/// An instrumented in-memory store for exercising combiner policies.
///
/// Clones share state, so a test keeps a handle to every backend it hands
/// to a combiner. Counters count calls that passed key validation.
#[derive(Clone)]
pub struct TestStore {
    inner: Arc<Inner>,
}

impl TestStore {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                ..Default::default()
            }),
        }
    }

    /// `count` stores named `store-0`, `store-1`, ...
    pub fn many(count: usize) -> Vec<Self> {
        (0..count).map(|i| Self::new(&format!("store-{i}"))).collect()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn failing_set(self) -> Self {
        self.inner.fail_set.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_get(self) -> Self {
        self.inner.fail_get.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_delete(self) -> Self {
        self.inner.fail_delete.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_close(self) -> Self {
        self.inner.fail_close.store(true, Ordering::SeqCst);
        self
    }

    /// Panic inside `set` instead of returning an error.
    pub fn panicking_set(self) -> Self {
        self.inner.panic_set.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn with_gauge(self, gauge: Arc<Gauge>) -> Self {
        *self.inner.gauge.lock().unwrap() = Some(gauge);
        self
    }

    pub fn set_calls(&self) -> usize {
        self.inner.set_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.inner.get_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.data.lock().unwrap().contains_key(key)
    }

    /// Write a value directly, bypassing counters and failure switches.
    pub fn preload<V: Serialize>(&self, key: &str, value: &V) {
        let encoded = serde_json::to_vec(value).unwrap();
        self.inner
            .data
            .lock()
            .unwrap()
            .insert(key.to_string(), encoded);
    }

    fn failure(&self, op: &str) -> Error {
        Error::Generic(format!("{} refused {op}", self.inner.name))
    }

    async fn enter(&self) -> InFlight {
        let gauge = self.inner.gauge.lock().unwrap().clone();
        if let Some(gauge) = &gauge {
            let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.max.fetch_max(now, Ordering::SeqCst);
        }
        let guard = InFlight(gauge);
        let delay = self.inner.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        guard
    }
}

impl fmt::Debug for TestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestStore")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Store for TestStore {
    async fn set<V>(&self, key: &str, value: &V) -> Result<()>
    where
        V: Serialize + Clone + Send + Sync + 'static,
    {
        validate_key(key)?;
        self.inner.set_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.enter().await;
        if self.inner.fail_set.load(Ordering::SeqCst) {
            return Err(self.failure("set"));
        }
        if self.inner.panic_set.load(Ordering::SeqCst) {
            panic!("{} panicked in set", self.inner.name);
        }
        let encoded = serde_json::to_vec(value)?;
        self.inner
            .data
            .lock()
            .unwrap()
            .insert(key.to_string(), encoded);
        Ok(())
    }

    async fn get<V>(&self, key: &str) -> Result<Option<V>>
    where
        V: DeserializeOwned + PartialEq + Send,
    {
        validate_key(key)?;
        self.inner.get_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.enter().await;
        if self.inner.fail_get.load(Ordering::SeqCst) {
            return Err(self.failure("get"));
        }
        let encoded = self.inner.data.lock().unwrap().get(key).cloned();
        match encoded {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.inner.delete_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.enter().await;
        if self.inner.fail_delete.load(Ordering::SeqCst) {
            return Err(self.failure("delete"));
        }
        self.inner.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.enter().await;
        if self.inner.fail_close.load(Ordering::SeqCst) {
            return Err(self.failure("close"));
        }
        Ok(())
    }
}
