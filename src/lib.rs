use std::fmt::{self, Debug};

use serde::Serialize;
use serde::de::DeserializeOwned;

#[cfg(feature = "memory")]
pub use adapters::memory::MemoryStore;

pub use adapters::multi::{
    ClosePolicy, Combiner, CombinerBuilder, CombinerOptions, GetPolicy, UpdatePolicy,
};

pub use adapters::multi;

/// A specialized Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An ordered collection of errors returned as one error value.
///
/// Combiners collect one entry per failed backend call, in the order the
/// failures were observed. The underlying errors are kept unmodified so
/// callers can branch on a specific failure kind.
///
/// ```
/// # use kvcombine::{Error, MultiError};
/// let mut errors = MultiError::new();
/// assert_eq!(errors.to_string(), "no error");
///
/// errors.push(Error::Generic("disk full".to_string()));
/// errors.push(Error::Generic("timeout".to_string()));
/// assert_eq!(errors.len(), 2);
/// assert_eq!(
///     errors.to_string(),
///     "Generic store error: disk full; Generic store error: timeout"
/// );
/// ```
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<Error>,
}

impl MultiError {
    /// Text rendered for an aggregate that holds no errors.
    pub const EMPTY: &'static str = "no error";

    /// Separator placed between underlying error texts.
    pub const SEPARATOR: &'static str = "; ";

    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// The underlying errors in collection order.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Iterate over the underlying errors.
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    /// Number of collected errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns true if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Take the underlying errors.
    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    /// `Ok(())` when empty, otherwise `Err(Error::Multi(self))`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Multi(self))
        }
    }
}

impl From<Error> for MultiError {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl FromIterator<Error> for MultiError {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for MultiError {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str(Self::EMPTY);
        }
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(Self::SEPARATOR)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A unified Error type for store operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("key must not be empty")]
    EmptyKey,

    #[error("not enough stores: a combiner needs at least 2 backends, got {0}")]
    NotEnoughStores(usize),

    #[error("value found in one store but not another (store 0 and store {index} disagree)")]
    FoundMismatch { index: usize },

    #[error("values found but not deeply equal (store 0 and store {index} disagree)")]
    ValueMismatch { index: usize },

    #[error("unimplemented policy: {0}")]
    UnimplementedPolicy(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("backend task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Generic store error: {0}")]
    Generic(String),

    #[error("{0}")]
    Multi(MultiError),
}

impl Error {
    /// Returns the aggregate if this is [`Error::Multi`].
    pub fn as_multi(&self) -> Option<&MultiError> {
        match self {
            Error::Multi(errors) => Some(errors),
            _ => None,
        }
    }

    /// Returns true for errors synthesized when backends disagree on a read.
    pub fn is_inconsistency(&self) -> bool {
        matches!(
            self,
            Error::FoundMismatch { .. } | Error::ValueMismatch { .. }
        )
    }
}

impl From<MultiError> for Error {
    fn from(errors: MultiError) -> Self {
        Error::Multi(errors)
    }
}

/// Reject an empty key.
///
/// Every [`Store`] implementation calls this before doing any work.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(Error::EmptyKey)
    } else {
        Ok(())
    }
}

/// Store modules, gated behind Cargo features.
pub mod adapters {
    #[cfg(feature = "memory")]
    pub mod memory;
    pub mod multi;
}

/// The core key-value store trait.
///
/// Values are typed: a store encodes whatever it is given with its own codec
/// and decodes into the type the caller asks for. Backends are opaque to a
/// [`Combiner`], which is itself a `Store` and can therefore be nested.
///
/// ## Contract
/// - Every method fails with [`Error::EmptyKey`] when given an empty key.
/// - `get` returns `Ok(None)` when the key is absent.
/// - `delete` of an absent key is not an error.
/// - `close` releases the store's resources. Calling it twice is allowed to
///   fail; idempotence is up to the implementation.
pub trait Store: Send + Sync + Debug {
    /// Store `value` under `key`, replacing any previous value.
    fn set<V>(&self, key: &str, value: &V) -> impl std::future::Future<Output = Result<()>> + Send
    where
        V: Serialize + Clone + Send + Sync + 'static;

    /// Retrieve the value stored under `key`.
    ///
    /// The decoded type needs `PartialEq` so that combiners can compare the
    /// values returned by different backends.
    fn get<V>(&self, key: &str) -> impl std::future::Future<Output = Result<Option<V>>> + Send
    where
        V: DeserializeOwned + PartialEq + Send;

    /// Remove `key`. Idempotent (returns `Ok(())` if already absent).
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Release the store's resources.
    fn close(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}
