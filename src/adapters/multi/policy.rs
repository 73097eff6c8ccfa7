//! Policies selecting how a [`Combiner`](super::Combiner) fans an operation out.
//!
//! Each operation kind has its own closed set of policies. Set and Delete
//! share [`UpdatePolicy`] but hold independent values; Get uses
//! [`GetPolicy`]; Close uses [`ClosePolicy`].
//!
//! Every policy has a canonical name equal to its variant name. Parsing
//! accepts the canonical name in any case and the snake_case spelling:
//!
//! ```
//! # use kvcombine::UpdatePolicy;
//! let policy: UpdatePolicy = "parallel_wait_error_then_skip".parse().unwrap();
//! assert_eq!(policy, UpdatePolicy::ParallelWaitErrorThenSkip);
//! assert_eq!(policy.to_string(), "ParallelWaitErrorThenSkip");
//! assert!("ParallelWaitForever".parse::<UpdatePolicy>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Strategy for Set and Delete.
///
/// "Background continuation" variants return before every backend has been
/// called. The remaining calls run in a detached task and their errors are
/// discarded, so a successful return does not mean the value is durable on
/// every backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum UpdatePolicy {
    /// Call each backend in order and wait for all of them.
    /// Every backend is attempted; all failures are returned together.
    #[default]
    SequentialWaitAll,

    /// Call all backends concurrently and wait for all of them.
    /// All failures are returned together.
    ParallelWaitAll,

    /// Call backends in order until the first error, which is returned
    /// immediately. The remaining backends are called in the background.
    SequentialWaitErrorThenContinue,

    /// Call all backends concurrently and return on the first error.
    /// Calls still in flight continue unsupervised.
    ParallelWaitErrorThenContinue,

    /// Call backends in order and stop at the first error.
    /// The remaining backends are never called.
    SequentialWaitErrorThenSkip,

    /// Call all backends concurrently and return on the first error.
    /// Calls that have not started yet are skipped; calls already in flight
    /// finish but their results are ignored.
    ParallelWaitErrorThenSkip,

    /// Call backends in order until one succeeds. The remaining backends are
    /// called in the background. Fails only if every backend fails.
    SequentialWaitNoError,

    /// Call the first backend and return its result. The remaining backends
    /// are always called in the background.
    SequentialWaitFirst,
}

impl UpdatePolicy {
    /// Every update policy.
    pub const ALL: [UpdatePolicy; 8] = [
        UpdatePolicy::SequentialWaitAll,
        UpdatePolicy::ParallelWaitAll,
        UpdatePolicy::SequentialWaitErrorThenContinue,
        UpdatePolicy::ParallelWaitErrorThenContinue,
        UpdatePolicy::SequentialWaitErrorThenSkip,
        UpdatePolicy::ParallelWaitErrorThenSkip,
        UpdatePolicy::SequentialWaitNoError,
        UpdatePolicy::SequentialWaitFirst,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            UpdatePolicy::SequentialWaitAll => "SequentialWaitAll",
            UpdatePolicy::ParallelWaitAll => "ParallelWaitAll",
            UpdatePolicy::SequentialWaitErrorThenContinue => "SequentialWaitErrorThenContinue",
            UpdatePolicy::ParallelWaitErrorThenContinue => "ParallelWaitErrorThenContinue",
            UpdatePolicy::SequentialWaitErrorThenSkip => "SequentialWaitErrorThenSkip",
            UpdatePolicy::ParallelWaitErrorThenSkip => "ParallelWaitErrorThenSkip",
            UpdatePolicy::SequentialWaitNoError => "SequentialWaitNoError",
            UpdatePolicy::SequentialWaitFirst => "SequentialWaitFirst",
        }
    }

    /// Returns true if backends are called from concurrent worker tasks.
    pub fn is_parallel(&self) -> bool {
        matches!(
            self,
            UpdatePolicy::ParallelWaitAll
                | UpdatePolicy::ParallelWaitErrorThenContinue
                | UpdatePolicy::ParallelWaitErrorThenSkip
        )
    }

    /// Returns true if the call may return while backend calls are still
    /// running or yet to run.
    pub fn continues_in_background(&self) -> bool {
        matches!(
            self,
            UpdatePolicy::SequentialWaitErrorThenContinue
                | UpdatePolicy::ParallelWaitErrorThenContinue
                | UpdatePolicy::SequentialWaitNoError
                | UpdatePolicy::SequentialWaitFirst
        )
    }
}

/// Strategy for Get. All Get policies call backends in order on the
/// caller's task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum GetPolicy {
    /// Call every backend and require them to agree.
    ///
    /// Each backend's found-state must match the first backend's, and found
    /// values must be equal (`PartialEq`) to the first backend's value. The
    /// first disagreement or backend error is returned without calling the
    /// remaining backends.
    #[default]
    SequentialWaitAll,

    /// Call only the first backend; its result is final.
    SequentialWaitFirst,

    /// Call backends in order until one returns without error, found or not.
    SequentialWaitSuccess,

    /// Call backends in order until one finds the key.
    /// Not-found if no backend has it; an error only if every backend failed.
    SequentialWaitResult,
}

impl GetPolicy {
    /// Every get policy.
    pub const ALL: [GetPolicy; 4] = [
        GetPolicy::SequentialWaitAll,
        GetPolicy::SequentialWaitFirst,
        GetPolicy::SequentialWaitSuccess,
        GetPolicy::SequentialWaitResult,
    ];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            GetPolicy::SequentialWaitAll => "SequentialWaitAll",
            GetPolicy::SequentialWaitFirst => "SequentialWaitFirst",
            GetPolicy::SequentialWaitSuccess => "SequentialWaitSuccess",
            GetPolicy::SequentialWaitResult => "SequentialWaitResult",
        }
    }
}

/// Strategy for Close. Shutdown always attempts every backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ClosePolicy {
    /// Close each backend in order, collecting every error.
    #[default]
    SequentialWaitAll,

    /// Close all backends concurrently, collecting every error.
    ParallelWaitAll,
}

impl ClosePolicy {
    /// Every close policy.
    pub const ALL: [ClosePolicy; 2] = [ClosePolicy::SequentialWaitAll, ClosePolicy::ParallelWaitAll];

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            ClosePolicy::SequentialWaitAll => "SequentialWaitAll",
            ClosePolicy::ParallelWaitAll => "ParallelWaitAll",
        }
    }
}

/// Lowercase with `_`, `-` and spaces removed.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

macro_rules! named_policy {
    ($policy:ty) => {
        impl fmt::Display for $policy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $policy {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = normalize(s);
                <$policy>::ALL
                    .into_iter()
                    .find(|policy| normalize(policy.name()) == wanted)
                    .ok_or_else(|| Error::UnimplementedPolicy(s.to_string()))
            }
        }

        impl TryFrom<String> for $policy {
            type Error = Error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

named_policy!(UpdatePolicy);
named_policy!(GetPolicy);
named_policy!(ClosePolicy);
