//! Combining multiple stores into one.
//!
//! A [`Combiner`] implements the [`Store`](crate::Store) trait by fanning
//! every operation out to an ordered list of backends and fanning the
//! results back in. Each operation kind follows its own policy, trading
//! latency against durability and consistency:
//!
//! - [`UpdatePolicy`] for `set` and `delete` (sequential or parallel,
//!   wait for all, stop or continue on error, background continuation)
//! - [`GetPolicy`] for `get` (require agreement, first backend, first
//!   success, first hit)
//! - [`ClosePolicy`] for `close` (sequential or parallel, always all)
//!
//! Backend failures surface inside [`Error::Multi`](crate::Error::Multi),
//! one entry per failed backend call.
//!
//! # Examples
//!
//! ## Write fast, finish in the background
//!
//! ```
//! # use kvcombine::{Store, MemoryStore};
//! # async fn example() -> kvcombine::Result<()> {
//! use kvcombine::multi::{Combiner, GetPolicy, UpdatePolicy};
//!
//! let combiner = Combiner::builder()
//!     .add_backend(MemoryStore::new())
//!     .add_backend(MemoryStore::new())
//!     .add_backend(MemoryStore::new())
//!     // Return once the first backend has the value
//!     .set_policy(UpdatePolicy::SequentialWaitFirst)
//!     // Read from whichever backend has it first
//!     .get_policy(GetPolicy::SequentialWaitResult)
//!     .build()?;
//!
//! combiner.set("session:42", &"alice".to_string()).await?;
//! let user: Option<String> = combiner.get("session:42").await?;
//! assert_eq!(user.as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Composing combiners
//!
//! ```
//! # use kvcombine::{Store, MemoryStore};
//! # async fn example() -> kvcombine::Result<()> {
//! use kvcombine::multi::{Combiner, UpdatePolicy};
//!
//! let region = |policy| {
//!     Combiner::builder()
//!         .add_backend(MemoryStore::new())
//!         .add_backend(MemoryStore::new())
//!         .set_policy(policy)
//!         .build()
//! };
//!
//! // Both regions are written in parallel; inside each region writes are sequential
//! let global = Combiner::builder()
//!     .add_backend_result(region(UpdatePolicy::SequentialWaitAll))
//!     .add_backend_result(region(UpdatePolicy::SequentialWaitAll))
//!     .set_policy(UpdatePolicy::ParallelWaitAll)
//!     .build()?;
//!
//! global.set("config", &vec![1, 2, 3]).await?;
//! # Ok(())
//! # }
//! ```

mod close;
mod combiner;
mod fanout;
mod get;
mod policy;
mod update;

pub use combiner::{Combiner, CombinerBuilder, CombinerOptions};
pub use policy::{ClosePolicy, GetPolicy, UpdatePolicy};
