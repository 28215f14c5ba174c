//! Simulated live feed.
//!
//! A background task that periodically perturbs every station's capacity
//! and availability, writes the result back with `replace_all`, and
//! invalidates the cached query results for that store.

mod mutator;

pub use mutator::{FeedHandle, FeedMutator, MutatorConfig, perturb};
