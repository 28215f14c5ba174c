//! Station storage.
//!
//! Two interchangeable backends sit behind [`StationStore`]:
//!
//! - [`SnapshotStore`]: one in-process list loaded from a seed file, with
//!   every operation serialized behind a single lock. Lookups are linear
//!   scans.
//! - [`DocumentStore`]: a facade over a partitioned document database.
//!   Lookups by the partition key are point reads; lookups by any other
//!   field are cross-partition queries.
//!
//! Both backends default a missing `id` from `number` and stamp both
//! timestamps on `add` and `update`. Neither knows about caching; callers
//! that mutate a store are responsible for invalidating cached results.

pub mod document;
mod error;
pub mod seed;
mod snapshot;

use std::fmt;
use std::future::Future;

use crate::domain::Station;

pub use document::{DocumentStore, DocumentStoreConfig, PartitionKeyField};
pub use error::StoreError;
pub use snapshot::SnapshotStore;

/// Identifies which backend served a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Snapshot,
    Document,
}

impl Backend {
    /// Short lowercase name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Snapshot => "snapshot",
            Backend::Document => "document",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence contract shared by both backends.
///
/// `update` matches on the key the backend indexes by (number for the
/// snapshot store, the partition key for the document store) and returns
/// `false` when nothing matched. `replace_all` swaps the whole dataset so
/// that a concurrent `get_all` sees either the old or the new set, never a
/// mix of both.
pub trait StationStore: Send + Sync + 'static {
    /// Backend tag carried by log events and cache scopes.
    const BACKEND: Backend;

    /// Point-in-time copy of every station.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Station>, StoreError>> + Send;

    /// Look up a station by its human-facing number.
    fn get_by_number(
        &self,
        number: i32,
    ) -> impl Future<Output = Result<Option<Station>, StoreError>> + Send;

    /// Look up a station by its canonical id.
    fn get_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Station>, StoreError>> + Send;

    /// Insert a new station.
    fn add(&self, station: Station) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace an existing station, returning `false` if none matched.
    fn update(&self, station: Station) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Replace the whole dataset.
    fn replace_all(
        &self,
        stations: Vec<Station>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
