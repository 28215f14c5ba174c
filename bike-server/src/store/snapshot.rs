//! In-process snapshot store.

use std::path::Path;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::Station;

use super::error::StoreError;
use super::seed::load_stations;
use super::{Backend, StationStore};

/// Station list held in memory.
///
/// A single mutex is held for the full duration of every operation, so all
/// access is serialized: `replace_all` and `get_all` never interleave.
/// Lookups are linear scans. Records are matched for `update` by `number`.
#[derive(Debug)]
pub struct SnapshotStore {
    stations: Mutex<Vec<Station>>,
}

impl SnapshotStore {
    /// Load the initial dataset from a seed file.
    ///
    /// The store cannot serve without its dataset, so any failure here is
    /// returned to the caller to treat as fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let stations = load_stations(path)?;
        info!(count = stations.len(), path = %path.display(), "loaded station snapshot");
        Ok(Self::from_stations(stations))
    }

    /// Build a store from stations already in memory.
    pub fn from_stations(stations: Vec<Station>) -> Self {
        let stations = stations
            .into_iter()
            .map(|mut s| {
                s.ensure_id();
                s
            })
            .collect();
        Self {
            stations: Mutex::new(stations),
        }
    }

    /// Number of stations currently held.
    pub async fn len(&self) -> usize {
        self.stations.lock().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.stations.lock().await.is_empty()
    }
}

impl StationStore for SnapshotStore {
    const BACKEND: Backend = Backend::Snapshot;

    async fn get_all(&self) -> Result<Vec<Station>, StoreError> {
        // Callers get their own copy; the internal list is never shared.
        Ok(self.stations.lock().await.clone())
    }

    async fn get_by_number(&self, number: i32) -> Result<Option<Station>, StoreError> {
        let guard = self.stations.lock().await;
        Ok(guard.iter().find(|s| s.number == number).cloned())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Station>, StoreError> {
        let guard = self.stations.lock().await;
        Ok(guard.iter().find(|s| s.id == id).cloned())
    }

    async fn add(&self, mut station: Station) -> Result<(), StoreError> {
        station.ensure_id();
        station.stamp(Utc::now());

        let mut guard = self.stations.lock().await;
        guard.push(station);
        Ok(())
    }

    async fn update(&self, mut station: Station) -> Result<bool, StoreError> {
        station.ensure_id();
        station.stamp(Utc::now());

        let mut guard = self.stations.lock().await;
        match guard.iter_mut().find(|s| s.number == station.number) {
            Some(slot) => {
                *slot = station;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_all(&self, stations: Vec<Station>) -> Result<(), StoreError> {
        let stations: Vec<Station> = stations
            .into_iter()
            .map(|mut s| {
                s.ensure_id();
                s
            })
            .collect();

        let mut guard = self.stations.lock().await;
        *guard = stations;
        Ok(())
    }
}
