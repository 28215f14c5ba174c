//! Station service: the call surface offered to request handlers.
//!
//! Wraps one store and its scope in the shared result cache. Queries read
//! through the cache; every mutation invalidates the store's cached results
//! before returning.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheScope, ResultCache};
use crate::domain::{Station, StationView, Summary, ValidationError};
use crate::query::{QueryPage, QueryParams, run_query};
use crate::store::{StationStore, StoreError};

/// Error from a service call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request was rejected before touching the store
    #[error("invalid station: {0}")]
    Validation(#[from] ValidationError),

    /// The store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Query and mutation entry point for one store.
///
/// Each call to [`StationService::new`] registers a fresh cache scope.
/// Clone the service to share a store between tasks so that they also
/// share its invalidations.
pub struct StationService<S> {
    store: Arc<S>,
    cache: Arc<ResultCache>,
    scope: CacheScope,
}

impl<S> Clone for StationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            scope: self.scope.clone(),
        }
    }
}

impl<S: StationStore> StationService<S> {
    pub fn new(store: Arc<S>, cache: Arc<ResultCache>) -> Self {
        let scope = cache.register(S::BACKEND);
        Self { store, cache, scope }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// This store's scope in the shared cache.
    pub fn scope(&self) -> &CacheScope {
        &self.scope
    }

    /// Filtered, sorted page of stations, served from cache when the
    /// store has not changed since the page was computed.
    pub async fn query(&self, params: &QueryParams) -> Result<Arc<QueryPage>, ServiceError> {
        let store = &self.store;
        self.cache
            .get_or_compute(&self.scope, params, |params| async move {
                let stations = store.get_all().await?;
                Ok::<_, ServiceError>(run_query(stations, &params))
            })
            .await
    }

    pub async fn get_by_number(&self, number: i32) -> Result<Option<StationView>, ServiceError> {
        let station = self.store.get_by_number(number).await?;
        Ok(station.as_ref().map(StationView::from))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<StationView>, ServiceError> {
        let station = self.store.get_by_id(id).await?;
        Ok(station.as_ref().map(StationView::from))
    }

    /// Add a station.
    ///
    /// Rejects negative capacity without touching the store or the cache.
    pub async fn add(&self, station: Station) -> Result<bool, ServiceError> {
        station.validate()?;
        let number = station.number;

        let result = self.store.add(station).await;
        self.scope.invalidate();
        result?;

        debug!(number, backend = %S::BACKEND, "Added station");
        Ok(true)
    }

    /// Replace a station, returning `false` when the store has no match.
    ///
    /// Applies the same capacity check as [`StationService::add`], so a
    /// negative `bike_stands` fails with [`ServiceError::Validation`] and
    /// leaves the store and cache untouched.
    pub async fn update(&self, station: Station) -> Result<bool, ServiceError> {
        station.validate()?;
        let number = station.number;

        let result = self.store.update(station).await;
        self.scope.invalidate();
        let updated = result?;

        debug!(number, updated, backend = %S::BACKEND, "Updated station");
        Ok(updated)
    }

    /// Fleet-wide totals over the current snapshot.
    pub async fn summary(&self) -> Result<Summary, ServiceError> {
        let stations = self.store.get_all().await?;
        Ok(Summary::from_stations(&stations))
    }

    /// Drop every cached result for this store.
    pub fn invalidate_cache(&self) {
        self.scope.invalidate();
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
