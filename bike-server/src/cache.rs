//! Read-through cache for query results.
//!
//! Each store that shares the cache registers a [`CacheScope`]. Entries are
//! keyed by `(scope, normalized params)` and tagged with the scope's
//! generation at the moment the snapshot was read. Invalidation bumps the
//! generation instead of evicting keys: any entry written under an older
//! generation is treated as a miss on its next lookup. The TTL is a
//! backstop in case a mutation path ever skips invalidation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::query::{QueryPage, QueryParams};
use crate::store::Backend;

/// Cache key: which scope answered, and what was asked.
type QueryKey = (u64, QueryParams);

/// A cached page and the generations it was computed under.
#[derive(Debug)]
struct CacheEntry {
    epoch: u64,
    generation: u64,
    page: Arc<QueryPage>,
}

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }
}

#[derive(Debug)]
struct ScopeState {
    id: u64,
    backend: Backend,
    generation: AtomicU64,
}

/// Invalidation handle for one store instance's cached results.
///
/// Clones share the same generation, so every component that mutates the
/// store must hold a clone of the scope its readers use.
#[derive(Debug, Clone)]
pub struct CacheScope {
    state: Arc<ScopeState>,
}

impl CacheScope {
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn backend(&self) -> Backend {
        self.state.backend
    }

    /// Current generation of this scope.
    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }

    /// Start a new generation, making every entry written under an earlier
    /// one stale.
    ///
    /// Safe to call concurrently: each call advances the generation, so
    /// no invalidation is lost.
    pub fn invalidate(&self) {
        let previous = self.state.generation.fetch_add(1, Ordering::AcqRel);
        debug!(
            backend = %self.state.backend,
            scope = self.state.id,
            generation = previous + 1,
            "Invalidated query cache"
        );
    }
}

/// Query result cache shared by any number of store scopes.
pub struct ResultCache {
    entries: MokaCache<QueryKey, Arc<CacheEntry>>,
    next_scope: AtomicU64,
    epoch: AtomicU64,
}

impl ResultCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self {
            entries,
            next_scope: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    /// Register a store instance, returning the scope its entries live in.
    pub fn register(&self, backend: Backend) -> CacheScope {
        let id = self.next_scope.fetch_add(1, Ordering::Relaxed);
        debug!(%backend, scope = id, "Registered query cache scope");
        CacheScope {
            state: Arc::new(ScopeState {
                id,
                backend,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Generation shared by every scope, advanced by [`ResultCache::invalidate_all`].
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Make every cached entry stale, whatever its scope.
    pub fn invalidate_all(&self) {
        let previous = self.epoch.fetch_add(1, Ordering::AcqRel);
        debug!(epoch = previous + 1, "Invalidated every query cache scope");
    }

    /// Return the cached page for `params`, or compute and cache it.
    ///
    /// The generations are read before `compute` runs. If the scope is
    /// invalidated while computing, the result is still returned but not
    /// cached, so the next lookup recomputes against fresh data. Errors from
    /// `compute` are returned as-is and nothing is cached.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        scope: &CacheScope,
        params: &QueryParams,
        compute: F,
    ) -> Result<Arc<QueryPage>, E>
    where
        F: FnOnce(QueryParams) -> Fut,
        Fut: Future<Output = Result<QueryPage, E>>,
    {
        let params = params.clone().normalized();
        let key = (scope.id(), params.clone());
        let epoch = self.epoch();
        let generation = scope.generation();
        let backend = scope.backend();

        if let Some(entry) = self.entries.get(&key).await
            && entry.epoch == epoch
            && entry.generation == generation
        {
            debug!(%backend, scope = scope.id(), generation, "Query cache hit");
            return Ok(entry.page.clone());
        }
        debug!(%backend, scope = scope.id(), generation, "Query cache miss");

        let page = Arc::new(compute(params).await?);

        if self.epoch() == epoch && scope.generation() == generation {
            let entry = Arc::new(CacheEntry {
                epoch,
                generation,
                page: page.clone(),
            });
            self.entries.insert(key, entry).await;
        }

        Ok(page)
    }

    /// Get cache statistics (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::AtomicUsize;

    use crate::domain::{Station, StationView};

    fn page_of(numbers: &[i32]) -> QueryPage {
        let items: Vec<StationView> = numbers
            .iter()
            .map(|n| StationView::from(&Station::new(*n, "s")))
            .collect();
        QueryPage {
            total: items.len(),
            items,
        }
    }

    async fn lookup(
        cache: &ResultCache,
        scope: &CacheScope,
        params: &QueryParams,
        calls: &AtomicUsize,
        numbers: &[i32],
    ) -> Arc<QueryPage> {
        cache
            .get_or_compute(scope, params, move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(page_of(numbers))
            })
            .await
            .unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.max_capacity, 10_000);
    }

    #[test]
    fn cache_creation() {
        let cache = ResultCache::new(&CacheConfig::default());
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.epoch(), 0);

        let scope = cache.register(Backend::Snapshot);
        assert_eq!(scope.generation(), 0);
        assert_eq!(scope.backend(), Backend::Snapshot);
    }

    #[test]
    fn registered_scopes_get_distinct_ids() {
        let cache = ResultCache::new(&CacheConfig::default());
        let a = cache.register(Backend::Document);
        let b = cache.register(Backend::Document);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        let first = lookup(&cache, &scope, &params, &calls, &[1]).await;
        let second = lookup(&cache, &scope, &params, &calls, &[2]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn equivalent_params_share_an_entry() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);

        lookup(&cache, &scope, &QueryParams::default(), &calls, &[1]).await;
        let unclamped = QueryParams::default().with_page(0, 20).with_status(" ");
        lookup(&cache, &scope, &unclamped, &calls, &[1]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compute_receives_normalized_params() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let params = QueryParams::default().with_page(0, 900);

        let page = cache
            .get_or_compute(&scope, &params, |p| async move {
                assert_eq!((p.page, p.page_size), (1, 200));
                Ok::<_, Infallible>(page_of(&[]))
            })
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        lookup(&cache, &scope, &params, &calls, &[1]).await;
        scope.invalidate();
        let page = lookup(&cache, &scope, &params, &calls, &[1, 2]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn clones_of_a_scope_share_invalidation() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let writer = scope.clone();
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        lookup(&cache, &scope, &params, &calls, &[1]).await;
        writer.invalidate();
        lookup(&cache, &scope, &params, &calls, &[1]).await;

        assert_eq!(scope.generation(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn backends_are_cached_separately() {
        let cache = ResultCache::new(&CacheConfig::default());
        let snapshot_scope = cache.register(Backend::Snapshot);
        let document_scope = cache.register(Backend::Document);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        let snapshot = lookup(&cache, &snapshot_scope, &params, &calls, &[1]).await;
        let document = lookup(&cache, &document_scope, &params, &calls, &[1, 2]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(snapshot, document);
    }

    #[tokio::test]
    async fn stores_of_the_same_backend_are_cached_separately() {
        let cache = ResultCache::new(&CacheConfig::default());
        let a = cache.register(Backend::Snapshot);
        let b = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        let from_a = lookup(&cache, &a, &params, &calls, &[1, 2]).await;
        let from_b = lookup(&cache, &b, &params, &calls, &[9]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(from_a.total, 2);
        assert_eq!(from_b.items.len(), 1);
        assert_eq!(from_b.items[0].number, 9);
    }

    #[tokio::test]
    async fn invalidation_is_scoped_to_one_store() {
        let cache = ResultCache::new(&CacheConfig::default());
        let a = cache.register(Backend::Document);
        let b = cache.register(Backend::Document);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        lookup(&cache, &a, &params, &calls, &[1]).await;
        lookup(&cache, &b, &params, &calls, &[1]).await;
        b.invalidate();

        lookup(&cache, &a, &params, &calls, &[1]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        lookup(&cache, &b, &params, &calls, &[1]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalidate_all_covers_every_scope() {
        let cache = ResultCache::new(&CacheConfig::default());
        let snapshot = cache.register(Backend::Snapshot);
        let document = cache.register(Backend::Document);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        lookup(&cache, &snapshot, &params, &calls, &[1]).await;
        lookup(&cache, &document, &params, &calls, &[1]).await;
        cache.invalidate_all();
        lookup(&cache, &snapshot, &params, &calls, &[1]).await;
        lookup(&cache, &document, &params, &calls, &[1]).await;

        assert_eq!(cache.epoch(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn result_computed_across_invalidation_is_not_cached() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();
        let (scope_ref, calls_ref) = (&scope, &calls);

        cache
            .get_or_compute(&scope, &params, move |_| async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                scope_ref.invalidate();
                Ok::<_, Infallible>(page_of(&[1]))
            })
            .await
            .unwrap();
        lookup(&cache, &scope, &params, &calls, &[1]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        let err = cache
            .get_or_compute(&scope, &params, |_| async { Err::<QueryPage, _>("down") })
            .await
            .unwrap_err();
        assert_eq!(err, "down");

        lookup(&cache, &scope, &params, &calls, &[1]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_invalidations_are_not_lost() {
        let cache = ResultCache::new(&CacheConfig::default());
        let scope = cache.register(Backend::Snapshot);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let scope = scope.clone();
                tokio::spawn(async move { scope.invalidate() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(scope.generation(), 16);
    }

    #[tokio::test]
    async fn ttl_is_a_backstop() {
        let cache = ResultCache::new(&CacheConfig::default().with_ttl(Duration::from_millis(50)));
        let scope = cache.register(Backend::Snapshot);
        let calls = AtomicUsize::new(0);
        let params = QueryParams::default();

        lookup(&cache, &scope, &params, &calls, &[1]).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        lookup(&cache, &scope, &params, &calls, &[1]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
