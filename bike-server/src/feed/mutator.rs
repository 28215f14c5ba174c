//! Background station mutator.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::service::StationService;
use crate::domain::Station;
use crate::store::{StationStore, StoreError};

/// Configuration for the feed mutator.
#[derive(Debug, Clone)]
pub struct MutatorConfig {
    /// Wait between ticks.
    pub interval: Duration,

    /// Largest capacity change applied to a station in one tick, either way.
    pub max_capacity_delta: i32,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(12_000),
            max_capacity_delta: 3,
        }
    }
}

impl MutatorConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_capacity_delta(mut self, delta: i32) -> Self {
        self.max_capacity_delta = delta;
        self
    }
}

/// Produce the next feed reading for every station.
///
/// Capacity moves by at most `max_delta` either way and never drops below
/// 1. Available bikes are redrawn uniformly from `[0, capacity]` and free
/// stands take up the rest. Every record is stamped with `now`; all other
/// fields carry over.
pub fn perturb<R: Rng + ?Sized>(
    stations: Vec<Station>,
    max_delta: i32,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Station> {
    let max_delta = max_delta.max(0);
    stations
        .into_iter()
        .map(|mut station| {
            let delta = rng.gen_range(-max_delta..=max_delta);
            let capacity = station.bike_stands.saturating_add(delta).max(1);
            let bikes = rng.gen_range(0..=capacity);

            station.bike_stands = capacity;
            station.available_bikes = bikes;
            station.available_bike_stands = capacity - bikes;
            station.stamp(now);
            station
        })
        .collect()
}

/// Periodically rewrites one store with perturbed readings.
///
/// Writes go straight to the store behind `service`, and invalidation goes
/// through that service's cache scope.
pub struct FeedMutator<S> {
    service: StationService<S>,
    config: MutatorConfig,
    rng: StdRng,
}

impl<S: StationStore> FeedMutator<S> {
    pub fn new(service: StationService<S>, config: MutatorConfig) -> Self {
        Self {
            service,
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a seeded generator, for reproducible readings.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Run a single update: read, perturb, replace, invalidate.
    ///
    /// The cache is invalidated even when `replace_all` fails. Returns the
    /// number of stations written.
    ///
    /// The read and the replace are not atomic: an `add` or `update` that
    /// lands between them is overwritten by this tick's snapshot.
    pub async fn tick(&mut self) -> Result<usize, StoreError> {
        let store = self.service.store().clone();
        let stations = store.get_all().await?;
        let next = perturb(
            stations,
            self.config.max_capacity_delta,
            Utc::now(),
            &mut self.rng,
        );
        let count = next.len();

        let result = store.replace_all(next).await;
        self.service.invalidate_cache();
        result?;

        Ok(count)
    }

    /// Tick until `shutdown` turns true or its sender is dropped.
    ///
    /// The first tick runs immediately. A failed tick is logged and the
    /// loop carries on. The wait between ticks ends early on shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            backend = %S::BACKEND,
            interval_ms = self.config.interval.as_millis() as u64,
            "Feed mutator started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.tick().await {
                Ok(count) => debug!(backend = %S::BACKEND, count, "Feed mutator updated stations"),
                Err(e) => error!(backend = %S::BACKEND, error = %e, "Feed mutator tick failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(backend = %S::BACKEND, "Feed mutator stopped");
    }

    /// Run on a background task.
    pub fn spawn(self) -> FeedHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        FeedHandle { shutdown: tx, task }
    }
}

/// Handle to a running feed mutator.
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the mutator to stop and wait for it to exit.
    pub async fn shutdown(self) {
        // An Err here means the loop already exited and dropped its receiver.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Feed mutator task did not exit cleanly");
        }
    }
}
