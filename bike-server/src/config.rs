//! Process configuration from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::feed::MutatorConfig;
use crate::store::document::CosmosConfig;
use crate::store::{DocumentStoreConfig, PartitionKeyField};

/// Invalid or incomplete configuration.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("invalid {name}={value:?}: {message}")]
    Invalid {
        name: &'static str,
        value: String,
        message: String,
    },
}

/// Connection and layout of the document backend.
#[derive(Debug, Clone)]
pub struct DocumentBackendConfig {
    pub cosmos: CosmosConfig,
    pub store: DocumentStoreConfig,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Seed file for the snapshot store.
    pub seed_path: PathBuf,
    pub cache: CacheConfig,
    pub mutator: MutatorConfig,
    /// Present only when `COSMOS_ENDPOINT` is set.
    pub document: Option<DocumentBackendConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables:
    /// - `BIKES_SEED_PATH` -- snapshot seed file (default `data/dublinbike.json`)
    /// - `UPDATER_INTERVAL_MS` -- feed tick interval (default 12000)
    /// - `UPDATER_MAX_CAPACITY_DELTA` -- capacity wiggle per tick (default 3)
    /// - `CACHE_TTL_SECS` -- cached query lifetime (default 300)
    /// - `CACHE_MAX_CAPACITY` -- cached query count bound (default 10000)
    /// - `COSMOS_ENDPOINT` -- enables the document backend
    ///
    /// With `COSMOS_ENDPOINT` set:
    /// - `COSMOS_AUTH_TOKEN` -- required
    /// - `COSMOS_DATABASE_ID` -- default `DublinBikesDb`
    /// - `COSMOS_CONTAINER_ID` -- default `BikeStations`
    /// - `COSMOS_PARTITION_KEY` -- `id` or `number` (default `id`)
    /// - `COSMOS_SEED_PATH` -- default `data/dublinbike_cosmos.json`
    /// - `COSMOS_TIMEOUT_SECS` -- default 10
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let seed_path = get("BIKES_SEED_PATH").unwrap_or_else(|| "data/dublinbike.json".to_owned());

        let cache_defaults = CacheConfig::default();
        let cache = CacheConfig::default()
            .with_ttl(Duration::from_secs(parse_var(
                &get,
                "CACHE_TTL_SECS",
                cache_defaults.ttl.as_secs(),
            )?))
            .with_max_capacity(parse_var(
                &get,
                "CACHE_MAX_CAPACITY",
                cache_defaults.max_capacity,
            )?);

        let interval_ms: u64 = parse_var(&get, "UPDATER_INTERVAL_MS", 12_000)?;
        if interval_ms == 0 {
            return Err(invalid("UPDATER_INTERVAL_MS", "0", "must be positive"));
        }
        let max_delta: i32 = parse_var(&get, "UPDATER_MAX_CAPACITY_DELTA", 3)?;
        if max_delta < 0 {
            return Err(invalid(
                "UPDATER_MAX_CAPACITY_DELTA",
                &max_delta.to_string(),
                "must not be negative",
            ));
        }
        let mutator = MutatorConfig::default()
            .with_interval(Duration::from_millis(interval_ms))
            .with_max_capacity_delta(max_delta);

        let document = match get("COSMOS_ENDPOINT") {
            Some(endpoint) => Some(load_document_config(&get, endpoint)?),
            None => None,
        };

        Ok(Self {
            seed_path: PathBuf::from(seed_path),
            cache,
            mutator,
            document,
        })
    }
}

fn load_document_config(
    get: &impl Fn(&str) -> Option<String>,
    endpoint: String,
) -> Result<DocumentBackendConfig, ConfigError> {
    let auth_token = get("COSMOS_AUTH_TOKEN").ok_or(ConfigError::Missing("COSMOS_AUTH_TOKEN"))?;
    let timeout_secs: u64 = parse_var(get, "COSMOS_TIMEOUT_SECS", 10)?;
    let partition_key: PartitionKeyField = parse_var(get, "COSMOS_PARTITION_KEY", PartitionKeyField::Id)?;

    let defaults = DocumentStoreConfig::default();
    let store = DocumentStoreConfig {
        database_id: get("COSMOS_DATABASE_ID").unwrap_or(defaults.database_id),
        container_id: get("COSMOS_CONTAINER_ID").unwrap_or(defaults.container_id),
        ..defaults
    }
    .with_partition_key(partition_key)
    .with_seed_path(
        get("COSMOS_SEED_PATH").unwrap_or_else(|| "data/dublinbike_cosmos.json".to_owned()),
    );

    Ok(DocumentBackendConfig {
        cosmos: CosmosConfig::new(endpoint, auth_token).with_timeout(timeout_secs),
        store,
    })
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match get(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, &value, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, value: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.seed_path, PathBuf::from("data/dublinbike.json"));
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.max_capacity, 10_000);
        assert_eq!(config.mutator.interval, Duration::from_millis(12_000));
        assert_eq!(config.mutator.max_capacity_delta, 3);
        assert!(config.document.is_none());
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("BIKES_SEED_PATH", "/srv/bikes.json"),
            ("UPDATER_INTERVAL_MS", "500"),
            ("UPDATER_MAX_CAPACITY_DELTA", "0"),
            ("CACHE_TTL_SECS", "30"),
            ("CACHE_MAX_CAPACITY", "64"),
        ])
        .unwrap();
        assert_eq!(config.seed_path, PathBuf::from("/srv/bikes.json"));
        assert_eq!(config.mutator.interval, Duration::from_millis(500));
        assert_eq!(config.mutator.max_capacity_delta, 0);
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.cache.max_capacity, 64);
    }

    #[test]
    fn blank_values_use_defaults() {
        let config = load(&[("UPDATER_INTERVAL_MS", "  "), ("COSMOS_ENDPOINT", "")]).unwrap();
        assert_eq!(config.mutator.interval, Duration::from_millis(12_000));
        assert!(config.document.is_none());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = load(&[("CACHE_TTL_SECS", "five")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CACHE_TTL_SECS", .. }));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = load(&[("UPDATER_INTERVAL_MS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "UPDATER_INTERVAL_MS", .. }));
    }

    #[test]
    fn negative_delta_is_rejected() {
        let err = load(&[("UPDATER_MAX_CAPACITY_DELTA", "-2")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "UPDATER_MAX_CAPACITY_DELTA", .. }
        ));
    }

    #[test]
    fn document_backend_needs_a_token() {
        let err = load(&[("COSMOS_ENDPOINT", "https://localhost:8081")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("COSMOS_AUTH_TOKEN"));
    }

    #[test]
    fn document_backend_defaults() {
        let config = load(&[
            ("COSMOS_ENDPOINT", "https://localhost:8081"),
            ("COSMOS_AUTH_TOKEN", "type=resource&ver=1.0&sig=abc"),
        ])
        .unwrap();
        let document = config.document.unwrap();
        assert_eq!(document.cosmos.endpoint, "https://localhost:8081");
        assert_eq!(document.cosmos.timeout_secs, 10);
        assert_eq!(document.store.database_id, "DublinBikesDb");
        assert_eq!(document.store.container_id, "BikeStations");
        assert_eq!(document.store.partition_key, PartitionKeyField::Id);
        assert_eq!(
            document.store.seed_path,
            Some(PathBuf::from("data/dublinbike_cosmos.json"))
        );
    }

    #[test]
    fn document_backend_overrides() {
        let config = load(&[
            ("COSMOS_ENDPOINT", "https://bikes.documents.azure.com"),
            ("COSMOS_AUTH_TOKEN", "token"),
            ("COSMOS_DATABASE_ID", "Bikes"),
            ("COSMOS_CONTAINER_ID", "Stations"),
            ("COSMOS_PARTITION_KEY", "number"),
            ("COSMOS_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        let document = config.document.unwrap();
        assert_eq!(document.store.database_id, "Bikes");
        assert_eq!(document.store.container_id, "Stations");
        assert_eq!(document.store.partition_key, PartitionKeyField::Number);
        assert_eq!(document.cosmos.timeout_secs, 3);
    }

    #[test]
    fn unknown_partition_key_is_rejected() {
        let err = load(&[
            ("COSMOS_ENDPOINT", "https://localhost:8081"),
            ("COSMOS_AUTH_TOKEN", "token"),
            ("COSMOS_PARTITION_KEY", "contract"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "COSMOS_PARTITION_KEY", .. }));
    }
}
