//! Document database backend.
//!
//! [`DocumentStore`] adapts a partitioned document database to the
//! [`StationStore`] contract. The partition key is chosen per deployment
//! and decides which lookups are cheap:
//!
//! | partition key | `get_by_id`            | `get_by_number`          |
//! |---------------|------------------------|--------------------------|
//! | `/id`         | point read             | cross-partition query    |
//! | `/number`     | cross-partition query  | single-partition query   |
//!
//! Writes are keyed by the partition key. `update` is a replace that
//! reports a miss as `false`; `replace_all` upserts every record.

mod database;
mod error;
mod http;
mod memory;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::Station;

use super::error::StoreError;
use super::seed::load_stations;
use super::{Backend, StationStore};

pub use database::{ContainerRef, DocumentDatabase, ItemQuery, PartitionValue};
pub use error::DocumentError;
pub use http::{CosmosConfig, HttpDocumentDatabase};
pub use memory::{InMemoryDocumentDatabase, OperationCounts};

/// Field used as the container's partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionKeyField {
    #[default]
    Id,
    Number,
}

impl PartitionKeyField {
    /// Partition key path declared on the container.
    pub fn path(&self) -> &'static str {
        match self {
            PartitionKeyField::Id => "/id",
            PartitionKeyField::Number => "/number",
        }
    }

    /// Partition value of a station under this key.
    pub fn value_of(&self, station: &Station) -> PartitionValue {
        match self {
            PartitionKeyField::Id => PartitionValue::String(station.id.clone()),
            PartitionKeyField::Number => PartitionValue::Number(i64::from(station.number)),
        }
    }
}

impl FromStr for PartitionKeyField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('/').to_ascii_lowercase().as_str() {
            "id" => Ok(PartitionKeyField::Id),
            "number" => Ok(PartitionKeyField::Number),
            other => Err(format!("unknown partition key '{other}' (expected id or number)")),
        }
    }
}

/// Configuration for the document store facade.
#[derive(Debug, Clone)]
pub struct DocumentStoreConfig {
    pub database_id: String,
    pub container_id: String,
    pub partition_key: PartitionKeyField,
    /// Seed file used when the container is empty. A missing file is not
    /// an error for this backend.
    pub seed_path: Option<PathBuf>,
}

impl DocumentStoreConfig {
    /// Set the partition key.
    pub fn with_partition_key(mut self, key: PartitionKeyField) -> Self {
        self.partition_key = key;
        self
    }

    /// Set the seed file.
    pub fn with_seed_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_path = Some(path.into());
        self
    }
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            database_id: "DublinBikesDb".to_string(),
            container_id: "BikeStations".to_string(),
            partition_key: PartitionKeyField::Id,
            seed_path: None,
        }
    }
}

/// Station store backed by a partitioned document database.
///
/// `get_all` and `replace_all` are mutually exclusive inside the facade, so
/// a reader in this process never observes a half-applied replace. Point
/// operations are left to the database's own consistency.
pub struct DocumentStore<D> {
    db: D,
    container: ContainerRef,
    partition_key: PartitionKeyField,
    seed_path: Option<PathBuf>,
    initialized: AtomicBool,
    replace_gate: RwLock<()>,
}

impl<D: DocumentDatabase> DocumentStore<D> {
    /// Create a facade. Call [`initialize`](Self::initialize) before use.
    pub fn new(db: D, config: DocumentStoreConfig) -> Self {
        Self {
            db,
            container: ContainerRef::new(config.database_id, config.container_id),
            partition_key: config.partition_key,
            seed_path: config.seed_path,
            initialized: AtomicBool::new(false),
            replace_gate: RwLock::new(()),
        }
    }

    /// Access the underlying database.
    pub fn database(&self) -> &D {
        &self.db
    }

    /// The container this store reads and writes.
    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    /// Create the database and container if absent, then seed the
    /// container if it is empty.
    ///
    /// Emptiness is checked with a `TOP 1` probe rather than a scan.
    /// Safe to call more than once. Returns the number of items seeded.
    pub async fn initialize(&self) -> Result<usize, StoreError> {
        self.db
            .create_database_if_not_exists(&self.container.database)
            .await?;
        self.db
            .create_container_if_not_exists(&self.container, self.partition_key.path())
            .await?;
        self.initialized.store(true, Ordering::Release);

        let probe = self
            .db
            .query_items(&self.container, &ItemQuery::all().with_limit(1), None)
            .await?;
        if !probe.is_empty() {
            info!(container = %self.container, "document container already populated");
            return Ok(0);
        }

        let Some(path) = self.seed_path.as_deref().filter(|p| p.exists()) else {
            info!(container = %self.container, "document container empty and no seed file");
            return Ok(0);
        };

        let stations = load_stations(path)?;
        let creates = stations.into_iter().map(|station| async move {
            let partition = self.partition_key.value_of(&station);
            let doc = to_document(&station)?;
            self.db.create_item(&self.container, &partition, doc).await
        });

        let mut seeded = 0;
        for result in join_all(creates).await {
            match result {
                Ok(()) => seeded += 1,
                Err(DocumentError::Conflict) => debug!("seed item already present, skipping"),
                Err(e) => return Err(e.into()),
            }
        }

        info!(container = %self.container, seeded, "seeded document container");
        Ok(seeded)
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Run a query and decode the first match.
    async fn query_first(
        &self,
        query: ItemQuery,
        partition: Option<&PartitionValue>,
    ) -> Result<Option<Station>, StoreError> {
        let docs = self
            .db
            .query_items(&self.container, &query.with_limit(1), partition)
            .await?;
        docs.into_iter().next().map(from_document).transpose()
    }

    /// Point read, with not-found mapped to `None`.
    async fn read_point(
        &self,
        id: &str,
        partition: &PartitionValue,
    ) -> Result<Option<Station>, StoreError> {
        match self.db.read_item(&self.container, id, partition).await {
            Ok(doc) => from_document(doc).map(Some),
            Err(DocumentError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn to_document(station: &Station) -> Result<Value, DocumentError> {
    Ok(serde_json::to_value(station)?)
}

fn from_document(doc: Value) -> Result<Station, StoreError> {
    let station = serde_json::from_value(doc).map_err(DocumentError::from)?;
    Ok(station)
}

impl<D: DocumentDatabase> StationStore for DocumentStore<D> {
    const BACKEND: Backend = Backend::Document;

    async fn get_all(&self) -> Result<Vec<Station>, StoreError> {
        self.ensure_initialized()?;
        let _read = self.replace_gate.read().await;

        let docs = self
            .db
            .query_items(&self.container, &ItemQuery::all(), None)
            .await?;
        docs.into_iter().map(from_document).collect()
    }

    async fn get_by_number(&self, number: i32) -> Result<Option<Station>, StoreError> {
        self.ensure_initialized()?;
        let query = ItemQuery::field_equals("number", number);
        match self.partition_key {
            PartitionKeyField::Number => {
                let partition = PartitionValue::Number(i64::from(number));
                self.query_first(query, Some(&partition)).await
            }
            PartitionKeyField::Id => self.query_first(query, None).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Station>, StoreError> {
        self.ensure_initialized()?;
        match self.partition_key {
            PartitionKeyField::Id => {
                self.read_point(id, &PartitionValue::String(id.to_string()))
                    .await
            }
            PartitionKeyField::Number => {
                self.query_first(ItemQuery::field_equals("id", id), None)
                    .await
            }
        }
    }

    async fn add(&self, mut station: Station) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        station.ensure_id();
        station.stamp(Utc::now());

        let partition = self.partition_key.value_of(&station);
        let doc = to_document(&station)?;
        self.db.create_item(&self.container, &partition, doc).await?;
        Ok(())
    }

    async fn update(&self, mut station: Station) -> Result<bool, StoreError> {
        self.ensure_initialized()?;
        station.ensure_id();
        station.stamp(Utc::now());

        let partition = self.partition_key.value_of(&station);
        let doc = to_document(&station)?;
        match self
            .db
            .replace_item(&self.container, &station.id, &partition, doc)
            .await
        {
            Ok(()) => Ok(true),
            Err(DocumentError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_all(&self, stations: Vec<Station>) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        let _write = self.replace_gate.write().await;

        let upserts = stations.into_iter().map(|mut station| async move {
            station.ensure_id();
            let partition = self.partition_key.value_of(&station);
            let doc = to_document(&station)?;
            self.db.upsert_item(&self.container, &partition, doc).await
        });
        try_join_all(upserts).await?;
        Ok(())
    }
}
