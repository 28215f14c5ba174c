//! In-process document database.
//!
//! Mirrors the routing rules of a partitioned document database closely
//! enough to exercise the document store facade without a network: items
//! live in per-partition maps, point operations touch one partition, and
//! queries without a partition value fan out across all of them. Operation
//! counters make the cost of each access pattern observable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;

use super::database::{ContainerRef, DocumentDatabase, ItemQuery, PartitionValue};
use super::error::DocumentError;

/// Items of one container, grouped by partition then by id.
#[derive(Debug, Default)]
struct Container {
    /// Top-level field holding the partition key (path without the `/`).
    partition_field: String,
    partitions: BTreeMap<PartitionValue, BTreeMap<String, Value>>,
}

impl Container {
    fn check_partition(&self, item: &Value, partition: &PartitionValue) -> Result<(), DocumentError> {
        let actual = item
            .get(&self.partition_field)
            .and_then(PartitionValue::from_json);
        if actual.as_ref() != Some(partition) {
            return Err(DocumentError::Api {
                status: 400,
                message: format!(
                    "partition key supplied does not match the item's /{} value",
                    self.partition_field
                ),
            });
        }
        Ok(())
    }
}

/// Counts of operations served, by cost class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    /// Reads of one item by id and partition.
    pub point_reads: u64,
    /// Queries routed to a single partition.
    pub partition_queries: u64,
    /// Queries that fanned out across every partition.
    pub cross_partition_queries: u64,
    /// Creates, upserts and replaces.
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    point_reads: AtomicU64,
    partition_queries: AtomicU64,
    cross_partition_queries: AtomicU64,
    writes: AtomicU64,
}

/// Document database held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentDatabase {
    databases: RwLock<Databases>,
    counters: Counters,
}

impl InMemoryDocumentDatabase {
    /// Create an empty account with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the operation counters.
    pub fn operation_counts(&self) -> OperationCounts {
        OperationCounts {
            point_reads: self.counters.point_reads.load(Ordering::Relaxed),
            partition_queries: self.counters.partition_queries.load(Ordering::Relaxed),
            cross_partition_queries: self.counters.cross_partition_queries.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    /// Total items in a container, or `None` if it does not exist.
    pub async fn item_count(&self, container: &ContainerRef) -> Option<usize> {
        let guard = self.databases.read().await;
        find(&guard, container)
            .ok()
            .map(|c| c.partitions.values().map(BTreeMap::len).sum())
    }

    fn count_write(&self) {
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
    }
}

fn missing(container: &ContainerRef) -> DocumentError {
    DocumentError::MissingResource(container.to_string())
}

fn item_id(item: &Value) -> Result<String, DocumentError> {
    item.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DocumentError::Api {
            status: 400,
            message: "item must have a non-empty string id".to_string(),
        })
}

type Databases = HashMap<String, HashMap<String, Container>>;

fn find<'a>(dbs: &'a Databases, container: &ContainerRef) -> Result<&'a Container, DocumentError> {
    dbs.get(&container.database)
        .and_then(|db| db.get(&container.container))
        .ok_or_else(|| missing(container))
}

fn find_mut<'a>(
    dbs: &'a mut Databases,
    container: &ContainerRef,
) -> Result<&'a mut Container, DocumentError> {
    dbs.get_mut(&container.database)
        .and_then(|db| db.get_mut(&container.container))
        .ok_or_else(|| missing(container))
}

impl DocumentDatabase for InMemoryDocumentDatabase {
    async fn create_database_if_not_exists(&self, database: &str) -> Result<(), DocumentError> {
        let mut guard = self.databases.write().await;
        guard.entry(database.to_string()).or_default();
        Ok(())
    }

    async fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
    ) -> Result<(), DocumentError> {
        let field = partition_key_path.trim_start_matches('/');
        if field.is_empty() || field.contains('/') {
            return Err(DocumentError::Api {
                status: 400,
                message: format!("unsupported partition key path: {partition_key_path}"),
            });
        }

        let mut guard = self.databases.write().await;
        let db = guard
            .get_mut(&container.database)
            .ok_or_else(|| DocumentError::MissingResource(format!("dbs/{}", container.database)))?;
        db.entry(container.container.clone())
            .or_insert_with(|| Container {
                partition_field: field.to_string(),
                partitions: BTreeMap::new(),
            });
        Ok(())
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition: &PartitionValue,
    ) -> Result<Value, DocumentError> {
        self.counters.point_reads.fetch_add(1, Ordering::Relaxed);

        let guard = self.databases.read().await;
        find(&guard, container)?
            .partitions
            .get(partition)
            .and_then(|p| p.get(id))
            .cloned()
            .ok_or(DocumentError::NotFound)
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &ItemQuery,
        partition: Option<&PartitionValue>,
    ) -> Result<Vec<Value>, DocumentError> {
        match partition {
            Some(_) => self.counters.partition_queries.fetch_add(1, Ordering::Relaxed),
            None => self
                .counters
                .cross_partition_queries
                .fetch_add(1, Ordering::Relaxed),
        };

        let guard = self.databases.read().await;
        let items = find(&guard, container)?
            .partitions
            .iter()
            .filter(|(value, _)| partition.is_none_or(|p| p == *value))
            .flat_map(|(_, items)| items.values())
            .filter(|doc| query.matches(doc))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(items)
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition: &PartitionValue,
        item: Value,
    ) -> Result<(), DocumentError> {
        self.count_write();
        let id = item_id(&item)?;
        let mut guard = self.databases.write().await;
        let c = find_mut(&mut guard, container)?;
        c.check_partition(&item, partition)?;
        let items = c.partitions.entry(partition.clone()).or_default();
        if items.contains_key(&id) {
            return Err(DocumentError::Conflict);
        }
        items.insert(id, item);
        Ok(())
    }

    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition: &PartitionValue,
        item: Value,
    ) -> Result<(), DocumentError> {
        self.count_write();
        let id = item_id(&item)?;
        let mut guard = self.databases.write().await;
        let c = find_mut(&mut guard, container)?;
        c.check_partition(&item, partition)?;
        c.partitions
            .entry(partition.clone())
            .or_default()
            .insert(id, item);
        Ok(())
    }

    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition: &PartitionValue,
        item: Value,
    ) -> Result<(), DocumentError> {
        self.count_write();
        let mut guard = self.databases.write().await;
        let c = find_mut(&mut guard, container)?;
        c.check_partition(&item, partition)?;
        let slot = c
            .partitions
            .get_mut(partition)
            .and_then(|p| p.get_mut(id))
            .ok_or(DocumentError::NotFound)?;
        *slot = item;
        Ok(())
    }
}
