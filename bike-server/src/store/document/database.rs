//! Document database collaborator contract.

use std::fmt;
use std::future::Future;

use serde_json::Value;

use super::error::DocumentError;

/// Address of a container inside a database account.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub database: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dbs/{}/colls/{}", self.database, self.container)
    }
}

/// Value of an item's partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionValue {
    String(String),
    Number(i64),
}

impl PartitionValue {
    /// The partition value as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            PartitionValue::String(s) => Value::from(s.as_str()),
            PartitionValue::Number(n) => Value::from(*n),
        }
    }

    /// Read a partition value out of a document field.
    ///
    /// Returns `None` when the field is absent or is neither a string nor
    /// an integer.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(PartitionValue::String(s.clone())),
            Value::Number(n) => n.as_i64().map(PartitionValue::Number),
            _ => None,
        }
    }
}

/// A structured item query: an optional equality filter on one top-level
/// field and an optional row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemQuery {
    pub filter: Option<(String, Value)>,
    pub limit: Option<usize>,
}

impl ItemQuery {
    /// Every item.
    pub fn all() -> Self {
        Self::default()
    }

    /// Items whose `field` equals `value`.
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            filter: Some((field.into(), value.into())),
            limit: None,
        }
    }

    /// Cap the number of returned items.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies the filter.
    pub fn matches(&self, doc: &Value) -> bool {
        match &self.filter {
            Some((field, value)) => doc.get(field) == Some(value),
            None => true,
        }
    }

    /// Render as SQL text plus named parameters.
    pub fn to_sql(&self) -> (String, Vec<(String, Value)>) {
        let mut sql = String::from("SELECT ");
        if let Some(limit) = self.limit {
            sql.push_str(&format!("TOP {limit} "));
        }
        sql.push_str("* FROM c");

        let mut params = Vec::new();
        if let Some((field, value)) = &self.filter {
            sql.push_str(&format!(" WHERE c.{field} = @value"));
            params.push(("@value".to_string(), value.clone()));
        }

        (sql, params)
    }
}

/// Operations the document store facade needs from a partitioned
/// document database.
///
/// Point operations take the item's partition value; queries take one
/// when they can be routed to a single partition and `None` when they
/// must fan out across every partition.
pub trait DocumentDatabase: Send + Sync + 'static {
    /// Create the database unless it already exists.
    fn create_database_if_not_exists(
        &self,
        database: &str,
    ) -> impl Future<Output = Result<(), DocumentError>> + Send;

    /// Create the container unless it already exists.
    ///
    /// `partition_key_path` is a JSON path such as `/id`.
    fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
    ) -> impl Future<Output = Result<(), DocumentError>> + Send;

    /// Point read by id and partition. Missing items are `NotFound`.
    fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition: &PartitionValue,
    ) -> impl Future<Output = Result<Value, DocumentError>> + Send;

    /// Run a query, within one partition or across all of them.
    fn query_items(
        &self,
        container: &ContainerRef,
        query: &ItemQuery,
        partition: Option<&PartitionValue>,
    ) -> impl Future<Output = Result<Vec<Value>, DocumentError>> + Send;

    /// Insert a new item. Duplicates are `Conflict`.
    fn create_item(
        &self,
        container: &ContainerRef,
        partition: &PartitionValue,
        item: Value,
    ) -> impl Future<Output = Result<(), DocumentError>> + Send;

    /// Insert or replace an item by id.
    fn upsert_item(
        &self,
        container: &ContainerRef,
        partition: &PartitionValue,
        item: Value,
    ) -> impl Future<Output = Result<(), DocumentError>> + Send;

    /// Replace an existing item by id. Missing items are `NotFound`.
    fn replace_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition: &PartitionValue,
        item: Value,
    ) -> impl Future<Output = Result<(), DocumentError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sql_for_all() {
        let (sql, params) = ItemQuery::all().to_sql();
        assert_eq!(sql, "SELECT * FROM c");
        assert!(params.is_empty());
    }

    #[test]
    fn sql_with_limit() {
        let (sql, _) = ItemQuery::all().with_limit(1).to_sql();
        assert_eq!(sql, "SELECT TOP 1 * FROM c");
    }

    #[test]
    fn sql_for_filter() {
        let (sql, params) = ItemQuery::field_equals("number", 42).to_sql();
        assert_eq!(sql, "SELECT * FROM c WHERE c.number = @value");
        assert_eq!(params, vec![("@value".to_string(), json!(42))]);
    }

    #[test]
    fn filter_matching() {
        let query = ItemQuery::field_equals("number", 7);
        assert!(query.matches(&json!({"id": "7", "number": 7})));
        assert!(!query.matches(&json!({"id": "8", "number": 8})));
        assert!(!query.matches(&json!({"id": "9"})));
        assert!(ItemQuery::all().matches(&json!({})));
    }

    #[test]
    fn partition_value_json() {
        assert_eq!(
            PartitionValue::from_json(&json!("12")),
            Some(PartitionValue::String("12".into()))
        );
        assert_eq!(
            PartitionValue::from_json(&json!(12)),
            Some(PartitionValue::Number(12))
        );
        assert_eq!(PartitionValue::from_json(&json!(true)), None);
        assert_eq!(PartitionValue::Number(3).to_json(), json!(3));
    }

    #[test]
    fn container_display() {
        let c = ContainerRef::new("DublinBikesDb", "BikeStations");
        assert_eq!(c.to_string(), "dbs/DublinBikesDb/colls/BikeStations");
    }
}
