//! Cosmos DB REST client.
//!
//! Speaks the SQL API over HTTPS: databases under `/dbs`, containers under
//! `/dbs/{db}/colls`, items under `/dbs/{db}/colls/{coll}/docs`. Requests
//! are authorized with a pre-issued token (a resource token, or a signed
//! master-key token minted by the deployment), sent verbatim in the
//! `authorization` header.

use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::database::{ContainerRef, DocumentDatabase, ItemQuery, PartitionValue};
use super::error::DocumentError;

/// REST API version sent with every request.
const API_VERSION: &str = "2018-12-31";

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const PARTITION_KEY_HEADER: &str = "x-ms-documentdb-partitionkey";
const CONTINUATION_HEADER: &str = "x-ms-continuation";

/// Configuration for the Cosmos DB client.
#[derive(Debug, Clone)]
pub struct CosmosConfig {
    /// Account endpoint, e.g. `https://localhost:8081`
    pub endpoint: String,
    /// Value for the `authorization` header
    pub auth_token: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl CosmosConfig {
    /// Create a new config for the given endpoint and token.
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: auth_token.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Page of query results.
#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// Document database backed by a Cosmos DB account.
#[derive(Debug, Clone)]
pub struct HttpDocumentDatabase {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpDocumentDatabase {
    /// Create a new client.
    pub fn new(config: CosmosConfig) -> Result<Self, DocumentError> {
        let mut headers = HeaderMap::new();

        let auth = HeaderValue::from_str(&config.auth_token).map_err(|_| DocumentError::Api {
            status: 0,
            message: "Invalid authorization token format".to_string(),
        })?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            HeaderName::from_static("x-ms-version"),
            HeaderValue::from_static(API_VERSION),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.endpoint, path))
            .header("x-ms-date", rfc1123_now())
    }

    fn docs_path(container: &ContainerRef) -> String {
        format!("{container}/docs")
    }

    async fn send_document(
        &self,
        request: RequestBuilder,
        partition: &PartitionValue,
        item: &Value,
    ) -> Result<Response, DocumentError> {
        let response = request
            .header(PARTITION_KEY_HEADER, partition_header(partition)?)
            .json(item)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Current time in the format the `x-ms-date` header requires.
fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Partition values travel as a one-element JSON array.
fn partition_header(partition: &PartitionValue) -> Result<String, DocumentError> {
    Ok(serde_json::to_string(&[partition.to_json()])?)
}

/// Map error statuses onto [`DocumentError`].
async fn check_status(response: Response) -> Result<Response, DocumentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(DocumentError::NotFound),
        StatusCode::CONFLICT => Err(DocumentError::Conflict),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DocumentError::Unauthorized),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(DocumentError::Api {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

/// Query body for the gateway.
///
/// The gateway refuses `TOP` on a cross-partition query without a query
/// plan, so fan-out queries go out unbounded and the limit is applied
/// while paging through the results.
fn query_body(query: &ItemQuery, partition: Option<&PartitionValue>) -> Value {
    let (sql, params) = match partition {
        Some(_) => query.to_sql(),
        None => ItemQuery {
            limit: None,
            ..query.clone()
        }
        .to_sql(),
    };
    let parameters: Vec<Value> = params
        .into_iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    json!({ "query": sql, "parameters": parameters })
}

/// Treat "already exists" as success for idempotent creates.
fn ignore_conflict(result: Result<Response, DocumentError>) -> Result<(), DocumentError> {
    match result {
        Ok(_) | Err(DocumentError::Conflict) => Ok(()),
        Err(e) => Err(e),
    }
}

impl DocumentDatabase for HttpDocumentDatabase {
    async fn create_database_if_not_exists(&self, database: &str) -> Result<(), DocumentError> {
        let response = self
            .request(Method::POST, "dbs")
            .json(&json!({ "id": database }))
            .send()
            .await?;
        ignore_conflict(check_status(response).await)
    }

    async fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
    ) -> Result<(), DocumentError> {
        let body = json!({
            "id": container.container,
            "partitionKey": { "paths": [partition_key_path], "kind": "Hash" },
        });
        let response = self
            .request(Method::POST, &format!("dbs/{}/colls", container.database))
            .json(&body)
            .send()
            .await?;
        ignore_conflict(check_status(response).await)
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition: &PartitionValue,
    ) -> Result<Value, DocumentError> {
        let path = format!("{}/{}", Self::docs_path(container), id);
        let response = self
            .request(Method::GET, &path)
            .header(PARTITION_KEY_HEADER, partition_header(partition)?)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &ItemQuery,
        partition: Option<&PartitionValue>,
    ) -> Result<Vec<Value>, DocumentError> {
        let body = serde_json::to_vec(&query_body(query, partition))?;

        let mut items = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::POST, &Self::docs_path(container))
                .header(reqwest::header::CONTENT_TYPE, "application/query+json")
                .header("x-ms-documentdb-isquery", "True")
                .body(body.clone());

            request = match partition {
                Some(p) => request.header(PARTITION_KEY_HEADER, partition_header(p)?),
                None => request.header("x-ms-documentdb-query-enablecrosspartition", "True"),
            };
            if let Some(token) = &continuation {
                request = request.header(CONTINUATION_HEADER, token.as_str());
            }

            let response = check_status(request.send().await?).await?;
            continuation = response
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let page: QueryPage = response.json().await?;
            items.extend(page.documents);

            if let Some(limit) = query.limit
                && items.len() >= limit
            {
                items.truncate(limit);
                break;
            }
            if continuation.is_none() {
                break;
            }
        }

        Ok(items)
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition: &PartitionValue,
        item: Value,
    ) -> Result<(), DocumentError> {
        let request = self.request(Method::POST, &Self::docs_path(container));
        self.send_document(request, partition, &item).await?;
        Ok(())
    }

    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition: &PartitionValue,
        item: Value,
    ) -> Result<(), DocumentError> {
        let request = self
            .request(Method::POST, &Self::docs_path(container))
            .header("x-ms-documentdb-is-upsert", "True");
        self.send_document(request, partition, &item).await?;
        Ok(())
    }

    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition: &PartitionValue,
        item: Value,
    ) -> Result<(), DocumentError> {
        let path = format!("{}/{}", Self::docs_path(container), id);
        let request = self.request(Method::PUT, &path);
        self.send_document(request, partition, &item).await?;
        Ok(())
    }
}
