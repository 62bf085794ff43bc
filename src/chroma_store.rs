//! Chroma-backed [`VectorStore`] over the Chroma v2 HTTP API.
//!
//! Embeddings are always supplied by the caller; the collection is created
//! without an embedding function. Each entry's metadata is stored under the
//! keys `filePath`, `content`, and `chatId`, and session filtering is a
//! `where` clause on `chatId`.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | initialize | `POST /api/v2/tenants/{t}/databases/{d}/collections` (`get_or_create`) |
//! | upsert | `POST …/collections/{id}/upsert` |
//! | query | `POST …/collections/{id}/query` |
//! | ids_for_file | `POST …/collections/{id}/get` |
//! | delete | `POST …/collections/{id}/delete` |

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

use session_index_core::metric::DistanceMetric;
use session_index_core::store::{QueryMatch, Readiness, SessionFilter, StoreState, VectorStore};
use session_index_core::{EntryMetadata, Error, IndexedEntry, Result};

const META_FILE_PATH: &str = "filePath";
const META_CONTENT: &str = "content";
const META_SESSION: &str = "chatId";

#[derive(Debug, Clone)]
pub struct ChromaSettings {
    pub url: String,
    pub tenant: String,
    pub database: String,
    pub collection: String,
    pub metric: DistanceMetric,
    pub timeout: Duration,
}

pub struct ChromaStore {
    client: reqwest::Client,
    settings: ChromaSettings,
    collection_id: OnceLock<String>,
    readiness: Readiness,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Value>>>>,
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
}

fn request_err(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::StoreUnavailable(format!("chroma unreachable: {}", e))
    } else {
        Error::Store(format!("chroma request failed: {}", e))
    }
}

impl ChromaStore {
    pub fn new(settings: ChromaSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("chroma client: {}", e)))?;
        Ok(Self {
            client,
            settings: ChromaSettings {
                url: settings.url.trim_end_matches('/').to_string(),
                ..settings
            },
            collection_id: OnceLock::new(),
            readiness: Readiness::uninitialized(),
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.settings.url, self.settings.tenant, self.settings.database
        )
    }

    fn collection_url(&self, op: &str) -> Result<String> {
        let id = self
            .collection_id
            .get()
            .ok_or_else(|| Error::StoreUnavailable("collection is not initialized yet".into()))?;
        Ok(format!("{}/{}/{}", self.collections_url(), id, op))
    }

    /// Get or create the collection, then settle readiness.
    pub async fn initialize(&self) -> Result<()> {
        let outcome = self.get_or_create().await;
        match &outcome {
            Ok(id) => {
                let _ = self.collection_id.set(id.clone());
                self.readiness.settle(Ok(()));
            }
            Err(e) => {
                self.readiness.settle(Err(e.to_string()));
            }
        }
        outcome.map(|_| ())
    }

    async fn get_or_create(&self) -> Result<String> {
        let body = json!({
            "name": self.settings.collection,
            "metadata": { "hnsw:space": self.settings.metric.as_str() },
            "get_or_create": true,
        });
        let response: CollectionResponse = self.post(&self.collections_url(), &body).await?;
        tracing::info!(
            collection = %self.settings.collection,
            id = %response.id,
            metric = %self.settings.metric,
            "chroma collection ready"
        );
        Ok(response.id)
    }

    async fn send(&self, url: &str, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("chroma error {}: {}", status, text)));
        }
        Ok(response)
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, url: &str, body: &Value) -> Result<T> {
        self.send(url, body)
            .await?
            .json()
            .await
            .map_err(|e| Error::Store(format!("invalid chroma response: {}", e)))
    }

    /// For operations whose response body carries nothing we need.
    async fn post_unit(&self, url: &str, body: &Value) -> Result<()> {
        self.send(url, body).await.map(|_| ())
    }
}

fn metadata_from(value: Option<Value>) -> Option<EntryMetadata> {
    let value = value?;
    let field = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Some(EntryMetadata {
        file_path: field(META_FILE_PATH)?,
        content: field(META_CONTENT)?,
        session_id: field(META_SESSION)?,
    })
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn state(&self) -> StoreState {
        self.readiness.get()
    }

    fn metric(&self) -> DistanceMetric {
        self.settings.metric
    }

    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<()> {
        self.readiness.ensure_ready()?;
        if entries.is_empty() {
            return Ok(());
        }
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let embeddings: Vec<&[f32]> = entries.iter().map(|e| e.embedding.as_slice()).collect();
        let metadatas: Vec<Value> = entries
            .iter()
            .map(|e| {
                json!({
                    META_FILE_PATH: e.metadata.file_path,
                    META_CONTENT: e.metadata.content,
                    META_SESSION: e.metadata.session_id,
                })
            })
            .collect();

        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "metadatas": metadatas,
        });
        self.post_unit(&self.collection_url("upsert")?, &body).await
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: SessionFilter<'_>,
    ) -> Result<Vec<QueryMatch>> {
        self.readiness.ensure_ready()?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "where": { META_SESSION: { "$eq": filter.session_id } },
            "include": ["metadatas", "distances"],
        });
        let response: QueryResponse = self.post(&self.collection_url("query")?, &body).await?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let mut distances = response
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default()
            .into_iter();
        let mut metadatas = response
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default()
            .into_iter();

        let mut matches = Vec::with_capacity(ids.len());
        for id in ids {
            let distance = distances.next().flatten();
            let Some(metadata) = metadata_from(metadatas.next().flatten()) else {
                tracing::warn!(id = %id, "chroma entry without usable metadata");
                continue;
            };
            matches.push(QueryMatch {
                id,
                metadata,
                distance,
            });
        }
        Ok(matches)
    }

    async fn ids_for_file(&self, session_id: &str, file_path: &str) -> Result<Vec<String>> {
        self.readiness.ensure_ready()?;
        let body = json!({
            "where": {
                "$and": [
                    { META_SESSION: { "$eq": session_id } },
                    { META_FILE_PATH: { "$eq": file_path } },
                ]
            },
            "include": [],
        });
        let response: GetResponse = self.post(&self.collection_url("get")?, &body).await?;
        Ok(response.ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.readiness.ensure_ready()?;
        if ids.is_empty() {
            return Ok(());
        }
        self.post_unit(&self.collection_url("delete")?, &json!({ "ids": ids }))
            .await
    }
}
