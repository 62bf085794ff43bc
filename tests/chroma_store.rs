//! Chroma adapter against a mock Chroma v2 server.

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use session_index::chroma_store::{ChromaSettings, ChromaStore};
use session_index_core::embedding::Embedder;
use session_index_core::index::IndexParams;
use session_index_core::metric::{cosine_similarity, DistanceMetric};
use session_index_core::store::{SessionFilter, StoreState, VectorStore};
use session_index_core::{Embedding, Error, Indexer, Result, Retriever};

#[derive(Default)]
struct MockChroma {
    create_requests: Vec<Value>,
    upsert_requests: Vec<Value>,
    query_requests: Vec<Value>,
    /// (id, embedding, metadata) in insertion order.
    entries: Vec<(String, Vec<f32>, Value)>,
    canned_query: Option<Value>,
    fail_upserts: bool,
}

type Shared = Arc<Mutex<MockChroma>>;

fn matches_where(metadata: &Value, clause: &Value) -> bool {
    if let Some(all) = clause.get("$and").and_then(|v| v.as_array()) {
        return all.iter().all(|c| matches_where(metadata, c));
    }
    clause.as_object().map_or(true, |obj| {
        obj.iter().all(|(key, cond)| metadata.get(key) == cond.get("$eq"))
    })
}

fn as_vec(v: &Value) -> Vec<f32> {
    v.as_array()
        .unwrap()
        .iter()
        .map(|x| x.as_f64().unwrap() as f32)
        .collect()
}

async fn create_collection(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let name = body["name"].clone();
    state.lock().unwrap().create_requests.push(body);
    Json(json!({ "id": "col-1", "name": name }))
}

async fn collection_op(
    State(state): State<Shared>,
    Path((_tenant, _database, id, op)): Path<(String, String, String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    assert_eq!(id, "col-1");
    let mut mock = state.lock().unwrap();
    match op.as_str() {
        "upsert" => {
            mock.upsert_requests.push(body.clone());
            if mock.fail_upserts {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "disk full" })),
                );
            }
            let ids = body["ids"].as_array().unwrap();
            for (i, id) in ids.iter().enumerate() {
                let id = id.as_str().unwrap().to_string();
                let embedding = as_vec(&body["embeddings"][i]);
                let metadata = body["metadatas"][i].clone();
                match mock.entries.iter_mut().find(|e| e.0 == id) {
                    Some(existing) => {
                        existing.1 = embedding;
                        existing.2 = metadata;
                    }
                    None => mock.entries.push((id, embedding, metadata)),
                }
            }
            (StatusCode::OK, Json(json!({})))
        }
        "query" => {
            mock.query_requests.push(body.clone());
            if let Some(canned) = mock.canned_query.clone() {
                return (StatusCode::OK, Json(canned));
            }
            let query = as_vec(&body["query_embeddings"][0]);
            let n = body["n_results"].as_u64().unwrap() as usize;
            let mut hits: Vec<(&String, f32, &Value)> = mock
                .entries
                .iter()
                .filter(|e| matches_where(&e.2, &body["where"]))
                .map(|e| (&e.0, 1.0 - cosine_similarity(&query, &e.1), &e.2))
                .collect();
            hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            hits.truncate(n);
            let ids: Vec<&String> = hits.iter().map(|h| h.0).collect();
            let distances: Vec<f32> = hits.iter().map(|h| h.1).collect();
            let metadatas: Vec<&Value> = hits.iter().map(|h| h.2).collect();
            (
                StatusCode::OK,
                Json(json!({
                    "ids": [ids],
                    "distances": [distances],
                    "metadatas": [metadatas],
                })),
            )
        }
        "get" => {
            let ids: Vec<&String> = mock
                .entries
                .iter()
                .filter(|e| matches_where(&e.2, &body["where"]))
                .map(|e| &e.0)
                .collect();
            (StatusCode::OK, Json(json!({ "ids": ids })))
        }
        "delete" => {
            let ids: Vec<String> = body["ids"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect();
            mock.entries.retain(|e| !ids.contains(&e.0));
            (StatusCode::OK, Json(Value::Null))
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown op" }))),
    }
}

async fn spawn_mock() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(MockChroma::default()));
    let app = Router::new()
        .route(
            "/api/v2/tenants/{tenant}/databases/{database}/collections",
            post(create_collection),
        )
        .route(
            "/api/v2/tenants/{tenant}/databases/{database}/collections/{id}/{op}",
            post(collection_op),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

fn settings(url: &str) -> ChromaSettings {
    ChromaSettings {
        url: url.to_string(),
        tenant: "default_tenant".into(),
        database: "default_database".into(),
        collection: "virtual_files".into(),
        metric: DistanceMetric::Cosine,
        timeout: Duration::from_secs(5),
    }
}

async fn ready_store() -> (Arc<ChromaStore>, Shared) {
    let (url, mock) = spawn_mock().await;
    let store = Arc::new(ChromaStore::new(settings(&url)).unwrap());
    store.initialize().await.unwrap();
    (store, mock)
}

/// `[count of 'a', count of 'b', 1.0]`
struct AbEmbedder;

#[async_trait]
impl Embedder for AbEmbedder {
    fn model_name(&self) -> &str {
        "ab"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|t| {
                vec![
                    t.matches('a').count() as f32,
                    t.matches('b').count() as f32,
                    1.0,
                ]
            })
            .collect())
    }
}

#[tokio::test]
async fn test_initialize_gets_or_creates_collection() {
    let (url, mock) = spawn_mock().await;
    let store = ChromaStore::new(settings(&url)).unwrap();
    assert_eq!(store.state(), StoreState::Uninitialized);

    store.initialize().await.unwrap();
    assert_eq!(store.state(), StoreState::Ready);

    let mock = mock.lock().unwrap();
    assert_eq!(
        mock.create_requests,
        vec![json!({
            "name": "virtual_files",
            "metadata": { "hnsw:space": "cosine" },
            "get_or_create": true,
        })]
    );
}

#[tokio::test]
async fn test_operations_fail_fast_before_initialize() {
    let (url, mock) = spawn_mock().await;
    let store = ChromaStore::new(settings(&url)).unwrap();
    let err = store
        .query(&[1.0, 0.0, 1.0], 5, SessionFilter { session_id: "s" })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));
    assert!(mock.lock().unwrap().query_requests.is_empty());
}

#[tokio::test]
async fn test_index_and_search_wire_format() {
    let (store, mock) = ready_store().await;
    let embedder = Arc::new(AbEmbedder);
    let indexer = Indexer::new(store.clone(), embedder.clone(), IndexParams::default()).unwrap();
    let retriever = Retriever::new(store.clone(), embedder);

    indexer.index_file("a.ts", "aaaa", "chat-1").await.unwrap();
    indexer.index_file("b.ts", "bbbb", "chat-1").await.unwrap();
    indexer.index_file("a.ts", "aaaa", "chat-2").await.unwrap();

    let results = retriever.search("aa", "chat-1", None).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].file_path, "a.ts");
    assert_eq!(results[0].content, "aaaa");
    assert!(results[0].score > results[1].score);

    let mock = mock.lock().unwrap();
    assert_eq!(
        mock.upsert_requests[0]["metadatas"][0],
        json!({ "filePath": "a.ts", "content": "aaaa", "chatId": "chat-1" })
    );
    assert_eq!(mock.upsert_requests[0]["ids"], json!(["chat-1_a.ts_0"]));
    let q = &mock.query_requests[0];
    assert_eq!(q["n_results"], 5);
    assert_eq!(q["where"], json!({ "chatId": { "$eq": "chat-1" } }));
    assert_eq!(q["include"], json!(["metadatas", "distances"]));
}

#[tokio::test]
async fn test_shrinking_file_deletes_stale_ids() {
    let (store, mock) = ready_store().await;
    let indexer = Indexer::new(store.clone(), Arc::new(AbEmbedder), IndexParams::default()).unwrap();

    let long: String = (0..50).map(|i| format!("a{}\n", i)).collect();
    indexer.index_file("a.ts", &long, "s").await.unwrap();
    indexer.index_file("b.ts", &long, "s").await.unwrap();
    assert_eq!(store.ids_for_file("s", "a.ts").await.unwrap().len(), 4);

    indexer.index_file("a.ts", "a\nb", "s").await.unwrap();
    assert_eq!(store.ids_for_file("s", "a.ts").await.unwrap(), vec!["s_a.ts_0"]);
    assert_eq!(store.ids_for_file("s", "b.ts").await.unwrap().len(), 4);
    assert_eq!(mock.lock().unwrap().entries.len(), 5);
}

#[tokio::test]
async fn test_null_distances_are_skipped() {
    let (store, mock) = ready_store().await;
    mock.lock().unwrap().canned_query = Some(json!({
        "ids": [["x", "y"]],
        "distances": [[null, 0.25]],
        "metadatas": [[
            { "filePath": "x.ts", "content": "x", "chatId": "s" },
            { "filePath": "y.ts", "content": "y", "chatId": "s" }
        ]],
    }));

    let matches = store
        .query(&[1.0, 0.0, 1.0], 5, SessionFilter { session_id: "s" })
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].distance, None);

    let retriever = Retriever::new(store, Arc::new(AbEmbedder));
    let results = retriever.search("a", "s", None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_path, "y.ts");
    assert!((results[0].score - 0.75).abs() < 1e-6);
}

#[tokio::test]
async fn test_server_error_maps_to_store_error() {
    let (store, mock) = ready_store().await;
    mock.lock().unwrap().fail_upserts = true;
    let indexer = Indexer::new(store, Arc::new(AbEmbedder), IndexParams::default()).unwrap();

    let err = indexer.index_file("a.ts", "aaaa", "s").await.unwrap_err();
    assert!(matches!(err, Error::IndexingFailure { .. }));
    assert!(matches!(err.root(), Error::Store(_)));
    assert!(err.to_string().contains("disk full"));
}
