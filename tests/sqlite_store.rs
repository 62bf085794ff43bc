use std::path::Path;
use tempfile::TempDir;

use session_index::sqlite_store::SqliteVectorStore;
use session_index_core::metric::DistanceMetric;
use session_index_core::store::{SessionFilter, StoreState, VectorStore};
use session_index_core::{EntryMetadata, Error, IndexedEntry};

fn entry(session: &str, path: &str, ordinal: usize, content: &str, embedding: Vec<f32>) -> IndexedEntry {
    IndexedEntry {
        id: format!("{}_{}_{}", session, path, ordinal),
        embedding,
        metadata: EntryMetadata {
            file_path: path.to_string(),
            content: content.to_string(),
            session_id: session.to_string(),
        },
    }
}

async fn open(path: &Path) -> SqliteVectorStore {
    let store = SqliteVectorStore::open(path, DistanceMetric::Cosine).unwrap();
    store.initialize(path).await.unwrap();
    store
}

#[tokio::test]
async fn test_not_ready_until_initialized() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("data/vectors.db");
    let store = SqliteVectorStore::open(&path, DistanceMetric::Cosine).unwrap();
    assert_eq!(store.state(), StoreState::Uninitialized);
    let err = store.upsert(&[]).await.unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));

    store.initialize(&path).await.unwrap();
    assert!(store.state().is_ready());
    assert!(path.exists());
}

#[tokio::test]
async fn test_query_filters_session_and_orders_by_distance() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("vectors.db")).await;

    store
        .upsert(&[
            entry("s1", "a.ts", 0, "far", vec![0.0, 1.0]),
            entry("s1", "a.ts", 1, "near", vec![1.0, 0.1]),
            entry("s2", "a.ts", 0, "other session", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

    let matches = store
        .query(&[1.0, 0.0], 5, SessionFilter { session_id: "s1" })
        .await
        .unwrap();
    let contents: Vec<&str> = matches.iter().map(|m| m.metadata.content.as_str()).collect();
    assert_eq!(contents, vec!["near", "far"]);
    assert!(matches.iter().all(|m| m.metadata.session_id == "s1"));
    assert!(matches[0].distance.unwrap() < matches[1].distance.unwrap());

    let top1 = store
        .query(&[1.0, 0.0], 1, SessionFilter { session_id: "s1" })
        .await
        .unwrap();
    assert_eq!(top1.len(), 1);
}

#[tokio::test]
async fn test_ties_keep_insertion_order_across_upserts() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("vectors.db")).await;

    store
        .upsert(&[
            entry("s", "a.ts", 0, "first", vec![1.0, 0.0]),
            entry("s", "b.ts", 0, "second", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();
    // Re-upserting the first entry must not move it behind the second.
    store
        .upsert(&[entry("s", "a.ts", 0, "first v2", vec![1.0, 0.0])])
        .await
        .unwrap();

    let matches = store
        .query(&[1.0, 0.0], 5, SessionFilter { session_id: "s" })
        .await
        .unwrap();
    let contents: Vec<&str> = matches.iter().map(|m| m.metadata.content.as_str()).collect();
    assert_eq!(contents, vec!["first v2", "second"]);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_ids_for_file_and_delete() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp.path().join("vectors.db")).await;

    store
        .upsert(&[
            entry("s", "a.ts", 0, "a0", vec![1.0, 0.0]),
            entry("s", "a.ts", 1, "a1", vec![1.0, 0.0]),
            entry("s", "b.ts", 0, "b0", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();

    assert_eq!(
        store.ids_for_file("s", "a.ts").await.unwrap(),
        vec!["s_a.ts_0", "s_a.ts_1"]
    );
    store
        .delete(&["s_a.ts_1".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(store.ids_for_file("s", "a.ts").await.unwrap(), vec!["s_a.ts_0"]);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_entries_persist_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vectors.db");
    {
        let store = open(&path).await;
        store
            .upsert(&[entry("s", "a.ts", 0, "persisted", vec![0.5, 0.5])])
            .await
            .unwrap();
    }

    let store = open(&path).await;
    let matches = store
        .query(&[0.5, 0.5], 5, SessionFilter { session_id: "s" })
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].metadata.content, "persisted");
    assert!(matches[0].distance.unwrap().abs() < 1e-6);
}
