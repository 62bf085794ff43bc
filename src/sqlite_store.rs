//! SQLite-backed [`VectorStore`].
//!
//! One table holds every entry of every session:
//!
//! ```sql
//! vectors(id TEXT PRIMARY KEY, session_id, file_path, content, embedding BLOB, dims, updated_at)
//! ```
//!
//! Upserts use `ON CONFLICT(id) DO UPDATE`, which keeps the row's rowid, so
//! ordering by rowid is insertion order. Queries load the session's rows,
//! score them under the configured metric, and take the nearest `top_k`
//! with a stable sort (equal distances keep insertion order).

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use session_index_core::embedding::{blob_to_vec, vec_to_blob};
use session_index_core::metric::DistanceMetric;
use session_index_core::store::{QueryMatch, Readiness, SessionFilter, StoreState, VectorStore};
use session_index_core::{EntryMetadata, Error, IndexedEntry, Result};

pub struct SqliteVectorStore {
    pool: SqlitePool,
    metric: DistanceMetric,
    readiness: Readiness,
}

fn store_err(e: sqlx::Error) -> Error {
    Error::Store(format!("sqlite: {}", e))
}

impl SqliteVectorStore {
    /// Lazily connected store; call [`initialize`](Self::initialize) before use.
    pub fn open(path: &Path, metric: DistanceMetric) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Configuration(format!("invalid sqlite path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            metric,
            readiness: Readiness::uninitialized(),
        })
    }

    /// Create the parent directory and schema, then settle readiness.
    pub async fn initialize(&self, path: &Path) -> Result<()> {
        let outcome = self.migrate(path).await;
        let settled = outcome.as_ref().map(|_| ()).map_err(|e| e.to_string());
        self.readiness.settle(settled);
        outcome
    }

    async fn migrate(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::StoreUnavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dims INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StoreUnavailable(format!("sqlite: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_vectors_session_file ON vectors(session_id, file_path)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::StoreUnavailable(format!("sqlite: {}", e)))?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn state(&self) -> StoreState {
        self.readiness.get()
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<()> {
        self.readiness.ensure_ready()?;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO vectors (id, session_id, file_path, content, embedding, dims, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    session_id = excluded.session_id,
                    file_path = excluded.file_path,
                    content = excluded.content,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.metadata.session_id)
            .bind(&entry.metadata.file_path)
            .bind(&entry.metadata.content)
            .bind(vec_to_blob(&entry.embedding))
            .bind(entry.embedding.len() as i64)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: SessionFilter<'_>,
    ) -> Result<Vec<QueryMatch>> {
        self.readiness.ensure_ready()?;

        let rows = sqlx::query(
            "SELECT id, file_path, content, embedding FROM vectors WHERE session_id = ? ORDER BY rowid",
        )
        .bind(filter.session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut matches: Vec<QueryMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                QueryMatch {
                    id: row.get("id"),
                    metadata: EntryMetadata {
                        file_path: row.get("file_path"),
                        content: row.get("content"),
                        session_id: filter.session_id.to_string(),
                    },
                    distance: Some(self.metric.distance(embedding, &vector)),
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            let da = a.distance.unwrap_or(f32::INFINITY);
            da.total_cmp(&b.distance.unwrap_or(f32::INFINITY))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn ids_for_file(&self, session_id: &str, file_path: &str) -> Result<Vec<String>> {
        self.readiness.ensure_ready()?;
        sqlx::query_scalar(
            "SELECT id FROM vectors WHERE session_id = ? AND file_path = ? ORDER BY rowid",
        )
        .bind(session_id)
        .bind(file_path)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        self.readiness.ensure_ready()?;
        if ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        for id in ids {
            sqlx::query("DELETE FROM vectors WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }
}
