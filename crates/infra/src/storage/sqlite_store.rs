//! SQLite-backed implementation of the key-value store port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mindhit_core::KeyValueStore;
use mindhit_domain::{MindhitError, Result as DomainResult};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tokio::task;

use super::manager::{map_sql_error, DbManager, SqliteConnection};

/// Durable key-value store persisted in the `kv_store` table.
pub struct SqliteKeyValueStore {
    db: Arc<DbManager>,
}

impl SqliteKeyValueStore {
    /// Construct a store on top of a migrated [`DbManager`].
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn select_value(conn: &SqliteConnection, key: &str) -> DomainResult<Option<Value>> {
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(map_sql_error)?;

        raw.map(|text| {
            serde_json::from_str(&text).map_err(|e| {
                MindhitError::Storage(format!("stored value for {key} is not valid JSON: {e}"))
            })
        })
        .transpose()
    }

    fn upsert_value(conn: &SqliteConnection, key: &str, text: &str) -> DomainResult<()> {
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, text, Utc::now().timestamp_millis()],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    fn select_keys(conn: &SqliteConnection, prefix: &str) -> DomainResult<Vec<String>> {
        let mut stmt = conn
            .prepare(
                "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key ASC",
            )
            .map_err(map_sql_error)?;

        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sql_error)?;
        Ok(keys)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> DomainResult<Option<Value>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Value>> {
            let conn = db.get_connection()?;
            Self::select_value(&conn, &key)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set(&self, key: &str, value: Value) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let text = serde_json::to_string(&value)
            .map_err(|e| MindhitError::Internal(format!("failed to encode value: {e}")))?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::upsert_value(&conn, &key, &text)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn remove(&self, key: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .map_err(map_sql_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list(&self, prefix: &str) -> DomainResult<Vec<String>> {
        let db = Arc::clone(&self.db);
        let prefix = prefix.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<String>> {
            let conn = db.get_connection()?;
            Self::select_keys(&conn, &prefix)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_join_error(err: task::JoinError) -> MindhitError {
    if err.is_cancelled() {
        MindhitError::Internal("blocking storage task cancelled".into())
    } else {
        MindhitError::Internal(format!("blocking storage task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn setup() -> (TempDir, SqliteKeyValueStore) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = DbManager::new(temp_dir.path().join("kv.db"), 2).expect("manager created");
        db.run_migrations().expect("migrations run");
        (temp_dir, SqliteKeyValueStore::new(Arc::new(db)))
    }

    #[tokio::test]
    async fn set_get_remove_cycle() {
        let (_dir, store) = setup();

        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));

        store.set("k", json!("replaced")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!("replaced")));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_matches_literal_prefix_in_order() {
        let (_dir, store) = setup();
        for key in ["p-2", "p-1", "q-1", "p_%", "P-3"] {
            store.set(key, json!(true)).await.unwrap();
        }

        assert_eq!(store.list("p-").await.unwrap(), vec!["p-1".to_string(), "p-2".to_string()]);
        assert_eq!(store.list("p_").await.unwrap(), vec!["p_%".to_string()]);
        assert_eq!(store.list("").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn values_survive_reopening() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let path = temp_dir.path().join("kv.db");
        {
            let db = DbManager::new(&path, 1).unwrap();
            db.run_migrations().unwrap();
            SqliteKeyValueStore::new(Arc::new(db)).set("durable", json!([1, 2])).await.unwrap();
        }

        let db = DbManager::new(&path, 1).unwrap();
        db.run_migrations().unwrap();
        let store = SqliteKeyValueStore::new(Arc::new(db));
        assert_eq!(store.get("durable").await.unwrap(), Some(json!([1, 2])));
    }
}
