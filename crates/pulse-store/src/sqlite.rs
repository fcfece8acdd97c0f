//! SQLite-backed document store.
//! One `documents` table holds every collection; fields live in a JSON
//! column and filters compile to `json_extract` comparisons.

use async_trait::async_trait;
use chrono::Utc;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::store::{Fields, Filter, Record, Store};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::{new_id, validate_field};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> PulseError {
    PulseError::StoreUnavailable(format!("{context}: {e}"))
}

impl SqliteStore {
    /// Open or create the store database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| unavailable("DB open", e))?;
        // Enable WAL mode so an overlapping run can read while another writes
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::debug!("💾 SQLite store opened at {}", path.display());
        Ok(store)
    }

    /// In-memory SQLite database (tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| unavailable("DB open", e))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| unavailable("Lock", e))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,              -- JSON object
                created_at TEXT NOT NULL,
                UNIQUE (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection);
            ",
        )
        .map_err(|e| unavailable("Migration", e))?;
        Ok(())
    }
}

/// Append filter conditions as `AND ...` clauses, pushing their parameters.
fn push_conditions(filter: &Filter, sql: &mut String, params: &mut Vec<String>) -> Result<()> {
    for (field, value) in &filter.conditions {
        validate_field(field)?;
        params.push(format!("$.{field}"));
        if value.is_null() {
            sql.push_str(" AND json_extract(data, ?) IS NULL");
        } else {
            // Compare through json_extract on both sides so booleans, numbers
            // and strings all normalise to the same SQL values.
            sql.push_str(" AND json_extract(data, ?) = json_extract(?, '$')");
            params.push(value.to_string());
        }
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut params = vec![collection.to_string()];
        push_conditions(filter, &mut sql, &mut params)?;
        sql.push_str(" ORDER BY seq");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn.lock().map_err(|e| unavailable("Lock", e))?;
        let mut stmt = conn.prepare(&sql).map_err(|e| unavailable("Query", e))?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| unavailable("Query", e))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data) = row.map_err(|e| unavailable("Row", e))?;
            match serde_json::from_str::<Fields>(&data) {
                Ok(fields) => records.push(Record { id, fields }),
                Err(e) => tracing::warn!("⚠️ Skipping corrupt document {collection}/{id}: {e}"),
            }
        }
        Ok(records)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().map_err(|e| unavailable("Lock", e))?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| unavailable("Get", e))?;

        match data {
            Some(data) => Ok(Some(Record {
                id: id.to_string(),
                fields: serde_json::from_str(&data)?,
            })),
            None => Ok(None),
        }
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = new_id();
        let data = serde_json::to_string(&fields)?;
        let conn = self.conn.lock().map_err(|e| unavailable("Lock", e))?;
        conn.execute(
            "INSERT INTO documents (collection, id, data, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![collection, id, data, Utc::now().to_rfc3339()],
        )
        .map_err(|e| unavailable("Insert", e))?;
        Ok(id)
    }

    async fn update_if_matches(
        &self,
        collection: &str,
        id: &str,
        predicate: &Filter,
        patch: Fields,
    ) -> Result<bool> {
        // A single UPDATE: SQLite evaluates the predicate and writes the
        // patch under one write lock, so only one concurrent caller wins.
        let mut sql = String::from(
            "UPDATE documents SET data = json_patch(data, ?) WHERE collection = ? AND id = ?",
        );
        let mut params = vec![
            serde_json::to_string(&patch)?,
            collection.to_string(),
            id.to_string(),
        ];
        push_conditions(predicate, &mut sql, &mut params)?;

        let conn = self.conn.lock().map_err(|e| unavailable("Lock", e))?;
        let changed = conn
            .execute(&sql, rusqlite::params_from_iter(params.iter()))
            .map_err(|e| unavailable("Update", e))?;
        Ok(changed == 1)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| unavailable("Lock", e))?;
        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )
        .map_err(|e| unavailable("Delete", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn fields(v: Value) -> Fields {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_open_and_migrate() {
        let dir = std::env::temp_dir().join("algopulse-store-test");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("test.db");
        SqliteStore::open(&path).unwrap();
        // Re-opening runs the migration again without error
        SqliteStore::open(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_filters_bool_string_and_null() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert("bank", fields(json!({"topic": "Arrays", "used": false})))
            .await
            .unwrap();
        store
            .insert("bank", fields(json!({"topic": "Arrays", "used": true})))
            .await
            .unwrap();
        store
            .insert("bank", fields(json!({"topic": "Trees", "used": false, "tag": "x"})))
            .await
            .unwrap();

        let arrays_unused = store
            .query("bank", &Filter::new().eq("topic", "Arrays").eq("used", false))
            .await
            .unwrap();
        assert_eq!(arrays_unused.len(), 1);

        let untagged = store
            .query("bank", &Filter::new().eq("tag", Value::Null))
            .await
            .unwrap();
        assert_eq!(untagged.len(), 2);

        let limited = store.query("bank", &Filter::new().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].str("topic"), Some("Arrays"));
    }

    #[tokio::test]
    async fn test_conditional_update_single_winner() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert("bank", fields(json!({"used": false}))).await.unwrap();
        let unused = Filter::new().eq("used", false);

        let a = store
            .update_if_matches("bank", &id, &unused, fields(json!({"used": true, "used_at": "t1"})))
            .await
            .unwrap();
        let b = store
            .update_if_matches("bank", &id, &unused, fields(json!({"used": true, "used_at": "t2"})))
            .await
            .unwrap();
        assert!(a);
        assert!(!b);

        let rows = store.query("bank", &Filter::new()).await.unwrap();
        assert_eq!(rows[0].bool("used"), Some(true));
        assert_eq!(rows[0].str("used_at"), Some("t1"));
    }

    #[tokio::test]
    async fn test_patch_null_removes_field() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .insert("subs", fields(json!({"email": "a@x.io", "last_item_id": "i1"})))
            .await
            .unwrap();
        let applied = store
            .update_if_matches("subs", &id, &Filter::new(), fields(json!({"last_item_id": null})))
            .await
            .unwrap();
        assert!(applied);
        let rows = store.query("subs", &Filter::new()).await.unwrap();
        assert!(rows[0].str("last_item_id").is_none());
    }

    #[tokio::test]
    async fn test_delete_and_invalid_field() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert("subs", fields(json!({"email": "a@x.io"}))).await.unwrap();
        let fetched = store.get("subs", &id).await.unwrap().unwrap();
        assert_eq!(fetched.str("email"), Some("a@x.io"));
        store.delete("subs", &id).await.unwrap();
        assert!(store.get("subs", &id).await.unwrap().is_none());
        assert!(store.query("subs", &Filter::new()).await.unwrap().is_empty());

        let bad = Filter::new().eq("a.b", 1);
        assert!(matches!(
            store.query("subs", &bad).await,
            Err(PulseError::InvalidRecord(_))
        ));
    }
}
