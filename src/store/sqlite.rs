use crate::errors::{DbError, DomainResult};
use crate::store::{Collection, Document, DocumentStore, WriteOp};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{query, query_as, SqlitePool};
use std::str::FromStr;

/// SQLite-backed implementation of the document store.
///
/// Every collection lives in one `documents` table keyed by
/// `(collection, id)` with the payload as a JSON blob. There are no foreign
/// keys and no schema beyond the key columns, which matches the store model
/// the rest of the engine is written against. One `commit` is one SQLite
/// transaction.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: String,
    updated_at: String,
}

impl SqliteDocumentStore {
    /// Open (and initialize) a store at the given SQLite path.
    pub async fn connect(path: &str) -> DomainResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))
            .map_err(DbError::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DbError::from)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store, used by tests. A single connection keeps every
    /// caller on the same memory database.
    pub async fn in_memory() -> DomainResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::from)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> DomainResult<()> {
        query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    fn row_to_document(collection: Collection, row: DocumentRow) -> DomainResult<Document> {
        let data: Value = serde_json::from_str(&row.data).map_err(|e| {
            DbError::Payload(format!(
                "Stored document {}/{} is not valid JSON: {}",
                collection, row.id, e
            ))
        })?;
        let updated_at = parse_timestamp(&row.updated_at)?;
        Ok(Document {
            collection,
            id: row.id,
            data,
            updated_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Payload(format!("Invalid stored timestamp {:?}: {}", raw, e)).into())
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> DomainResult<Option<Document>> {
        let row = query_as::<_, DocumentRow>(
            "SELECT id, data, updated_at FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        match row {
            Some(row) => Ok(Some(Self::row_to_document(collection, row)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, collection: Collection, id: &str) -> DomainResult<bool> {
        let present: (i64,) = query_as(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ? AND id = ?)",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(present.0 == 1)
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> DomainResult<Vec<Document>> {
        let rows = query_as::<_, DocumentRow>(
            "SELECT id, data, updated_at FROM documents \
             WHERE collection = ? AND json_extract(data, ?) = ?",
        )
        .bind(collection.as_str())
        .bind(json_path(field))
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| Self::row_to_document(collection, row))
            .collect()
    }

    async fn scan(&self, collection: Collection) -> DomainResult<Vec<Document>> {
        let rows = query_as::<_, DocumentRow>(
            "SELECT id, data, updated_at FROM documents WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| Self::row_to_document(collection, row))
            .collect()
    }

    async fn insert(&self, collection: Collection, id: &str, data: Value) -> DomainResult<()> {
        let payload = serde_json::to_string(&data)
            .map_err(|e| DbError::Payload(format!("Unserializable document: {}", e)))?;
        let now = Utc::now().to_rfc3339();
        query(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(payload)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn commit(&self, ops: &[WriteOp]) -> DomainResult<()> {
        let limit = self.max_commit_ops();
        if ops.len() > limit {
            return Err(DbError::BatchLimitExceeded {
                limit,
                requested: ops.len(),
            }
            .into());
        }
        if ops.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        for op in ops {
            match op {
                WriteOp::Delete(target) => {
                    // Absent documents are a tolerated no-op.
                    query("DELETE FROM documents WHERE collection = ? AND id = ?")
                        .bind(target.collection.as_str())
                        .bind(&target.id)
                        .execute(&mut *tx)
                        .await
                        .map_err(DbError::from)?;
                }
                WriteOp::Patch { target, fields } => {
                    // json_set keeps explicit nulls, unlike json_patch which
                    // would drop the key entirely.
                    let mut expr = String::from("data");
                    for _ in fields {
                        expr = format!("json_set({}, ?, json(?))", expr);
                    }
                    let sql = format!(
                        "UPDATE documents SET data = {}, updated_at = ? \
                         WHERE collection = ? AND id = ?",
                        expr
                    );
                    let mut q = query(&sql);
                    for (field, value) in fields {
                        let encoded = serde_json::to_string(value).map_err(|e| {
                            DbError::Payload(format!("Unserializable patch value: {}", e))
                        })?;
                        q = q.bind(json_path(field)).bind(encoded);
                    }
                    q.bind(&now)
                        .bind(target.collection.as_str())
                        .bind(&target.id)
                        .execute(&mut *tx)
                        .await
                        .map_err(DbError::from)?;
                }
            }
        }
        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocRef;
    use serde_json::json;

    #[tokio::test]
    async fn insert_get_roundtrip() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        store
            .insert(Collection::Users, "u1", json!({"displayName": "Ada"}))
            .await
            .unwrap();

        let doc = store.get(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(doc.id, "u1");
        assert_eq!(doc.str_field("displayName"), Some("Ada"));
        assert!(store.exists(Collection::Users, "u1").await.unwrap());
        assert!(!store.exists(Collection::Users, "u2").await.unwrap());
        assert!(store.get(Collection::Items, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_eq_filters_on_field() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        store
            .insert(Collection::Items, "i1", json!({"postedBy": "u1"}))
            .await
            .unwrap();
        store
            .insert(Collection::Items, "i2", json!({"postedBy": "u2"}))
            .await
            .unwrap();
        store
            .insert(Collection::Items, "i3", json!({"postedBy": "u1"}))
            .await
            .unwrap();

        let mut ids: Vec<String> = store
            .query_eq(Collection::Items, "postedBy", "u1")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["i1", "i3"]);
    }

    #[tokio::test]
    async fn commit_deletes_and_tolerates_absent_targets() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        store
            .insert(Collection::Items, "i1", json!({"postedBy": "u1"}))
            .await
            .unwrap();

        let ops = vec![
            WriteOp::Delete(DocRef::new(Collection::Items, "i1")),
            WriteOp::Delete(DocRef::new(Collection::Items, "missing")),
        ];
        store.commit(&ops).await.unwrap();
        assert!(!store.exists(Collection::Items, "i1").await.unwrap());

        // Re-running the same batch is a no-op.
        store.commit(&ops).await.unwrap();
    }

    #[tokio::test]
    async fn commit_patch_sets_explicit_null() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        store
            .insert(
                Collection::Exchanges,
                "e1",
                json!({"itemId": "i1", "itemTitle": "Bike", "status": "pending"}),
            )
            .await
            .unwrap();

        let mut fields = serde_json::Map::new();
        fields.insert("itemId".to_string(), Value::Null);
        fields.insert("itemTitle".to_string(), json!("Item deleted"));
        store
            .commit(&[WriteOp::Patch {
                target: DocRef::new(Collection::Exchanges, "e1"),
                fields,
            }])
            .await
            .unwrap();

        let doc = store.get(Collection::Exchanges, "e1").await.unwrap().unwrap();
        assert_eq!(doc.data.get("itemId"), Some(&Value::Null));
        assert_eq!(doc.str_field("itemTitle"), Some("Item deleted"));
        assert_eq!(doc.str_field("status"), Some("pending"));
    }

    #[tokio::test]
    async fn commit_rejects_oversized_batch() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        let ops: Vec<WriteOp> = (0..=store.max_commit_ops())
            .map(|i| WriteOp::Delete(DocRef::new(Collection::Items, format!("i{}", i))))
            .collect();
        let err = store.commit(&ops).await.unwrap_err();
        assert!(err.to_string().contains("exceeds the store limit"));
    }
}
