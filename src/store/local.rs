//! Guest-mode store backed by SQLite on the device.
//!
//! Each table is a collection of JSON rows in a single `documents` table;
//! filters and ordering are evaluated in process.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use super::{Query, Store, Table};
use crate::error::StoreError;

pub struct LocalStore {
  pool: SqlitePool,
}

impl LocalStore {
  /// Open (creating if needed) the database at `database_url` and run migrations
  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    // every connection to an in-memory database is a separate database
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Local store ready at {}", database_url);

    Ok(Self { pool })
  }

  /// Wrap an already-migrated pool
  pub fn from_pool(pool: SqlitePool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}

async fn load_documents(
  conn: &mut SqliteConnection,
  table: Table,
) -> Result<Vec<(String, Value)>, StoreError> {
  let rows: Vec<(String, String)> =
    sqlx::query_as("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY rowid")
      .bind(table.as_str())
      .fetch_all(&mut *conn)
      .await?;

  rows
    .into_iter()
    .map(|(id, body)| Ok((id, serde_json::from_str(&body)?)))
    .collect()
}

async fn write_document(
  conn: &mut SqliteConnection,
  table: Table,
  id: &str,
  body: &Value,
) -> Result<(), StoreError> {
  sqlx::query(
    r#"
    INSERT INTO documents (collection, id, body, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(collection, id) DO UPDATE SET
      body = excluded.body,
      updated_at = excluded.updated_at
    "#,
  )
  .bind(table.as_str())
  .bind(id)
  .bind(serde_json::to_string(body)?)
  .bind(Utc::now().to_rfc3339())
  .execute(&mut *conn)
  .await?;

  Ok(())
}

fn into_object(row: Value) -> Result<Map<String, Value>, StoreError> {
  match row {
    Value::Object(map) => Ok(map),
    other => Err(StoreError::InvalidRow(format!("expected a JSON object, got {}", other))),
  }
}

/// Fill in the columns the hosted database would default
fn with_generated_columns(mut row: Map<String, Value>) -> (String, Value) {
  let id = match row.get("id") {
    Some(Value::String(id)) => id.clone(),
    _ => Uuid::new_v4().to_string(),
  };
  row.insert("id".to_string(), Value::String(id.clone()));
  if !matches!(row.get("created_at"), Some(Value::String(_))) {
    row.insert("created_at".to_string(), Value::String(Utc::now().to_rfc3339()));
  }
  (id, Value::Object(row))
}

fn merge(target: &mut Value, patch: &Map<String, Value>) {
  if let Value::Object(map) = target {
    for (key, value) in patch {
      if key != "id" {
        map.insert(key.clone(), value.clone());
      }
    }
  }
}

impl Store for LocalStore {
  async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
    let mut conn = self.pool.acquire().await?;
    let mut rows: Vec<Value> = load_documents(&mut conn, query.table)
      .await?
      .into_iter()
      .map(|(_, body)| body)
      .filter(|body| query.matches(body))
      .collect();

    rows.sort_by(|a, b| query.compare_rows(a, b));
    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }
    Ok(rows)
  }

  async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
    let (id, body) = with_generated_columns(into_object(row)?);
    let mut conn = self.pool.acquire().await?;
    write_document(&mut conn, table, &id, &body).await?;
    Ok(body)
  }

  async fn upsert(&self, table: Table, row: Value, on_conflict: &[&str]) -> Result<Value, StoreError> {
    let row = into_object(row)?;
    let mut tx = self.pool.begin().await?;

    let existing = load_documents(&mut tx, table)
      .await?
      .into_iter()
      .find(|(_, body)| {
        on_conflict
          .iter()
          .all(|col| body.get(*col).unwrap_or(&Value::Null) == row.get(*col).unwrap_or(&Value::Null))
      });

    let (id, body) = match existing {
      Some((id, mut body)) => {
        merge(&mut body, &row);
        (id, body)
      }
      None => with_generated_columns(row),
    };

    write_document(&mut tx, table, &id, &body).await?;
    tx.commit().await?;
    Ok(body)
  }

  async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
    let patch = into_object(patch)?;
    let mut tx = self.pool.begin().await?;

    let mut updated = Vec::new();
    for (id, mut body) in load_documents(&mut tx, query.table).await? {
      if query.matches(&body) {
        merge(&mut body, &patch);
        write_document(&mut tx, query.table, &id, &body).await?;
        updated.push(body);
      }
    }

    tx.commit().await?;
    Ok(updated)
  }

  async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
    let mut tx = self.pool.begin().await?;

    let mut deleted = 0;
    for (id, body) in load_documents(&mut tx, query.table).await? {
      if query.matches(&body) {
        sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
          .bind(query.table.as_str())
          .bind(&id)
          .execute(&mut *tx)
          .await?;
        deleted += 1;
      }
    }

    tx.commit().await?;
    Ok(deleted)
  }
}
