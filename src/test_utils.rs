//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Seed helpers for the local store
//! - Fake planning service and a store that fails on demand

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::error::{parse_date, StoreError};
use crate::llm::{LlmError, PlanningService};
use crate::models::{CalendarRule, Habit, HabitLog, ScheduleEvent, Todo};
use crate::store::{LocalStore, Query, Store, Table};

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Insert an event on 2024-03-01
pub async fn seed_event(
  store: &LocalStore,
  user_id: &str,
  title: &str,
  start: &str,
  end: &str,
  is_ai_generated: bool,
) -> ScheduleEvent {
  let row = store
    .insert(
      Table::ScheduleEvents,
      json!({
        "user_id": user_id,
        "title": title,
        "date": "2024-03-01",
        "start_time": start,
        "end_time": end,
        "completed": false,
        "is_ai_generated": is_ai_generated,
      }),
    )
    .await
    .expect("Failed to seed event");
  serde_json::from_value(row).expect("Seeded event did not decode")
}

pub async fn seed_preferences(store: &LocalStore, user_id: &str, wake: &str, bed: &str) {
  store
    .upsert(
      Table::UserPreferences,
      json!({ "user_id": user_id, "wake_time": wake, "bed_time": bed }),
      &["user_id"],
    )
    .await
    .expect("Failed to seed preferences");
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// "YYYY-MM-DD" to a date
pub fn date(value: &str) -> NaiveDate {
  parse_date(value).expect("Invalid test date")
}

/// Active habit of weight 1 created at midnight UTC on `created`
pub fn mock_habit(id: &str, created: &str) -> Habit {
  Habit {
    id: id.to_string(),
    user_id: "u1".to_string(),
    name: format!("Habit {}", id),
    description: None,
    weight: 1,
    is_active: true,
    sort_order: 0,
    created_at: date(created).and_time(NaiveTime::MIN).and_utc(),
    deactivated_at: None,
  }
}

pub fn mock_log(habit_id: &str, on: &str, completed: bool) -> HabitLog {
  HabitLog {
    id: None,
    user_id: "u1".to_string(),
    habit_id: habit_id.to_string(),
    date: date(on),
    completed,
  }
}

pub fn mock_todo(id: &str, on: &str, completed: bool) -> Todo {
  Todo {
    id: id.to_string(),
    user_id: "u1".to_string(),
    text: format!("Todo {}", id),
    date: date(on),
    completed,
    sort_order: 0,
    created_at: None,
  }
}

/// User-created event on 2024-03-01
pub fn mock_event(id: &str, start: &str, end: &str, completed: bool) -> ScheduleEvent {
  ScheduleEvent {
    id: id.to_string(),
    user_id: "u1".to_string(),
    title: format!("Event {}", id),
    description: None,
    date: date("2024-03-01"),
    start_time: start.to_string(),
    end_time: end.to_string(),
    completed,
    is_ai_generated: false,
    created_at: None,
  }
}

pub fn mock_rule(id: &str, text: &str, priority: i64, is_active: bool) -> CalendarRule {
  CalendarRule {
    id: id.to_string(),
    user_id: "u1".to_string(),
    rule_text: text.to_string(),
    is_active,
    priority,
    created_at: None,
  }
}

/// ---------------------------------------------------------------------------
/// Test Doubles
/// ---------------------------------------------------------------------------

/// Planning service that answers every request with the same reply
pub struct ScriptedPlanner {
  reply: Result<String, String>,
  delay: Option<Duration>,
  last_request: Mutex<Option<(String, String)>>,
}

impl ScriptedPlanner {
  pub fn reply(text: &str) -> Self {
    Self {
      reply: Ok(text.to_string()),
      delay: None,
      last_request: Mutex::new(None),
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      reply: Err(message.to_string()),
      ..Self::reply("")
    }
  }

  pub fn delayed(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  /// (system prompt, user message) of the most recent request
  pub fn last_request(&self) -> Option<(String, String)> {
    self.last_request.lock().expect("poisoned").clone()
  }
}

impl PlanningService for ScriptedPlanner {
  async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
    *self.last_request.lock().expect("poisoned") =
      Some((system_prompt.to_string(), user_message.to_string()));

    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self.reply.clone().map_err(LlmError::Api)
  }
}

/// Passes everything through to a local store, except that inserts fail once
/// `allowed_inserts` have succeeded, and selects or deletes fail when switched
/// off with [`FailingStore::failing_reads`] / [`FailingStore::failing_deletes`]
pub struct FailingStore {
  inner: LocalStore,
  allowed_inserts: usize,
  inserts: AtomicUsize,
  fail_reads: bool,
  fail_deletes: bool,
}

fn unavailable() -> StoreError {
  StoreError::Api {
    status: 503,
    message: "store unavailable".to_string(),
  }
}

impl FailingStore {
  pub fn new(inner: LocalStore, allowed_inserts: usize) -> Self {
    Self {
      inner,
      allowed_inserts,
      inserts: AtomicUsize::new(0),
      fail_reads: false,
      fail_deletes: false,
    }
  }

  pub fn failing_reads(mut self) -> Self {
    self.fail_reads = true;
    self
  }

  pub fn failing_deletes(mut self) -> Self {
    self.fail_deletes = true;
    self
  }

  pub fn inner(&self) -> &LocalStore {
    &self.inner
  }

  pub fn into_inner(self) -> LocalStore {
    self.inner
  }
}

impl Store for FailingStore {
  async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
    if self.fail_reads {
      return Err(unavailable());
    }
    self.inner.select(query).await
  }

  async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
    if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.allowed_inserts {
      return Err(unavailable());
    }
    self.inner.insert(table, row).await
  }

  async fn upsert(&self, table: Table, row: Value, on_conflict: &[&str]) -> Result<Value, StoreError> {
    self.inner.upsert(table, row, on_conflict).await
  }

  async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
    self.inner.update(query, patch).await
  }

  async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
    if self.fail_deletes {
      return Err(unavailable());
    }
    self.inner.delete(query).await
  }
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
      sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = 'documents'")
        .fetch_all(&pool)
        .await
        .expect("Failed to query tables");

    assert_eq!(tables.len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_event_round_trips_through_store() {
    let store = LocalStore::from_pool(setup_test_db().await);

    let event = seed_event(&store, "u1", "Standup", "09:00:00", "09:30:00", true).await;
    assert_eq!(event.date, date("2024-03-01"));
    assert!(event.is_ai_generated);
    assert!(!event.id.is_empty());
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let habit = mock_habit("h1", "2024-01-05");
    assert_eq!(habit.created_on(), date("2024-01-05"));
    assert!(habit.applies_on(date("2024-01-05")));

    let event = mock_event("e1", "09:00:00", "10:00:00", true);
    assert!(event.completed);
    assert!(!event.is_ai_generated);
  }

  #[tokio::test]
  async fn test_failing_store_allows_configured_inserts() {
    let store = FailingStore::new(LocalStore::from_pool(setup_test_db().await), 1);

    assert!(store.insert(Table::Todos, json!({ "text": "a" })).await.is_ok());
    assert!(store.insert(Table::Todos, json!({ "text": "b" })).await.is_err());
    assert_eq!(store.select(&Query::table(Table::Todos)).await.unwrap().len(), 1);

    let store = store.failing_reads().failing_deletes();
    assert!(store.select(&Query::table(Table::Todos)).await.is_err());
    assert!(store.delete(&Query::table(Table::Todos)).await.is_err());
    assert_eq!(store.inner().select(&Query::table(Table::Todos)).await.unwrap().len(), 1);
  }
}
