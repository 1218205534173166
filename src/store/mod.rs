//! Storage collaborator
//!
//! The score engine and planner never see SQL or HTTP. They read and write
//! named tables through [`Store`], expressed as filter predicates over columns.
//! Two backends exist: [`RemoteStore`] (hosted PostgREST tables, signed-in
//! users) and [`LocalStore`] (SQLite on the device, guest mode). [`Storage`]
//! picks one from the session configuration at construction time.

pub mod local;
pub mod remote;

use serde_json::Value;
use std::cmp::Ordering;

use crate::config::SessionConfig;
use crate::error::StoreError;

pub use local::LocalStore;
pub use remote::{RemoteConfig, RemoteStore};

/// ---------------------------------------------------------------------------
/// Tables
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
  Habits,
  HabitLogs,
  Todos,
  ScheduleEvents,
  CalendarRules,
  UserPreferences,
  Goals,
  Visions,
  Mantras,
  DailyNotes,
}

impl Table {
  pub fn as_str(&self) -> &'static str {
    match self {
      Table::Habits => "habits",
      Table::HabitLogs => "habit_logs",
      Table::Todos => "todos",
      Table::ScheduleEvents => "schedule_events",
      Table::CalendarRules => "calendar_rules",
      Table::UserPreferences => "user_preferences",
      Table::Goals => "goals",
      Table::Visions => "visions",
      Table::Mantras => "mantras",
      Table::DailyNotes => "daily_notes",
    }
  }
}

impl std::fmt::Display for Table {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// ---------------------------------------------------------------------------
/// Filter Predicates
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
  Eq(String, Value),
  Gte(String, Value),
  Lte(String, Value),
  In(String, Vec<Value>),
}

impl Filter {
  pub fn column(&self) -> &str {
    match self {
      Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) | Filter::In(c, _) => c,
    }
  }

  /// Evaluate the predicate against a JSON row. A missing column reads as
  /// null, and null never satisfies a range bound.
  pub fn matches(&self, row: &Value) -> bool {
    let actual = row.get(self.column()).unwrap_or(&Value::Null);
    match self {
      Filter::Eq(_, expected) => actual == expected,
      Filter::Gte(..) | Filter::Lte(..) if actual.is_null() => false,
      Filter::Gte(_, bound) => matches!(
        compare_values(actual, bound),
        Some(Ordering::Greater | Ordering::Equal)
      ),
      Filter::Lte(_, bound) => matches!(
        compare_values(actual, bound),
        Some(Ordering::Less | Ordering::Equal)
      ),
      Filter::In(_, options) => options.iter().any(|o| o == actual),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
  pub column: String,
  pub ascending: bool,
}

/// A filtered read (or the row selection for update/delete) on one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
  pub table: Table,
  pub filters: Vec<Filter>,
  pub order: Vec<Order>,
  pub limit: Option<usize>,
}

impl Query {
  pub fn table(table: Table) -> Self {
    Self {
      table,
      filters: Vec::new(),
      order: Vec::new(),
      limit: None,
    }
  }

  pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::Eq(column.to_string(), value.into()));
    self
  }

  pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::Gte(column.to_string(), value.into()));
    self
  }

  pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::Lte(column.to_string(), value.into()));
    self
  }

  pub fn is_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
    self.filters.push(Filter::In(
      column.to_string(),
      values.into_iter().map(Into::into).collect(),
    ));
    self
  }

  pub fn order_by(mut self, column: &str) -> Self {
    self.order.push(Order {
      column: column.to_string(),
      ascending: true,
    });
    self
  }

  pub fn order_by_desc(mut self, column: &str) -> Self {
    self.order.push(Order {
      column: column.to_string(),
      ascending: false,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn matches(&self, row: &Value) -> bool {
    self.filters.iter().all(|f| f.matches(row))
  }

  /// Compare two rows by the query's ordering columns
  pub fn compare_rows(&self, a: &Value, b: &Value) -> Ordering {
    for order in &self.order {
      let left = a.get(&order.column).unwrap_or(&Value::Null);
      let right = b.get(&order.column).unwrap_or(&Value::Null);
      let ord = compare_values(left, right).unwrap_or(Ordering::Equal);
      let ord = if order.ascending { ord } else { ord.reverse() };
      if ord != Ordering::Equal {
        return ord;
      }
    }
    Ordering::Equal
  }
}

/// Order two JSON scalars of the same kind. Dates and zero-padded times
/// compare correctly as strings.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
    (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
    (Value::Null, Value::Null) => Some(Ordering::Equal),
    (Value::Null, _) => Some(Ordering::Less),
    (_, Value::Null) => Some(Ordering::Greater),
    _ => None,
  }
}

/// ---------------------------------------------------------------------------
/// Store Interface
/// ---------------------------------------------------------------------------

/// Generic table-oriented read/write interface
#[allow(async_fn_in_trait)]
pub trait Store {
  /// Filtered select, ordered and limited per the query
  async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError>;

  /// Insert one row and return it as stored (with id and created_at filled in)
  async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError>;

  /// Insert, or merge into the row that matches on every `on_conflict` column
  async fn upsert(&self, table: Table, row: Value, on_conflict: &[&str]) -> Result<Value, StoreError>;

  /// Merge `patch` into every row the query selects
  async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError>;

  /// Delete every row the query selects, returning how many were removed
  async fn delete(&self, query: &Query) -> Result<u64, StoreError>;
}

/// ---------------------------------------------------------------------------
/// Session-Selected Backend
/// ---------------------------------------------------------------------------

pub enum Storage {
  Remote(RemoteStore),
  Local(LocalStore),
}

impl Storage {
  pub async fn connect(session: &SessionConfig) -> Result<Self, StoreError> {
    match session {
      SessionConfig::Remote(remote) => Ok(Storage::Remote(RemoteStore::new(remote.clone())?)),
      SessionConfig::Guest { database_url } => {
        Ok(Storage::Local(LocalStore::connect(database_url).await?))
      }
    }
  }

  pub fn is_guest(&self) -> bool {
    matches!(self, Storage::Local(_))
  }
}

impl Store for Storage {
  async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
    match self {
      Storage::Remote(s) => s.select(query).await,
      Storage::Local(s) => s.select(query).await,
    }
  }

  async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
    match self {
      Storage::Remote(s) => s.insert(table, row).await,
      Storage::Local(s) => s.insert(table, row).await,
    }
  }

  async fn upsert(&self, table: Table, row: Value, on_conflict: &[&str]) -> Result<Value, StoreError> {
    match self {
      Storage::Remote(s) => s.upsert(table, row, on_conflict).await,
      Storage::Local(s) => s.upsert(table, row, on_conflict).await,
    }
  }

  async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
    match self {
      Storage::Remote(s) => s.update(query, patch).await,
      Storage::Local(s) => s.update(query, patch).await,
    }
  }

  async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
    match self {
      Storage::Remote(s) => s.delete(query).await,
      Storage::Local(s) => s.delete(query).await,
    }
  }
}
