use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
  pub id: String,
  pub user_id: String,
  pub text: String,
  pub date: NaiveDate,
  #[serde(default)]
  pub completed: bool,
  #[serde(default)]
  pub sort_order: i64,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTodo {
  pub user_id: String,
  pub text: String,
  pub date: NaiveDate,
  pub completed: bool,
}
