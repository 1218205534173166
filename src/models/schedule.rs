use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar block on a single day. Times are zero-padded "HH:MM:SS" wall-clock strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
  pub id: String,
  pub user_id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  pub date: NaiveDate,
  pub start_time: String,
  pub end_time: String,
  #[serde(default)]
  pub completed: bool,
  /// Set for events written by the planning pipeline
  #[serde(default)]
  pub is_ai_generated: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

/// For inserting new events (without id, created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduleEvent {
  pub user_id: String,
  pub title: String,
  pub description: Option<String>,
  pub date: NaiveDate,
  pub start_time: String,
  pub end_time: String,
  pub is_ai_generated: bool,
  pub completed: bool,
}
