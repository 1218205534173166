use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
  pub id: String,
  pub user_id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Completion weight used by the weighted habit score
  #[serde(default = "default_weight")]
  pub weight: i64,
  #[serde(default = "default_active")]
  pub is_active: bool,
  #[serde(default)]
  pub sort_order: i64,
  pub created_at: DateTime<Utc>,
  /// First calendar day the habit no longer counts
  #[serde(default)]
  pub deactivated_at: Option<NaiveDate>,
}

impl Habit {
  /// Calendar date (UTC) the habit was created on
  pub fn created_on(&self) -> NaiveDate {
    self.created_at.date_naive()
  }

  /// Whether the habit existed and had not yet been deactivated on `date`
  pub fn applies_on(&self, date: NaiveDate) -> bool {
    self.created_on() <= date && self.deactivated_at.map_or(true, |until| until > date)
  }
}

/// For inserting new habits (without id, created_at)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHabit {
  pub user_id: String,
  pub name: String,
  pub description: Option<String>,
  pub weight: i64,
  pub sort_order: i64,
}

/// One row per (habit, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLog {
  #[serde(default)]
  pub id: Option<String>,
  pub user_id: String,
  pub habit_id: String,
  pub date: NaiveDate,
  pub completed: bool,
}

fn default_weight() -> i64 {
  1
}

fn default_active() -> bool {
  true
}
