//! Rows that only feed the planning context

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WAKE_TIME: &str = "07:00:00";
pub const DEFAULT_BED_TIME: &str = "22:00:00";

/// Natural-language scheduling rule, interpreted only by the planning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRule {
  pub id: String,
  pub user_id: String,
  pub rule_text: String,
  #[serde(default = "default_active")]
  pub is_active: bool,
  #[serde(default)]
  pub priority: i64,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalendarRule {
  pub user_id: String,
  pub rule_text: String,
  pub priority: i64,
}

/// Wake and bed time, the hard bounds for generated events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
  pub wake_time: String,
  pub bed_time: String,
}

impl Default for UserPreferences {
  fn default() -> Self {
    Self {
      wake_time: DEFAULT_WAKE_TIME.to_string(),
      bed_time: DEFAULT_BED_TIME.to_string(),
    }
  }
}

impl UserPreferences {
  /// "HH:MM" form shown to the planner
  pub fn wake_display(&self) -> &str {
    display_time(&self.wake_time)
  }

  pub fn bed_display(&self) -> &str {
    display_time(&self.bed_time)
  }
}

fn display_time(time: &str) -> &str {
  time.get(..5).unwrap_or(time)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
  #[serde(default)]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vision {
  #[serde(default)]
  pub id: String,
  pub text: String,
  #[serde(default = "default_active")]
  pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mantra {
  #[serde(default)]
  pub id: String,
  pub text: String,
  #[serde(default = "default_active")]
  pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNote {
  pub date: NaiveDate,
  #[serde(default)]
  pub note: String,
}

fn default_active() -> bool {
  true
}
