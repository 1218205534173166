//! Error types shared across the score engine, planner and stores

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
  #[error("Invalid date range: {end} is before {start}")]
  InvalidDateRange { start: NaiveDate, end: NaiveDate },

  #[error("Invalid date: {0}")]
  InvalidDate(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("URL error: {0}")]
  Url(#[from] url::ParseError),

  #[error("Storage API error ({status}): {message}")]
  Api { status: u16, message: String },

  #[error("Decode error: {0}")]
  Decode(String),

  #[error("Invalid row: {0}")]
  InvalidRow(String),
}

impl From<serde_json::Error> for StoreError {
  fn from(e: serde_json::Error) -> Self {
    StoreError::Decode(e.to_string())
  }
}

#[derive(Debug, Error)]
pub enum PlanError {
  /// Network failure, non-2xx response, timeout or unparseable body from the planning service
  #[error("Planning request failed: {reason}")]
  PlanningRequestFailed { reason: String },

  /// Writes stopped partway; the first `written_count` events stay committed
  #[error("Added {written_count}/{attempted_count} events")]
  PartialPersistFailure {
    written_count: usize,
    attempted_count: usize,
    #[source]
    source: StoreError,
  },

  #[error(transparent)]
  Storage(#[from] StoreError),
}

impl PlanError {
  pub fn request_failed(reason: impl Into<String>) -> Self {
    PlanError::PlanningRequestFailed {
      reason: reason.into(),
    }
  }
}

/// Parse a "YYYY-MM-DD" calendar date
pub fn parse_date(value: &str) -> Result<NaiveDate, ScoreError> {
  NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
    .map_err(|_| ScoreError::InvalidDate(value.to_string()))
}
