//! Application entry points
//!
//! Each command takes the shared [`AppState`], parses its string inputs and
//! returns `Result<_, String>` so callers can show the error as-is.

pub mod planning;
pub mod scores;
pub mod tracking;

use chrono::NaiveDate;

use crate::config::AppConfig;
use crate::error::parse_date;
use crate::llm::ClaudeClient;
use crate::store::Storage;

/// Application state shared by every command
pub struct AppState {
  pub store: Storage,
  pub planner: ClaudeClient,
  pub config: AppConfig,
}

impl AppState {
  /// Connect the session's store and build the planning client
  pub async fn initialize(config: AppConfig) -> Result<Self, String> {
    let store = Storage::connect(&config.session)
      .await
      .map_err(|e| format!("Failed to open store: {}", e))?;

    tracing::info!(
      guest = store.is_guest(),
      user = %config.user_id,
      "Session ready"
    );

    Ok(Self {
      planner: ClaudeClient::new(&config.llm),
      store,
      config,
    })
  }

  pub fn user_id(&self) -> &str {
    &self.config.user_id
  }
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
  parse_date(value).map_err(|e| e.to_string())
}
