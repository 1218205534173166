pub mod commands;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod planner;
pub mod repo;
pub mod score;
pub mod store;

#[cfg(test)]
mod test_utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::AppState;
use config::AppConfig;

const USAGE: &str = "usage: daygo <plan|clear|score> <YYYY-MM-DD> | daygo history <start> <end>";

/// One invocation of the binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Plan { date: String },
  Clear { date: String },
  Score { date: String },
  History { start: String, end: String },
}

impl Command {
  /// Parse the arguments after the program name
  pub fn parse(args: &[String]) -> Result<Self, String> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
      ["plan", date] => Ok(Command::Plan { date: date.to_string() }),
      ["clear", date] => Ok(Command::Clear { date: date.to_string() }),
      ["score", date] => Ok(Command::Score { date: date.to_string() }),
      ["history", start, end] => Ok(Command::History {
        start: start.to_string(),
        end: end.to_string(),
      }),
      _ => Err(USAGE.to_string()),
    }
  }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
  serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

/// Run one command against the configured session and return what to print
pub async fn execute(state: &AppState, command: Command) -> Result<String, String> {
  match command {
    Command::Plan { date } => {
      let outcome = commands::planning::apply_rules(state, &date, |status| {
        tracing::info!("{}", status);
      })
      .await?;
      Ok(outcome.status_message())
    }
    Command::Clear { date } => {
      let deleted = commands::planning::clear_ai_events(state, &date).await?;
      Ok(format!("Removed {} AI events", deleted))
    }
    Command::Score { date } => to_json(&commands::scores::get_day_scores(state, &date).await?),
    Command::History { start, end } => {
      to_json(&commands::scores::get_score_history(state, &start, &end).await?)
    }
  }
}

pub async fn run(args: Vec<String>) -> Result<String, String> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    ))
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let command = Command::parse(&args)?;
  let config = AppConfig::from_env().map_err(|e| e.to_string())?;
  let state = AppState::initialize(config).await?;

  execute(&state, command).await
}
