//! Environment-driven configuration
//!
//! Values are read once at startup (after `.env` is loaded by the binary).

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::score::HeadlineScore;
use crate::store::RemoteConfig;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

pub const DEFAULT_DATABASE_URL: &str = "sqlite://daygo.db?mode=rwc";
pub const GUEST_USER_ID: &str = "guest";
pub const DEFAULT_PLAN_TIMEOUT_SECS: u64 = 45;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  Missing(String),

  #[error("Invalid value for {name}: {value}")]
  Invalid { name: String, value: String },
}

/// Which storage backend the session uses
#[derive(Debug, Clone, PartialEq)]
pub enum SessionConfig {
  Remote(RemoteConfig),
  Guest { database_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
  pub api_key: Option<String>,
  pub base_url: Option<String>,
  pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
  pub session: SessionConfig,
  pub user_id: String,
  pub llm: LlmConfig,
  pub plan_timeout: Duration,
  pub headline: HeadlineScore,
}

fn optional(name: &str) -> Option<String> {
  env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> Result<String, ConfigError> {
  optional(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    let mode = optional("DAYGO_SESSION_MODE").unwrap_or_else(|| {
      if optional("SUPABASE_URL").is_some() {
        "remote".to_string()
      } else {
        "guest".to_string()
      }
    });

    let (session, user_id) = match mode.to_lowercase().as_str() {
      "remote" => {
        let remote = RemoteConfig {
          base_url: required("SUPABASE_URL")?,
          anon_key: required("SUPABASE_ANON_KEY")?,
          access_token: optional("SUPABASE_ACCESS_TOKEN"),
        };
        (SessionConfig::Remote(remote), required("DAYGO_USER_ID")?)
      }
      "guest" => {
        let database_url =
          optional("DAYGO_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let user_id = optional("DAYGO_USER_ID").unwrap_or_else(|| GUEST_USER_ID.to_string());
        (SessionConfig::Guest { database_url }, user_id)
      }
      other => {
        return Err(ConfigError::Invalid {
          name: "DAYGO_SESSION_MODE".to_string(),
          value: other.to_string(),
        })
      }
    };

    let plan_timeout = match optional("DAYGO_PLAN_TIMEOUT_SECS") {
      Some(raw) => match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
          return Err(ConfigError::Invalid {
            name: "DAYGO_PLAN_TIMEOUT_SECS".to_string(),
            value: raw,
          })
        }
      },
      None => Duration::from_secs(DEFAULT_PLAN_TIMEOUT_SECS),
    };

    let headline = match optional("DAYGO_HEADLINE_SCORE") {
      Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
        name: "DAYGO_HEADLINE_SCORE".to_string(),
        value: raw.clone(),
      })?,
      None => HeadlineScore::default(),
    };

    Ok(Self {
      session,
      user_id,
      llm: LlmConfig {
        api_key: optional("ANTHROPIC_API_KEY"),
        base_url: optional("DAYGO_LLM_BASE_URL"),
        model: optional("DAYGO_LLM_MODEL"),
      },
      plan_timeout,
      headline,
    })
  }
}
