use crate::commands::{parse_day, AppState};
use crate::models::{CalendarRule, UserPreferences};
use crate::planner::{ClockTime, DayPlanner, PlanOutcome};
use crate::repo;

/// ---------------------------------------------------------------------------
/// AI Planning
/// ---------------------------------------------------------------------------

/// Plan the given day and write the accepted events.
///
/// `on_status` receives each progress message as the run advances. A failed
/// planning request resolves to [`PlanOutcome::Failed`]; a storage failure
/// (including a partial write, "Added W/N events") is returned as the error.
pub async fn apply_rules(
  state: &AppState,
  date: &str,
  on_status: impl FnMut(&str),
) -> Result<PlanOutcome, String> {
  let date = parse_day(date)?;
  let planner = DayPlanner::new(&state.store, &state.planner, state.config.plan_timeout);

  planner
    .apply_rules(state.user_id(), date, on_status)
    .await
    .map_err(|e| e.to_string())
}

/// Remove the planner's events for a day, returning how many were deleted
pub async fn clear_ai_events(state: &AppState, date: &str) -> Result<u64, String> {
  let date = parse_day(date)?;
  let planner = DayPlanner::new(&state.store, &state.planner, state.config.plan_timeout);

  planner
    .clear_ai_generated_events(state.user_id(), date)
    .await
    .map_err(|e| format!("Failed to clear events: {}", e))
}

/// ---------------------------------------------------------------------------
/// Rules, Preferences and Notes
/// ---------------------------------------------------------------------------

pub async fn get_calendar_rules(state: &AppState) -> Result<Vec<CalendarRule>, String> {
  repo::load_rules(&state.store, state.user_id())
    .await
    .map_err(|e| format!("Failed to load rules: {}", e))
}

pub async fn add_calendar_rule(state: &AppState, rule_text: &str) -> Result<CalendarRule, String> {
  let rule_text = rule_text.trim();
  if rule_text.is_empty() {
    return Err("Rule text is required".to_string());
  }

  repo::create_rule(&state.store, state.user_id(), rule_text)
    .await
    .map_err(|e| format!("Failed to add rule: {}", e))
}

pub async fn set_calendar_rule_active(
  state: &AppState,
  rule_id: &str,
  is_active: bool,
) -> Result<CalendarRule, String> {
  repo::set_rule_active(&state.store, rule_id, is_active)
    .await
    .map_err(|e| format!("Failed to update rule: {}", e))
}

pub async fn get_preferences(state: &AppState) -> Result<UserPreferences, String> {
  repo::load_preferences(&state.store, state.user_id())
    .await
    .map_err(|e| format!("Failed to load preferences: {}", e))
}

pub async fn update_preferences(
  state: &AppState,
  wake_time: &str,
  bed_time: &str,
) -> Result<UserPreferences, String> {
  let wake = ClockTime::parse(wake_time).ok_or_else(|| format!("Invalid wake time: {}", wake_time))?;
  let bed = ClockTime::parse(bed_time).ok_or_else(|| format!("Invalid bed time: {}", bed_time))?;
  if bed <= wake {
    return Err("Bed time must be after wake time".to_string());
  }

  let preferences = UserPreferences {
    wake_time: wake.to_db_string(),
    bed_time: bed.to_db_string(),
  };
  repo::save_preferences(&state.store, state.user_id(), &preferences)
    .await
    .map_err(|e| format!("Failed to save preferences: {}", e))
}

pub async fn save_daily_note(state: &AppState, date: &str, note: &str) -> Result<(), String> {
  let date = parse_day(date)?;
  repo::save_daily_note(&state.store, state.user_id(), date, note)
    .await
    .map_err(|e| format!("Failed to save note: {}", e))
}
