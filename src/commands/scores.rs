use crate::commands::{parse_day, AppState};
use crate::repo;
use crate::score::{
  compute_daily_habit_score, compute_day_scores, compute_mission_score, compute_score_history,
  DayScores, MissionScore, ScorePoint,
};

/// ---------------------------------------------------------------------------
/// Daily Scores
/// ---------------------------------------------------------------------------

pub async fn get_daily_habit_score(state: &AppState, date: &str) -> Result<u8, String> {
  let date = parse_day(date)?;
  let habits = repo::load_habits(&state.store, state.user_id())
    .await
    .map_err(|e| format!("Failed to load habits: {}", e))?;
  let logs = repo::load_habit_logs(&state.store, state.user_id(), date, date)
    .await
    .map_err(|e| format!("Failed to load habit logs: {}", e))?;

  Ok(compute_daily_habit_score(&habits, &logs, date))
}

pub async fn get_mission_score(state: &AppState, date: &str) -> Result<MissionScore, String> {
  let date = parse_day(date)?;
  let todos = repo::load_todos(&state.store, state.user_id(), date)
    .await
    .map_err(|e| format!("Failed to load todos: {}", e))?;
  let events = repo::load_events(&state.store, state.user_id(), date)
    .await
    .map_err(|e| format!("Failed to load events: {}", e))?;

  Ok(compute_mission_score(&todos, &events))
}

/// Habit, schedule and mission scores together, with the configured headline
pub async fn get_day_scores(state: &AppState, date: &str) -> Result<DayScores, String> {
  let date = parse_day(date)?;
  let user_id = state.user_id();

  let habits = repo::load_habits(&state.store, user_id)
    .await
    .map_err(|e| format!("Failed to load habits: {}", e))?;
  let logs = repo::load_habit_logs(&state.store, user_id, date, date)
    .await
    .map_err(|e| format!("Failed to load habit logs: {}", e))?;
  let todos = repo::load_todos(&state.store, user_id, date)
    .await
    .map_err(|e| format!("Failed to load todos: {}", e))?;
  let events = repo::load_events(&state.store, user_id, date)
    .await
    .map_err(|e| format!("Failed to load events: {}", e))?;

  Ok(compute_day_scores(
    &habits,
    &logs,
    &todos,
    &events,
    date,
    state.config.headline,
  ))
}

/// ---------------------------------------------------------------------------
/// History
/// ---------------------------------------------------------------------------

pub async fn get_score_history(
  state: &AppState,
  start: &str,
  end: &str,
) -> Result<Vec<ScorePoint>, String> {
  let start = parse_day(start)?;
  let end = parse_day(end)?;
  if end < start {
    // reject before touching the store
    return compute_score_history(&[], &[], start, end).map_err(|e| e.to_string());
  }

  let habits = repo::load_habits(&state.store, state.user_id())
    .await
    .map_err(|e| format!("Failed to load habits: {}", e))?;
  let logs = repo::load_habit_logs(&state.store, state.user_id(), start, end)
    .await
    .map_err(|e| format!("Failed to load habit logs: {}", e))?;

  compute_score_history(&habits, &logs, start, end).map_err(|e| e.to_string())
}
