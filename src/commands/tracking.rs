use crate::commands::{parse_day, AppState};
use crate::models::{Habit, HabitLog, NewScheduleEvent, NewTodo, ScheduleEvent, Todo};
use crate::planner::ClockTime;
use crate::repo;

/// ---------------------------------------------------------------------------
/// Habits
/// ---------------------------------------------------------------------------

pub async fn get_habits(state: &AppState) -> Result<Vec<Habit>, String> {
  repo::load_habits(&state.store, state.user_id())
    .await
    .map_err(|e| format!("Failed to load habits: {}", e))
}

pub async fn create_habit(
  state: &AppState,
  name: &str,
  description: Option<&str>,
  weight: Option<i64>,
) -> Result<Habit, String> {
  let name = name.trim();
  if name.is_empty() {
    return Err("Habit name is required".to_string());
  }

  repo::create_habit(&state.store, state.user_id(), name, description, weight.unwrap_or(1))
    .await
    .map_err(|e| format!("Failed to create habit: {}", e))
}

/// Habit stops counting from `date`; earlier days keep their scores
pub async fn deactivate_habit(state: &AppState, habit_id: &str, date: &str) -> Result<Habit, String> {
  let date = parse_day(date)?;
  repo::deactivate_habit(&state.store, habit_id, date)
    .await
    .map_err(|e| format!("Failed to deactivate habit: {}", e))
}

pub async fn toggle_habit(
  state: &AppState,
  habit_id: &str,
  date: &str,
  completed: bool,
) -> Result<HabitLog, String> {
  let date = parse_day(date)?;
  repo::set_habit_completion(&state.store, state.user_id(), habit_id, date, completed)
    .await
    .map_err(|e| format!("Failed to update habit: {}", e))
}

/// ---------------------------------------------------------------------------
/// Todos
/// ---------------------------------------------------------------------------

pub async fn get_todos(state: &AppState, date: &str) -> Result<Vec<Todo>, String> {
  let date = parse_day(date)?;
  repo::load_todos(&state.store, state.user_id(), date)
    .await
    .map_err(|e| format!("Failed to load todos: {}", e))
}

pub async fn add_todo(state: &AppState, text: &str, date: &str) -> Result<Todo, String> {
  let text = text.trim();
  if text.is_empty() {
    return Err("Todo text is required".to_string());
  }

  let todo = NewTodo {
    user_id: state.user_id().to_string(),
    text: text.to_string(),
    date: parse_day(date)?,
    completed: false,
  };
  repo::create_todo(&state.store, &todo)
    .await
    .map_err(|e| format!("Failed to add todo: {}", e))
}

pub async fn toggle_todo(state: &AppState, todo_id: &str, completed: bool) -> Result<Todo, String> {
  repo::set_todo_completion(&state.store, todo_id, completed)
    .await
    .map_err(|e| format!("Failed to update todo: {}", e))
}

/// ---------------------------------------------------------------------------
/// Schedule Events
/// ---------------------------------------------------------------------------

pub async fn get_events(state: &AppState, date: &str) -> Result<Vec<ScheduleEvent>, String> {
  let date = parse_day(date)?;
  repo::load_events(&state.store, state.user_id(), date)
    .await
    .map_err(|e| format!("Failed to load events: {}", e))
}

/// Add a user-created event. Times may be "H:MM", "HH:MM" or "HH:MM:SS".
pub async fn add_event(
  state: &AppState,
  title: &str,
  date: &str,
  start_time: &str,
  end_time: &str,
  description: Option<&str>,
) -> Result<ScheduleEvent, String> {
  let start = ClockTime::parse(start_time).ok_or_else(|| format!("Invalid start time: {}", start_time))?;
  let end = ClockTime::parse(end_time).ok_or_else(|| format!("Invalid end time: {}", end_time))?;
  if end <= start {
    return Err("Event must end after it starts".to_string());
  }

  let event = NewScheduleEvent {
    user_id: state.user_id().to_string(),
    title: title.trim().to_string(),
    description: description.map(str::to_string),
    date: parse_day(date)?,
    start_time: start.to_db_string(),
    end_time: end.to_db_string(),
    is_ai_generated: false,
    completed: false,
  };
  repo::create_event(&state.store, &event)
    .await
    .map_err(|e| format!("Failed to add event: {}", e))
}

pub async fn toggle_event(state: &AppState, event_id: &str, completed: bool) -> Result<ScheduleEvent, String> {
  repo::set_event_completion(&state.store, event_id, completed)
    .await
    .map_err(|e| format!("Failed to update event: {}", e))
}
