//! Typed reads and writes over a [`Store`]
//!
//! Every query is scoped to one user. Row decoding happens here so the score
//! engine and planner only ever see model types.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::models::{
  CalendarRule, DailyNote, Goal, Habit, HabitLog, Mantra, NewCalendarRule, NewHabit, NewScheduleEvent,
  NewTodo, ScheduleEvent, Todo, UserPreferences, Vision, DEFAULT_BED_TIME, DEFAULT_WAKE_TIME,
};
use crate::store::{Query, Store, Table};

fn decode<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(StoreError::from))
    .collect()
}

fn decode_one<T: DeserializeOwned>(row: Value) -> Result<T, StoreError> {
  Ok(serde_json::from_value(row)?)
}

fn first_updated<T: DeserializeOwned>(rows: Vec<Value>, table: Table, id: &str) -> Result<T, StoreError> {
  match rows.into_iter().next() {
    Some(row) => decode_one(row),
    None => Err(StoreError::InvalidRow(format!("no {} row with id {}", table, id))),
  }
}

fn date_value(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

/// ---------------------------------------------------------------------------
/// Habits
/// ---------------------------------------------------------------------------

/// All habits for a user, including deactivated ones, in display order
pub async fn load_habits<S: Store>(store: &S, user_id: &str) -> Result<Vec<Habit>, StoreError> {
  let rows = store
    .select(&Query::table(Table::Habits).eq("user_id", user_id).order_by("sort_order"))
    .await?;
  decode(rows)
}

/// Habit logs with dates in `[start, end]`
pub async fn load_habit_logs<S: Store>(
  store: &S,
  user_id: &str,
  start: NaiveDate,
  end: NaiveDate,
) -> Result<Vec<HabitLog>, StoreError> {
  let rows = store
    .select(
      &Query::table(Table::HabitLogs)
        .eq("user_id", user_id)
        .gte("date", date_value(start))
        .lte("date", date_value(end)),
    )
    .await?;
  decode(rows)
}

pub async fn create_habit<S: Store>(
  store: &S,
  user_id: &str,
  name: &str,
  description: Option<&str>,
  weight: i64,
) -> Result<Habit, StoreError> {
  let existing = load_habits(store, user_id).await?;
  let habit = NewHabit {
    user_id: user_id.to_string(),
    name: name.to_string(),
    description: description.map(str::to_string),
    weight: weight.max(1),
    sort_order: existing.len() as i64,
  };

  let mut row = serde_json::to_value(&habit)?;
  row["is_active"] = json!(true);
  decode_one(store.insert(Table::Habits, row).await?)
}

/// Stop counting a habit from `from` onwards; history before it is kept
pub async fn deactivate_habit<S: Store>(
  store: &S,
  habit_id: &str,
  from: NaiveDate,
) -> Result<Habit, StoreError> {
  let rows = store
    .update(
      &Query::table(Table::Habits).eq("id", habit_id),
      json!({ "is_active": false, "deactivated_at": date_value(from) }),
    )
    .await?;
  first_updated(rows, Table::Habits, habit_id)
}

/// Record a habit as done or not done on a date (one log per habit and date)
pub async fn set_habit_completion<S: Store>(
  store: &S,
  user_id: &str,
  habit_id: &str,
  date: NaiveDate,
  completed: bool,
) -> Result<HabitLog, StoreError> {
  let row = store
    .upsert(
      Table::HabitLogs,
      json!({
        "user_id": user_id,
        "habit_id": habit_id,
        "date": date_value(date),
        "completed": completed,
      }),
      &["habit_id", "date"],
    )
    .await?;
  decode_one(row)
}

/// ---------------------------------------------------------------------------
/// Todos and Schedule Events
/// ---------------------------------------------------------------------------

pub async fn load_todos<S: Store>(store: &S, user_id: &str, date: NaiveDate) -> Result<Vec<Todo>, StoreError> {
  let rows = store
    .select(
      &Query::table(Table::Todos)
        .eq("user_id", user_id)
        .eq("date", date_value(date))
        .order_by("sort_order"),
    )
    .await?;
  decode(rows)
}

pub async fn create_todo<S: Store>(store: &S, todo: &NewTodo) -> Result<Todo, StoreError> {
  let count = load_todos(store, &todo.user_id, todo.date).await?.len();
  let mut row = serde_json::to_value(todo)?;
  row["sort_order"] = json!(count);
  decode_one(store.insert(Table::Todos, row).await?)
}

pub async fn set_todo_completion<S: Store>(
  store: &S,
  todo_id: &str,
  completed: bool,
) -> Result<Todo, StoreError> {
  let rows = store
    .update(
      &Query::table(Table::Todos).eq("id", todo_id),
      json!({ "completed": completed }),
    )
    .await?;
  first_updated(rows, Table::Todos, todo_id)
}

/// Events on one date, earliest first
pub async fn load_events<S: Store>(
  store: &S,
  user_id: &str,
  date: NaiveDate,
) -> Result<Vec<ScheduleEvent>, StoreError> {
  let rows = store
    .select(
      &Query::table(Table::ScheduleEvents)
        .eq("user_id", user_id)
        .eq("date", date_value(date))
        .order_by("start_time"),
    )
    .await?;
  decode(rows)
}

pub async fn create_event<S: Store>(
  store: &S,
  event: &NewScheduleEvent,
) -> Result<ScheduleEvent, StoreError> {
  let row = store
    .insert(Table::ScheduleEvents, serde_json::to_value(event)?)
    .await?;
  decode_one(row)
}

pub async fn set_event_completion<S: Store>(
  store: &S,
  event_id: &str,
  completed: bool,
) -> Result<ScheduleEvent, StoreError> {
  let rows = store
    .update(
      &Query::table(Table::ScheduleEvents).eq("id", event_id),
      json!({ "completed": completed }),
    )
    .await?;
  first_updated(rows, Table::ScheduleEvents, event_id)
}

/// Remove the planner's events for a date; user-created events are never touched
pub async fn delete_ai_events<S: Store>(
  store: &S,
  user_id: &str,
  date: NaiveDate,
) -> Result<u64, StoreError> {
  store
    .delete(
      &Query::table(Table::ScheduleEvents)
        .eq("user_id", user_id)
        .eq("date", date_value(date))
        .eq("is_ai_generated", true),
    )
    .await
}

/// ---------------------------------------------------------------------------
/// Planning Inputs
/// ---------------------------------------------------------------------------

/// All rules, active or not, by priority
pub async fn load_rules<S: Store>(store: &S, user_id: &str) -> Result<Vec<CalendarRule>, StoreError> {
  let rows = store
    .select(&Query::table(Table::CalendarRules).eq("user_id", user_id).order_by("priority"))
    .await?;
  decode(rows)
}

/// New rules go to the back of the priority order and start active
pub async fn create_rule<S: Store>(
  store: &S,
  user_id: &str,
  rule_text: &str,
) -> Result<CalendarRule, StoreError> {
  let next_priority = load_rules(store, user_id)
    .await?
    .iter()
    .map(|r| r.priority + 1)
    .max()
    .unwrap_or(0);

  let rule = NewCalendarRule {
    user_id: user_id.to_string(),
    rule_text: rule_text.to_string(),
    priority: next_priority,
  };
  let mut row = serde_json::to_value(&rule)?;
  row["is_active"] = json!(true);
  decode_one(store.insert(Table::CalendarRules, row).await?)
}

pub async fn set_rule_active<S: Store>(
  store: &S,
  rule_id: &str,
  is_active: bool,
) -> Result<CalendarRule, StoreError> {
  let rows = store
    .update(
      &Query::table(Table::CalendarRules).eq("id", rule_id),
      json!({ "is_active": is_active }),
    )
    .await?;
  first_updated(rows, Table::CalendarRules, rule_id)
}

/// Wake and bed time, falling back to 07:00/22:00 per missing field
pub async fn load_preferences<S: Store>(store: &S, user_id: &str) -> Result<UserPreferences, StoreError> {
  let rows = store
    .select(&Query::table(Table::UserPreferences).eq("user_id", user_id).limit(1))
    .await?;

  let field = |row: Option<&Value>, key: &str, fallback: &str| {
    row
      .and_then(|r| r.get(key))
      .and_then(Value::as_str)
      .unwrap_or(fallback)
      .to_string()
  };

  let row = rows.first();
  Ok(UserPreferences {
    wake_time: field(row, "wake_time", DEFAULT_WAKE_TIME),
    bed_time: field(row, "bed_time", DEFAULT_BED_TIME),
  })
}

pub async fn save_preferences<S: Store>(
  store: &S,
  user_id: &str,
  preferences: &UserPreferences,
) -> Result<UserPreferences, StoreError> {
  let row = store
    .upsert(
      Table::UserPreferences,
      json!({
        "user_id": user_id,
        "wake_time": preferences.wake_time,
        "bed_time": preferences.bed_time,
      }),
      &["user_id"],
    )
    .await?;
  decode_one(row)
}

pub async fn load_goals<S: Store>(store: &S, user_id: &str) -> Result<Vec<Goal>, StoreError> {
  let rows = store
    .select(&Query::table(Table::Goals).eq("user_id", user_id))
    .await?;
  decode(rows)
}

pub async fn load_visions<S: Store>(store: &S, user_id: &str) -> Result<Vec<Vision>, StoreError> {
  let rows = store
    .select(&Query::table(Table::Visions).eq("user_id", user_id).eq("is_active", true))
    .await?;
  decode(rows)
}

pub async fn load_mantras<S: Store>(store: &S, user_id: &str) -> Result<Vec<Mantra>, StoreError> {
  let rows = store
    .select(&Query::table(Table::Mantras).eq("user_id", user_id).eq("is_active", true))
    .await?;
  decode(rows)
}

pub async fn load_daily_note<S: Store>(
  store: &S,
  user_id: &str,
  date: NaiveDate,
) -> Result<Option<String>, StoreError> {
  let rows = store
    .select(
      &Query::table(Table::DailyNotes)
        .eq("user_id", user_id)
        .eq("date", date_value(date))
        .limit(1),
    )
    .await?;

  match rows.into_iter().next() {
    Some(row) => Ok(Some(decode_one::<DailyNote>(row)?.note)),
    None => Ok(None),
  }
}

pub async fn save_daily_note<S: Store>(
  store: &S,
  user_id: &str,
  date: NaiveDate,
  note: &str,
) -> Result<(), StoreError> {
  store
    .upsert(
      Table::DailyNotes,
      json!({ "user_id": user_id, "date": date_value(date), "note": note }),
      &["user_id", "date"],
    )
    .await?;
  Ok(())
}
