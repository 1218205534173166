//! Planning context assembly
//!
//! Projects the day's data down to what the planning service needs and
//! renders it into the request text. No I/O happens here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{
  CalendarRule, Goal, Habit, Mantra, ScheduleEvent, Todo, UserPreferences, Vision,
};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("../prompts/planner_system.txt");

/// Everything known about one user's day at the moment planning starts
#[derive(Debug, Clone, Default)]
pub struct DaySnapshot {
  pub date: NaiveDate,
  pub rules: Vec<CalendarRule>,
  pub events: Vec<ScheduleEvent>,
  pub habits: Vec<Habit>,
  pub todos: Vec<Todo>,
  pub goals: Vec<Goal>,
  pub visions: Vec<Vision>,
  pub mantras: Vec<Mantra>,
  pub daily_note: Option<String>,
  pub preferences: UserPreferences,
}

/// ---------------------------------------------------------------------------
/// Context Projection
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
  pub title: String,
  pub start_time: String,
  pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitContext {
  pub name: String,
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoContext {
  pub text: String,
  pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalContext {
  pub title: String,
  pub description: Option<String>,
}

/// The minimal payload the planning service sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningContext {
  pub date: NaiveDate,
  /// Active rule texts, highest priority (lowest number) first
  pub rules: Vec<String>,
  pub existing_events: Vec<EventContext>,
  pub habits: Vec<HabitContext>,
  pub todos: Vec<TodoContext>,
  pub goals: Vec<GoalContext>,
  pub visions: Vec<String>,
  pub mantras: Vec<String>,
  pub daily_note: Option<String>,
  /// "HH:MM"
  pub wake_time: String,
  pub bed_time: String,
}

fn non_empty(text: &Option<String>) -> Option<String> {
  text
    .as_deref()
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_string)
}

pub fn build_planning_context(snapshot: &DaySnapshot) -> PlanningContext {
  let mut rules: Vec<&CalendarRule> = snapshot.rules.iter().filter(|r| r.is_active).collect();
  rules.sort_by_key(|r| r.priority);

  PlanningContext {
    date: snapshot.date,
    rules: rules.into_iter().map(|r| r.rule_text.clone()).collect(),
    existing_events: snapshot
      .events
      .iter()
      .map(|e| EventContext {
        title: e.title.clone(),
        start_time: e.start_time.clone(),
        end_time: e.end_time.clone(),
      })
      .collect(),
    habits: snapshot
      .habits
      .iter()
      .map(|h| HabitContext {
        name: h.name.clone(),
        description: non_empty(&h.description),
      })
      .collect(),
    todos: snapshot
      .todos
      .iter()
      .map(|t| TodoContext {
        text: t.text.clone(),
        completed: t.completed,
      })
      .collect(),
    goals: snapshot
      .goals
      .iter()
      .map(|g| GoalContext {
        title: g.title.clone(),
        description: non_empty(&g.description),
      })
      .collect(),
    visions: snapshot.visions.iter().map(|v| v.text.clone()).collect(),
    mantras: snapshot.mantras.iter().map(|m| m.text.clone()).collect(),
    daily_note: non_empty(&snapshot.daily_note),
    wake_time: snapshot.preferences.wake_display().to_string(),
    bed_time: snapshot.preferences.bed_display().to_string(),
  }
}

/// ---------------------------------------------------------------------------
/// Request Rendering
/// ---------------------------------------------------------------------------

fn bullet_list<T>(items: &[T], empty: &str, render: impl Fn(&T) -> String) -> String {
  if items.is_empty() {
    return empty.to_string();
  }
  items.iter().map(|i| format!("- {}", render(i))).collect::<Vec<_>>().join("\n")
}

fn with_description(name: &str, description: &Option<String>) -> String {
  match description {
    Some(d) => format!("{}: {}", name, d),
    None => name.to_string(),
  }
}

impl PlanningContext {
  /// The instruction, with the hard constraints filled in for this user
  pub fn system_prompt(&self) -> String {
    SYSTEM_PROMPT_TEMPLATE
      .replace("{wake_time}", &self.wake_time)
      .replace("{bed_time}", &self.bed_time)
  }

  /// The user-context payload
  pub fn user_message(&self) -> String {
    let rules = if self.rules.is_empty() {
      "No specific rules - plan the day intelligently based on context".to_string()
    } else {
      self
        .rules
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n")
    };

    let events = bullet_list(
      &self.existing_events,
      "No existing events - the day is open",
      |e| format!("{}: {} - {}", e.title, e.start_time, e.end_time),
    );

    let pending: Vec<&TodoContext> = self.todos.iter().filter(|t| !t.completed).collect();
    let mut todos = bullet_list(&pending, "No pending todos", |t| t.text.clone());
    let completed = self.todos.len() - pending.len();
    if completed > 0 {
      todos.push_str(&format!("\n({} already completed today)", completed));
    }

    let habits = bullet_list(&self.habits, "No habits defined", |h| {
      with_description(&h.name, &h.description)
    });
    let goals = bullet_list(&self.goals, "No goals defined", |g| {
      with_description(&g.title, &g.description)
    });
    let visions = bullet_list(&self.visions, "No visions defined", |v| v.clone());
    let mantras = bullet_list(&self.mantras, "No mantras defined", |m| format!("\"{}\"", m));
    let note = self
      .daily_note
      .as_deref()
      .unwrap_or("No specific notes for today");

    format!(
      r#"Today's date: {date}
Wake time: {wake} | Bed time: {bed}

=== EXISTING EVENTS (DO NOT OVERLAP) ===
{events}

=== TODAY'S NOTES (IMPORTANT CONTEXT - schedule around these) ===
{note}

=== TODAY'S TODOS ===
{todos}

=== HABITS (schedule time for these) ===
{habits}

=== GOALS ===
{goals}

=== VISION ===
{visions}

=== TODAY'S MANTRAS ===
{mantras}

=== SCHEDULING RULES ===
{rules}

Create a schedule from {wake} to {bed}. Respond with only a JSON array."#,
      date = self.date,
      wake = self.wake_time,
      bed = self.bed_time,
    )
  }
}
