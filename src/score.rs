//! Deterministic score engine
//!
//! Pure functions over snapshots of habits, habit logs, to-dos and schedule
//! events. Three scores coexist and are kept separate:
//! - habit score: completed applicable habits over applicable habits, per day
//!   (drives the history chart)
//! - schedule score: completed events over events (the headline ring)
//! - mission score: to-dos and events blended
//!
//! Which one the headline shows is a caller choice ([`HeadlineScore`]).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ScoreError;
use crate::models::{Habit, HabitLog, ScheduleEvent, Todo};

/// ---------------------------------------------------------------------------
/// Shared Types
/// ---------------------------------------------------------------------------

/// Which score the headline ring shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadlineScore {
  /// Completed schedule events over all schedule events
  #[default]
  Schedule,
  /// Blended to-dos and schedule events
  Mission,
}

impl std::str::FromStr for HeadlineScore {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "schedule" => Ok(Self::Schedule),
      "mission" => Ok(Self::Mission),
      other => Err(format!("Unknown headline score: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionCount {
  pub completed: usize,
  pub total: usize,
}

impl CompletionCount {
  fn of<T>(items: &[T], is_done: impl Fn(&T) -> bool) -> Self {
    Self {
      completed: items.iter().filter(|i| is_done(*i)).count(),
      total: items.len(),
    }
  }
}

/// Integer percentage, rounded half away from zero; 0 when there is nothing to count
fn percentage(completed: f64, total: f64) -> u8 {
  if total <= 0.0 {
    return 0;
  }
  ((completed / total) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// ---------------------------------------------------------------------------
/// Habit Score
/// ---------------------------------------------------------------------------

/// Habits that existed and were not yet deactivated on `date`.
///
/// Takes the full habit list, inactive ones included: deactivation is a
/// historical marker, so a habit removed today still counts for last week.
pub fn compute_applicable_habits(habits: &[Habit], date: NaiveDate) -> Vec<&Habit> {
  habits.iter().filter(|h| h.applies_on(date)).collect()
}

/// Ids of habits with a completed log on `date`
fn completed_on(logs: &[HabitLog], date: NaiveDate) -> HashSet<&str> {
  logs
    .iter()
    .filter(|l| l.date == date && l.completed)
    .map(|l| l.habit_id.as_str())
    .collect()
}

/// round(100 * completed applicable habits / applicable habits), 0 when none apply
pub fn compute_daily_habit_score(habits: &[Habit], logs: &[HabitLog], date: NaiveDate) -> u8 {
  let applicable = compute_applicable_habits(habits, date);
  if applicable.is_empty() {
    return 0;
  }

  let done = completed_on(logs, date);
  let completed = applicable.iter().filter(|h| done.contains(h.id.as_str())).count();

  percentage(completed as f64, applicable.len() as f64)
}

/// Same universe as [`compute_daily_habit_score`], but each habit counts by its weight
pub fn compute_weighted_habit_score(habits: &[Habit], logs: &[HabitLog], date: NaiveDate) -> u8 {
  let applicable = compute_applicable_habits(habits, date);
  let done = completed_on(logs, date);

  let total: i64 = applicable.iter().map(|h| h.weight.max(0)).sum();
  let completed: i64 = applicable
    .iter()
    .filter(|h| done.contains(h.id.as_str()))
    .map(|h| h.weight.max(0))
    .sum();

  percentage(completed as f64, total as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePoint {
  pub date: NaiveDate,
  pub score: u8,
}

/// One habit score per calendar day in `[start, end]`, ascending.
///
/// Every day is produced, including days with no applicable habits (score 0).
pub fn compute_score_history(
  habits: &[Habit],
  logs: &[HabitLog],
  start: NaiveDate,
  end: NaiveDate,
) -> Result<Vec<ScorePoint>, ScoreError> {
  if end < start {
    return Err(ScoreError::InvalidDateRange { start, end });
  }

  Ok(
    start
      .iter_days()
      .take_while(|day| *day <= end)
      .map(|date| ScorePoint {
        date,
        score: compute_daily_habit_score(habits, logs, date),
      })
      .collect(),
  )
}

/// ---------------------------------------------------------------------------
/// Schedule and Mission Scores
/// ---------------------------------------------------------------------------

/// Completed events over all events for the day
pub fn compute_schedule_score(events: &[ScheduleEvent]) -> u8 {
  let counts = CompletionCount::of(events, |e| e.completed);
  percentage(counts.completed as f64, counts.total as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MissionBreakdown {
  pub todos: CompletionCount,
  pub schedule: CompletionCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MissionScore {
  pub total: u8,
  pub breakdown: MissionBreakdown,
}

/// Blend of to-do and schedule completion. Habits are not part of this
/// score; they are scored on their own by [`compute_daily_habit_score`].
///
/// There is no habits argument: habits never change this value, so callers
/// pass only the day's to-dos and events.
pub fn compute_mission_score(todos: &[Todo], events: &[ScheduleEvent]) -> MissionScore {
  let todo_counts = CompletionCount::of(todos, |t| t.completed);
  let schedule_counts = CompletionCount::of(events, |e| e.completed);

  let completed = todo_counts.completed + schedule_counts.completed;
  let total = todo_counts.total + schedule_counts.total;

  MissionScore {
    total: percentage(completed as f64, total as f64),
    breakdown: MissionBreakdown {
      todos: todo_counts,
      schedule: schedule_counts,
    },
  }
}

/// ---------------------------------------------------------------------------
/// Day Summary
/// ---------------------------------------------------------------------------

/// Every score for one day, plus the one picked for the headline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayScores {
  pub date: NaiveDate,
  pub habits: u8,
  /// Habit score with each habit counted by its weight
  pub weighted_habits: u8,
  pub schedule: u8,
  pub mission: MissionScore,
  pub headline: u8,
}

pub fn compute_day_scores(
  habits: &[Habit],
  logs: &[HabitLog],
  todos: &[Todo],
  events: &[ScheduleEvent],
  date: NaiveDate,
  headline: HeadlineScore,
) -> DayScores {
  let todos: Vec<Todo> = todos.iter().filter(|t| t.date == date).cloned().collect();
  let events: Vec<ScheduleEvent> = events.iter().filter(|e| e.date == date).cloned().collect();

  let schedule = compute_schedule_score(&events);
  let mission = compute_mission_score(&todos, &events);

  DayScores {
    date,
    habits: compute_daily_habit_score(habits, logs, date),
    weighted_habits: compute_weighted_habit_score(habits, logs, date),
    schedule,
    mission,
    headline: match headline {
      HeadlineScore::Schedule => schedule,
      HeadlineScore::Mission => mission.total,
    },
  }
}
