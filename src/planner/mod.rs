//! AI day planning
//!
//! One planning run moves through
//! `Idle -> Requesting -> Validating -> Persisting -> Done`, and ends in
//! `Failed` when the service request fails or a write fails.
//! The service only proposes events. What gets written is decided by
//! [`validate::validate_and_filter_plan`].

pub mod context;
pub mod validate;

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use context::{build_planning_context, DaySnapshot, PlanningContext};
pub use validate::{validate_and_filter_plan, CandidateEvent, ClockTime, ProposedEvent};

use crate::error::PlanError;
use crate::llm::{extract_json_array, PlanningService};
use crate::models::NewScheduleEvent;
use crate::repo;
use crate::store::Store;

/// ---------------------------------------------------------------------------
/// Run State
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPhase {
  Idle,
  Requesting,
  Validating,
  Persisting,
  Done,
  Failed,
}

impl PlanPhase {
  pub fn can_advance_to(self, next: PlanPhase) -> bool {
    use PlanPhase::*;
    matches!(
      (self, next),
      (Idle, Requesting)
        | (Requesting, Validating)
        | (Requesting, Failed)
        | (Validating, Persisting)
        | (Validating, Done)
        | (Persisting, Done)
        | (Persisting, Failed)
    )
  }
}

/// Result of a planning run that reached a terminal phase without a storage error
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome {
  Added { written: usize },
  NoViableEvents,
  Failed { reason: String },
}

impl PlanOutcome {
  pub fn status_message(&self) -> String {
    match self {
      PlanOutcome::Added { written } => format!("Done! Added {} events", written),
      PlanOutcome::NoViableEvents => "No events to add".to_string(),
      PlanOutcome::Failed { .. } => "Error planning day".to_string(),
    }
  }

  pub fn phase(&self) -> PlanPhase {
    match self {
      PlanOutcome::Failed { .. } => PlanPhase::Failed,
      _ => PlanPhase::Done,
    }
  }
}

struct PhaseTracker {
  phase: PlanPhase,
}

impl PhaseTracker {
  fn new() -> Self {
    Self { phase: PlanPhase::Idle }
  }

  fn advance(&mut self, next: PlanPhase) {
    debug_assert!(self.phase.can_advance_to(next), "{:?} -> {:?}", self.phase, next);
    debug!("Planning phase {:?} -> {:?}", self.phase, next);
    self.phase = next;
  }
}

/// ---------------------------------------------------------------------------
/// Planner
/// ---------------------------------------------------------------------------

pub struct DayPlanner<'a, S: Store, P: PlanningService> {
  store: &'a S,
  service: &'a P,
  timeout: Duration,
}

impl<'a, S: Store, P: PlanningService> DayPlanner<'a, S, P> {
  pub fn new(store: &'a S, service: &'a P, timeout: Duration) -> Self {
    Self {
      store,
      service,
      timeout,
    }
  }

  /// Gather everything the planner reads for one user's day
  pub async fn load_snapshot(&self, user_id: &str, date: NaiveDate) -> Result<DaySnapshot, PlanError> {
    let habits = repo::load_habits(self.store, user_id)
      .await?
      .into_iter()
      .filter(|h| h.is_active && h.applies_on(date))
      .collect();

    Ok(DaySnapshot {
      date,
      rules: repo::load_rules(self.store, user_id).await?,
      events: repo::load_events(self.store, user_id, date).await?,
      habits,
      todos: repo::load_todos(self.store, user_id, date).await?,
      goals: repo::load_goals(self.store, user_id).await?,
      visions: repo::load_visions(self.store, user_id).await?,
      mantras: repo::load_mantras(self.store, user_id).await?,
      daily_note: repo::load_daily_note(self.store, user_id, date).await?,
      preferences: repo::load_preferences(self.store, user_id).await?,
    })
  }

  /// Ask the planning service for candidate events.
  ///
  /// Gives up after the configured timeout; dropping the pending request
  /// cancels it.
  pub async fn request_plan(&self, context: &PlanningContext) -> Result<Vec<CandidateEvent>, PlanError> {
    let system_prompt = context.system_prompt();
    let user_message = context.user_message();

    let reply = tokio::time::timeout(self.timeout, self.service.complete(&system_prompt, &user_message))
      .await
      .map_err(|_| PlanError::request_failed("timeout"))?
      .map_err(|e| PlanError::request_failed(e.to_string()))?;

    parse_candidates(&reply)
  }

  /// Write accepted events in order, stopping at the first failure
  pub async fn persist_accepted_events(
    &self,
    accepted: &[ProposedEvent],
    user_id: &str,
    date: NaiveDate,
  ) -> Result<usize, PlanError> {
    self
      .persist_with_progress(accepted, user_id, date, |_, _| {})
      .await
  }

  async fn persist_with_progress(
    &self,
    accepted: &[ProposedEvent],
    user_id: &str,
    date: NaiveDate,
    mut on_event: impl FnMut(usize, &ProposedEvent),
  ) -> Result<usize, PlanError> {
    for (i, event) in accepted.iter().enumerate() {
      on_event(i + 1, event);

      let new_event = NewScheduleEvent {
        user_id: user_id.to_string(),
        title: event.title.clone(),
        description: event.description.clone(),
        date,
        start_time: event.start_time.clone(),
        end_time: event.end_time.clone(),
        is_ai_generated: true,
        completed: false,
      };

      if let Err(source) = repo::create_event(self.store, &new_event).await {
        warn!("Failed to write planned event {}/{}: {}", i + 1, accepted.len(), source);
        return Err(PlanError::PartialPersistFailure {
          written_count: i,
          attempted_count: accepted.len(),
          source,
        });
      }
      debug!("Wrote {} {}-{}", event.title, event.start_time, event.end_time);
    }

    Ok(accepted.len())
  }

  /// Delete the planner's own events for a date and report how many went
  pub async fn clear_ai_generated_events(&self, user_id: &str, date: NaiveDate) -> Result<u64, PlanError> {
    let deleted = repo::delete_ai_events(self.store, user_id, date).await?;
    info!("Cleared {} AI events for {}", deleted, date);
    Ok(deleted)
  }

  /// Plan the day end to end.
  ///
  /// `on_status` receives the user-facing progress messages. A failed service
  /// request is reported as [`PlanOutcome::Failed`]; storage errors and
  /// partial writes come back as `Err`.
  pub async fn apply_rules(
    &self,
    user_id: &str,
    date: NaiveDate,
    mut on_status: impl FnMut(&str),
  ) -> Result<PlanOutcome, PlanError> {
    let mut tracker = PhaseTracker::new();

    on_status("Analyzing your day...");
    let snapshot = self.load_snapshot(user_id, date).await?;
    let context = build_planning_context(&snapshot);

    tracker.advance(PlanPhase::Requesting);
    on_status("AI is thinking...");
    let candidates = match self.request_plan(&context).await {
      Ok(candidates) => candidates,
      Err(PlanError::PlanningRequestFailed { reason }) => {
        warn!("Planning request failed: {}", reason);
        tracker.advance(PlanPhase::Failed);
        let outcome = PlanOutcome::Failed { reason };
        on_status(&outcome.status_message());
        return Ok(outcome);
      }
      Err(e) => return Err(e),
    };

    tracker.advance(PlanPhase::Validating);
    let accepted = validate_and_filter_plan(&candidates, &snapshot.events, &snapshot.preferences);
    info!("Planner proposed {} events, {} accepted", candidates.len(), accepted.len());

    if accepted.is_empty() {
      tracker.advance(PlanPhase::Done);
      let outcome = PlanOutcome::NoViableEvents;
      on_status(&outcome.status_message());
      return Ok(outcome);
    }

    tracker.advance(PlanPhase::Persisting);
    let total = accepted.len();
    let written = self
      .persist_with_progress(&accepted, user_id, date, |i, event| {
        on_status(&format!("Adding {}/{}: {}", i, total, event.title));
      })
      .await;

    match written {
      Ok(written) => {
        tracker.advance(PlanPhase::Done);
        let outcome = PlanOutcome::Added { written };
        on_status(&outcome.status_message());
        Ok(outcome)
      }
      Err(e) => {
        tracker.advance(PlanPhase::Failed);
        on_status(&e.to_string());
        Err(e)
      }
    }
  }
}

/// Turn the service's reply into candidates, one per array element
pub fn parse_candidates(reply: &str) -> Result<Vec<CandidateEvent>, PlanError> {
  let json = extract_json_array(reply).map_err(|e| PlanError::request_failed(e.to_string()))?;

  match serde_json::from_str::<Value>(&json) {
    Ok(Value::Array(items)) => Ok(items.iter().map(CandidateEvent::from_value).collect()),
    Ok(_) => Err(PlanError::request_failed("response is not a JSON array")),
    Err(e) => Err(PlanError::request_failed(format!("invalid JSON in response: {}", e))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::StoreError;
  use crate::models::ScheduleEvent;
  use crate::store::LocalStore;
  use crate::test_utils::{
    date, seed_event, seed_preferences, setup_test_db, FailingStore, ScriptedPlanner,
  };

  const USER: &str = "u1";

  async fn store() -> LocalStore {
    LocalStore::from_pool(setup_test_db().await)
  }

  fn planner<'a, S: Store, P: PlanningService>(store: &'a S, service: &'a P) -> DayPlanner<'a, S, P> {
    DayPlanner::new(store, service, Duration::from_secs(5))
  }

  async fn events(store: &LocalStore) -> Vec<ScheduleEvent> {
    repo::load_events(store, USER, date("2024-03-01")).await.unwrap()
  }

  #[test]
  fn test_phase_transitions() {
    assert!(PlanPhase::Idle.can_advance_to(PlanPhase::Requesting));
    assert!(PlanPhase::Requesting.can_advance_to(PlanPhase::Failed));
    assert!(PlanPhase::Validating.can_advance_to(PlanPhase::Done));
    assert!(!PlanPhase::Idle.can_advance_to(PlanPhase::Persisting));
    assert!(!PlanPhase::Done.can_advance_to(PlanPhase::Requesting));
    assert!(!PlanPhase::Failed.can_advance_to(PlanPhase::Idle));
  }

  #[test]
  fn test_outcome_messages() {
    assert_eq!(PlanOutcome::Added { written: 3 }.status_message(), "Done! Added 3 events");
    assert_eq!(PlanOutcome::NoViableEvents.status_message(), "No events to add");
    assert_eq!(
      PlanOutcome::Failed { reason: "timeout".to_string() }.status_message(),
      "Error planning day"
    );
    assert_eq!(PlanOutcome::NoViableEvents.phase(), PlanPhase::Done);
  }

  #[test]
  fn test_parse_candidates() {
    let reply = "Here you go:\n```json\n[{\"title\": \"Run\", \"start_time\": \"7:00\", \"end_time\": \"08:00:00\"}, 5]\n```";
    let candidates = parse_candidates(reply).unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].start_time.as_deref(), Some("7:00"));
    assert_eq!(candidates[1], CandidateEvent::default());

    let trailing = "[{\"title\": \"Run\", \"start_time\": \"07:00:00\", \"end_time\": \"08:00:00\"}]\nLet me know if you want changes!";
    let candidates = parse_candidates(trailing).unwrap();
    assert_eq!(candidates, vec![CandidateEvent::new("Run", "07:00:00", "08:00:00")]);

    assert!(matches!(
      parse_candidates("I cannot help with that"),
      Err(PlanError::PlanningRequestFailed { .. })
    ));
    assert!(matches!(
      parse_candidates("[not json]"),
      Err(PlanError::PlanningRequestFailed { .. })
    ));
  }

  #[tokio::test]
  async fn test_apply_rules_writes_only_valid_events() {
    let store = store().await;
    seed_event(&store, USER, "Standup", "09:00:00", "09:30:00", false).await;

    let service = ScriptedPlanner::reply(
      r#"[
        {"title": "Deep Work", "start_time": "09:30:00", "end_time": "11:30:00", "description": "Roadmap"},
        {"title": "Overlaps standup", "start_time": "08:30:00", "end_time": "09:30:00"},
        {"title": "Lunch", "start_time": "12:00", "end_time": "12:30"},
        {"title": "Break", "start_time": "12:15:00", "end_time": "12:45:00"},
        {"title": "Late", "start_time": "21:30:00", "end_time": "22:30:00"}
      ]"#,
    );

    let mut statuses = Vec::new();
    let outcome = planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |s| statuses.push(s.to_string()))
      .await
      .unwrap();

    assert_eq!(outcome, PlanOutcome::Added { written: 2 });
    assert_eq!(
      statuses,
      vec![
        "Analyzing your day...",
        "AI is thinking...",
        "Adding 1/2: Deep Work",
        "Adding 2/2: Lunch",
        "Done! Added 2 events",
      ]
    );

    let stored = events(&store).await;
    assert_eq!(stored.len(), 3);
    let lunch = stored.iter().find(|e| e.title == "Lunch").unwrap();
    assert_eq!(lunch.start_time, "12:00:00");
    assert!(lunch.is_ai_generated);
    assert!(!lunch.completed);
    let deep = stored.iter().find(|e| e.title == "Deep Work").unwrap();
    assert_eq!(deep.description.as_deref(), Some("Roadmap"));
  }

  #[tokio::test]
  async fn test_apply_rules_sends_context_to_service() {
    let store = store().await;
    seed_preferences(&store, USER, "06:00:00", "21:00:00").await;
    repo::create_rule(&store, USER, "Gym at 6pm").await.unwrap();
    repo::save_daily_note(&store, USER, date("2024-03-01"), "Flight at 5pm").await.unwrap();

    let service = ScriptedPlanner::reply("[]");
    planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |_| {})
      .await
      .unwrap();

    let (system, user) = service.last_request().unwrap();
    assert!(system.contains("Only schedule between 06:00 and 21:00"));
    assert!(user.contains("1. Gym at 6pm"));
    assert!(user.contains("Flight at 5pm"));
  }

  #[tokio::test]
  async fn test_apply_rules_with_nothing_viable() {
    let store = store().await;
    let service = ScriptedPlanner::reply(r#"[{"title": "Midnight", "start_time": "23:00", "end_time": "23:30"}]"#);

    let mut statuses = Vec::new();
    let outcome = planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |s| statuses.push(s.to_string()))
      .await
      .unwrap();

    assert_eq!(outcome, PlanOutcome::NoViableEvents);
    assert_eq!(statuses.last().map(String::as_str), Some("No events to add"));
    assert!(events(&store).await.is_empty());
  }

  #[tokio::test]
  async fn test_service_failure_writes_nothing() {
    let store = store().await;
    let service = ScriptedPlanner::failing("Overloaded");

    let mut statuses = Vec::new();
    let outcome = planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |s| statuses.push(s.to_string()))
      .await
      .unwrap();

    match outcome {
      PlanOutcome::Failed { reason } => assert!(reason.contains("Overloaded")),
      other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(statuses.last().map(String::as_str), Some("Error planning day"));
    assert!(events(&store).await.is_empty());
  }

  #[tokio::test]
  async fn test_unparseable_reply_is_a_request_failure() {
    let store = store().await;
    let service = ScriptedPlanner::reply("Sorry, I can't plan today.");

    let outcome = planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |_| {})
      .await
      .unwrap();
    assert_eq!(outcome.phase(), PlanPhase::Failed);
  }

  #[tokio::test]
  async fn test_request_times_out() {
    let store = store().await;
    let service = ScriptedPlanner::reply("[]").delayed(Duration::from_millis(500));
    let planner = DayPlanner::new(&store, &service, Duration::from_millis(20));

    let context = build_planning_context(&DaySnapshot::default());
    match planner.request_plan(&context).await {
      Err(PlanError::PlanningRequestFailed { reason }) => assert_eq!(reason, "timeout"),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_partial_persist_keeps_earlier_writes() {
    let store = FailingStore::new(store().await, 1);
    let service = ScriptedPlanner::reply("[]");
    let accepted = vec![
      ProposedEvent {
        title: "One".to_string(),
        description: None,
        start_time: "09:00:00".to_string(),
        end_time: "10:00:00".to_string(),
      },
      ProposedEvent {
        title: "Two".to_string(),
        description: None,
        start_time: "10:00:00".to_string(),
        end_time: "11:00:00".to_string(),
      },
      ProposedEvent {
        title: "Three".to_string(),
        description: None,
        start_time: "11:00:00".to_string(),
        end_time: "12:00:00".to_string(),
      },
    ];

    let result = planner(&store, &service)
      .persist_accepted_events(&accepted, USER, date("2024-03-01"))
      .await;

    match result {
      Err(PlanError::PartialPersistFailure {
        written_count,
        attempted_count,
        ..
      }) => {
        assert_eq!(written_count, 1);
        assert_eq!(attempted_count, 3);
      }
      other => panic!("unexpected result: {:?}", other),
    }

    let stored = events(store.inner()).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "One");
  }

  #[tokio::test]
  async fn test_apply_rules_reports_partial_write() {
    let store = FailingStore::new(store().await, 0);
    let service = ScriptedPlanner::reply(
      r#"[{"title": "A", "start_time": "09:00", "end_time": "10:00"},
          {"title": "B", "start_time": "10:00", "end_time": "11:00"}]"#,
    );

    let mut statuses = Vec::new();
    let result = planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |s| statuses.push(s.to_string()))
      .await;

    assert!(matches!(result, Err(PlanError::PartialPersistFailure { written_count: 0, .. })));
    assert_eq!(statuses.last().map(String::as_str), Some("Added 0/2 events"));
  }

  #[tokio::test]
  async fn test_storage_errors_propagate() {
    let store = FailingStore::new(store().await, usize::MAX).failing_reads();
    let service = ScriptedPlanner::reply("[]");

    let mut statuses = Vec::new();
    let result = planner(&store, &service)
      .apply_rules(USER, date("2024-03-01"), |s| statuses.push(s.to_string()))
      .await;

    assert!(matches!(result, Err(PlanError::Storage(StoreError::Api { status: 503, .. }))));
    // the service is never asked when the day cannot be read
    assert!(service.last_request().is_none());
    assert_eq!(statuses, vec!["Analyzing your day..."]);

    let store = FailingStore::new(store.into_inner(), usize::MAX).failing_deletes();
    let result = planner(&store, &service)
      .clear_ai_generated_events(USER, date("2024-03-01"))
      .await;
    assert!(matches!(result, Err(PlanError::Storage(_))));
  }

  #[tokio::test]
  async fn test_clear_then_replan() {
    let store = store().await;
    seed_event(&store, USER, "Dentist", "15:00:00", "16:00:00", false).await;

    let service = ScriptedPlanner::reply(r#"[{"title": "Write", "start_time": "09:00", "end_time": "11:00"}]"#);
    let planner = planner(&store, &service);

    planner.apply_rules(USER, date("2024-03-01"), |_| {}).await.unwrap();
    assert_eq!(events(&store).await.len(), 2);

    let deleted = planner.clear_ai_generated_events(USER, date("2024-03-01")).await.unwrap();
    assert_eq!(deleted, 1);
    let remaining = events(&store).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Dentist");

    assert_eq!(planner.clear_ai_generated_events(USER, date("2024-03-01")).await.unwrap(), 0);

    planner.apply_rules(USER, date("2024-03-01"), |_| {}).await.unwrap();
    assert_eq!(events(&store).await.len(), 2);
  }

  #[tokio::test]
  async fn test_snapshot_skips_deactivated_habits() {
    let store = store().await;
    let habit = repo::create_habit(&store, USER, "Journal", None, 1).await.unwrap();
    repo::create_habit(&store, USER, "Stretch", None, 1).await.unwrap();
    repo::deactivate_habit(&store, &habit.id, date("2000-01-01")).await.unwrap();

    let service = ScriptedPlanner::reply("[]");
    let snapshot = planner(&store, &service)
      .load_snapshot(USER, chrono::Utc::now().date_naive())
      .await
      .unwrap();

    assert_eq!(snapshot.habits.len(), 1);
    assert_eq!(snapshot.habits[0].name, "Stretch");
  }
}
