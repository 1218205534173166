//! Candidate event validation
//!
//! The planning service's output is untrusted. Every candidate passes through
//! here, in the order it was returned, before anything is written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::models::{ScheduleEvent, UserPreferences, DEFAULT_BED_TIME, DEFAULT_WAKE_TIME};

const SLOT_SECONDS: u32 = 30 * 60;

/// ---------------------------------------------------------------------------
/// Clock Times
/// ---------------------------------------------------------------------------

/// Time of day with second resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime(u32);

impl ClockTime {
  /// Accepts "H:MM", "HH:MM" and "HH:MM:SS"
  pub fn parse(value: &str) -> Option<Self> {
    let parts: Vec<&str> = value.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
      return None;
    }

    let field = |s: &str, max: u32| -> Option<u32> {
      if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
      }
      s.parse().ok().filter(|n| *n <= max)
    };

    let hours = field(parts[0], 23)?;
    if parts[1].len() != 2 {
      return None;
    }
    let minutes = field(parts[1], 59)?;
    let seconds = match parts.get(2) {
      Some(s) if s.len() == 2 => field(s, 59)?,
      Some(_) => return None,
      None => 0,
    };

    Some(ClockTime(hours * 3600 + minutes * 60 + seconds))
  }

  pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
    ClockTime(hours * 3600 + minutes * 60 + seconds)
  }

  /// On a :00 or :30 boundary with zero seconds
  pub fn is_slot_aligned(&self) -> bool {
    self.0 % SLOT_SECONDS == 0
  }

  /// Stored form, "HH:MM:SS"
  pub fn to_db_string(&self) -> String {
    format!("{:02}:{:02}:{:02}", self.0 / 3600, (self.0 % 3600) / 60, self.0 % 60)
  }
}

/// ---------------------------------------------------------------------------
/// Candidates
/// ---------------------------------------------------------------------------

/// One element of the planning service's reply, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
  pub title: Option<String>,
  pub start_time: Option<String>,
  pub end_time: Option<String>,
  pub description: Option<String>,
}

impl CandidateEvent {
  pub fn new(title: &str, start_time: &str, end_time: &str) -> Self {
    Self {
      title: Some(title.to_string()),
      start_time: Some(start_time.to_string()),
      end_time: Some(end_time.to_string()),
      description: None,
    }
  }

  /// Lenient read of a reply element. Fields of the wrong type count as missing
  /// so one bad element never sinks the rest of the reply.
  pub fn from_value(value: &Value) -> Self {
    let text = |key: &str| {
      value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
    };

    Self {
      title: text("title"),
      start_time: text("start_time"),
      end_time: text("end_time"),
      description: text("description"),
    }
  }
}

/// A candidate that passed every check, with times in stored form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedEvent {
  pub title: String,
  pub description: Option<String>,
  pub start_time: String,
  pub end_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  MissingField,
  MalformedTime,
  OutsideWakingHours,
  Misaligned,
  EndNotAfterStart,
  OverlapsExisting,
  OverlapsAccepted,
}

/// ---------------------------------------------------------------------------
/// Validation
/// ---------------------------------------------------------------------------

type Interval = (ClockTime, ClockTime);

fn overlaps(a: Interval, b: Interval) -> bool {
  a.0 < b.1 && a.1 > b.0
}

fn bound(value: &str, fallback: &str) -> ClockTime {
  ClockTime::parse(value).unwrap_or_else(|| {
    debug!("Unparseable preference time {:?}, using {}", value, fallback);
    ClockTime::parse(fallback).unwrap_or(ClockTime(0))
  })
}

fn check_candidate(
  candidate: &CandidateEvent,
  wake: ClockTime,
  bed: ClockTime,
  existing: &[Interval],
  accepted: &[Interval],
) -> Result<(ProposedEvent, Interval), Rejection> {
  let (title, start, end) = match (&candidate.title, &candidate.start_time, &candidate.end_time) {
    (Some(title), Some(start), Some(end)) => (title, start, end),
    _ => return Err(Rejection::MissingField),
  };

  let start = ClockTime::parse(start).ok_or(Rejection::MalformedTime)?;
  let end = ClockTime::parse(end).ok_or(Rejection::MalformedTime)?;

  if start < wake || end > bed {
    return Err(Rejection::OutsideWakingHours);
  }
  if !start.is_slot_aligned() || !end.is_slot_aligned() {
    return Err(Rejection::Misaligned);
  }
  if end <= start {
    return Err(Rejection::EndNotAfterStart);
  }

  let interval = (start, end);
  if existing.iter().any(|e| overlaps(interval, *e)) {
    return Err(Rejection::OverlapsExisting);
  }
  if accepted.iter().any(|a| overlaps(interval, *a)) {
    return Err(Rejection::OverlapsAccepted);
  }

  Ok((
    ProposedEvent {
      title: title.clone(),
      description: candidate.description.clone(),
      start_time: start.to_db_string(),
      end_time: end.to_db_string(),
    },
    interval,
  ))
}

/// Filter candidates down to the ones that are safe to write.
///
/// Candidates are taken in the order given; a later candidate that overlaps an
/// earlier accepted one is dropped. Wake and bed times are inclusive bounds.
pub fn validate_and_filter_plan(
  candidates: &[CandidateEvent],
  existing_events: &[ScheduleEvent],
  preferences: &UserPreferences,
) -> Vec<ProposedEvent> {
  let wake = bound(&preferences.wake_time, DEFAULT_WAKE_TIME);
  let bed = bound(&preferences.bed_time, DEFAULT_BED_TIME);

  let existing: Vec<Interval> = existing_events
    .iter()
    .filter_map(|e| {
      match (ClockTime::parse(&e.start_time), ClockTime::parse(&e.end_time)) {
        (Some(start), Some(end)) => Some((start, end)),
        _ => {
          debug!("Ignoring event {} with unparseable times", e.id);
          None
        }
      }
    })
    .collect();

  let mut accepted: Vec<ProposedEvent> = Vec::new();
  let mut accepted_intervals: Vec<Interval> = Vec::new();

  for candidate in candidates {
    match check_candidate(candidate, wake, bed, &existing, &accepted_intervals) {
      Ok((event, interval)) => {
        accepted.push(event);
        accepted_intervals.push(interval);
      }
      Err(reason) => {
        debug!(?reason, title = ?candidate.title, "Rejected planned event");
      }
    }
  }

  debug!("Accepted {}/{} planned events", accepted.len(), candidates.len());
  accepted
}
