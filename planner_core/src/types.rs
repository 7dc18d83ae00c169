//! Core domain types for the workout planner.
//!
//! This module defines the plan hierarchy and the inputs used to build it:
//! - Plans, weeks, days, sessions, moveframes, movelaps
//! - Status, role, and zone enums
//! - Creation/patch payloads and read-side trees

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::{Error, Result};

/// Generate a fresh opaque entity id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a label such as `main` or `PLANNED_FUTURE` into one of the
/// SCREAMING_SNAKE_CASE enums below.
pub fn parse_label<T: DeserializeOwned>(label: &str) -> Result<T> {
    let normalized = label.trim().replace(['-', ' '], "_").to_uppercase();
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| Error::ValidationFailed(format!("Unknown value: {}", label)))
}

// ============================================================================
// Enumerations
// ============================================================================

/// Purpose of a plan
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    TemplateWeeks,
    YearlyPlan,
    WorkoutsDone,
    Archive,
}

/// Filtering tag derived from the plan type
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageZone {
    A,
    B,
    C,
    D,
}

/// Planning / completion state of a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    NotPlanned,
    PlannedFuture,
    PlannedNextWeek,
    PlannedCurrentWeek,
    #[serde(rename = "DONE_OVER_75")]
    DoneOver75,
    #[serde(rename = "DONE_UNDER_75")]
    DoneUnder75,
    DoneDifferently,
}

impl SessionStatus {
    pub fn is_done(self) -> bool {
        matches!(
            self,
            SessionStatus::DoneOver75 | SessionStatus::DoneUnder75 | SessionStatus::DoneDifferently
        )
    }

    pub fn is_planned(self) -> bool {
        matches!(
            self,
            SessionStatus::PlannedFuture
                | SessionStatus::PlannedNextWeek
                | SessionStatus::PlannedCurrentWeek
        )
    }
}

/// Sport of a moveframe
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sport {
    Swim,
    Bike,
    Run,
    BodyBuilding,
    Rowing,
    Skate,
    Ski,
    Snowboard,
    Hiking,
    Walking,
    Stretching,
    Other,
}

/// Whether a moveframe is real work or a note placed between work units
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveframeType {
    #[default]
    Work,
    Annotation,
}

/// Role of a moveframe among same-sport moveframes of its day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkType {
    #[default]
    None,
    Main,
    Secondary,
}

/// Execution state of a single repetition
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovelapStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
    Disabled,
}

/// How the rest after a repetition is counted
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestType {
    SetTime,
    Restart,
    Pause,
}

// ============================================================================
// Entities
// ============================================================================

/// Top-level container of weeks
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub plan_type: PlanType,
    /// Users granted write access by the owner
    #[serde(default)]
    pub coaches: BTreeSet<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Week {
    pub id: String,
    pub plan_id: String,
    pub week_number: u32,
    pub period_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Day {
    pub id: String,
    pub week_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    /// 1 = Monday .. 7 = Sunday
    pub day_of_week: u8,
    pub storage_zone: StorageZone,
    pub period_id: Option<String>,
    pub weather: Option<String>,
    pub feeling: Option<u8>,
    pub notes: Option<String>,
    /// Bumped by every mutation of the day's subtree
    #[serde(default)]
    pub version: u64,
}

impl Day {
    pub fn weekday_number(date: NaiveDate) -> u8 {
        date.weekday().number_from_monday() as u8
    }
}

/// A training session ("workout") of a day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub day_id: String,
    pub session_number: u8,
    pub storage_zone: StorageZone,
    pub name: Option<String>,
    pub code: Option<String>,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub heart_rate_max: Option<u16>,
    pub heart_rate_avg: Option<u16>,
    pub calories: Option<u32>,
    pub feeling: Option<u8>,
    pub status: SessionStatus,
}

/// A lettered group of prescribed repetitions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Moveframe {
    pub id: String,
    pub session_id: String,
    pub letter: char,
    pub sport: Sport,
    #[serde(rename = "type", default)]
    pub kind: MoveframeType,
    #[serde(default)]
    pub work_type: WorkType,
    pub section_id: Option<String>,
    pub description: Option<String>,
}

/// One numbered repetition row
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Movelap {
    pub id: String,
    pub moveframe_id: String,
    pub repetition_number: u32,
    pub distance_m: Option<u32>,
    pub speed: Option<String>,
    pub time_seconds: Option<u32>,
    pub pause_seconds: Option<u32>,
    pub rest_type: Option<RestType>,
    pub alarm_seconds: Option<u32>,
    pub sound: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub status: MovelapStatus,
    #[serde(default)]
    pub is_skipped: bool,
    #[serde(default)]
    pub is_disabled: bool,
}

impl Movelap {
    /// Drop execution state on a cloned row
    pub fn reset_execution(&mut self) {
        self.status = MovelapStatus::Pending;
        self.is_skipped = false;
    }
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewWeek {
    pub period_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDay {
    pub date: NaiveDate,
    pub period_id: Option<String>,
    pub weather: Option<String>,
    pub feeling: Option<u8>,
    pub notes: Option<String>,
}

impl NewDay {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            period_id: None,
            weather: None,
            feeling: None,
            notes: None,
        }
    }
}

/// Day edits; `None` keeps the stored value
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DayPatch {
    pub period_id: Option<String>,
    pub weather: Option<String>,
    pub feeling: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewSession {
    pub name: Option<String>,
    pub code: Option<String>,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: Option<SessionStatus>,
}

/// Session edits; `None` keeps the stored value
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: Option<SessionStatus>,
}

/// User-reported outcome of a session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompletionReport {
    pub percentage: i32,
    #[serde(default)]
    pub as_different: bool,
    pub heart_rate_max: Option<u16>,
    pub heart_rate_avg: Option<u16>,
    pub calories: Option<u32>,
    pub feeling: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewMoveframe {
    pub sport: Sport,
    #[serde(default)]
    pub kind: MoveframeType,
    #[serde(default)]
    pub work_type: WorkType,
    pub section_id: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub movelaps: Vec<NewMovelap>,
}

impl NewMoveframe {
    pub fn of(sport: Sport) -> Self {
        Self {
            sport,
            kind: MoveframeType::Work,
            work_type: WorkType::None,
            section_id: None,
            description: None,
            movelaps: Vec::new(),
        }
    }
}

/// Moveframe edits; `movelaps`, when present, rewrites the rows wholesale
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MoveframePatch {
    pub sport: Option<Sport>,
    pub kind: Option<MoveframeType>,
    pub section_id: Option<String>,
    pub description: Option<String>,
    pub movelaps: Option<Vec<NewMovelap>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewMovelap {
    pub distance_m: Option<u32>,
    pub speed: Option<String>,
    pub time_seconds: Option<u32>,
    pub pause_seconds: Option<u32>,
    pub rest_type: Option<RestType>,
    pub alarm_seconds: Option<u32>,
    pub sound: Option<String>,
    pub notes: Option<String>,
}

impl NewMovelap {
    pub fn distance(distance_m: u32) -> Self {
        Self {
            distance_m: Some(distance_m),
            ..Self::default()
        }
    }

    pub(crate) fn into_movelap(self, moveframe_id: &str, repetition_number: u32) -> Movelap {
        Movelap {
            id: new_id(),
            moveframe_id: moveframe_id.to_string(),
            repetition_number,
            distance_m: self.distance_m,
            speed: self.speed,
            time_seconds: self.time_seconds,
            pause_seconds: self.pause_seconds,
            rest_type: self.rest_type,
            alarm_seconds: self.alarm_seconds,
            sound: self.sound,
            notes: self.notes,
            status: MovelapStatus::Pending,
            is_skipped: false,
            is_disabled: false,
        }
    }
}

/// Where a relocated moveframe lands relative to the destination's rows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "target", rename_all = "snake_case")]
pub enum Placement {
    Before(String),
    After(String),
    Replace(String),
    Append,
}

// ============================================================================
// Read-side trees
// ============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct MoveframeTree {
    #[serde(flatten)]
    pub moveframe: Moveframe,
    pub movelaps: Vec<Movelap>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionTree {
    #[serde(flatten)]
    pub session: Session,
    pub moveframes: Vec<MoveframeTree>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DayTree {
    #[serde(flatten)]
    pub day: Day,
    pub sessions: Vec<SessionTree>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WeekTree {
    #[serde(flatten)]
    pub week: Week,
    pub days: Vec<DayTree>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlanTree {
    #[serde(flatten)]
    pub plan: Plan,
    pub weeks: Vec<WeekTree>,
}
