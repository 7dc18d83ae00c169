//! Storage-zone classification.
//!
//! Every day and session carries the zone of the plan it lives under so
//! zone-scoped listings never have to walk back up the hierarchy.

use crate::{PlanType, SessionStatus, StorageZone};

/// Zone tag for a plan type
pub fn zone_for(plan_type: PlanType) -> StorageZone {
    match plan_type {
        PlanType::TemplateWeeks => StorageZone::A,
        PlanType::YearlyPlan => StorageZone::B,
        PlanType::WorkoutsDone => StorageZone::C,
        PlanType::Archive => StorageZone::D,
    }
}

/// Whether entities in this zone follow real calendar semantics
///
/// Template weeks are reusable blueprints; their dates only anchor ordering.
pub fn is_calendar_bound(zone: StorageZone) -> bool {
    zone != StorageZone::A
}

/// Status given to a new session when the caller does not supply one
pub fn default_session_status(zone: StorageZone) -> SessionStatus {
    if is_calendar_bound(zone) {
        SessionStatus::PlannedFuture
    } else {
        SessionStatus::NotPlanned
    }
}
