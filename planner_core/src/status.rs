//! Session status derivation.
//!
//! Planned statuses depend on where the day's date falls relative to
//! "today" by ISO week; done statuses depend on the reported completion.

use crate::repository::Repository;
use crate::{zone, CompletionReport, Error, Result, Session, SessionStatus};
use chrono::{Datelike, Duration, NaiveDate};

/// Completion percentage at or above which a session counts as done over 75%
pub const DONE_THRESHOLD: i32 = 75;

fn iso_week_key(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

/// Planned status for a session on `date`, seen from `today`
///
/// Dates on or before today, and dates in today's ISO week, are current
/// week; dates in the following ISO week are next week; later dates are
/// future.
pub fn planned_status(date: NaiveDate, today: NaiveDate) -> SessionStatus {
    if date <= today || iso_week_key(date) == iso_week_key(today) {
        return SessionStatus::PlannedCurrentWeek;
    }
    if iso_week_key(date) == iso_week_key(today + Duration::days(7)) {
        return SessionStatus::PlannedNextWeek;
    }
    SessionStatus::PlannedFuture
}

/// Done status for a completion report
pub fn completion_status(percentage: i32, as_different: bool) -> Result<SessionStatus> {
    if !(0..=100).contains(&percentage) {
        return Err(Error::ValidationFailed(format!(
            "Completion percentage must be within 0..=100, got {}",
            percentage
        )));
    }
    Ok(if as_different {
        SessionStatus::DoneDifferently
    } else if percentage < DONE_THRESHOLD {
        SessionStatus::DoneUnder75
    } else {
        SessionStatus::DoneOver75
    })
}

/// Apply a completion report to a session in place
///
/// Physiological fields not present in the report keep their prior values.
pub fn apply_completion(session: &mut Session, report: &CompletionReport) -> Result<()> {
    if let Some(feeling) = report.feeling {
        if feeling > 10 {
            return Err(Error::ValidationFailed(format!(
                "Feeling must be within 0..=10, got {}",
                feeling
            )));
        }
    }
    session.status = completion_status(report.percentage, report.as_different)?;
    session.heart_rate_max = report.heart_rate_max.or(session.heart_rate_max);
    session.heart_rate_avg = report.heart_rate_avg.or(session.heart_rate_avg);
    session.calories = report.calories.or(session.calories);
    session.feeling = report.feeling.or(session.feeling);
    if report.notes.is_some() {
        session.notes = report.notes.clone();
    }
    Ok(())
}

/// Re-derive planned statuses across a plan as "today" advances
///
/// Done and not-planned sessions are left alone, as is everything in the
/// template zone. Returns how many sessions changed.
pub fn refresh_plan<R: Repository>(repo: &mut R, plan_id: &str, today: NaiveDate) -> Result<usize> {
    let plan = repo.plan(plan_id)?;
    if !zone::is_calendar_bound(zone::zone_for(plan.plan_type)) {
        return Ok(0);
    }

    let mut changed = 0;
    for week in repo.weeks_of_plan(plan_id) {
        for day in repo.days_of_week(&week.id) {
            let mut touched = false;
            for mut session in repo.sessions_of_day(&day.id) {
                if !session.status.is_planned() {
                    continue;
                }
                let derived = planned_status(day.date, today);
                if derived != session.status {
                    session.status = derived;
                    repo.update_session(session)?;
                    touched = true;
                    changed += 1;
                }
            }
            if touched {
                repo.touch_day(&day.id)?;
            }
        }
    }
    tracing::debug!("Refreshed {} session statuses in plan {}", changed, plan_id);
    Ok(changed)
}
