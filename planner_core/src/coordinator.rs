//! Multi-entity reorganization: copy, move, duplicate, switch, and
//! cross-container reorder for days, sessions, moveframes, and weeks.
//!
//! Every function here is meant to run inside one store transaction. They
//! validate capacity and conflicts before writing, then leave letters,
//! numbers, and roles consistent in every container they touched.

use crate::hierarchy::{day_tree, moveframe_tree, session_tree, week_tree};
use crate::repository::Repository;
use crate::{
    new_id, ordering, status, work_role, zone, Day, DayTree, Error, Moveframe, MoveframeTree,
    Placement, Result, Session, SessionStatus, SessionTree, Week, WeekTree,
};
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;

// ============================================================================
// Cloning helpers
// ============================================================================

/// Clone a moveframe and its movelaps into `session_id`, dropping
/// execution state from the rows
fn clone_moveframe<R: Repository>(
    repo: &mut R,
    source: &Moveframe,
    session_id: &str,
    letter: char,
) -> Result<Moveframe> {
    let mut copy = source.clone();
    copy.id = new_id();
    copy.session_id = session_id.to_string();
    copy.letter = letter;
    repo.insert_moveframe(copy.clone())?;

    for lap in repo.movelaps_of_moveframe(&source.id) {
        let mut lap_copy = lap.clone();
        lap_copy.id = new_id();
        lap_copy.moveframe_id = copy.id.clone();
        lap_copy.reset_execution();
        repo.insert_movelap(lap_copy)?;
    }
    Ok(copy)
}

/// Clone a session subtree into `day`; returns the new session and the ids
/// of its moveframes
fn clone_session<R: Repository>(
    repo: &mut R,
    source: &Session,
    day: &Day,
    session_number: u8,
    status: SessionStatus,
) -> Result<(Session, HashSet<String>)> {
    let mut copy = source.clone();
    copy.id = new_id();
    copy.day_id = day.id.clone();
    copy.session_number = session_number;
    copy.storage_zone = day.storage_zone;
    copy.status = status;
    copy.heart_rate_max = None;
    copy.heart_rate_avg = None;
    copy.calories = None;
    copy.feeling = None;
    repo.insert_session(copy.clone())?;

    let mut cloned = HashSet::new();
    for moveframe in repo.moveframes_of_session(&source.id) {
        let letter = moveframe.letter;
        let mf_copy = clone_moveframe(repo, &moveframe, &copy.id, letter)?;
        cloned.insert(mf_copy.id);
    }
    ordering::compact_letters(repo, &copy.id)?;
    Ok((copy, cloned))
}

fn ensure_date_free<R: Repository>(
    repo: &R,
    user_id: &str,
    date: NaiveDate,
    moving: Option<&str>,
) -> Result<()> {
    if let Some(existing) = repo.day_on_date(user_id, date) {
        if Some(existing.id.as_str()) != moving {
            return Err(Error::Conflict(format!(
                "User {} already has day {} on {}",
                user_id, existing.id, date
            )));
        }
    }
    Ok(())
}

fn ensure_session_room<R: Repository>(repo: &R, day_id: &str) -> Result<u8> {
    let sessions = repo.sessions_of_day(day_id);
    if sessions.len() >= ordering::MAX_SESSIONS_PER_DAY {
        return Err(Error::CapacityExceeded(format!(
            "Day {} already holds {} sessions",
            day_id,
            ordering::MAX_SESSIONS_PER_DAY
        )));
    }
    let max = sessions.iter().map(|s| s.session_number).max().unwrap_or(0);
    Ok(max + 1)
}

fn moveframe_ids_of_session<R: Repository>(repo: &R, session_id: &str) -> HashSet<String> {
    repo.moveframes_of_session(session_id)
        .into_iter()
        .map(|m| m.id)
        .collect()
}

// ============================================================================
// Days
// ============================================================================

/// Deep-copy a day into `target_week_id` on `date`
///
/// Sessions come back NOT_PLANNED and movelaps PENDING. The copy takes the
/// zone and owner of the destination plan.
pub fn copy_day<R: Repository>(
    repo: &mut R,
    day_id: &str,
    target_week_id: &str,
    date: NaiveDate,
) -> Result<DayTree> {
    copy_day_with_status(repo, day_id, target_week_id, date, |_| {
        SessionStatus::NotPlanned
    })
}

fn copy_day_with_status<R: Repository, F>(
    repo: &mut R,
    day_id: &str,
    target_week_id: &str,
    date: NaiveDate,
    status_for: F,
) -> Result<DayTree>
where
    F: Fn(&Day) -> SessionStatus,
{
    let source = repo.day(day_id)?;
    let week = repo.week(target_week_id)?;
    let plan = repo.plan(&week.plan_id)?;
    ensure_date_free(repo, &plan.user_id, date, None)?;

    let copy = Day {
        id: new_id(),
        week_id: week.id.clone(),
        user_id: plan.user_id.clone(),
        date,
        day_of_week: Day::weekday_number(date),
        storage_zone: zone::zone_for(plan.plan_type),
        period_id: source.period_id.clone(),
        weather: None,
        feeling: None,
        notes: source.notes.clone(),
        version: 0,
    };
    repo.insert_day(copy.clone())?;

    let status = status_for(&copy);
    for session in repo.sessions_of_day(&source.id) {
        clone_session(repo, &session, &copy, session.session_number, status)?;
    }
    ordering::compact_sessions(repo, &copy.id)?;

    tracing::info!(
        "Copied day {} to {} ({}) in week {}",
        day_id,
        copy.id,
        date,
        target_week_id
    );
    day_tree(repo, &copy.id)
}

/// Relocate a day to another week and/or date, keeping execution state
pub fn move_day<R: Repository>(
    repo: &mut R,
    day_id: &str,
    target_week_id: &str,
    date: NaiveDate,
) -> Result<DayTree> {
    let mut day = repo.day(day_id)?;
    let week = repo.week(target_week_id)?;
    let plan = repo.plan(&week.plan_id)?;
    ensure_date_free(repo, &plan.user_id, date, Some(day_id))?;

    let zone = zone::zone_for(plan.plan_type);
    day.week_id = week.id.clone();
    day.user_id = plan.user_id.clone();
    day.date = date;
    day.day_of_week = Day::weekday_number(date);
    day.storage_zone = zone;
    day.version += 1;
    repo.update_day(day)?;

    for mut session in repo.sessions_of_day(day_id) {
        if session.storage_zone != zone {
            session.storage_zone = zone;
            repo.update_session(session)?;
        }
    }

    tracing::info!("Moved day {} to {} in week {}", day_id, date, target_week_id);
    day_tree(repo, day_id)
}

/// Coach-to-athlete assignment: copy a day and derive planned statuses
/// from the destination date
pub fn assign_day<R: Repository>(
    repo: &mut R,
    day_id: &str,
    target_week_id: &str,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<DayTree> {
    copy_day_with_status(repo, day_id, target_week_id, date, |day| {
        if zone::is_calendar_bound(day.storage_zone) {
            status::planned_status(day.date, today)
        } else {
            SessionStatus::NotPlanned
        }
    })
}

// ============================================================================
// Sessions
// ============================================================================

/// Copy a session into another day with execution state reset
pub fn copy_session<R: Repository>(
    repo: &mut R,
    session_id: &str,
    target_day_id: &str,
) -> Result<SessionTree> {
    let source = repo.session(session_id)?;
    let target_day = repo.day(target_day_id)?;
    let number = ensure_session_room(repo, target_day_id)?;

    let (copy, incoming) =
        clone_session(repo, &source, &target_day, number, SessionStatus::NotPlanned)?;
    ordering::compact_sessions(repo, target_day_id)?;
    work_role::reconcile_incoming(repo, target_day_id, &incoming)?;
    repo.touch_day(target_day_id)?;

    tracing::info!(
        "Copied session {} to {} in day {}",
        session_id,
        copy.id,
        target_day_id
    );
    session_tree(repo, &copy.id)
}

/// Relocate a live session to another day
pub fn move_session<R: Repository>(
    repo: &mut R,
    session_id: &str,
    target_day_id: &str,
) -> Result<SessionTree> {
    let mut session = repo.session(session_id)?;
    let source_day_id = session.day_id.clone();
    if source_day_id == target_day_id {
        return session_tree(repo, session_id);
    }
    let target_day = repo.day(target_day_id)?;
    let number = ensure_session_room(repo, target_day_id)?;

    session.day_id = target_day.id.clone();
    session.session_number = number;
    session.storage_zone = target_day.storage_zone;
    repo.update_session(session)?;

    ordering::compact_sessions(repo, &source_day_id)?;
    ordering::compact_sessions(repo, target_day_id)?;
    let incoming = moveframe_ids_of_session(repo, session_id);
    work_role::reconcile_incoming(repo, target_day_id, &incoming)?;
    repo.touch_day(&source_day_id)?;
    repo.touch_day(target_day_id)?;

    tracing::info!(
        "Moved session {} from day {} to day {}",
        session_id,
        source_day_id,
        target_day_id
    );
    session_tree(repo, session_id)
}

/// Exchange the parent days (and numbers) of two sessions
pub fn switch_sessions<R: Repository>(
    repo: &mut R,
    first_id: &str,
    second_id: &str,
) -> Result<(SessionTree, SessionTree)> {
    if first_id == second_id {
        return Err(Error::ValidationFailed(
            "Cannot switch a session with itself".into(),
        ));
    }
    let mut first = repo.session(first_id)?;
    let mut second = repo.session(second_id)?;
    let first_day = repo.day(&first.day_id)?;
    let second_day = repo.day(&second.day_id)?;

    std::mem::swap(&mut first.session_number, &mut second.session_number);
    if first_day.id != second_day.id {
        first.day_id = second_day.id.clone();
        first.storage_zone = second_day.storage_zone;
        second.day_id = first_day.id.clone();
        second.storage_zone = first_day.storage_zone;
    }
    repo.update_session(first)?;
    repo.update_session(second)?;

    if first_day.id != second_day.id {
        let into_second = moveframe_ids_of_session(repo, first_id);
        let into_first = moveframe_ids_of_session(repo, second_id);
        work_role::reconcile_incoming(repo, &second_day.id, &into_second)?;
        work_role::reconcile_incoming(repo, &first_day.id, &into_first)?;
        repo.touch_day(&second_day.id)?;
    }
    repo.touch_day(&first_day.id)?;

    tracing::info!("Switched sessions {} and {}", first_id, second_id);
    Ok((session_tree(repo, first_id)?, session_tree(repo, second_id)?))
}

/// Drag a session to a zero-based slot of a (possibly different) day
pub fn move_session_to_index<R: Repository>(
    repo: &mut R,
    session_id: &str,
    target_day_id: &str,
    index: usize,
) -> Result<Vec<Session>> {
    move_session(repo, session_id, target_day_id)?;
    let order: Vec<String> = repo
        .sessions_of_day(target_day_id)
        .into_iter()
        .map(|s| s.id)
        .collect();
    let order = ordering::splice(order, session_id, index);
    ordering::renumber_sessions(repo, target_day_id, &order)?;
    repo.touch_day(target_day_id)?;
    Ok(repo.sessions_of_day(target_day_id))
}

// ============================================================================
// Moveframes
// ============================================================================

/// Resolve a placement against the destination's current order
///
/// Returns the order without any replaced target and the insertion index.
fn resolve_placement<R: Repository>(
    repo: &mut R,
    session_id: &str,
    placement: &Placement,
    moving: Option<&str>,
) -> Result<(Vec<String>, usize)> {
    let mut order: Vec<String> = repo
        .moveframes_of_session(session_id)
        .into_iter()
        .map(|m| m.id)
        .filter(|id| Some(id.as_str()) != moving)
        .collect();

    let target = match placement {
        Placement::Append => return Ok((order.clone(), order.len())),
        Placement::Before(t) | Placement::After(t) | Placement::Replace(t) => t,
    };
    if Some(target.as_str()) == moving {
        return Err(Error::ValidationFailed(
            "A moveframe cannot be placed relative to itself".into(),
        ));
    }
    repo.moveframe(target)?;
    let position = order.iter().position(|id| id == target).ok_or_else(|| {
        Error::ValidationFailed(format!(
            "Moveframe {} is not in session {}",
            target, session_id
        ))
    })?;

    let index = match placement {
        Placement::Before(_) => position,
        Placement::After(_) => position + 1,
        Placement::Replace(_) => {
            repo.delete_moveframe(target)?;
            order.remove(position);
            position
        }
        Placement::Append => unreachable!("handled above"),
    };
    Ok((order, index))
}

fn ensure_moveframe_room(current: usize) -> Result<()> {
    if current >= ordering::MAX_MOVEFRAMES_PER_SESSION {
        return Err(Error::CapacityExceeded(format!(
            "A session holds at most {} moveframes",
            ordering::MAX_MOVEFRAMES_PER_SESSION
        )));
    }
    Ok(())
}

/// Copy a moveframe into a session before, after, or in place of a target
pub fn copy_moveframe<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    target_session_id: &str,
    placement: Placement,
) -> Result<MoveframeTree> {
    let source = repo.moveframe(moveframe_id)?;
    let target_session = repo.session(target_session_id)?;
    if matches!(&placement, Placement::Replace(t) if t == moveframe_id) {
        return Err(Error::ValidationFailed(
            "A moveframe cannot replace itself".into(),
        ));
    }
    let (order, index) = resolve_placement(repo, target_session_id, &placement, None)?;
    ensure_moveframe_room(order.len())?;

    // Temporary letter past the current run; reletter fixes it below
    let temporary = ordering::letter_at(order.len())?;
    let copy = clone_moveframe(repo, &source, target_session_id, temporary)?;

    let mut order = order;
    order.insert(index.min(order.len()), copy.id.clone());
    ordering::reletter(repo, target_session_id, &order)?;

    let incoming: HashSet<String> = [copy.id.clone()].into();
    work_role::reconcile_incoming(repo, &target_session.day_id, &incoming)?;
    repo.touch_day(&target_session.day_id)?;

    tracing::info!(
        "Copied moveframe {} to {} in session {} ({:?})",
        moveframe_id,
        copy.id,
        target_session_id,
        placement
    );
    moveframe_tree(repo, &copy.id)
}

/// Relocate a live moveframe before, after, or in place of a target
pub fn move_moveframe<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    target_session_id: &str,
    placement: Placement,
) -> Result<MoveframeTree> {
    let moveframe = repo.moveframe(moveframe_id)?;
    let source_session = repo.session(&moveframe.session_id)?;
    let target_session = repo.session(target_session_id)?;
    let (mut order, index) =
        resolve_placement(repo, target_session_id, &placement, Some(moveframe_id))?;
    if source_session.id != target_session.id {
        ensure_moveframe_room(order.len())?;
    }

    order.insert(index.min(order.len()), moveframe_id.to_string());
    ordering::reletter(repo, target_session_id, &order)?;

    if source_session.id != target_session.id {
        ordering::compact_letters(repo, &source_session.id)?;
    }
    if source_session.day_id != target_session.day_id {
        let incoming: HashSet<String> = [moveframe_id.to_string()].into();
        work_role::reconcile_incoming(repo, &target_session.day_id, &incoming)?;
        repo.touch_day(&source_session.day_id)?;
    }
    repo.touch_day(&target_session.day_id)?;

    tracing::info!(
        "Moved moveframe {} to session {} ({:?})",
        moveframe_id,
        target_session_id,
        placement
    );
    moveframe_tree(repo, moveframe_id)
}

/// Append a copy of a moveframe to a session (its own when `None`)
pub fn duplicate_moveframe<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    target_session_id: Option<&str>,
) -> Result<MoveframeTree> {
    let session_id = match target_session_id {
        Some(id) => id.to_string(),
        None => repo.moveframe(moveframe_id)?.session_id,
    };
    copy_moveframe(repo, moveframe_id, &session_id, Placement::Append)
}

/// Drag a moveframe to a zero-based slot of a (possibly different) session
pub fn move_moveframe_to_index<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    target_session_id: &str,
    index: usize,
) -> Result<Vec<Moveframe>> {
    move_moveframe(repo, moveframe_id, target_session_id, Placement::Append)?;
    let order: Vec<String> = repo
        .moveframes_of_session(target_session_id)
        .into_iter()
        .map(|m| m.id)
        .collect();
    let order = ordering::splice(order, moveframe_id, index);
    ordering::reletter(repo, target_session_id, &order)?;
    Ok(repo.moveframes_of_session(target_session_id))
}

// ============================================================================
// Weeks
// ============================================================================

/// Copy a week to the end of a plan, shifting every day by `shift_days`
pub fn copy_week<R: Repository>(
    repo: &mut R,
    week_id: &str,
    target_plan_id: &str,
    shift_days: i64,
) -> Result<WeekTree> {
    let source = repo.week(week_id)?;
    repo.plan(target_plan_id)?;

    let copy = Week {
        id: new_id(),
        plan_id: target_plan_id.to_string(),
        week_number: repo.weeks_of_plan(target_plan_id).len() as u32 + 1,
        period_id: source.period_id.clone(),
        notes: source.notes.clone(),
    };
    repo.insert_week(copy.clone())?;

    for day in repo.days_of_week(week_id) {
        let date = day
            .date
            .checked_add_signed(Duration::days(shift_days))
            .ok_or_else(|| Error::ValidationFailed(format!("Shift {} overflows", shift_days)))?;
        copy_day(repo, &day.id, &copy.id, date)?;
    }

    tracing::info!(
        "Copied week {} into plan {} as week {}",
        week_id,
        target_plan_id,
        copy.week_number
    );
    week_tree(repo, &copy.id)
}

/// Move a week to a 1-based position within its plan
pub fn move_week<R: Repository>(repo: &mut R, week_id: &str, position: u32) -> Result<Vec<Week>> {
    if position == 0 {
        return Err(Error::ValidationFailed(
            "Week positions start at 1".into(),
        ));
    }
    let week = repo.week(week_id)?;
    let order: Vec<String> = repo
        .weeks_of_plan(&week.plan_id)
        .into_iter()
        .map(|w| w.id)
        .collect();
    let order = ordering::splice(order, week_id, position as usize - 1);
    ordering::renumber_weeks(repo, &week.plan_id, &order)?;
    Ok(repo.weeks_of_plan(&week.plan_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::*;
    use crate::repository::fixtures::date;
    use crate::repository::MemoryRepository;
    use crate::{
        CompletionReport, MovelapStatus, NewDay, NewMovelap, NewMoveframe, NewSession, NewWeek,
        PlanType, Sport, StorageZone, WorkType,
    };

    struct Setup {
        repo: MemoryRepository,
        week: Week,
        day: Day,
        session: Session,
    }

    fn setup() -> Setup {
        crate::logging::init_test();
        let mut repo = MemoryRepository::new();
        let plan = create_plan(&mut repo, "athlete", "Season", PlanType::YearlyPlan).unwrap();
        let week = add_week(&mut repo, &plan.id, NewWeek::default()).unwrap();
        let day = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 1))).unwrap();
        let session = add_session(&mut repo, &day.id, NewSession::default()).unwrap();
        Setup {
            repo,
            week,
            day,
            session,
        }
    }

    fn swim_with_laps(repo: &mut MemoryRepository, session_id: &str, role: WorkType) -> Moveframe {
        let mut input = NewMoveframe::of(Sport::Swim);
        input.work_type = role;
        input.movelaps = vec![NewMovelap::distance(100), NewMovelap::distance(100)];
        add_moveframe(repo, session_id, input).unwrap()
    }

    fn complete_all_laps(repo: &mut MemoryRepository, moveframe_id: &str) {
        for lap in repo.movelaps_of_moveframe(moveframe_id) {
            set_movelap_status(repo, &lap.id, MovelapStatus::Completed).unwrap();
        }
    }

    fn letters(repo: &MemoryRepository, session_id: &str) -> Vec<char> {
        repo.moveframes_of_session(session_id)
            .iter()
            .map(|m| m.letter)
            .collect()
    }

    #[test]
    fn test_copy_day_resets_execution_state() {
        let Setup {
            mut repo,
            week,
            day,
            session,
        } = setup();
        let mf = swim_with_laps(&mut repo, &session.id, WorkType::Main);
        complete_all_laps(&mut repo, &mf.id);
        complete_session(
            &mut repo,
            &session.id,
            &CompletionReport {
                percentage: 100,
                ..CompletionReport::default()
            },
        )
        .unwrap();

        let tree = copy_day(&mut repo, &day.id, &week.id, date(2024, 4, 2)).unwrap();

        assert_eq!(tree.day.day_of_week, 2);
        assert_eq!(tree.sessions.len(), 1);
        let copied = &tree.sessions[0];
        assert_eq!(copied.session.status, SessionStatus::NotPlanned);
        assert_eq!(copied.moveframes[0].moveframe.work_type, WorkType::Main);
        assert!(copied.moveframes[0]
            .movelaps
            .iter()
            .all(|l| l.status == MovelapStatus::Pending));

        // Source untouched
        assert!(repo.session(&session.id).unwrap().status.is_done());
    }

    #[test]
    fn test_copy_day_conflict_on_occupied_date() {
        let Setup {
            mut repo,
            week,
            day,
            ..
        } = setup();
        add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();

        let err = copy_day(&mut repo, &day.id, &week.id, date(2024, 4, 2)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_copy_day_takes_destination_zone() {
        let Setup {
            mut repo, day, ..
        } = setup();
        let archive = create_plan(&mut repo, "athlete", "Old", PlanType::Archive).unwrap();
        let archive_week = add_week(&mut repo, &archive.id, NewWeek::default()).unwrap();

        let tree = copy_day(&mut repo, &day.id, &archive_week.id, date(2023, 4, 1)).unwrap();

        assert_eq!(tree.day.storage_zone, StorageZone::D);
        assert_eq!(tree.sessions[0].session.storage_zone, StorageZone::D);
    }

    #[test]
    fn test_move_day_keeps_state_and_checks_dates() {
        let Setup {
            mut repo,
            week,
            day,
            session,
        } = setup();
        let mf = swim_with_laps(&mut repo, &session.id, WorkType::None);
        complete_all_laps(&mut repo, &mf.id);
        add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 3))).unwrap();

        let err = move_day(&mut repo, &day.id, &week.id, date(2024, 4, 3)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Moving onto its own date is allowed
        move_day(&mut repo, &day.id, &week.id, date(2024, 4, 1)).unwrap();

        let tree = move_day(&mut repo, &day.id, &week.id, date(2024, 4, 5)).unwrap();
        assert_eq!(tree.day.id, day.id);
        assert_eq!(tree.day.day_of_week, 5);
        assert!(tree.sessions[0].moveframes[0]
            .movelaps
            .iter()
            .all(|l| l.status == MovelapStatus::Completed));
    }

    #[test]
    fn test_copy_session_resets_and_numbers() {
        let Setup {
            mut repo,
            week,
            session,
            ..
        } = setup();
        let mf = swim_with_laps(&mut repo, &session.id, WorkType::None);
        complete_all_laps(&mut repo, &mf.id);
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        add_session(&mut repo, &target.id, NewSession::default()).unwrap();

        let tree = copy_session(&mut repo, &session.id, &target.id).unwrap();

        assert_eq!(tree.session.session_number, 2);
        assert_eq!(tree.session.status, SessionStatus::NotPlanned);
        assert!(tree.moveframes[0]
            .movelaps
            .iter()
            .all(|l| l.status == MovelapStatus::Pending));
    }

    #[test]
    fn test_copy_session_into_full_day_rejected() {
        let Setup {
            mut repo,
            week,
            session,
            ..
        } = setup();
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        for _ in 0..3 {
            add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        }

        let err = copy_session(&mut repo, &session.id, &target.id).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded(_)));
        assert_eq!(repo.sessions_of_day(&target.id).len(), 3);
    }

    #[test]
    fn test_move_session_preserves_state_and_renumbers_both_days() {
        let Setup {
            mut repo,
            week,
            day,
            session,
        } = setup();
        let second = add_session(&mut repo, &day.id, NewSession::default()).unwrap();
        let mf = swim_with_laps(&mut repo, &session.id, WorkType::None);
        complete_all_laps(&mut repo, &mf.id);
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();

        let tree = move_session(&mut repo, &session.id, &target.id).unwrap();

        assert_eq!(tree.session.day_id, target.id);
        assert_eq!(tree.session.session_number, 1);
        assert!(tree.moveframes[0]
            .movelaps
            .iter()
            .all(|l| l.status == MovelapStatus::Completed));
        assert_eq!(repo.session(&second.id).unwrap().session_number, 1);
    }

    #[test]
    fn test_move_session_reconciles_roles() {
        let Setup {
            mut repo,
            week,
            session,
            ..
        } = setup();
        let moving = swim_with_laps(&mut repo, &session.id, WorkType::Main);
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        let resident_session = add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        let resident = swim_with_laps(&mut repo, &resident_session.id, WorkType::Main);

        move_session(&mut repo, &session.id, &target.id).unwrap();

        assert_eq!(repo.moveframe(&resident.id).unwrap().work_type, WorkType::Main);
        assert_eq!(repo.moveframe(&moving.id).unwrap().work_type, WorkType::None);
        assert!(work_role::roles_are_unique(&repo, &target.id));
    }

    #[test]
    fn test_switch_sessions_between_days() {
        let Setup {
            mut repo,
            week,
            day,
            session,
        } = setup();
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        let other = add_session(&mut repo, &target.id, NewSession::default()).unwrap();

        let (first, second) = switch_sessions(&mut repo, &session.id, &other.id).unwrap();

        assert_eq!(first.session.day_id, target.id);
        assert_eq!(first.session.session_number, 2);
        assert_eq!(second.session.day_id, day.id);
        assert_eq!(second.session.session_number, 1);
    }

    #[test]
    fn test_switch_sessions_reconciles_roles_in_both_days() {
        let Setup {
            mut repo,
            week,
            day,
            session,
        } = setup();
        let moving_main = swim_with_laps(&mut repo, &session.id, WorkType::Main);
        let first_resident = add_session(&mut repo, &day.id, NewSession::default()).unwrap();
        swim_with_laps(&mut repo, &first_resident.id, WorkType::Secondary);

        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        let other = add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        let moving_secondary = swim_with_laps(&mut repo, &other.id, WorkType::Secondary);
        let second_resident = add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        let resident_main = swim_with_laps(&mut repo, &second_resident.id, WorkType::Main);

        switch_sessions(&mut repo, &session.id, &other.id).unwrap();

        assert!(work_role::roles_are_unique(&repo, &day.id));
        assert!(work_role::roles_are_unique(&repo, &target.id));
        assert_eq!(
            repo.moveframe(&moving_main.id).unwrap().work_type,
            WorkType::None
        );
        assert_eq!(
            repo.moveframe(&moving_secondary.id).unwrap().work_type,
            WorkType::None
        );
        assert_eq!(
            repo.moveframe(&resident_main.id).unwrap().work_type,
            WorkType::Main
        );
    }

    #[test]
    fn test_move_session_to_index() {
        let Setup {
            mut repo,
            week,
            session,
            ..
        } = setup();
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        let t1 = add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        let t2 = add_session(&mut repo, &target.id, NewSession::default()).unwrap();

        let sessions = move_session_to_index(&mut repo, &session.id, &target.id, 0).unwrap();

        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![session.id.as_str(), t1.id.as_str(), t2.id.as_str()]);
        let numbers: Vec<u8> = sessions.iter().map(|s| s.session_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_copy_moveframe_before_after_replace() {
        let Setup {
            mut repo, session, ..
        } = setup();
        let a = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Run)).unwrap();
        let b = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Bike)).unwrap();
        let source = swim_with_laps(&mut repo, &session.id, WorkType::None);

        let before = copy_moveframe(
            &mut repo,
            &source.id,
            &session.id,
            Placement::Before(b.id.clone()),
        )
        .unwrap();
        assert_eq!(before.moveframe.letter, 'B');
        assert_eq!(before.movelaps.len(), 2);
        assert_eq!(repo.moveframe(&b.id).unwrap().letter, 'C');

        let after = copy_moveframe(
            &mut repo,
            &source.id,
            &session.id,
            Placement::After(a.id.clone()),
        )
        .unwrap();
        assert_eq!(after.moveframe.letter, 'B');

        let replaced = copy_moveframe(
            &mut repo,
            &source.id,
            &session.id,
            Placement::Replace(a.id.clone()),
        )
        .unwrap();
        assert_eq!(replaced.moveframe.letter, 'A');
        assert!(repo.moveframe(&a.id).is_err());
        assert_eq!(letters(&repo, &session.id), vec!['A', 'B', 'C', 'D', 'E']);
    }

    #[test]
    fn test_move_moveframe_across_sessions_reletters_both() {
        let Setup {
            mut repo,
            day,
            session,
            ..
        } = setup();
        let other = add_session(&mut repo, &day.id, NewSession::default()).unwrap();
        let a = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Run)).unwrap();
        let b = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Bike)).unwrap();
        let c = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Swim)).unwrap();
        let x = add_moveframe(&mut repo, &other.id, NewMoveframe::of(Sport::Run)).unwrap();

        let moved =
            move_moveframe(&mut repo, &b.id, &other.id, Placement::Before(x.id.clone())).unwrap();

        assert_eq!(moved.moveframe.session_id, other.id);
        assert_eq!(moved.moveframe.letter, 'A');
        assert_eq!(repo.moveframe(&x.id).unwrap().letter, 'B');
        assert_eq!(repo.moveframe(&a.id).unwrap().letter, 'A');
        assert_eq!(repo.moveframe(&c.id).unwrap().letter, 'B');
        assert_eq!(letters(&repo, &session.id), vec!['A', 'B']);
    }

    #[test]
    fn test_move_moveframe_into_other_day_drops_taken_role() {
        let Setup {
            mut repo,
            week,
            session,
            ..
        } = setup();
        let moving = swim_with_laps(&mut repo, &session.id, WorkType::Main);
        let target = add_day(&mut repo, &week.id, NewDay::on(date(2024, 4, 2))).unwrap();
        let target_session = add_session(&mut repo, &target.id, NewSession::default()).unwrap();
        let resident = swim_with_laps(&mut repo, &target_session.id, WorkType::Main);

        let moved = move_moveframe(
            &mut repo,
            &moving.id,
            &target_session.id,
            Placement::Before(resident.id.clone()),
        )
        .unwrap();

        assert_eq!(moved.moveframe.letter, 'A');
        assert_eq!(moved.moveframe.work_type, WorkType::None);
        assert_eq!(
            repo.moveframe(&resident.id).unwrap().work_type,
            WorkType::Main
        );
        assert!(work_role::roles_are_unique(&repo, &target.id));
    }

    #[test]
    fn test_placement_target_missing_or_elsewhere() {
        let Setup {
            mut repo,
            day,
            session,
            ..
        } = setup();
        let a = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Run)).unwrap();
        let other = add_session(&mut repo, &day.id, NewSession::default()).unwrap();
        let elsewhere = add_moveframe(&mut repo, &other.id, NewMoveframe::of(Sport::Bike)).unwrap();

        let err = copy_moveframe(
            &mut repo,
            &a.id,
            &session.id,
            Placement::Before("no-such-moveframe".into()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = move_moveframe(
            &mut repo,
            &a.id,
            &session.id,
            Placement::After(elsewhere.id.clone()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }

    #[test]
    fn test_move_moveframe_relative_to_itself_rejected() {
        let Setup {
            mut repo, session, ..
        } = setup();
        let a = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Run)).unwrap();

        let err = move_moveframe(&mut repo, &a.id, &session.id, Placement::After(a.id.clone()))
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
    }

    #[test]
    fn test_duplicate_moveframe_appends_and_drops_role() {
        let Setup {
            mut repo,
            day,
            session,
            ..
        } = setup();
        let source = swim_with_laps(&mut repo, &session.id, WorkType::Main);
        complete_all_laps(&mut repo, &source.id);
        add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Run)).unwrap();

        let dup = duplicate_moveframe(&mut repo, &source.id, None).unwrap();

        assert_eq!(dup.moveframe.letter, 'C');
        assert_eq!(dup.moveframe.work_type, WorkType::None);
        assert!(dup.movelaps.iter().all(|l| l.status == MovelapStatus::Pending));
        assert_eq!(repo.moveframe(&source.id).unwrap().work_type, WorkType::Main);
        assert!(work_role::roles_are_unique(&repo, &day.id));
    }

    #[test]
    fn test_move_moveframe_to_index() {
        let Setup {
            mut repo,
            day,
            session,
            ..
        } = setup();
        let other = add_session(&mut repo, &day.id, NewSession::default()).unwrap();
        let moving = add_moveframe(&mut repo, &session.id, NewMoveframe::of(Sport::Run)).unwrap();
        let x = add_moveframe(&mut repo, &other.id, NewMoveframe::of(Sport::Swim)).unwrap();
        let y = add_moveframe(&mut repo, &other.id, NewMoveframe::of(Sport::Bike)).unwrap();

        let listed = move_moveframe_to_index(&mut repo, &moving.id, &other.id, 1).unwrap();

        let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![x.id.as_str(), moving.id.as_str(), y.id.as_str()]);
        assert_eq!(letters(&repo, &other.id), vec!['A', 'B', 'C']);
        assert!(repo.moveframes_of_session(&session.id).is_empty());
    }

    #[test]
    fn test_copy_week_shifts_dates() {
        let Setup {
            mut repo, week, ..
        } = setup();
        let plan_id = week.plan_id.clone();

        let tree = copy_week(&mut repo, &week.id, &plan_id, 7).unwrap();

        assert_eq!(tree.week.week_number, 2);
        assert_eq!(tree.days[0].day.date, date(2024, 4, 8));
        assert_eq!(tree.days[0].sessions.len(), 1);
    }

    #[test]
    fn test_copy_week_without_shift_conflicts() {
        let Setup {
            mut repo, week, ..
        } = setup();
        let plan_id = week.plan_id.clone();

        let err = copy_week(&mut repo, &week.id, &plan_id, 0).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_move_week_renumbers() {
        let Setup {
            mut repo, week, ..
        } = setup();
        let w2 = add_week(&mut repo, &week.plan_id, NewWeek::default()).unwrap();
        let w3 = add_week(&mut repo, &week.plan_id, NewWeek::default()).unwrap();

        let weeks = move_week(&mut repo, &w3.id, 1).unwrap();

        let ids: Vec<&str> = weeks.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec![w3.id.as_str(), week.id.as_str(), w2.id.as_str()]);
        assert!(move_week(&mut repo, &w3.id, 0).is_err());
    }

    #[test]
    fn test_assign_day_derives_status() {
        let Setup {
            mut repo, day, ..
        } = setup();
        let athlete_plan =
            create_plan(&mut repo, "athlete-2", "Assigned", PlanType::YearlyPlan).unwrap();
        let athlete_week = add_week(&mut repo, &athlete_plan.id, NewWeek::default()).unwrap();

        // 2024-04-03 is a Wednesday; eight days later is next ISO week
        let today = date(2024, 4, 3);
        let tree = assign_day(&mut repo, &day.id, &athlete_week.id, date(2024, 4, 11), today)
            .unwrap();

        assert_eq!(tree.day.user_id, "athlete-2");
        assert_eq!(
            tree.sessions[0].session.status,
            SessionStatus::PlannedNextWeek
        );
    }
}
