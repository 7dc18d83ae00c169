//! Create, edit, and delete at every level of the plan hierarchy.
//!
//! These functions apply the ordering, zone, status, and role rules to a
//! single entity. They run against whatever repository the caller hands
//! them, normally the working copy of a store transaction.

use crate::repository::Repository;
use crate::{
    new_id, ordering, status, work_role, zone, CompletionReport, Day, DayPatch, DayTree, Error,
    Movelap, MovelapStatus, Moveframe, MoveframePatch, MoveframeTree, NewDay, NewMovelap,
    NewMoveframe, NewSession, NewWeek, Plan, PlanTree, PlanType, Result, Session, SessionPatch,
    SessionTree, Week, WeekTree, WorkType,
};
use std::collections::BTreeSet;

fn check_feeling(feeling: Option<u8>) -> Result<()> {
    match feeling {
        Some(value) if value > 10 => Err(Error::ValidationFailed(format!(
            "Feeling must be within 0..=10, got {}",
            value
        ))),
        _ => Ok(()),
    }
}

// ============================================================================
// Plans and weeks
// ============================================================================

pub fn create_plan<R: Repository>(
    repo: &mut R,
    owner: &str,
    name: &str,
    plan_type: PlanType,
) -> Result<Plan> {
    if name.trim().is_empty() {
        return Err(Error::ValidationFailed("Plan name is required".into()));
    }
    let plan = Plan {
        id: new_id(),
        user_id: owner.to_string(),
        name: name.trim().to_string(),
        plan_type,
        coaches: BTreeSet::new(),
    };
    repo.insert_plan(plan.clone())?;
    tracing::info!("Created plan {} ({:?}) for {}", plan.id, plan_type, owner);
    Ok(plan)
}

pub fn add_week<R: Repository>(repo: &mut R, plan_id: &str, input: NewWeek) -> Result<Week> {
    repo.plan(plan_id)?;
    let week = Week {
        id: new_id(),
        plan_id: plan_id.to_string(),
        week_number: repo.weeks_of_plan(plan_id).len() as u32 + 1,
        period_id: input.period_id,
        notes: input.notes,
    };
    repo.insert_week(week.clone())?;
    Ok(week)
}

pub fn rename_plan<R: Repository>(repo: &mut R, plan_id: &str, name: &str) -> Result<Plan> {
    if name.trim().is_empty() {
        return Err(Error::ValidationFailed("Plan name is required".into()));
    }
    let mut plan = repo.plan(plan_id)?;
    plan.name = name.trim().to_string();
    repo.update_plan(plan.clone())?;
    Ok(plan)
}

pub fn delete_plan<R: Repository>(repo: &mut R, plan_id: &str) -> Result<()> {
    repo.delete_plan(plan_id)?;
    tracing::info!("Deleted plan {}", plan_id);
    Ok(())
}

/// Grant (or revoke) a coach's write access to a plan
pub fn set_coach<R: Repository>(
    repo: &mut R,
    plan_id: &str,
    coach: &str,
    granted: bool,
) -> Result<Plan> {
    let mut plan = repo.plan(plan_id)?;
    if coach.trim().is_empty() {
        return Err(Error::ValidationFailed("Coach id is required".into()));
    }
    if coach == plan.user_id {
        return Err(Error::ValidationFailed(
            "The plan owner cannot be their own coach".into(),
        ));
    }
    if granted {
        plan.coaches.insert(coach.to_string());
    } else {
        plan.coaches.remove(coach);
    }
    repo.update_plan(plan.clone())?;
    tracing::info!(
        "Coach {} {} on plan {}",
        coach,
        if granted { "granted" } else { "revoked" },
        plan_id
    );
    Ok(plan)
}

pub fn update_week<R: Repository>(repo: &mut R, week_id: &str, patch: NewWeek) -> Result<Week> {
    let mut week = repo.week(week_id)?;
    if patch.period_id.is_some() {
        week.period_id = patch.period_id;
    }
    if patch.notes.is_some() {
        week.notes = patch.notes;
    }
    repo.update_week(week.clone())?;
    Ok(week)
}

pub fn delete_week<R: Repository>(repo: &mut R, week_id: &str) -> Result<()> {
    let week = repo.week(week_id)?;
    repo.delete_week(week_id)?;
    ordering::compact_weeks(repo, &week.plan_id)
}

// ============================================================================
// Days
// ============================================================================

pub fn add_day<R: Repository>(repo: &mut R, week_id: &str, input: NewDay) -> Result<Day> {
    check_feeling(input.feeling)?;
    let week = repo.week(week_id)?;
    let plan = repo.plan(&week.plan_id)?;

    let day = Day {
        id: new_id(),
        week_id: week.id.clone(),
        user_id: plan.user_id.clone(),
        date: input.date,
        day_of_week: Day::weekday_number(input.date),
        storage_zone: zone::zone_for(plan.plan_type),
        period_id: input.period_id.or(week.period_id),
        weather: input.weather,
        feeling: input.feeling,
        notes: input.notes,
        version: 0,
    };
    repo.insert_day(day.clone())?;
    tracing::info!("Added day {} on {} to week {}", day.id, day.date, week.id);
    Ok(day)
}

pub fn update_day<R: Repository>(repo: &mut R, day_id: &str, patch: DayPatch) -> Result<Day> {
    check_feeling(patch.feeling)?;
    let mut day = repo.day(day_id)?;
    if patch.period_id.is_some() {
        day.period_id = patch.period_id;
    }
    if patch.weather.is_some() {
        day.weather = patch.weather;
    }
    if patch.feeling.is_some() {
        day.feeling = patch.feeling;
    }
    if patch.notes.is_some() {
        day.notes = patch.notes;
    }
    day.version += 1;
    repo.update_day(day.clone())?;
    Ok(day)
}

pub fn delete_day<R: Repository>(repo: &mut R, day_id: &str) -> Result<()> {
    repo.delete_day(day_id)?;
    tracing::info!("Deleted day {}", day_id);
    Ok(())
}

// ============================================================================
// Sessions
// ============================================================================

pub fn add_session<R: Repository>(repo: &mut R, day_id: &str, input: NewSession) -> Result<Session> {
    let day = repo.day(day_id)?;
    let used: Vec<u8> = repo
        .sessions_of_day(day_id)
        .iter()
        .map(|s| s.session_number)
        .collect();
    let session_number = ordering::next_session_number(&used)?;

    let session = Session {
        id: new_id(),
        day_id: day.id.clone(),
        session_number,
        storage_zone: day.storage_zone,
        name: input.name,
        code: input.code,
        time: input.time,
        location: input.location,
        notes: input.notes,
        heart_rate_max: None,
        heart_rate_avg: None,
        calories: None,
        feeling: None,
        status: input
            .status
            .unwrap_or_else(|| zone::default_session_status(day.storage_zone)),
    };
    repo.insert_session(session.clone())?;
    repo.touch_day(day_id)?;
    tracing::info!(
        "Added session {} (#{}) to day {}",
        session.id,
        session_number,
        day_id
    );
    Ok(session)
}

pub fn update_session<R: Repository>(
    repo: &mut R,
    session_id: &str,
    patch: SessionPatch,
) -> Result<Session> {
    let mut session = repo.session(session_id)?;
    if patch.name.is_some() {
        session.name = patch.name;
    }
    if patch.code.is_some() {
        session.code = patch.code;
    }
    if patch.time.is_some() {
        session.time = patch.time;
    }
    if patch.location.is_some() {
        session.location = patch.location;
    }
    if patch.notes.is_some() {
        session.notes = patch.notes;
    }
    if let Some(explicit) = patch.status {
        session.status = explicit;
    }
    repo.update_session(session.clone())?;
    repo.touch_day(&session.day_id)?;
    Ok(session)
}

pub fn complete_session<R: Repository>(
    repo: &mut R,
    session_id: &str,
    report: &CompletionReport,
) -> Result<Session> {
    let mut session = repo.session(session_id)?;
    status::apply_completion(&mut session, report)?;
    repo.update_session(session.clone())?;
    repo.touch_day(&session.day_id)?;
    tracing::info!("Session {} reported as {:?}", session_id, session.status);
    Ok(session)
}

pub fn delete_session<R: Repository>(repo: &mut R, session_id: &str) -> Result<()> {
    let session = repo.session(session_id)?;
    // Hand each MAIN slot to a same-sport SECONDARY before the session goes
    for moveframe in repo.moveframes_of_session(session_id) {
        if moveframe.work_type == WorkType::Main {
            work_role::set_work_type(repo, &moveframe.id, WorkType::None)?;
        }
    }
    repo.delete_session(session_id)?;
    ordering::compact_sessions(repo, &session.day_id)?;
    repo.touch_day(&session.day_id)?;
    tracing::info!("Deleted session {}", session_id);
    Ok(())
}

// ============================================================================
// Moveframes
// ============================================================================

fn insert_movelaps<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    rows: Vec<NewMovelap>,
) -> Result<()> {
    for (index, row) in rows.into_iter().enumerate() {
        repo.insert_movelap(row.into_movelap(moveframe_id, index as u32 + 1))?;
    }
    Ok(())
}

pub fn add_moveframe<R: Repository>(
    repo: &mut R,
    session_id: &str,
    input: NewMoveframe,
) -> Result<Moveframe> {
    let session = repo.session(session_id)?;
    let used: Vec<char> = repo
        .moveframes_of_session(session_id)
        .iter()
        .map(|m| m.letter)
        .collect();
    let letter = ordering::next_letter(&used)?;

    let moveframe = Moveframe {
        id: new_id(),
        session_id: session.id.clone(),
        letter,
        sport: input.sport,
        kind: input.kind,
        work_type: WorkType::None,
        section_id: input.section_id,
        description: input.description,
    };
    repo.insert_moveframe(moveframe.clone())?;
    insert_movelaps(repo, &moveframe.id, input.movelaps)?;

    if input.work_type != WorkType::None {
        work_role::set_work_type(repo, &moveframe.id, input.work_type)?;
    } else {
        repo.touch_day(&session.day_id)?;
    }
    tracing::info!(
        "Added moveframe {} ({}) to session {}",
        moveframe.id,
        letter,
        session_id
    );
    repo.moveframe(&moveframe.id)
}

pub fn update_moveframe<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    patch: MoveframePatch,
) -> Result<Moveframe> {
    let mut moveframe = repo.moveframe(moveframe_id)?;
    let old_sport = moveframe.sport;
    let sport_changed = patch.sport.map_or(false, |s| s != old_sport);

    if let Some(sport) = patch.sport {
        moveframe.sport = sport;
    }
    if let Some(kind) = patch.kind {
        moveframe.kind = kind;
    }
    if patch.section_id.is_some() {
        moveframe.section_id = patch.section_id;
    }
    if patch.description.is_some() {
        moveframe.description = patch.description;
    }
    let role = moveframe.work_type;
    repo.update_moveframe(moveframe.clone())?;

    if let Some(rows) = patch.movelaps {
        for lap in repo.movelaps_of_moveframe(moveframe_id) {
            repo.delete_movelap(&lap.id)?;
        }
        insert_movelaps(repo, moveframe_id, rows)?;
    }

    // A sport switch vacates the old sport's slot and can collide with the
    // new sport's role holders
    if sport_changed && role != WorkType::None {
        if role == WorkType::Main {
            let day_id = work_role::day_of_moveframe(repo, &moveframe)?;
            work_role::promote_secondary(repo, &day_id, old_sport, moveframe_id)?;
        }
        work_role::set_work_type(repo, moveframe_id, role)?;
    } else {
        let day_id = work_role::day_of_moveframe(repo, &moveframe)?;
        repo.touch_day(&day_id)?;
    }
    repo.moveframe(moveframe_id)
}

pub fn delete_moveframe<R: Repository>(repo: &mut R, moveframe_id: &str) -> Result<()> {
    let moveframe = repo.moveframe(moveframe_id)?;
    if moveframe.work_type == WorkType::Main {
        work_role::set_work_type(repo, moveframe_id, WorkType::None)?;
    }
    let day_id = work_role::day_of_moveframe(repo, &moveframe)?;
    repo.delete_moveframe(moveframe_id)?;
    ordering::compact_letters(repo, &moveframe.session_id)?;
    repo.touch_day(&day_id)?;
    tracing::info!("Deleted moveframe {}", moveframe_id);
    Ok(())
}

/// Apply an explicit letter order to a session's moveframes
pub fn reorder_moveframes<R: Repository>(
    repo: &mut R,
    session_id: &str,
    order: &[String],
) -> Result<Vec<Moveframe>> {
    let session = repo.session(session_id)?;
    let current: Vec<String> = repo
        .moveframes_of_session(session_id)
        .into_iter()
        .map(|m| m.id)
        .collect();
    ordering::validate_permutation(&current, order)?;
    ordering::reletter(repo, session_id, order)?;
    repo.touch_day(&session.day_id)?;
    Ok(repo.moveframes_of_session(session_id))
}

/// Apply an explicit numbering to a day's sessions
pub fn reorder_sessions<R: Repository>(
    repo: &mut R,
    day_id: &str,
    order: &[String],
) -> Result<Vec<Session>> {
    let current: Vec<String> = repo
        .sessions_of_day(day_id)
        .into_iter()
        .map(|s| s.id)
        .collect();
    ordering::validate_permutation(&current, order)?;
    ordering::renumber_sessions(repo, day_id, order)?;
    repo.touch_day(day_id)?;
    Ok(repo.sessions_of_day(day_id))
}

// ============================================================================
// Movelaps
// ============================================================================

fn touch_day_of_moveframe<R: Repository>(repo: &mut R, moveframe_id: &str) -> Result<()> {
    let moveframe = repo.moveframe(moveframe_id)?;
    let day_id = work_role::day_of_moveframe(repo, &moveframe)?;
    repo.touch_day(&day_id)
}

/// Insert a movelap at a zero-based position (append when `None`)
pub fn add_movelap<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    input: NewMovelap,
    position: Option<usize>,
) -> Result<Movelap> {
    let siblings: Vec<String> = repo
        .movelaps_of_moveframe(moveframe_id)
        .into_iter()
        .map(|l| l.id)
        .collect();
    let movelap = input.into_movelap(moveframe_id, siblings.len() as u32 + 1);
    repo.insert_movelap(movelap.clone())?;

    let index = position.unwrap_or(siblings.len());
    let order = ordering::splice(siblings, &movelap.id, index);
    ordering::renumber_movelaps(repo, moveframe_id, &order)?;
    touch_day_of_moveframe(repo, moveframe_id)?;
    repo.movelap(&movelap.id)
}

pub fn update_movelap<R: Repository>(
    repo: &mut R,
    movelap_id: &str,
    input: NewMovelap,
) -> Result<Movelap> {
    let current = repo.movelap(movelap_id)?;
    let mut updated = input.into_movelap(&current.moveframe_id, current.repetition_number);
    updated.id = current.id;
    updated.status = current.status;
    updated.is_skipped = current.is_skipped;
    updated.is_disabled = current.is_disabled;
    repo.update_movelap(updated.clone())?;
    touch_day_of_moveframe(repo, &updated.moveframe_id)?;
    Ok(updated)
}

pub fn set_movelap_status<R: Repository>(
    repo: &mut R,
    movelap_id: &str,
    status: MovelapStatus,
) -> Result<Movelap> {
    let mut movelap = repo.movelap(movelap_id)?;
    movelap.status = status;
    repo.update_movelap(movelap.clone())?;
    touch_day_of_moveframe(repo, &movelap.moveframe_id)?;
    Ok(movelap)
}

/// Toggle the skip / disable flags; `None` keeps the stored flag
pub fn set_movelap_flags<R: Repository>(
    repo: &mut R,
    movelap_id: &str,
    skipped: Option<bool>,
    disabled: Option<bool>,
) -> Result<Movelap> {
    let mut movelap = repo.movelap(movelap_id)?;
    if let Some(flag) = skipped {
        movelap.is_skipped = flag;
    }
    if let Some(flag) = disabled {
        movelap.is_disabled = flag;
    }
    repo.update_movelap(movelap.clone())?;
    touch_day_of_moveframe(repo, &movelap.moveframe_id)?;
    Ok(movelap)
}

pub fn delete_movelap<R: Repository>(repo: &mut R, movelap_id: &str) -> Result<()> {
    let movelap = repo.movelap(movelap_id)?;
    repo.delete_movelap(movelap_id)?;
    ordering::compact_movelaps(repo, &movelap.moveframe_id)?;
    touch_day_of_moveframe(repo, &movelap.moveframe_id)
}

// ============================================================================
// Trees
// ============================================================================

pub fn moveframe_tree<R: Repository>(repo: &R, moveframe_id: &str) -> Result<MoveframeTree> {
    Ok(MoveframeTree {
        moveframe: repo.moveframe(moveframe_id)?,
        movelaps: repo.movelaps_of_moveframe(moveframe_id),
    })
}

pub fn session_tree<R: Repository>(repo: &R, session_id: &str) -> Result<SessionTree> {
    let session = repo.session(session_id)?;
    let moveframes = repo
        .moveframes_of_session(session_id)
        .into_iter()
        .map(|m| moveframe_tree(repo, &m.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(SessionTree {
        session,
        moveframes,
    })
}

pub fn day_tree<R: Repository>(repo: &R, day_id: &str) -> Result<DayTree> {
    let day = repo.day(day_id)?;
    let sessions = repo
        .sessions_of_day(day_id)
        .into_iter()
        .map(|s| session_tree(repo, &s.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(DayTree { day, sessions })
}

pub fn week_tree<R: Repository>(repo: &R, week_id: &str) -> Result<WeekTree> {
    let week = repo.week(week_id)?;
    let days = repo
        .days_of_week(week_id)
        .into_iter()
        .map(|d| day_tree(repo, &d.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(WeekTree { week, days })
}

pub fn plan_tree<R: Repository>(repo: &R, plan_id: &str) -> Result<PlanTree> {
    let plan = repo.plan(plan_id)?;
    let weeks = repo
        .weeks_of_plan(plan_id)
        .into_iter()
        .map(|w| week_tree(repo, &w.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(PlanTree { plan, weeks })
}
