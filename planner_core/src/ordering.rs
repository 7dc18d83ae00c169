//! Positional identifiers: moveframe letters, session numbers, movelap
//! repetition numbers, week numbers.
//!
//! Every structural operation funnels through here so the contiguity rules
//! (letters `A..`, numbers `1..`) hold once it completes.

use crate::repository::Repository;
use crate::{Error, Result};
use std::collections::HashSet;

/// Sessions a day can hold
pub const MAX_SESSIONS_PER_DAY: usize = 3;

/// Moveframes a session can hold (one per letter A..Z)
pub const MAX_MOVEFRAMES_PER_SESSION: usize = 26;

/// Letter for a zero-based position
pub fn letter_at(index: usize) -> Result<char> {
    if index >= MAX_MOVEFRAMES_PER_SESSION {
        return Err(Error::CapacityExceeded(format!(
            "A session holds at most {} moveframes",
            MAX_MOVEFRAMES_PER_SESSION
        )));
    }
    Ok((b'A' + index as u8) as char)
}

/// Lowest letter in `A..Z` not present in `used`
pub fn next_letter(used: &[char]) -> Result<char> {
    (b'A'..=b'Z')
        .map(char::from)
        .find(|c| !used.contains(c))
        .ok_or_else(|| {
            Error::CapacityExceeded(format!(
                "A session holds at most {} moveframes",
                MAX_MOVEFRAMES_PER_SESSION
            ))
        })
}

/// Lowest session number in `1..=3` not present in `used`
pub fn next_session_number(used: &[u8]) -> Result<u8> {
    (1..=MAX_SESSIONS_PER_DAY as u8)
        .find(|n| !used.contains(n))
        .ok_or_else(|| {
            Error::CapacityExceeded(format!(
                "A day holds at most {} sessions",
                MAX_SESSIONS_PER_DAY
            ))
        })
}

/// Ensure `proposed` is a reordering of exactly the ids in `current`
pub fn validate_permutation(current: &[String], proposed: &[String]) -> Result<()> {
    let current_set: HashSet<&String> = current.iter().collect();
    let proposed_set: HashSet<&String> = proposed.iter().collect();

    if proposed.len() != proposed_set.len() {
        return Err(Error::ValidationFailed(
            "Ordering contains duplicate ids".into(),
        ));
    }
    if current_set != proposed_set {
        return Err(Error::ValidationFailed(format!(
            "Ordering must list exactly the {} existing ids",
            current.len()
        )));
    }
    Ok(())
}

/// Move `id` to `index` within `order`, clamping past-the-end indexes
pub fn splice(mut order: Vec<String>, id: &str, index: usize) -> Vec<String> {
    order.retain(|existing| existing != id);
    let index = index.min(order.len());
    order.insert(index, id.to_string());
    order
}

/// Re-letter a session's moveframes in the given order (A, B, C, ...)
pub fn reletter<R: Repository>(repo: &mut R, session_id: &str, order: &[String]) -> Result<()> {
    if order.len() > MAX_MOVEFRAMES_PER_SESSION {
        return Err(Error::CapacityExceeded(format!(
            "A session holds at most {} moveframes",
            MAX_MOVEFRAMES_PER_SESSION
        )));
    }
    for (index, id) in order.iter().enumerate() {
        let mut moveframe = repo.moveframe(id)?;
        let letter = letter_at(index)?;
        if moveframe.letter != letter || moveframe.session_id != session_id {
            moveframe.letter = letter;
            moveframe.session_id = session_id.to_string();
            repo.update_moveframe(moveframe)?;
        }
    }
    tracing::debug!("Re-lettered {} moveframes in session {}", order.len(), session_id);
    Ok(())
}

/// Close letter gaps while keeping the current relative order
pub fn compact_letters<R: Repository>(repo: &mut R, session_id: &str) -> Result<()> {
    let order: Vec<String> = repo
        .moveframes_of_session(session_id)
        .into_iter()
        .map(|m| m.id)
        .collect();
    reletter(repo, session_id, &order)
}

/// Renumber a day's sessions in the given order (1, 2, 3)
pub fn renumber_sessions<R: Repository>(repo: &mut R, day_id: &str, order: &[String]) -> Result<()> {
    if order.len() > MAX_SESSIONS_PER_DAY {
        return Err(Error::CapacityExceeded(format!(
            "A day holds at most {} sessions",
            MAX_SESSIONS_PER_DAY
        )));
    }
    for (index, id) in order.iter().enumerate() {
        let mut session = repo.session(id)?;
        let number = index as u8 + 1;
        if session.session_number != number || session.day_id != day_id {
            session.session_number = number;
            session.day_id = day_id.to_string();
            repo.update_session(session)?;
        }
    }
    tracing::debug!("Renumbered {} sessions in day {}", order.len(), day_id);
    Ok(())
}

/// Close session-number gaps while keeping the current relative order
pub fn compact_sessions<R: Repository>(repo: &mut R, day_id: &str) -> Result<()> {
    let order: Vec<String> = repo
        .sessions_of_day(day_id)
        .into_iter()
        .map(|s| s.id)
        .collect();
    renumber_sessions(repo, day_id, &order)
}

/// Renumber a moveframe's movelaps in the given order (1, 2, 3, ...)
pub fn renumber_movelaps<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    order: &[String],
) -> Result<()> {
    for (index, id) in order.iter().enumerate() {
        let mut movelap = repo.movelap(id)?;
        let number = index as u32 + 1;
        if movelap.repetition_number != number {
            movelap.repetition_number = number;
            repo.update_movelap(movelap)?;
        }
    }
    tracing::debug!(
        "Renumbered {} movelaps in moveframe {}",
        order.len(),
        moveframe_id
    );
    Ok(())
}

/// Close repetition-number gaps while keeping the current relative order
pub fn compact_movelaps<R: Repository>(repo: &mut R, moveframe_id: &str) -> Result<()> {
    let order: Vec<String> = repo
        .movelaps_of_moveframe(moveframe_id)
        .into_iter()
        .map(|l| l.id)
        .collect();
    renumber_movelaps(repo, moveframe_id, &order)
}

/// Renumber a plan's weeks in the given order (1, 2, 3, ...)
pub fn renumber_weeks<R: Repository>(repo: &mut R, plan_id: &str, order: &[String]) -> Result<()> {
    for (index, id) in order.iter().enumerate() {
        let mut week = repo.week(id)?;
        let number = index as u32 + 1;
        if week.week_number != number {
            week.week_number = number;
            repo.update_week(week)?;
        }
    }
    tracing::debug!("Renumbered {} weeks in plan {}", order.len(), plan_id);
    Ok(())
}

/// Close week-number gaps while keeping the current relative order
pub fn compact_weeks<R: Repository>(repo: &mut R, plan_id: &str) -> Result<()> {
    let order: Vec<String> = repo
        .weeks_of_plan(plan_id)
        .into_iter()
        .map(|w| w.id)
        .collect();
    renumber_weeks(repo, plan_id, &order)
}
