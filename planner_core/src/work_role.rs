//! MAIN / SECONDARY role bookkeeping.
//!
//! Per day and per sport, at most one moveframe is MAIN and at most one is
//! SECONDARY, counted across every session of the day.

use crate::repository::Repository;
use crate::{Moveframe, Result, Sport, WorkType};
use std::collections::{HashMap, HashSet};

/// Day that owns a moveframe
pub fn day_of_moveframe<R: Repository>(repo: &R, moveframe: &Moveframe) -> Result<String> {
    Ok(repo.session(&moveframe.session_id)?.day_id)
}

/// Change a moveframe's role and repair the rest of its day
///
/// Claiming MAIN or SECONDARY strips that role from every other same-sport
/// moveframe of the day. Dropping from MAIN to NONE promotes a same-sport
/// SECONDARY, if one exists. Returns all moveframes of the day afterwards.
pub fn set_work_type<R: Repository>(
    repo: &mut R,
    moveframe_id: &str,
    role: WorkType,
) -> Result<Vec<Moveframe>> {
    let mut target = repo.moveframe(moveframe_id)?;
    let day_id = day_of_moveframe(repo, &target)?;
    let previous = target.work_type;

    if role != WorkType::None {
        for mut other in repo.moveframes_of_day(&day_id) {
            if other.id != target.id && other.sport == target.sport && other.work_type == role {
                tracing::debug!(
                    "Clearing {:?} from moveframe {} ({:?})",
                    role,
                    other.id,
                    other.sport
                );
                other.work_type = WorkType::None;
                repo.update_moveframe(other)?;
            }
        }
    }

    target.work_type = role;
    let sport = target.sport;
    repo.update_moveframe(target)?;

    if previous == WorkType::Main && role == WorkType::None {
        promote_secondary(repo, &day_id, sport, moveframe_id)?;
    }

    repo.touch_day(&day_id)?;
    tracing::info!(
        "Moveframe {} role {:?} -> {:?}",
        moveframe_id,
        previous,
        role
    );
    Ok(repo.moveframes_of_day(&day_id))
}

/// Promote the day's SECONDARY for `sport` to MAIN, skipping `excluded`
pub(crate) fn promote_secondary<R: Repository>(
    repo: &mut R,
    day_id: &str,
    sport: Sport,
    excluded: &str,
) -> Result<Option<String>> {
    let candidate = repo
        .moveframes_of_day(day_id)
        .into_iter()
        .find(|m| m.id != excluded && m.sport == sport && m.work_type == WorkType::Secondary);

    match candidate {
        Some(mut promoted) => {
            tracing::debug!("Promoting moveframe {} to MAIN", promoted.id);
            promoted.work_type = WorkType::Main;
            let id = promoted.id.clone();
            repo.update_moveframe(promoted)?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

/// Strip roles from moveframes that just arrived in a day when a resident
/// moveframe already holds the same sport and role
///
/// Among arrivals competing for the same slot, the first in day order keeps
/// it. Returns the ids that were reset.
pub fn reconcile_incoming<R: Repository>(
    repo: &mut R,
    day_id: &str,
    incoming: &HashSet<String>,
) -> Result<Vec<String>> {
    let moveframes = repo.moveframes_of_day(day_id);
    let mut taken: HashSet<(Sport, WorkType)> = moveframes
        .iter()
        .filter(|m| !incoming.contains(&m.id) && m.work_type != WorkType::None)
        .map(|m| (m.sport, m.work_type))
        .collect();

    let mut reset = Vec::new();
    for mut moveframe in moveframes {
        if !incoming.contains(&moveframe.id) || moveframe.work_type == WorkType::None {
            continue;
        }
        if !taken.insert((moveframe.sport, moveframe.work_type)) {
            tracing::debug!(
                "Moveframe {} loses {:?}: slot already held in day {}",
                moveframe.id,
                moveframe.work_type,
                day_id
            );
            moveframe.work_type = WorkType::None;
            reset.push(moveframe.id.clone());
            repo.update_moveframe(moveframe)?;
        }
    }
    Ok(reset)
}

/// Whether a day satisfies the one-role-per-sport rule
pub fn roles_are_unique<R: Repository>(repo: &R, day_id: &str) -> bool {
    let mut counts: HashMap<(Sport, WorkType), usize> = HashMap::new();
    for moveframe in repo.moveframes_of_day(day_id) {
        if moveframe.work_type != WorkType::None {
            *counts
                .entry((moveframe.sport, moveframe.work_type))
                .or_default() += 1;
        }
    }
    counts.values().all(|&count| count <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::*;
    use crate::repository::MemoryRepository;
    use crate::{Day, PlanType, Session};

    fn two_session_day(repo: &mut MemoryRepository) -> (Day, Session, Session) {
        let plan = plan(repo, "u1", PlanType::YearlyPlan);
        let week = week(repo, &plan);
        let day = day(repo, &week, date(2024, 6, 3));
        let s1 = session(repo, &day, 1);
        let s2 = session(repo, &day, 2);
        (day, s1, s2)
    }

    fn role_of(repo: &MemoryRepository, id: &str) -> WorkType {
        repo.moveframe(id).unwrap().work_type
    }

    #[test]
    fn test_setting_main_clears_other_main_across_sessions() {
        let mut repo = MemoryRepository::new();
        let (day, s1, s2) = two_session_day(&mut repo);
        let x = moveframe(&mut repo, &s1, 'A', Sport::Swim, WorkType::Main);
        let y = moveframe(&mut repo, &s2, 'A', Sport::Swim, WorkType::None);

        let day_moveframes = set_work_type(&mut repo, &y.id, WorkType::Main).unwrap();

        assert_eq!(day_moveframes.len(), 2);
        assert_eq!(role_of(&repo, &x.id), WorkType::None);
        assert_eq!(role_of(&repo, &y.id), WorkType::Main);
        assert!(roles_are_unique(&repo, &day.id));
    }

    #[test]
    fn test_other_sports_untouched() {
        let mut repo = MemoryRepository::new();
        let (_, s1, _) = two_session_day(&mut repo);
        let run = moveframe(&mut repo, &s1, 'A', Sport::Run, WorkType::Main);
        let swim = moveframe(&mut repo, &s1, 'B', Sport::Swim, WorkType::None);

        set_work_type(&mut repo, &swim.id, WorkType::Main).unwrap();

        assert_eq!(role_of(&repo, &run.id), WorkType::Main);
    }

    #[test]
    fn test_clearing_main_promotes_secondary() {
        let mut repo = MemoryRepository::new();
        let (_, s1, s2) = two_session_day(&mut repo);
        let x = moveframe(&mut repo, &s1, 'A', Sport::Swim, WorkType::Main);
        let y = moveframe(&mut repo, &s2, 'A', Sport::Swim, WorkType::Secondary);

        set_work_type(&mut repo, &x.id, WorkType::None).unwrap();

        assert_eq!(role_of(&repo, &x.id), WorkType::None);
        assert_eq!(role_of(&repo, &y.id), WorkType::Main);
    }

    #[test]
    fn test_clearing_secondary_does_not_promote() {
        let mut repo = MemoryRepository::new();
        let (_, s1, _) = two_session_day(&mut repo);
        let main = moveframe(&mut repo, &s1, 'A', Sport::Swim, WorkType::Main);
        let secondary = moveframe(&mut repo, &s1, 'B', Sport::Swim, WorkType::Secondary);

        set_work_type(&mut repo, &secondary.id, WorkType::None).unwrap();

        assert_eq!(role_of(&repo, &main.id), WorkType::Main);
        assert_eq!(role_of(&repo, &secondary.id), WorkType::None);
    }

    #[test]
    fn test_no_promotion_across_sports_or_days() {
        let mut repo = MemoryRepository::new();
        let (_, s1, _) = two_session_day(&mut repo);
        let plan = repo.plans_of_user("u1").remove(0);
        let week = repo.weeks_of_plan(&plan.id).remove(0);
        let other_day = day(&mut repo, &week, date(2024, 6, 4));
        let other_session = session(&mut repo, &other_day, 1);

        let main = moveframe(&mut repo, &s1, 'A', Sport::Swim, WorkType::Main);
        let bike_secondary = moveframe(&mut repo, &s1, 'B', Sport::Bike, WorkType::Secondary);
        let other_day_secondary =
            moveframe(&mut repo, &other_session, 'A', Sport::Swim, WorkType::Secondary);

        set_work_type(&mut repo, &main.id, WorkType::None).unwrap();

        assert_eq!(role_of(&repo, &bike_secondary.id), WorkType::Secondary);
        assert_eq!(role_of(&repo, &other_day_secondary.id), WorkType::Secondary);
    }

    #[test]
    fn test_reconcile_incoming_prefers_residents() {
        let mut repo = MemoryRepository::new();
        let (day, s1, s2) = two_session_day(&mut repo);
        let resident = moveframe(&mut repo, &s1, 'A', Sport::Run, WorkType::Main);
        let arrival = moveframe(&mut repo, &s2, 'A', Sport::Run, WorkType::Main);
        let arrival_ok = moveframe(&mut repo, &s2, 'B', Sport::Run, WorkType::Secondary);

        let incoming: HashSet<String> = [arrival.id.clone(), arrival_ok.id.clone()].into();
        let reset = reconcile_incoming(&mut repo, &day.id, &incoming).unwrap();

        assert_eq!(reset, vec![arrival.id.clone()]);
        assert_eq!(role_of(&repo, &resident.id), WorkType::Main);
        assert_eq!(role_of(&repo, &arrival.id), WorkType::None);
        assert_eq!(role_of(&repo, &arrival_ok.id), WorkType::Secondary);
        assert!(roles_are_unique(&repo, &day.id));
    }
}
