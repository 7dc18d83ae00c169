//! Typed persistence interface for the plan hierarchy.
//!
//! The `Repository` trait is the only way the engines touch stored data.
//! `MemoryRepository` is the in-process implementation; the stores in
//! `store.rs` snapshot it to disk and run transactions against a copy.

use crate::{Day, Error, Movelap, Moveframe, Plan, Result, Session, Week};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CRUD and query operations per entity
///
/// Listing methods return children in positional order (week number, date,
/// session number, letter, repetition number). Deletes cascade to children.
pub trait Repository {
    fn plan(&self, id: &str) -> Result<Plan>;
    fn plans_of_user(&self, user_id: &str) -> Vec<Plan>;
    fn insert_plan(&mut self, plan: Plan) -> Result<()>;
    fn update_plan(&mut self, plan: Plan) -> Result<()>;
    fn delete_plan(&mut self, id: &str) -> Result<()>;

    fn week(&self, id: &str) -> Result<Week>;
    fn weeks_of_plan(&self, plan_id: &str) -> Vec<Week>;
    fn insert_week(&mut self, week: Week) -> Result<()>;
    fn update_week(&mut self, week: Week) -> Result<()>;
    fn delete_week(&mut self, id: &str) -> Result<()>;

    fn day(&self, id: &str) -> Result<Day>;
    fn days_of_week(&self, week_id: &str) -> Vec<Day>;
    fn day_on_date(&self, user_id: &str, date: NaiveDate) -> Option<Day>;
    fn insert_day(&mut self, day: Day) -> Result<()>;
    fn update_day(&mut self, day: Day) -> Result<()>;
    fn delete_day(&mut self, id: &str) -> Result<()>;

    fn session(&self, id: &str) -> Result<Session>;
    fn sessions_of_day(&self, day_id: &str) -> Vec<Session>;
    fn insert_session(&mut self, session: Session) -> Result<()>;
    fn update_session(&mut self, session: Session) -> Result<()>;
    fn delete_session(&mut self, id: &str) -> Result<()>;

    fn moveframe(&self, id: &str) -> Result<Moveframe>;
    fn moveframes_of_session(&self, session_id: &str) -> Vec<Moveframe>;
    fn insert_moveframe(&mut self, moveframe: Moveframe) -> Result<()>;
    fn update_moveframe(&mut self, moveframe: Moveframe) -> Result<()>;
    fn delete_moveframe(&mut self, id: &str) -> Result<()>;

    fn movelap(&self, id: &str) -> Result<Movelap>;
    fn movelaps_of_moveframe(&self, moveframe_id: &str) -> Vec<Movelap>;
    fn insert_movelap(&mut self, movelap: Movelap) -> Result<()>;
    fn update_movelap(&mut self, movelap: Movelap) -> Result<()>;
    fn delete_movelap(&mut self, id: &str) -> Result<()>;

    /// All moveframes of a day, across its sessions, in session then letter order
    fn moveframes_of_day(&self, day_id: &str) -> Vec<Moveframe> {
        self.sessions_of_day(day_id)
            .iter()
            .flat_map(|s| self.moveframes_of_session(&s.id))
            .collect()
    }

    /// Increment a day's version after a mutation of its subtree
    fn touch_day(&mut self, day_id: &str) -> Result<()> {
        let mut day = self.day(day_id)?;
        day.version += 1;
        self.update_day(day)
    }
}

/// In-memory repository backed by ordered maps
///
/// Serializable so the file store can snapshot it as a whole.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryRepository {
    #[serde(default)]
    plans: BTreeMap<String, Plan>,
    #[serde(default)]
    weeks: BTreeMap<String, Week>,
    #[serde(default)]
    days: BTreeMap<String, Day>,
    #[serde(default)]
    sessions: BTreeMap<String, Session>,
    #[serde(default)]
    moveframes: BTreeMap<String, Moveframe>,
    #[serde(default)]
    movelaps: BTreeMap<String, Movelap>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities, for diagnostics
    pub fn entity_count(&self) -> usize {
        self.plans.len()
            + self.weeks.len()
            + self.days.len()
            + self.sessions.len()
            + self.moveframes.len()
            + self.movelaps.len()
    }

    fn check_date_free(&self, day: &Day) -> Result<()> {
        let clash = self
            .days
            .values()
            .any(|d| d.id != day.id && d.user_id == day.user_id && d.date == day.date);
        if clash {
            return Err(Error::Conflict(format!(
                "User {} already has a day on {}",
                day.user_id, day.date
            )));
        }
        Ok(())
    }
}

fn fetch<T: Clone>(map: &BTreeMap<String, T>, entity: &'static str, id: &str) -> Result<T> {
    map.get(id)
        .cloned()
        .ok_or_else(|| Error::not_found(entity, id))
}

fn insert_new<T>(
    map: &mut BTreeMap<String, T>,
    entity: &'static str,
    id: &str,
    value: T,
) -> Result<()> {
    if map.contains_key(id) {
        return Err(Error::Conflict(format!("{} {} already exists", entity, id)));
    }
    map.insert(id.to_string(), value);
    Ok(())
}

fn replace_existing<T>(
    map: &mut BTreeMap<String, T>,
    entity: &'static str,
    id: &str,
    value: T,
) -> Result<()> {
    match map.get_mut(id) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(Error::not_found(entity, id)),
    }
}

impl Repository for MemoryRepository {
    fn plan(&self, id: &str) -> Result<Plan> {
        fetch(&self.plans, "Plan", id)
    }

    fn plans_of_user(&self, user_id: &str) -> Vec<Plan> {
        let mut plans: Vec<Plan> = self
            .plans
            .values()
            .filter(|p| p.user_id == user_id || p.coaches.contains(user_id))
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        plans
    }

    fn insert_plan(&mut self, plan: Plan) -> Result<()> {
        let id = plan.id.clone();
        insert_new(&mut self.plans, "Plan", &id, plan)
    }

    fn update_plan(&mut self, plan: Plan) -> Result<()> {
        let id = plan.id.clone();
        replace_existing(&mut self.plans, "Plan", &id, plan)
    }

    fn delete_plan(&mut self, id: &str) -> Result<()> {
        self.plan(id)?;
        for week in self.weeks_of_plan(id) {
            self.delete_week(&week.id)?;
        }
        self.plans.remove(id);
        Ok(())
    }

    fn week(&self, id: &str) -> Result<Week> {
        fetch(&self.weeks, "Week", id)
    }

    fn weeks_of_plan(&self, plan_id: &str) -> Vec<Week> {
        let mut weeks: Vec<Week> = self
            .weeks
            .values()
            .filter(|w| w.plan_id == plan_id)
            .cloned()
            .collect();
        weeks.sort_by_key(|w| w.week_number);
        weeks
    }

    fn insert_week(&mut self, week: Week) -> Result<()> {
        self.plan(&week.plan_id)?;
        let id = week.id.clone();
        insert_new(&mut self.weeks, "Week", &id, week)
    }

    fn update_week(&mut self, week: Week) -> Result<()> {
        self.plan(&week.plan_id)?;
        let id = week.id.clone();
        replace_existing(&mut self.weeks, "Week", &id, week)
    }

    fn delete_week(&mut self, id: &str) -> Result<()> {
        self.week(id)?;
        for day in self.days_of_week(id) {
            self.delete_day(&day.id)?;
        }
        self.weeks.remove(id);
        Ok(())
    }

    fn day(&self, id: &str) -> Result<Day> {
        fetch(&self.days, "Day", id)
    }

    fn days_of_week(&self, week_id: &str) -> Vec<Day> {
        let mut days: Vec<Day> = self
            .days
            .values()
            .filter(|d| d.week_id == week_id)
            .cloned()
            .collect();
        days.sort_by_key(|d| d.date);
        days
    }

    fn day_on_date(&self, user_id: &str, date: NaiveDate) -> Option<Day> {
        self.days
            .values()
            .find(|d| d.user_id == user_id && d.date == date)
            .cloned()
    }

    fn insert_day(&mut self, day: Day) -> Result<()> {
        self.week(&day.week_id)?;
        self.check_date_free(&day)?;
        let id = day.id.clone();
        insert_new(&mut self.days, "Day", &id, day)
    }

    fn update_day(&mut self, day: Day) -> Result<()> {
        self.week(&day.week_id)?;
        self.check_date_free(&day)?;
        let id = day.id.clone();
        replace_existing(&mut self.days, "Day", &id, day)
    }

    fn delete_day(&mut self, id: &str) -> Result<()> {
        self.day(id)?;
        for session in self.sessions_of_day(id) {
            self.delete_session(&session.id)?;
        }
        self.days.remove(id);
        Ok(())
    }

    fn session(&self, id: &str) -> Result<Session> {
        fetch(&self.sessions, "Session", id)
    }

    fn sessions_of_day(&self, day_id: &str) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .values()
            .filter(|s| s.day_id == day_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.session_number);
        sessions
    }

    fn insert_session(&mut self, session: Session) -> Result<()> {
        self.day(&session.day_id)?;
        let id = session.id.clone();
        insert_new(&mut self.sessions, "Session", &id, session)
    }

    fn update_session(&mut self, session: Session) -> Result<()> {
        self.day(&session.day_id)?;
        let id = session.id.clone();
        replace_existing(&mut self.sessions, "Session", &id, session)
    }

    fn delete_session(&mut self, id: &str) -> Result<()> {
        self.session(id)?;
        for moveframe in self.moveframes_of_session(id) {
            self.delete_moveframe(&moveframe.id)?;
        }
        self.sessions.remove(id);
        Ok(())
    }

    fn moveframe(&self, id: &str) -> Result<Moveframe> {
        fetch(&self.moveframes, "Moveframe", id)
    }

    fn moveframes_of_session(&self, session_id: &str) -> Vec<Moveframe> {
        let mut moveframes: Vec<Moveframe> = self
            .moveframes
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        moveframes.sort_by_key(|m| m.letter);
        moveframes
    }

    fn insert_moveframe(&mut self, moveframe: Moveframe) -> Result<()> {
        self.session(&moveframe.session_id)?;
        let id = moveframe.id.clone();
        insert_new(&mut self.moveframes, "Moveframe", &id, moveframe)
    }

    fn update_moveframe(&mut self, moveframe: Moveframe) -> Result<()> {
        self.session(&moveframe.session_id)?;
        let id = moveframe.id.clone();
        replace_existing(&mut self.moveframes, "Moveframe", &id, moveframe)
    }

    fn delete_moveframe(&mut self, id: &str) -> Result<()> {
        self.moveframe(id)?;
        self.movelaps.retain(|_, lap| lap.moveframe_id != id);
        self.moveframes.remove(id);
        Ok(())
    }

    fn movelap(&self, id: &str) -> Result<Movelap> {
        fetch(&self.movelaps, "Movelap", id)
    }

    fn movelaps_of_moveframe(&self, moveframe_id: &str) -> Vec<Movelap> {
        let mut movelaps: Vec<Movelap> = self
            .movelaps
            .values()
            .filter(|l| l.moveframe_id == moveframe_id)
            .cloned()
            .collect();
        movelaps.sort_by_key(|l| l.repetition_number);
        movelaps
    }

    fn insert_movelap(&mut self, movelap: Movelap) -> Result<()> {
        self.moveframe(&movelap.moveframe_id)?;
        let id = movelap.id.clone();
        insert_new(&mut self.movelaps, "Movelap", &id, movelap)
    }

    fn update_movelap(&mut self, movelap: Movelap) -> Result<()> {
        self.moveframe(&movelap.moveframe_id)?;
        let id = movelap.id.clone();
        replace_existing(&mut self.movelaps, "Movelap", &id, movelap)
    }

    fn delete_movelap(&mut self, id: &str) -> Result<()> {
        self.movelap(id)?;
        self.movelaps.remove(id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders shared by the engine tests.

    use super::*;
    use crate::{zone, MoveframeType, PlanType, SessionStatus, Sport, WorkType};
    use std::collections::BTreeSet;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn plan(repo: &mut MemoryRepository, user: &str, plan_type: PlanType) -> Plan {
        let plan = Plan {
            id: crate::new_id(),
            user_id: user.into(),
            name: format!("{:?}", plan_type),
            plan_type,
            coaches: BTreeSet::new(),
        };
        repo.insert_plan(plan.clone()).unwrap();
        plan
    }

    pub fn week(repo: &mut MemoryRepository, plan: &Plan) -> Week {
        let number = repo.weeks_of_plan(&plan.id).len() as u32 + 1;
        let week = Week {
            id: crate::new_id(),
            plan_id: plan.id.clone(),
            week_number: number,
            period_id: None,
            notes: None,
        };
        repo.insert_week(week.clone()).unwrap();
        week
    }

    pub fn day(repo: &mut MemoryRepository, week: &Week, on: NaiveDate) -> Day {
        let plan = repo.plan(&week.plan_id).unwrap();
        let day = Day {
            id: crate::new_id(),
            week_id: week.id.clone(),
            user_id: plan.user_id.clone(),
            date: on,
            day_of_week: Day::weekday_number(on),
            storage_zone: zone::zone_for(plan.plan_type),
            period_id: None,
            weather: None,
            feeling: None,
            notes: None,
            version: 0,
        };
        repo.insert_day(day.clone()).unwrap();
        day
    }

    pub fn session(repo: &mut MemoryRepository, day: &Day, number: u8) -> Session {
        let session = Session {
            id: crate::new_id(),
            day_id: day.id.clone(),
            session_number: number,
            storage_zone: day.storage_zone,
            name: Some(format!("Session {}", number)),
            code: None,
            time: None,
            location: None,
            notes: None,
            heart_rate_max: None,
            heart_rate_avg: None,
            calories: None,
            feeling: None,
            status: SessionStatus::PlannedFuture,
        };
        repo.insert_session(session.clone()).unwrap();
        session
    }

    pub fn moveframe(
        repo: &mut MemoryRepository,
        session: &Session,
        letter: char,
        sport: Sport,
        work_type: WorkType,
    ) -> Moveframe {
        let moveframe = Moveframe {
            id: crate::new_id(),
            session_id: session.id.clone(),
            letter,
            sport,
            kind: MoveframeType::Work,
            work_type,
            section_id: None,
            description: None,
        };
        repo.insert_moveframe(moveframe.clone()).unwrap();
        moveframe
    }

    pub fn movelap(repo: &mut MemoryRepository, moveframe: &Moveframe, number: u32) -> Movelap {
        let movelap = crate::NewMovelap::distance(100).into_movelap(&moveframe.id, number);
        repo.insert_movelap(movelap.clone()).unwrap();
        movelap
    }
}
