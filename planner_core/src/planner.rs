//! Authorized, transactional entry point for every planner operation.
//!
//! A `Planner` binds a store to the acting user and the reference date.
//! Each mutation checks access, runs inside one store transaction, and is
//! appended to the operation journal once committed.

use crate::coordinator;
use crate::hierarchy;
use crate::identity::{self, ensure_can_edit, ensure_owner};
use crate::journal::{JournalEntry, OperationSink};
use crate::repository::{MemoryRepository, Repository};
use crate::store::UnitOfWork;
use crate::totals::{self, Totals};
use crate::work_role;
use crate::{
    CompletionReport, Day, DayPatch, DayTree, Error, Movelap, MovelapStatus, Moveframe,
    MoveframePatch, MoveframeTree, NewDay, NewMovelap, NewMoveframe, NewSession, NewWeek, Placement,
    Plan, PlanTree, PlanType, Result, Session, SessionPatch, SessionTree, Week, WeekTree, WorkType,
};
use chrono::NaiveDate;

pub struct Planner<S: UnitOfWork> {
    store: S,
    actor: String,
    today: NaiveDate,
    journal: Option<Box<dyn OperationSink>>,
}

fn check_version<R: Repository>(repo: &R, day_id: &str, expected: Option<u64>) -> Result<()> {
    if let Some(expected) = expected {
        let day = repo.day(day_id)?;
        if day.version != expected {
            return Err(Error::Conflict(format!(
                "Day {} is at version {}, expected {}",
                day_id, day.version, expected
            )));
        }
    }
    Ok(())
}

fn edit_week<R: Repository>(repo: &R, week_id: &str, actor: &str) -> Result<()> {
    ensure_can_edit(&identity::plan_of_week(repo, week_id)?, actor)
}

fn edit_session<R: Repository>(repo: &R, session_id: &str, actor: &str) -> Result<()> {
    ensure_can_edit(&identity::plan_of_session(repo, session_id)?, actor)
}

fn edit_moveframe<R: Repository>(repo: &R, moveframe_id: &str, actor: &str) -> Result<()> {
    ensure_can_edit(&identity::plan_of_moveframe(repo, moveframe_id)?, actor)
}

fn edit_movelap<R: Repository>(repo: &R, movelap_id: &str, actor: &str) -> Result<()> {
    ensure_can_edit(&identity::plan_of_movelap(repo, movelap_id)?, actor)
}

impl<S: UnitOfWork> Planner<S> {
    pub fn new(store: S, actor: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            store,
            actor: actor.into(),
            today,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Box<dyn OperationSink>) -> Self {
        self.journal = Some(journal);
        self
    }

    fn query<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&MemoryRepository, &str) -> Result<T>,
    {
        let actor = self.actor.as_str();
        self.store.read(|repo| f(repo, actor))
    }

    /// Run one mutation as a transaction and journal it on success
    fn mutate<T, F>(&mut self, operation: &str, affected: &[&str], f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryRepository, &str, NaiveDate) -> Result<T>,
    {
        let actor = self.actor.clone();
        let today = self.today;
        let value = self.store.transact(|repo| f(repo, &actor, today))?;

        if let Some(journal) = self.journal.as_mut() {
            let entry = JournalEntry::new(
                operation,
                actor.as_str(),
                affected.iter().map(|id| id.to_string()).collect(),
            );
            if let Err(e) = journal.append(&entry) {
                tracing::warn!("Failed to journal {}: {}", operation, e);
            }
        }
        Ok(value)
    }

    // ========================================================================
    // Plans
    // ========================================================================

    /// Plans the actor owns or coaches
    pub fn plans(&self) -> Result<Vec<Plan>> {
        self.query(|repo, actor| Ok(repo.plans_of_user(actor)))
    }

    pub fn create_plan(&mut self, name: &str, plan_type: PlanType) -> Result<Plan> {
        self.mutate("plan.create", &[], |repo, actor, _| {
            hierarchy::create_plan(repo, actor, name, plan_type)
        })
    }

    pub fn plan(&self, plan_id: &str) -> Result<PlanTree> {
        self.query(|repo, actor| {
            ensure_can_edit(&repo.plan(plan_id)?, actor)?;
            hierarchy::plan_tree(repo, plan_id)
        })
    }

    pub fn rename_plan(&mut self, plan_id: &str, name: &str) -> Result<Plan> {
        self.mutate("plan.rename", &[plan_id], |repo, actor, _| {
            ensure_can_edit(&repo.plan(plan_id)?, actor)?;
            hierarchy::rename_plan(repo, plan_id, name)
        })
    }

    pub fn delete_plan(&mut self, plan_id: &str) -> Result<()> {
        self.mutate("plan.delete", &[plan_id], |repo, actor, _| {
            ensure_owner(&repo.plan(plan_id)?, actor)?;
            hierarchy::delete_plan(repo, plan_id)
        })
    }

    pub fn grant_coach(&mut self, plan_id: &str, coach: &str) -> Result<Plan> {
        self.mutate("plan.grant_coach", &[plan_id], |repo, actor, _| {
            ensure_owner(&repo.plan(plan_id)?, actor)?;
            hierarchy::set_coach(repo, plan_id, coach, true)
        })
    }

    pub fn revoke_coach(&mut self, plan_id: &str, coach: &str) -> Result<Plan> {
        self.mutate("plan.revoke_coach", &[plan_id], |repo, actor, _| {
            ensure_owner(&repo.plan(plan_id)?, actor)?;
            hierarchy::set_coach(repo, plan_id, coach, false)
        })
    }

    /// Re-derive planned statuses against today; returns sessions changed
    pub fn refresh_statuses(&mut self, plan_id: &str) -> Result<usize> {
        self.mutate("plan.refresh", &[plan_id], |repo, actor, today| {
            ensure_can_edit(&repo.plan(plan_id)?, actor)?;
            crate::status::refresh_plan(repo, plan_id, today)
        })
    }

    // ========================================================================
    // Weeks
    // ========================================================================

    pub fn add_week(&mut self, plan_id: &str, input: NewWeek) -> Result<Week> {
        self.mutate("week.add", &[plan_id], |repo, actor, _| {
            ensure_can_edit(&repo.plan(plan_id)?, actor)?;
            hierarchy::add_week(repo, plan_id, input)
        })
    }

    pub fn week(&self, week_id: &str) -> Result<WeekTree> {
        self.query(|repo, actor| {
            edit_week(repo, week_id, actor)?;
            hierarchy::week_tree(repo, week_id)
        })
    }

    pub fn update_week(&mut self, week_id: &str, patch: NewWeek) -> Result<Week> {
        self.mutate("week.update", &[week_id], |repo, actor, _| {
            edit_week(repo, week_id, actor)?;
            hierarchy::update_week(repo, week_id, patch)
        })
    }

    pub fn delete_week(&mut self, week_id: &str) -> Result<()> {
        self.mutate("week.delete", &[week_id], |repo, actor, _| {
            edit_week(repo, week_id, actor)?;
            hierarchy::delete_week(repo, week_id)
        })
    }

    pub fn copy_week(
        &mut self,
        week_id: &str,
        target_plan_id: &str,
        shift_days: i64,
    ) -> Result<WeekTree> {
        self.mutate("week.copy", &[week_id, target_plan_id], |repo, actor, _| {
            edit_week(repo, week_id, actor)?;
            ensure_can_edit(&repo.plan(target_plan_id)?, actor)?;
            coordinator::copy_week(repo, week_id, target_plan_id, shift_days)
        })
    }

    pub fn move_week(&mut self, week_id: &str, position: u32) -> Result<Vec<Week>> {
        self.mutate("week.move", &[week_id], |repo, actor, _| {
            edit_week(repo, week_id, actor)?;
            coordinator::move_week(repo, week_id, position)
        })
    }

    pub fn week_totals(&self, week_id: &str) -> Result<Totals> {
        self.query(|repo, actor| {
            edit_week(repo, week_id, actor)?;
            totals::week_totals(repo, week_id)
        })
    }

    // ========================================================================
    // Days
    // ========================================================================

    pub fn add_day(&mut self, week_id: &str, input: NewDay) -> Result<Day> {
        self.mutate("day.add", &[week_id], |repo, actor, _| {
            edit_week(repo, week_id, actor)?;
            hierarchy::add_day(repo, week_id, input)
        })
    }

    pub fn day(&self, day_id: &str) -> Result<DayTree> {
        self.query(|repo, actor| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            hierarchy::day_tree(repo, day_id)
        })
    }

    pub fn update_day(&mut self, day_id: &str, patch: DayPatch) -> Result<Day> {
        self.mutate("day.update", &[day_id], |repo, actor, _| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            hierarchy::update_day(repo, day_id, patch)
        })
    }

    pub fn delete_day(&mut self, day_id: &str) -> Result<()> {
        self.mutate("day.delete", &[day_id], |repo, actor, _| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            hierarchy::delete_day(repo, day_id)
        })
    }

    pub fn copy_day(&mut self, day_id: &str, target_week_id: &str, date: NaiveDate) -> Result<DayTree> {
        self.mutate("day.copy", &[day_id, target_week_id], |repo, actor, _| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            edit_week(repo, target_week_id, actor)?;
            coordinator::copy_day(repo, day_id, target_week_id, date)
        })
    }

    pub fn move_day(&mut self, day_id: &str, target_week_id: &str, date: NaiveDate) -> Result<DayTree> {
        self.mutate("day.move", &[day_id, target_week_id], |repo, actor, _| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            edit_week(repo, target_week_id, actor)?;
            coordinator::move_day(repo, day_id, target_week_id, date)
        })
    }

    /// Copy one of the actor's days into a week they coach
    pub fn assign_day(
        &mut self,
        day_id: &str,
        target_week_id: &str,
        date: NaiveDate,
    ) -> Result<DayTree> {
        self.mutate("day.assign", &[day_id, target_week_id], |repo, actor, today| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            edit_week(repo, target_week_id, actor)?;
            coordinator::assign_day(repo, day_id, target_week_id, date, today)
        })
    }

    pub fn day_totals(&self, day_id: &str) -> Result<Totals> {
        self.query(|repo, actor| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            totals::day_totals(repo, day_id)
        })
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub fn add_session(&mut self, day_id: &str, input: NewSession) -> Result<Session> {
        self.mutate("session.add", &[day_id], |repo, actor, _| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            hierarchy::add_session(repo, day_id, input)
        })
    }

    pub fn session(&self, session_id: &str) -> Result<SessionTree> {
        self.query(|repo, actor| {
            edit_session(repo, session_id, actor)?;
            hierarchy::session_tree(repo, session_id)
        })
    }

    pub fn update_session(&mut self, session_id: &str, patch: SessionPatch) -> Result<Session> {
        self.mutate("session.update", &[session_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            hierarchy::update_session(repo, session_id, patch)
        })
    }

    pub fn complete_session(
        &mut self,
        session_id: &str,
        report: &CompletionReport,
    ) -> Result<Session> {
        self.mutate("session.complete", &[session_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            hierarchy::complete_session(repo, session_id, report)
        })
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<()> {
        self.mutate("session.delete", &[session_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            hierarchy::delete_session(repo, session_id)
        })
    }

    pub fn copy_session(&mut self, session_id: &str, target_day_id: &str) -> Result<SessionTree> {
        self.mutate("session.copy", &[session_id, target_day_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            identity::ensure_can_edit_day(repo, target_day_id, actor)?;
            coordinator::copy_session(repo, session_id, target_day_id)
        })
    }

    pub fn move_session(&mut self, session_id: &str, target_day_id: &str) -> Result<SessionTree> {
        self.mutate("session.move", &[session_id, target_day_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            identity::ensure_can_edit_day(repo, target_day_id, actor)?;
            coordinator::move_session(repo, session_id, target_day_id)
        })
    }

    pub fn switch_sessions(
        &mut self,
        first_id: &str,
        second_id: &str,
    ) -> Result<(SessionTree, SessionTree)> {
        self.mutate("session.switch", &[first_id, second_id], |repo, actor, _| {
            edit_session(repo, first_id, actor)?;
            edit_session(repo, second_id, actor)?;
            coordinator::switch_sessions(repo, first_id, second_id)
        })
    }

    pub fn move_session_to_index(
        &mut self,
        session_id: &str,
        target_day_id: &str,
        index: usize,
    ) -> Result<Vec<Session>> {
        self.mutate("session.move_to", &[session_id, target_day_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            identity::ensure_can_edit_day(repo, target_day_id, actor)?;
            coordinator::move_session_to_index(repo, session_id, target_day_id, index)
        })
    }

    /// Renumber a day's sessions; fails with Conflict on a stale version
    pub fn reorder_sessions(
        &mut self,
        day_id: &str,
        order: &[String],
        expected_version: Option<u64>,
    ) -> Result<Vec<Session>> {
        self.mutate("session.reorder", &[day_id], |repo, actor, _| {
            identity::ensure_can_edit_day(repo, day_id, actor)?;
            check_version(repo, day_id, expected_version)?;
            hierarchy::reorder_sessions(repo, day_id, order)
        })
    }

    // ========================================================================
    // Moveframes
    // ========================================================================

    pub fn add_moveframe(&mut self, session_id: &str, input: NewMoveframe) -> Result<MoveframeTree> {
        self.mutate("moveframe.add", &[session_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            let moveframe = hierarchy::add_moveframe(repo, session_id, input)?;
            hierarchy::moveframe_tree(repo, &moveframe.id)
        })
    }

    pub fn moveframe(&self, moveframe_id: &str) -> Result<MoveframeTree> {
        self.query(|repo, actor| {
            edit_moveframe(repo, moveframe_id, actor)?;
            hierarchy::moveframe_tree(repo, moveframe_id)
        })
    }

    pub fn update_moveframe(
        &mut self,
        moveframe_id: &str,
        patch: MoveframePatch,
    ) -> Result<MoveframeTree> {
        self.mutate("moveframe.update", &[moveframe_id], |repo, actor, _| {
            edit_moveframe(repo, moveframe_id, actor)?;
            hierarchy::update_moveframe(repo, moveframe_id, patch)?;
            hierarchy::moveframe_tree(repo, moveframe_id)
        })
    }

    pub fn delete_moveframe(&mut self, moveframe_id: &str) -> Result<()> {
        self.mutate("moveframe.delete", &[moveframe_id], |repo, actor, _| {
            edit_moveframe(repo, moveframe_id, actor)?;
            hierarchy::delete_moveframe(repo, moveframe_id)
        })
    }

    /// Change a role; returns every moveframe of the day afterwards
    pub fn set_work_type(&mut self, moveframe_id: &str, role: WorkType) -> Result<Vec<Moveframe>> {
        self.mutate("moveframe.role", &[moveframe_id], |repo, actor, _| {
            edit_moveframe(repo, moveframe_id, actor)?;
            work_role::set_work_type(repo, moveframe_id, role)
        })
    }

    pub fn copy_moveframe(
        &mut self,
        moveframe_id: &str,
        target_session_id: &str,
        placement: Placement,
    ) -> Result<MoveframeTree> {
        self.mutate(
            "moveframe.copy",
            &[moveframe_id, target_session_id],
            |repo, actor, _| {
                edit_moveframe(repo, moveframe_id, actor)?;
                edit_session(repo, target_session_id, actor)?;
                coordinator::copy_moveframe(repo, moveframe_id, target_session_id, placement)
            },
        )
    }

    pub fn move_moveframe(
        &mut self,
        moveframe_id: &str,
        target_session_id: &str,
        placement: Placement,
    ) -> Result<MoveframeTree> {
        self.mutate(
            "moveframe.move",
            &[moveframe_id, target_session_id],
            |repo, actor, _| {
                edit_moveframe(repo, moveframe_id, actor)?;
                edit_session(repo, target_session_id, actor)?;
                coordinator::move_moveframe(repo, moveframe_id, target_session_id, placement)
            },
        )
    }

    pub fn duplicate_moveframe(
        &mut self,
        moveframe_id: &str,
        target_session_id: Option<&str>,
    ) -> Result<MoveframeTree> {
        self.mutate("moveframe.duplicate", &[moveframe_id], |repo, actor, _| {
            edit_moveframe(repo, moveframe_id, actor)?;
            if let Some(target) = target_session_id {
                edit_session(repo, target, actor)?;
            }
            coordinator::duplicate_moveframe(repo, moveframe_id, target_session_id)
        })
    }

    pub fn move_moveframe_to_index(
        &mut self,
        moveframe_id: &str,
        target_session_id: &str,
        index: usize,
    ) -> Result<Vec<Moveframe>> {
        self.mutate(
            "moveframe.move_to",
            &[moveframe_id, target_session_id],
            |repo, actor, _| {
                edit_moveframe(repo, moveframe_id, actor)?;
                edit_session(repo, target_session_id, actor)?;
                coordinator::move_moveframe_to_index(repo, moveframe_id, target_session_id, index)
            },
        )
    }

    /// Re-letter a session's moveframes; fails with Conflict on a stale
    /// day version
    pub fn reorder_moveframes(
        &mut self,
        session_id: &str,
        order: &[String],
        expected_version: Option<u64>,
    ) -> Result<Vec<Moveframe>> {
        self.mutate("moveframe.reorder", &[session_id], |repo, actor, _| {
            edit_session(repo, session_id, actor)?;
            let day_id = repo.session(session_id)?.day_id;
            check_version(repo, &day_id, expected_version)?;
            hierarchy::reorder_moveframes(repo, session_id, order)
        })
    }

    // ========================================================================
    // Movelaps
    // ========================================================================

    pub fn add_movelap(
        &mut self,
        moveframe_id: &str,
        input: NewMovelap,
        position: Option<usize>,
    ) -> Result<Movelap> {
        self.mutate("movelap.add", &[moveframe_id], |repo, actor, _| {
            edit_moveframe(repo, moveframe_id, actor)?;
            hierarchy::add_movelap(repo, moveframe_id, input, position)
        })
    }

    pub fn movelap(&self, movelap_id: &str) -> Result<Movelap> {
        self.query(|repo, actor| {
            edit_movelap(repo, movelap_id, actor)?;
            repo.movelap(movelap_id)
        })
    }

    pub fn update_movelap(&mut self, movelap_id: &str, input: NewMovelap) -> Result<Movelap> {
        self.mutate("movelap.update", &[movelap_id], |repo, actor, _| {
            edit_movelap(repo, movelap_id, actor)?;
            hierarchy::update_movelap(repo, movelap_id, input)
        })
    }

    pub fn set_movelap_status(&mut self, movelap_id: &str, status: MovelapStatus) -> Result<Movelap> {
        self.mutate("movelap.status", &[movelap_id], |repo, actor, _| {
            edit_movelap(repo, movelap_id, actor)?;
            hierarchy::set_movelap_status(repo, movelap_id, status)
        })
    }

    pub fn set_movelap_flags(
        &mut self,
        movelap_id: &str,
        skipped: Option<bool>,
        disabled: Option<bool>,
    ) -> Result<Movelap> {
        self.mutate("movelap.flags", &[movelap_id], |repo, actor, _| {
            edit_movelap(repo, movelap_id, actor)?;
            hierarchy::set_movelap_flags(repo, movelap_id, skipped, disabled)
        })
    }

    pub fn delete_movelap(&mut self, movelap_id: &str) -> Result<()> {
        self.mutate("movelap.delete", &[movelap_id], |repo, actor, _| {
            edit_movelap(repo, movelap_id, actor)?;
            hierarchy::delete_movelap(repo, movelap_id)
        })
    }
}
