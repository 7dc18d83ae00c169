//! Caller identity and ownership checks.
//!
//! Credentials are resolved by an `IdentityProvider`; the resolved user id
//! is then checked against the plan that owns the target entity.

use crate::config::IdentityConfig;
use crate::repository::Repository;
use crate::{Error, Plan, Result};
use std::collections::BTreeMap;

/// Resolves a bearer credential to a user id
pub trait IdentityProvider {
    fn resolve(&self, credential: &str) -> Result<String>;
}

/// Fixed token table, usually loaded from the config file
#[derive(Clone, Debug, Default)]
pub struct StaticTokens {
    tokens: BTreeMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(config.tokens.clone())
    }
}

impl IdentityProvider for StaticTokens {
    fn resolve(&self, credential: &str) -> Result<String> {
        let token = credential
            .strip_prefix("Bearer ")
            .unwrap_or(credential)
            .trim();
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Unknown credential".into()))
    }
}

/// Owner or a coach the owner granted access to
pub fn ensure_can_edit(plan: &Plan, actor: &str) -> Result<()> {
    if plan.user_id == actor || plan.coaches.contains(actor) {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "{} has no access to plan {}",
            actor, plan.id
        )))
    }
}

/// Owner only: plan deletion and coach grants
pub fn ensure_owner(plan: &Plan, actor: &str) -> Result<()> {
    if plan.user_id == actor {
        Ok(())
    } else {
        Err(Error::Unauthorized(format!(
            "{} does not own plan {}",
            actor, plan.id
        )))
    }
}

pub fn plan_of_week<R: Repository>(repo: &R, week_id: &str) -> Result<Plan> {
    let week = repo.week(week_id)?;
    repo.plan(&week.plan_id)
}

pub fn plan_of_day<R: Repository>(repo: &R, day_id: &str) -> Result<Plan> {
    let day = repo.day(day_id)?;
    plan_of_week(repo, &day.week_id)
}

pub fn plan_of_session<R: Repository>(repo: &R, session_id: &str) -> Result<Plan> {
    let session = repo.session(session_id)?;
    plan_of_day(repo, &session.day_id)
}

pub fn plan_of_moveframe<R: Repository>(repo: &R, moveframe_id: &str) -> Result<Plan> {
    let moveframe = repo.moveframe(moveframe_id)?;
    plan_of_session(repo, &moveframe.session_id)
}

pub fn plan_of_movelap<R: Repository>(repo: &R, movelap_id: &str) -> Result<Plan> {
    let movelap = repo.movelap(movelap_id)?;
    plan_of_moveframe(repo, &movelap.moveframe_id)
}

/// Day edits go through the denormalized owner before touching the plan
pub fn ensure_can_edit_day<R: Repository>(repo: &R, day_id: &str, actor: &str) -> Result<()> {
    let day = repo.day(day_id)?;
    if day.user_id == actor {
        return Ok(());
    }
    ensure_can_edit(&plan_of_week(repo, &day.week_id)?, actor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::*;
    use crate::repository::MemoryRepository;
    use crate::PlanType;

    #[test]
    fn test_static_tokens_resolve() {
        let mut tokens = BTreeMap::new();
        tokens.insert("t-123".to_string(), "athlete-1".to_string());
        let provider = StaticTokens::new(tokens);

        assert_eq!(provider.resolve("t-123").unwrap(), "athlete-1");
        assert_eq!(provider.resolve("Bearer t-123").unwrap(), "athlete-1");
        assert!(matches!(
            provider.resolve("nope"),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_coach_can_edit_but_not_own() {
        let mut repo = MemoryRepository::new();
        let mut plan = plan(&mut repo, "athlete", PlanType::YearlyPlan);
        plan.coaches.insert("coach".into());

        assert!(ensure_can_edit(&plan, "athlete").is_ok());
        assert!(ensure_can_edit(&plan, "coach").is_ok());
        assert!(ensure_can_edit(&plan, "stranger").is_err());
        assert!(ensure_owner(&plan, "coach").is_err());
    }

    #[test]
    fn test_day_ownership_lookup() {
        let mut repo = MemoryRepository::new();
        let plan = plan(&mut repo, "athlete", PlanType::YearlyPlan);
        let week = week(&mut repo, &plan);
        let day = day(&mut repo, &week, date(2024, 2, 5));
        let session = session(&mut repo, &day, 1);

        assert!(ensure_can_edit_day(&repo, &day.id, "athlete").is_ok());
        assert!(matches!(
            ensure_can_edit_day(&repo, &day.id, "someone"),
            Err(Error::Unauthorized(_))
        ));
        assert_eq!(plan_of_session(&repo, &session.id).unwrap().id, plan.id);
    }
}
