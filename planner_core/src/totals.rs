//! Per-sport summaries for days and weeks.
//!
//! Computed at read time and never stored. Annotation moveframes and
//! disabled movelaps do not count.

use crate::repository::Repository;
use crate::{MoveframeType, MovelapStatus, Result, Sport};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Distinct sports at which stretching drops out of a day's summary
pub const STRETCHING_EXCLUSION_SPORTS: usize = 4;

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct SportTotals {
    pub moveframes: u32,
    pub movelaps: u32,
    pub distance_m: u64,
    pub time_seconds: u64,
}

impl SportTotals {
    fn absorb(&mut self, other: &SportTotals) {
        self.moveframes += other.moveframes;
        self.movelaps += other.movelaps;
        self.distance_m += other.distance_m;
        self.time_seconds += other.time_seconds;
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Totals {
    /// Id of the day or week summarized
    pub id: String,
    pub sports: BTreeMap<Sport, SportTotals>,
    pub stretching_excluded: bool,
}

/// Whether stretching is left out for a day practicing `sports`
pub fn excludes_stretching(sports: &BTreeSet<Sport>) -> bool {
    sports.len() >= STRETCHING_EXCLUSION_SPORTS
}

pub fn day_totals<R: Repository>(repo: &R, day_id: &str) -> Result<Totals> {
    repo.day(day_id)?;

    let mut sports: BTreeMap<Sport, SportTotals> = BTreeMap::new();
    for moveframe in repo.moveframes_of_day(day_id) {
        if moveframe.kind == MoveframeType::Annotation {
            continue;
        }
        let entry = sports.entry(moveframe.sport).or_default();
        entry.moveframes += 1;
        for lap in repo.movelaps_of_moveframe(&moveframe.id) {
            if lap.is_disabled || lap.status == MovelapStatus::Disabled {
                continue;
            }
            entry.movelaps += 1;
            entry.distance_m += u64::from(lap.distance_m.unwrap_or(0));
            entry.time_seconds += u64::from(lap.time_seconds.unwrap_or(0));
        }
    }

    let present: BTreeSet<Sport> = sports.keys().copied().collect();
    let stretching_excluded = excludes_stretching(&present) && present.contains(&Sport::Stretching);
    if stretching_excluded {
        sports.remove(&Sport::Stretching);
    }

    Ok(Totals {
        id: day_id.to_string(),
        sports,
        stretching_excluded,
    })
}

/// Sum of the week's day totals; the stretching rule applies per day
pub fn week_totals<R: Repository>(repo: &R, week_id: &str) -> Result<Totals> {
    repo.week(week_id)?;

    let mut sports: BTreeMap<Sport, SportTotals> = BTreeMap::new();
    let mut stretching_excluded = false;
    for day in repo.days_of_week(week_id) {
        let daily = day_totals(repo, &day.id)?;
        stretching_excluded |= daily.stretching_excluded;
        for (sport, totals) in &daily.sports {
            sports.entry(*sport).or_default().absorb(totals);
        }
    }

    Ok(Totals {
        id: week_id.to_string(),
        sports,
        stretching_excluded,
    })
}
