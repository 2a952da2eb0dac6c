//! Growth-accounting state machine: labels each user's period-over-period
//! transitions as new, resurrected or churned.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use subscription_core::StatusLabel;

use crate::activity::ActivityTable;
use crate::grid::PeriodGrid;

/// One classified (user, period) observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifiedPeriod {
    pub is_active: bool,
    pub is_active_previous: bool,
    /// Active in any strictly earlier period.
    pub was_active: bool,
    pub status: Option<StatusLabel>,
}

/// Running per-user state. Must be fed periods in chronological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusMachine {
    previous: bool,
    ever_active: bool,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ever_active(&self) -> bool {
        self.ever_active
    }

    pub fn step(&mut self, is_active: bool) -> ClassifiedPeriod {
        let status = match (is_active, self.previous, self.ever_active) {
            (true, false, false) => Some(StatusLabel::NewActive),
            (true, false, true) => Some(StatusLabel::Resurrected),
            (false, true, _) => Some(StatusLabel::Churn),
            _ => None,
        };
        let classified = ClassifiedPeriod {
            is_active,
            is_active_previous: self.previous,
            was_active: self.ever_active,
            status,
        };
        self.previous = is_active;
        self.ever_active |= is_active;
        classified
    }
}

pub fn classify(row: &[bool]) -> Vec<ClassifiedPeriod> {
    let mut machine = StatusMachine::new();
    row.iter().map(|&is_active| machine.step(is_active)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTimeline {
    pub user_id: String,
    pub periods: Vec<ClassifiedPeriod>,
}

impl UserTimeline {
    pub fn first_active(&self) -> Option<usize> {
        self.periods.iter().position(|p| p.is_active)
    }
}

/// Flattened row of the activity table handed to presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySnapshot<'a> {
    pub user_id: &'a str,
    pub period: NaiveDate,
    pub is_active: bool,
    pub status: Option<StatusLabel>,
}

/// Classified activity for every user of one granularity. Carries the grid
/// the activity was evaluated on; every timeline has one entry per period.
#[derive(Debug, Clone, Serialize)]
pub struct StatusTable {
    #[serde(skip)]
    grid: PeriodGrid,
    users: Vec<UserTimeline>,
}

impl StatusTable {
    /// Users are independent; each row is classified sequentially.
    pub fn classify(activity: ActivityTable) -> Self {
        let (grid, users, rows) = activity.into_parts();
        let users = users
            .into_par_iter()
            .zip(rows.into_par_iter())
            .map(|(user_id, row)| UserTimeline {
                periods: classify(&row),
                user_id,
            })
            .collect();
        Self { grid, users }
    }

    pub fn grid(&self) -> &PeriodGrid {
        &self.grid
    }

    pub fn users(&self) -> &[UserTimeline] {
        &self.users
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Period-major iteration over every (user, period) pair.
    pub fn snapshots(&self) -> impl Iterator<Item = ActivitySnapshot<'_>> + '_ {
        self.grid
            .periods()
            .iter()
            .enumerate()
            .flat_map(move |(idx, &period)| {
                self.users.iter().filter_map(move |user| {
                    let observation = user.periods.get(idx)?;
                    Some(ActivitySnapshot {
                        user_id: &user.user_id,
                        period,
                        is_active: observation.is_active,
                        status: observation.status,
                    })
                })
            })
    }
}
