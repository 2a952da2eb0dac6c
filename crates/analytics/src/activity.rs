//! Per-user, per-period activity evaluation.
//!
//! A user is active at a period boundary when any of their subscriptions
//! contains that instant under `[start, end)` semantics, with an open end
//! treated as never closing. [`evaluate`] sweeps merged intervals against the
//! sorted grid; [`evaluate_cross_join`] checks every (period, subscription)
//! pair and is kept as the reference the sweep must agree with.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use subscription_core::{Dataset, SubscriptionRecord};

use crate::grid::PeriodGrid;

/// Dense user × period activity flags over the grid they were evaluated on.
/// Users are in dataset (id) order; every row has one flag per grid period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityTable {
    #[serde(skip)]
    grid: PeriodGrid,
    users: Vec<String>,
    rows: Vec<Vec<bool>>,
}

impl ActivityTable {
    pub fn grid(&self) -> &PeriodGrid {
        &self.grid
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.rows
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_active(&self, user: usize, period: usize) -> bool {
        self.rows
            .get(user)
            .and_then(|row| row.get(period))
            .copied()
            .unwrap_or(false)
    }

    pub fn into_parts(self) -> (PeriodGrid, Vec<String>, Vec<Vec<bool>>) {
        (self.grid, self.users, self.rows)
    }
}

/// Half-open interval; `end = None` never closes.
#[derive(Debug, Clone, Copy)]
struct Interval {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

impl Interval {
    fn ends_at_or_before(&self, instant: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| end <= instant)
    }
}

/// Union of a user's subscriptions as sorted, disjoint intervals.
fn merged_intervals(subscriptions: &[SubscriptionRecord]) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = subscriptions
        .iter()
        .map(|s| Interval {
            start: s.start_date,
            end: s.end_date,
        })
        .collect();
    sorted.sort_by_key(|i| i.start);

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if last.end.map_or(true, |end| interval.start <= end) => {
                last.end = match (last.end, interval.end) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                };
            }
            _ => merged.push(interval),
        }
    }
    merged
}

fn sweep_user(instants: &[DateTime<Utc>], subscriptions: &[SubscriptionRecord]) -> Vec<bool> {
    let intervals = merged_intervals(subscriptions);
    let mut cursor = 0;
    instants
        .iter()
        .map(|&instant| {
            while cursor < intervals.len() && intervals[cursor].ends_at_or_before(instant) {
                cursor += 1;
            }
            intervals
                .get(cursor)
                .is_some_and(|interval| interval.start <= instant)
        })
        .collect()
}

/// Sweep evaluation, parallel across users.
pub fn evaluate(grid: &PeriodGrid, dataset: &Dataset) -> ActivityTable {
    let instants = grid.instants();
    let users: Vec<(&str, &[SubscriptionRecord])> = dataset.by_user().collect();

    let rows = users
        .par_iter()
        .map(|(_, subscriptions)| sweep_user(&instants, subscriptions))
        .collect();

    ActivityTable {
        grid: grid.clone(),
        users: users.iter().map(|(id, _)| id.to_string()).collect(),
        rows,
    }
}

/// Reference evaluation: OR-reduce `covers` over every subscription for
/// every period.
pub fn evaluate_cross_join(grid: &PeriodGrid, dataset: &Dataset) -> ActivityTable {
    let instants = grid.instants();
    let mut users = Vec::with_capacity(dataset.user_count());
    let mut rows = Vec::with_capacity(dataset.user_count());

    for (user_id, subscriptions) in dataset.by_user() {
        users.push(user_id.to_string());
        rows.push(
            instants
                .iter()
                .map(|&instant| subscriptions.iter().any(|s| s.covers(instant)))
                .collect(),
        );
    }

    ActivityTable {
        grid: grid.clone(),
        users,
        rows,
    }
}
