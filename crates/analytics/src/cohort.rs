//! Cohort assignment: every user belongs to the cohort of their first active
//! period.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::status::StatusTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CohortSize {
    pub period: NaiveDate,
    pub users: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CohortAssignment {
    /// Grid index of each user's cohort, in status table order.
    #[serde(skip)]
    first_active: Vec<Option<usize>>,
    /// Users that were never active are absent.
    assignments: BTreeMap<String, NaiveDate>,
    /// Dense over the grid; periods without new users hold zero.
    sizes: Vec<CohortSize>,
}

impl CohortAssignment {
    pub fn assign(table: &StatusTable) -> Self {
        let grid = table.grid();
        let first_active: Vec<Option<usize>> =
            table.users().iter().map(|u| u.first_active()).collect();

        let mut sizes: Vec<CohortSize> = grid
            .periods()
            .iter()
            .map(|&period| CohortSize { period, users: 0 })
            .collect();
        let mut assignments = BTreeMap::new();

        for (user, cohort) in table.users().iter().zip(&first_active) {
            if let Some(size) = cohort.and_then(|idx| sizes.get_mut(idx)) {
                size.users += 1;
                assignments.insert(user.user_id.clone(), size.period);
            }
        }

        Self {
            first_active,
            assignments,
            sizes,
        }
    }

    /// Grid index of the cohort of the user at `user` in the status table.
    pub fn cohort_index(&self, user: usize) -> Option<usize> {
        self.first_active.get(user).copied().flatten()
    }

    pub fn cohort_of(&self, user_id: &str) -> Option<NaiveDate> {
        self.assignments.get(user_id).copied()
    }

    pub fn sizes(&self) -> &[CohortSize] {
        &self.sizes
    }

    pub fn size_at(&self, index: usize) -> u64 {
        self.sizes.get(index).map_or(0, |s| s.users)
    }

    pub fn assigned_users(&self) -> usize {
        self.assignments.len()
    }
}
