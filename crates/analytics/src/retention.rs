//! Cohort retention: dense cohort × offset matrices and per-cohort curves.
//!
//! Rows cover every grid period (newest first), including periods in which no
//! user started; columns run from offset 0 to the largest observed offset.
//! A cell is observed when its cohort has members and the grid reaches that
//! offset; everything else is `None`, which is distinct from an observed 0.

use chrono::NaiveDate;
use serde::Serialize;
use subscription_core::config::MAX_PERCENTAGE_PRECISION;
use subscription_core::Granularity;

use crate::cohort::CohortAssignment;
use crate::status::StatusTable;

/// `100 * part / whole` rounded half-to-even to `precision` decimals.
/// Precision is capped at [`MAX_PERCENTAGE_PRECISION`].
pub(crate) fn percentage(part: u64, whole: u64, precision: u32) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    let scale = 10f64.powi(precision.min(MAX_PERCENTAGE_PRECISION) as i32);
    let value = 100.0 * part as f64 / whole as f64;
    Some((value * scale).round_ties_even() / scale)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionTable<T> {
    pub cohorts: Vec<NaiveDate>,
    pub offsets: Vec<u32>,
    pub rows: Vec<Vec<Option<T>>>,
}

impl<T: Copy> RetentionTable<T> {
    pub fn row(&self, cohort: NaiveDate) -> Option<&[Option<T>]> {
        self.cohorts
            .iter()
            .position(|&c| c == cohort)
            .map(|idx| self.rows[idx].as_slice())
    }

    pub fn get(&self, cohort: NaiveDate, offset: usize) -> Option<T> {
        self.row(cohort)?.get(offset).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetentionCell {
    pub cohort_period: NaiveDate,
    pub offset: u32,
    pub active_count: Option<u64>,
    pub total_cohort_size: u64,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionMatrix {
    granularity: Granularity,
    /// Aligned with the table rows.
    cohort_sizes: Vec<u64>,
    counts: RetentionTable<u64>,
    percentages: RetentionTable<f64>,
}

impl RetentionMatrix {
    pub fn build(table: &StatusTable, precision: u32) -> Self {
        let grid = table.grid();
        let cohorts = CohortAssignment::assign(table);
        let granularity = grid.granularity();
        let periods = grid.periods();
        let mut observed: Vec<Vec<Option<u64>>> = vec![Vec::new(); periods.len()];

        for (user_idx, user) in table.users().iter().enumerate() {
            let Some(cohort_idx) = cohorts.cohort_index(user_idx) else {
                continue;
            };
            let (Some(&cohort_period), Some(row)) =
                (periods.get(cohort_idx), observed.get_mut(cohort_idx))
            else {
                continue;
            };
            for (period, observation) in periods.iter().zip(&user.periods) {
                let offset = granularity.steps_between(cohort_period, *period);
                let Ok(offset) = usize::try_from(offset) else {
                    continue;
                };
                if row.len() <= offset {
                    row.resize(offset + 1, None);
                }
                *row[offset].get_or_insert(0) += u64::from(observation.is_active);
            }
        }

        let columns = observed.iter().map(Vec::len).max().unwrap_or(0);
        let offsets: Vec<u32> = (0..columns as u32).collect();
        let mut cohort_periods = Vec::with_capacity(periods.len());
        let mut cohort_sizes = Vec::with_capacity(periods.len());
        let mut count_rows = Vec::with_capacity(periods.len());
        let mut percentage_rows = Vec::with_capacity(periods.len());

        for ((idx, mut row), &period) in observed.into_iter().enumerate().zip(periods).rev() {
            let size = cohorts.size_at(idx);
            row.resize(columns, None);
            percentage_rows.push(
                row.iter()
                    .map(|cell| cell.and_then(|count| percentage(count, size, precision)))
                    .collect(),
            );
            count_rows.push(row);
            cohort_periods.push(period);
            cohort_sizes.push(size);
        }

        Self {
            granularity,
            cohort_sizes,
            counts: RetentionTable {
                cohorts: cohort_periods.clone(),
                offsets: offsets.clone(),
                rows: count_rows,
            },
            percentages: RetentionTable {
                cohorts: cohort_periods,
                offsets,
                rows: percentage_rows,
            },
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn counts(&self) -> &RetentionTable<u64> {
        &self.counts
    }

    pub fn percentages(&self) -> &RetentionTable<f64> {
        &self.percentages
    }

    pub fn cohort_size(&self, cohort: NaiveDate) -> Option<u64> {
        self.counts
            .cohorts
            .iter()
            .position(|&c| c == cohort)
            .map(|idx| self.cohort_sizes[idx])
    }

    /// Every cell of the matrix, row-major in table order.
    pub fn cells(&self) -> Vec<RetentionCell> {
        let mut cells = Vec::with_capacity(self.counts.cohorts.len() * self.counts.offsets.len());
        for (row_idx, &cohort_period) in self.counts.cohorts.iter().enumerate() {
            for (col_idx, &offset) in self.counts.offsets.iter().enumerate() {
                cells.push(RetentionCell {
                    cohort_period,
                    offset,
                    active_count: self.counts.rows[row_idx][col_idx],
                    total_cohort_size: self.cohort_sizes[row_idx],
                    percentage: self.percentages.rows[row_idx][col_idx],
                });
            }
        }
        cells
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurvePoint {
    pub period: NaiveDate,
    pub active_users: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortCurve {
    pub cohort: NaiveDate,
    pub size: u64,
    pub points: Vec<CurvePoint>,
}

/// Active members of each non-empty cohort at every period from the cohort
/// onwards, oldest cohort first.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionCurves {
    curves: Vec<CohortCurve>,
}

impl RetentionCurves {
    pub fn build(table: &StatusTable) -> Self {
        let cohorts = CohortAssignment::assign(table);
        let periods = table.grid().periods();
        let mut active: Vec<Vec<u64>> = (0..periods.len())
            .map(|idx| vec![0; periods.len() - idx])
            .collect();

        for (user_idx, user) in table.users().iter().enumerate() {
            let Some(cohort_idx) = cohorts.cohort_index(user_idx) else {
                continue;
            };
            let (Some(slots), Some(observations)) =
                (active.get_mut(cohort_idx), user.periods.get(cohort_idx..))
            else {
                continue;
            };
            for (slot, observation) in slots.iter_mut().zip(observations) {
                *slot += u64::from(observation.is_active);
            }
        }

        let curves = active
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| cohorts.size_at(*idx) > 0)
            .map(|(idx, counts)| CohortCurve {
                cohort: periods[idx],
                size: cohorts.size_at(idx),
                points: periods[idx..]
                    .iter()
                    .zip(counts)
                    .map(|(&period, active_users)| CurvePoint {
                        period,
                        active_users,
                    })
                    .collect(),
            })
            .collect();

        Self { curves }
    }

    pub fn curves(&self) -> &[CohortCurve] {
        &self.curves
    }
}
