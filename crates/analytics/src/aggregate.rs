//! Period-level growth series: active users and transition counts per period.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use subscription_core::{Granularity, StatusLabel};

use crate::status::StatusTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub period: NaiveDate,
    pub active_users: u64,
    pub new_active: u64,
    pub resurrected: u64,
    /// Churned users as a negative count, ready for stacked bars.
    pub churn: i64,
}

impl PeriodAggregate {
    fn empty(period: NaiveDate) -> Self {
        Self {
            period,
            active_users: 0,
            new_active: 0,
            resurrected: 0,
            churn: 0,
        }
    }

    pub fn churned_users(&self) -> u64 {
        self.churn.unsigned_abs()
    }
}

/// One row per grid period, zero rows included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSeries {
    granularity: Granularity,
    rows: Vec<PeriodAggregate>,
}

impl AggregateSeries {
    pub fn build(table: &StatusTable) -> Self {
        let grid = table.grid();
        let mut rows: Vec<PeriodAggregate> = grid
            .periods()
            .iter()
            .copied()
            .map(PeriodAggregate::empty)
            .collect();

        for user in table.users() {
            for (row, observation) in rows.iter_mut().zip(&user.periods) {
                if observation.is_active {
                    row.active_users += 1;
                }
                match observation.status {
                    Some(StatusLabel::NewActive) => row.new_active += 1,
                    Some(StatusLabel::Resurrected) => row.resurrected += 1,
                    Some(StatusLabel::Churn) => row.churn -= 1,
                    None => {}
                }
            }
        }

        Self {
            granularity: grid.granularity(),
            rows,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn rows(&self) -> &[PeriodAggregate] {
        &self.rows
    }

    pub fn get(&self, period: NaiveDate) -> Option<&PeriodAggregate> {
        self.rows
            .binary_search_by_key(&period, |row| row.period)
            .ok()
            .map(|idx| &self.rows[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::evaluate;
    use crate::grid::PeriodGrid;
    use chrono::{DateTime, Utc, Weekday};
    use subscription_core::types::period_instant;
    use subscription_core::{Dataset, SubscriptionRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        period_instant(date(y, m, d))
    }

    fn series(records: Vec<SubscriptionRecord>) -> AggregateSeries {
        let grid =
            PeriodGrid::build(Granularity::Month, Weekday::Mon, date(2023, 12, 1), date(2024, 5, 1))
                .unwrap();
        let dataset = Dataset::new(records).unwrap();
        let table = StatusTable::classify(evaluate(&grid, &dataset));
        AggregateSeries::build(&table)
    }

    #[test]
    fn test_counts_per_period() {
        let series = series(vec![
            SubscriptionRecord::new("a", "1", at(2024, 1, 1), Some(at(2024, 3, 1))),
            SubscriptionRecord::new("b", "2", at(2024, 2, 1), None),
            SubscriptionRecord::new("a", "3", at(2024, 4, 1), None),
        ]);
        let active: Vec<u64> = series.rows().iter().map(|r| r.active_users).collect();
        let new: Vec<u64> = series.rows().iter().map(|r| r.new_active).collect();
        let resurrected: Vec<u64> = series.rows().iter().map(|r| r.resurrected).collect();
        let churn: Vec<i64> = series.rows().iter().map(|r| r.churn).collect();

        // Dec, Jan, Feb, Mar, Apr, May
        assert_eq!(active, vec![0, 1, 2, 1, 2, 2]);
        assert_eq!(new, vec![0, 1, 1, 0, 0, 0]);
        assert_eq!(resurrected, vec![0, 0, 0, 0, 1, 0]);
        assert_eq!(churn, vec![0, 0, 0, -1, 0, 0]);
    }

    #[test]
    fn test_dense_rows_and_lookup() {
        let series = series(vec![SubscriptionRecord::new(
            "a",
            "1",
            at(2024, 2, 1),
            Some(at(2024, 2, 20)),
        )]);
        assert_eq!(series.rows().len(), 6);
        assert_eq!(series.get(date(2023, 12, 1)).map(|r| r.active_users), Some(0));
        let march = series.get(date(2024, 3, 1)).unwrap();
        assert_eq!(march.churn, -1);
        assert_eq!(march.churned_users(), 1);
        assert!(series.get(date(2024, 3, 2)).is_none());
    }
}
