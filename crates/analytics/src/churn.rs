//! Churn series: churned users and churn rate relative to the previous
//! period's active base.

use chrono::NaiveDate;
use serde::Serialize;
use subscription_core::Granularity;

use crate::aggregate::AggregateSeries;
use crate::retention::percentage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChurnPoint {
    pub period: NaiveDate,
    pub churned_users: u64,
    pub previous_active_users: u64,
    /// `None` when nobody was active in the previous period.
    pub churn_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChurnSeries {
    granularity: Granularity,
    points: Vec<ChurnPoint>,
}

impl ChurnSeries {
    pub fn build(aggregates: &AggregateSeries, precision: u32) -> Self {
        let mut previous_active_users = 0;
        let points = aggregates
            .rows()
            .iter()
            .map(|row| {
                let churned_users = row.churned_users();
                let point = ChurnPoint {
                    period: row.period,
                    churned_users,
                    previous_active_users,
                    churn_rate: percentage(churned_users, previous_active_users, precision),
                };
                previous_active_users = row.active_users;
                point
            })
            .collect();

        Self {
            granularity: aggregates.granularity(),
            points,
        }
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn points(&self) -> &[ChurnPoint] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::evaluate;
    use crate::grid::PeriodGrid;
    use crate::status::StatusTable;
    use chrono::{DateTime, Utc, Weekday};
    use subscription_core::types::period_instant;
    use subscription_core::{Dataset, SubscriptionRecord};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        period_instant(date(y, m, d))
    }

    #[test]
    fn test_churn_rate_against_previous_period() {
        let grid =
            PeriodGrid::build(Granularity::Month, Weekday::Mon, date(2023, 12, 1), date(2024, 4, 1))
                .unwrap();
        let dataset = Dataset::new(vec![
            SubscriptionRecord::new("a", "1", at(2024, 1, 1), Some(at(2024, 3, 1))),
            SubscriptionRecord::new("b", "2", at(2024, 1, 1), Some(at(2024, 2, 1))),
            SubscriptionRecord::new("c", "3", at(2024, 1, 1), None),
        ])
        .unwrap();
        let table = StatusTable::classify(evaluate(&grid, &dataset));
        let series = ChurnSeries::build(&AggregateSeries::build(&table), 1);
        let points = series.points();

        // Dec: nobody before, no rate.
        assert_eq!(points[0].churn_rate, None);
        // Jan: 0 active before.
        assert_eq!(points[1].churn_rate, None);
        // Feb: b churns out of 3.
        assert_eq!(points[2].churned_users, 1);
        assert_eq!(points[2].previous_active_users, 3);
        assert_eq!(points[2].churn_rate, Some(33.3));
        // Mar: a churns out of 2.
        assert_eq!(points[3].churn_rate, Some(50.0));
        // Apr: nobody churns out of 1.
        assert_eq!(points[4].churn_rate, Some(0.0));
    }
}
