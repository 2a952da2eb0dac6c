//! Property tests over randomly generated subscription histories.

use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use proptest::prelude::*;
use subscription_analytics::activity::{evaluate, evaluate_cross_join};
use subscription_analytics::cohort::CohortAssignment;
use subscription_analytics::{AggregateSeries, PeriodGrid, RetentionMatrix, StatusTable};
use subscription_core::types::period_instant;
use subscription_core::{Dataset, Granularity, StatusLabel, SubscriptionRecord};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

fn instant(offset_days: i64, offset_hours: i64) -> DateTime<Utc> {
    period_instant(epoch() + Duration::days(offset_days)) + Duration::hours(offset_hours)
}

fn granularity_strategy() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Day),
        Just(Granularity::Week),
        Just(Granularity::Month),
    ]
}

/// (user index, start offset days, start hour, optional length in days)
fn subscription_strategy() -> impl Strategy<Value = (u8, i64, i64, Option<i64>)> {
    (
        0u8..6,
        0i64..400,
        0i64..24,
        proptest::option::of(0i64..200),
    )
}

fn dataset_strategy() -> impl Strategy<Value = Dataset> {
    prop::collection::vec(subscription_strategy(), 1..20).prop_map(|subs| {
        let records = subs
            .into_iter()
            .enumerate()
            .map(|(idx, (user, start, hour, length))| {
                let start_date = instant(start, hour);
                SubscriptionRecord::new(
                    format!("user-{user}"),
                    format!("sub-{idx}"),
                    start_date,
                    length.map(|days| start_date + Duration::days(days)),
                )
            })
            .collect();
        Dataset::new(records).unwrap()
    })
}

fn grid_for(granularity: Granularity, dataset: &Dataset) -> PeriodGrid {
    let summary = dataset.summary();
    PeriodGrid::covering(
        granularity,
        Weekday::Mon,
        1,
        summary.min_start_date.date_naive(),
        summary.max_known_date.date_naive(),
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_sweep_matches_cross_join(
        dataset in dataset_strategy(),
        granularity in granularity_strategy(),
    ) {
        let grid = grid_for(granularity, &dataset);
        prop_assert_eq!(evaluate(&grid, &dataset), evaluate_cross_join(&grid, &dataset));
    }

    #[test]
    fn prop_status_sequence_is_consistent(
        dataset in dataset_strategy(),
        granularity in granularity_strategy(),
    ) {
        let grid = grid_for(granularity, &dataset);
        let table = StatusTable::classify(evaluate(&grid, &dataset));

        for user in table.users() {
            let new_active = user
                .periods
                .iter()
                .filter(|p| p.status == Some(StatusLabel::NewActive))
                .count();
            prop_assert!(new_active <= 1);

            // Every activation or deactivation, counted from an inactive
            // start, carries exactly one label.
            let mut activations = 0;
            let mut deactivations = 0;
            let mut previous = false;
            for period in &user.periods {
                match (previous, period.is_active) {
                    (false, true) => activations += 1,
                    (true, false) => deactivations += 1,
                    _ => {}
                }
                previous = period.is_active;
            }
            let count = |label: StatusLabel| {
                user.periods.iter().filter(|p| p.status == Some(label)).count()
            };
            prop_assert_eq!(
                count(StatusLabel::NewActive) + count(StatusLabel::Resurrected),
                activations
            );
            prop_assert_eq!(count(StatusLabel::Churn), deactivations);
            prop_assert_eq!(
                user.periods.iter().filter(|p| p.status.is_some()).count(),
                activations + deactivations
            );

            let mut seen = false;
            for (idx, period) in user.periods.iter().enumerate() {
                prop_assert!(!seen || period.was_active);
                seen = period.was_active;
                let previous = idx > 0 && user.periods[idx - 1].is_active;
                prop_assert_eq!(period.is_active_previous, previous);
                if period.status == Some(StatusLabel::Churn) {
                    prop_assert!(!period.is_active && previous);
                }
            }
        }
    }

    #[test]
    fn prop_aggregates_and_retention_are_dense(
        dataset in dataset_strategy(),
        granularity in granularity_strategy(),
        precision in 0u32..3,
    ) {
        let grid = grid_for(granularity, &dataset);
        let table = StatusTable::classify(evaluate(&grid, &dataset));
        let aggregates = AggregateSeries::build(&table);
        prop_assert_eq!(aggregates.rows().len(), grid.len());
        for row in aggregates.rows() {
            prop_assert!(row.churn <= 0);
            prop_assert!(row.active_users <= table.user_count() as u64);
        }

        let cohorts = CohortAssignment::assign(&table);
        let matrix = RetentionMatrix::build(&table, precision);
        prop_assert_eq!(matrix.counts().cohorts.len(), grid.len());

        let assigned: u64 = cohorts.sizes().iter().map(|s| s.users).sum();
        prop_assert_eq!(assigned, cohorts.assigned_users() as u64);

        for cell in matrix.cells() {
            if let Some(pct) = cell.percentage {
                prop_assert!((0.0..=100.0).contains(&pct));
            }
            if cell.offset == 0 && cell.total_cohort_size > 0 {
                prop_assert_eq!(cell.active_count, Some(cell.total_cohort_size));
            }
            if cell.total_cohort_size == 0 {
                prop_assert!(cell.active_count.is_none());
                prop_assert!(cell.percentage.is_none());
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_always_active_user_never_churns(start in 0i64..300, hour in 0i64..24) {
        let dataset = Dataset::new(vec![SubscriptionRecord::new(
            "loyal",
            "sub",
            instant(start, hour),
            None,
        )])
        .unwrap();
        for granularity in Granularity::ALL {
            let grid = grid_for(granularity, &dataset);
            let table = StatusTable::classify(evaluate(&grid, &dataset));
            let statuses: Vec<_> = table.users()[0].periods.iter().map(|p| p.status).collect();
            prop_assert_eq!(
                statuses.iter().filter(|s| **s == Some(StatusLabel::NewActive)).count(),
                1
            );
            prop_assert!(!statuses.contains(&Some(StatusLabel::Churn)));
            prop_assert!(!statuses.contains(&Some(StatusLabel::Resurrected)));
        }
    }
}
