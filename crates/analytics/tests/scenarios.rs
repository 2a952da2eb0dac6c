//! End-to-end growth accounting and retention scenarios on monthly grids.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use subscription_analytics::{GranularityReport, SubscriptionModel};
use subscription_core::types::period_instant;
use subscription_core::{Dataset, EngineConfig, Granularity, StatusLabel, SubscriptionRecord};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    period_instant(date(y, m, d))
}

fn monthly_report(records: Vec<SubscriptionRecord>) -> GranularityReport {
    let model = SubscriptionModel::new(EngineConfig {
        granularities: vec![Granularity::Month],
        ..EngineConfig::default()
    });
    let dataset = Dataset::new(records).unwrap();
    let instant = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
    let mut output = model.fit(&dataset, instant).unwrap();
    output.reports.remove(&Granularity::Month).unwrap()
}

fn statuses(report: &GranularityReport, user: usize) -> Vec<Option<StatusLabel>> {
    report.activity.users()[user]
        .periods
        .iter()
        .map(|p| p.status)
        .collect()
}

#[test]
fn test_single_subscription_lifecycle() {
    let report = monthly_report(vec![SubscriptionRecord::new(
        "user-1",
        "sub-1",
        at(2024, 1, 1),
        Some(at(2024, 3, 1)),
    )]);

    assert_eq!(
        report.grid.periods(),
        &[
            date(2023, 12, 1),
            date(2024, 1, 1),
            date(2024, 2, 1),
            date(2024, 3, 1),
            date(2024, 4, 1),
        ]
    );
    let active: Vec<u64> = report
        .aggregates
        .rows()
        .iter()
        .map(|r| r.active_users)
        .collect();
    assert_eq!(active, vec![0, 1, 1, 0, 0]);
    assert_eq!(
        statuses(&report, 0),
        vec![
            None,
            Some(StatusLabel::NewActive),
            None,
            Some(StatusLabel::Churn),
            None
        ]
    );
    let march = report.aggregates.get(date(2024, 3, 1)).unwrap();
    assert_eq!(march.churn, -1);
}

#[test]
fn test_gap_between_subscriptions_resurrects() {
    let report = monthly_report(vec![
        SubscriptionRecord::new("user-1", "sub-1", at(2024, 1, 1), Some(at(2024, 2, 1))),
        SubscriptionRecord::new("user-1", "sub-2", at(2024, 3, 1), Some(at(2024, 4, 1))),
    ]);

    // Dec, Jan, Feb, Mar, Apr, May
    assert_eq!(report.grid.len(), 6);
    assert_eq!(
        statuses(&report, 0),
        vec![
            None,
            Some(StatusLabel::NewActive),
            Some(StatusLabel::Churn),
            Some(StatusLabel::Resurrected),
            Some(StatusLabel::Churn),
            None,
        ]
    );
    let resurrected: Vec<u64> = report
        .aggregates
        .rows()
        .iter()
        .map(|r| r.resurrected)
        .collect();
    assert_eq!(resurrected, vec![0, 0, 0, 1, 0, 0]);
    // One user, one cohort: January.
    assert_eq!(report.cohorts.cohort_of("user-1"), Some(date(2024, 1, 1)));
}

#[test]
fn test_two_user_cohort_retention() {
    let report = monthly_report(vec![
        SubscriptionRecord::new("stays", "sub-1", at(2024, 1, 1), Some(at(2024, 7, 1))),
        SubscriptionRecord::new("leaves", "sub-2", at(2024, 1, 1), Some(at(2024, 3, 1))),
    ]);
    let jan = date(2024, 1, 1);

    let counts = report.retention.counts().row(jan).unwrap();
    assert_eq!(&counts[..6], &[Some(2), Some(2), Some(1), Some(1), Some(1), Some(1)]);
    assert_eq!(counts[6], Some(0));

    let percentages = report.retention.percentages().row(jan).unwrap();
    assert_eq!(
        &percentages[..4],
        &[Some(100.0), Some(100.0), Some(50.0), Some(50.0)]
    );

    // Every grid period has a row, newest first, with no data for empty cohorts.
    let cohorts = &report.retention.counts().cohorts;
    assert_eq!(cohorts.len(), report.grid.len());
    assert_eq!(cohorts.first().copied(), report.grid.periods().last().copied());
    let december = report.retention.counts().row(date(2023, 12, 1)).unwrap();
    assert!(december.iter().all(Option::is_none));
    assert_eq!(report.retention.cohort_size(date(2024, 2, 1)), Some(0));

    let curves = report.retention_curves.curves();
    assert_eq!(curves.len(), 1);
    assert_eq!(curves[0].size, 2);
}

#[test]
fn test_snapshots_cover_every_user_period_pair() {
    let report = monthly_report(vec![
        SubscriptionRecord::new("a", "1", at(2024, 1, 1), None),
        SubscriptionRecord::new("b", "2", at(2024, 2, 1), Some(at(2024, 2, 10))),
    ]);
    let snapshots: Vec<_> = report.activity.snapshots().collect();
    assert_eq!(snapshots.len(), 2 * report.grid.len());
    assert!(snapshots
        .iter()
        .any(|s| s.user_id == "b" && s.period == date(2024, 2, 1) && s.is_active));
    assert!(snapshots
        .iter()
        .any(|s| s.user_id == "b"
            && s.period == date(2024, 3, 1)
            && s.status == Some(StatusLabel::Churn)));
}

#[test]
fn test_output_serializes_without_nan() {
    let model = SubscriptionModel::default();
    let dataset = Dataset::new(vec![
        SubscriptionRecord::new("a", "1", at(2024, 1, 1), None),
        SubscriptionRecord::new("b", "2", at(2024, 1, 20), Some(at(2024, 2, 3))),
    ])
    .unwrap();
    let instant = Utc.with_ymd_and_hms(2024, 2, 15, 0, 0, 0).unwrap();
    let output = model.fit(&dataset, instant).unwrap();

    let json = serde_json::to_value(&output).unwrap();
    assert!(json["kpis"]["active_users_now"].is_u64());
    assert!(json["reports"]["month"]["retention"]["percentages"]["rows"].is_array());
    assert!(!json.to_string().contains("NaN"));
}
