//! Point-in-time KPIs read from the day, week and month aggregates.
//!
//! Every reference date is derived with the same alignment rules the grids
//! use (week start, first of month), so each one must be an exact grid point.
//! A missing reference means grid construction and KPI conventions drifted
//! apart and is reported as [`AnalyticsError::GridAlignment`].

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::Serialize;
use subscription_core::{AnalyticsError, AnalyticsResult, Granularity};

use crate::aggregate::{AggregateSeries, PeriodAggregate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KpiReferences {
    pub today: NaiveDate,
    pub this_week: NaiveDate,
    pub last_week: NaiveDate,
    pub this_month: NaiveDate,
    pub last_month: NaiveDate,
}

impl KpiReferences {
    pub fn at(evaluation_instant: DateTime<Utc>, week_start: Weekday) -> Self {
        let today = evaluation_instant.date_naive();
        let this_week = Granularity::Week.align(today, week_start);
        let this_month = Granularity::Month.align(today, week_start);
        Self {
            today,
            this_week,
            last_week: Granularity::Week
                .retreat(this_week, 1)
                .unwrap_or(this_week),
            this_month,
            last_month: Granularity::Month
                .retreat(this_month, 1)
                .unwrap_or(this_month),
        }
    }

    pub fn earliest(&self) -> NaiveDate {
        [
            self.today,
            self.this_week,
            self.last_week,
            self.this_month,
            self.last_month,
        ]
        .into_iter()
        .min()
        .unwrap_or(self.today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiSnapshot {
    pub references: KpiReferences,
    pub active_users_now: u64,
    pub active_users_end_last_week: u64,
    pub active_users_end_last_month: u64,
    pub new_users_this_week: u64,
    pub new_users_last_week: u64,
    pub new_users_this_month: u64,
    pub new_users_last_month: u64,
    pub churn_this_week: u64,
    pub churn_last_week: u64,
    pub churn_this_month: u64,
    pub churn_last_month: u64,
}

fn lookup<'a>(
    series: &'a AggregateSeries,
    reference: NaiveDate,
    label: &'static str,
) -> AnalyticsResult<&'a PeriodAggregate> {
    series
        .get(reference)
        .ok_or(AnalyticsError::GridAlignment {
            label,
            reference,
            granularity: series.granularity(),
        })
}

impl KpiSnapshot {
    pub fn compute(
        references: KpiReferences,
        day: &AggregateSeries,
        week: &AggregateSeries,
        month: &AggregateSeries,
    ) -> AnalyticsResult<Self> {
        let today = lookup(day, references.today, "today")?;
        let this_week = lookup(week, references.this_week, "start of current week")?;
        let last_week = lookup(week, references.last_week, "start of previous week")?;
        let this_month = lookup(month, references.this_month, "start of current month")?;
        let last_month = lookup(month, references.last_month, "start of previous month")?;

        Ok(Self {
            references,
            active_users_now: today.active_users,
            active_users_end_last_week: this_week.active_users,
            active_users_end_last_month: this_month.active_users,
            new_users_this_week: this_week.new_active,
            new_users_last_week: last_week.new_active,
            new_users_this_month: this_month.new_active,
            new_users_last_month: last_month.new_active,
            churn_this_week: this_week.churned_users(),
            churn_last_week: last_week.churned_users(),
            churn_this_month: this_month.churned_users(),
            churn_last_month: last_month.churned_users(),
        })
    }
}
