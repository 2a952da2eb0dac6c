//! Subscription model: runs the full pipeline for every configured
//! granularity and merges the results.

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use subscription_core::{AnalyticsResult, Dataset, DatasetSummary, EngineConfig, Granularity};
use tracing::{debug, info};

use crate::activity;
use crate::aggregate::AggregateSeries;
use crate::churn::ChurnSeries;
use crate::cohort::CohortAssignment;
use crate::grid::PeriodGrid;
use crate::kpi::{KpiReferences, KpiSnapshot};
use crate::retention::{RetentionCurves, RetentionMatrix};
use crate::status::StatusTable;

/// Everything derived for one granularity.
#[derive(Debug, Clone, Serialize)]
pub struct GranularityReport {
    pub granularity: Granularity,
    pub grid: PeriodGrid,
    pub activity: StatusTable,
    pub aggregates: AggregateSeries,
    pub cohorts: CohortAssignment,
    pub retention: RetentionMatrix,
    pub retention_curves: RetentionCurves,
    pub churn: ChurnSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelOutput {
    pub evaluation_instant: DateTime<Utc>,
    pub summary: DatasetSummary,
    pub reports: BTreeMap<Granularity, GranularityReport>,
    /// Present when day, week and month were all computed.
    pub kpis: Option<KpiSnapshot>,
}

impl ModelOutput {
    pub fn report(&self, granularity: Granularity) -> Option<&GranularityReport> {
        self.reports.get(&granularity)
    }
}

pub struct SubscriptionModel {
    config: EngineConfig,
}

impl SubscriptionModel {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Date span every grid must cover: the data plus the KPI references of
    /// `evaluation_instant`, before padding.
    pub fn span(&self, dataset: &Dataset, references: &KpiReferences) -> (NaiveDate, NaiveDate) {
        let summary = dataset.summary();
        let min = summary.min_start_date.date_naive().min(references.earliest());
        let max = summary.max_known_date.date_naive().max(references.today);
        (min, max)
    }

    pub fn fit(
        &self,
        dataset: &Dataset,
        evaluation_instant: DateTime<Utc>,
    ) -> AnalyticsResult<ModelOutput> {
        let started = Instant::now();
        let references = KpiReferences::at(evaluation_instant, self.config.week_start);
        let granularities: BTreeSet<Granularity> =
            self.config.granularities.iter().copied().collect();

        info!(
            users = dataset.user_count(),
            subscriptions = dataset.summary().subscriptions,
            granularities = granularities.len(),
            evaluation_day = %references.today,
            "Fitting subscription model"
        );

        let reports: BTreeMap<Granularity, GranularityReport> = granularities
            .par_iter()
            .map(|&granularity| {
                self.fit_granularity(dataset, granularity, &references)
                    .map(|report| (granularity, report))
            })
            .collect::<AnalyticsResult<_>>()?;

        let kpis = match (
            reports.get(&Granularity::Day),
            reports.get(&Granularity::Week),
            reports.get(&Granularity::Month),
        ) {
            (Some(day), Some(week), Some(month)) => Some(KpiSnapshot::compute(
                references,
                &day.aggregates,
                &week.aggregates,
                &month.aggregates,
            )?),
            _ => {
                debug!("Skipping KPI snapshot, day/week/month not all configured");
                None
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        metrics::counter!("pulse.fit.runs").increment(1);
        metrics::histogram!("pulse.fit.duration_ms").record(elapsed_ms);
        info!(elapsed_ms, "Subscription model fitted");

        Ok(ModelOutput {
            evaluation_instant,
            summary: dataset.summary().clone(),
            reports,
            kpis,
        })
    }

    pub fn fit_granularity(
        &self,
        dataset: &Dataset,
        granularity: Granularity,
        references: &KpiReferences,
    ) -> AnalyticsResult<GranularityReport> {
        let (min, max) = self.span(dataset, references);
        let grid = PeriodGrid::covering(
            granularity,
            self.config.week_start,
            self.config.padding_periods,
            min,
            max,
        )?;

        let activity = StatusTable::classify(activity::evaluate(&grid, dataset));
        let aggregates = AggregateSeries::build(&activity);
        let cohorts = CohortAssignment::assign(&activity);
        let precision = self.config.percentage_precision;
        let retention = RetentionMatrix::build(&activity, precision);
        let retention_curves = RetentionCurves::build(&activity);
        let churn = ChurnSeries::build(&aggregates, precision);

        debug!(
            granularity = %granularity,
            periods = grid.len(),
            cohorts = retention_curves.curves().len(),
            offsets = retention.counts().offsets.len(),
            "Granularity pipeline complete"
        );

        Ok(GranularityReport {
            granularity,
            grid,
            activity,
            aggregates,
            cohorts,
            retention,
            retention_curves,
            churn,
        })
    }
}

impl Default for SubscriptionModel {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
