//! Subscription analytics engine: period grids, activity evaluation, growth
//! accounting, cohort retention and KPI snapshots.

pub mod activity;
pub mod aggregate;
pub mod churn;
pub mod cohort;
pub mod generator;
pub mod grid;
pub mod kpi;
pub mod model;
pub mod retention;
pub mod status;

pub use aggregate::{AggregateSeries, PeriodAggregate};
pub use generator::DatasetGenerator;
pub use grid::PeriodGrid;
pub use kpi::{KpiReferences, KpiSnapshot};
pub use model::{GranularityReport, ModelOutput, SubscriptionModel};
pub use retention::{RetentionCell, RetentionMatrix};
pub use status::{StatusMachine, StatusTable};
