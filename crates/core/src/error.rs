use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::types::Granularity;

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error(
        "Data integrity error: subscription {subscription_id} of user {user_id} ends at {end_date} before it starts at {start_date}"
    )]
    DataIntegrity {
        user_id: String,
        subscription_id: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid period range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Grid alignment error: {reference} ({label}) is not a point of the {granularity} grid")]
    GridAlignment {
        label: &'static str,
        reference: NaiveDate,
        granularity: Granularity,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AnalyticsError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
