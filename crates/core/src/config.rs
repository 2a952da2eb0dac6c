use chrono::{NaiveDate, Weekday};
use serde::Deserialize;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::Granularity;

/// Largest number of decimals kept in percentages; beyond this the scaling
/// factor no longer fits in an `f64`'s exact range.
pub const MAX_PERCENTAGE_PRECISION: u32 = 15;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `SUBSCRIPTION_PULSE__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Empty periods added before the first and after the last data point.
    #[serde(default = "default_padding_periods")]
    pub padding_periods: u32,
    /// Decimal places kept in retention and churn percentages.
    #[serde(default)]
    pub percentage_precision: u32,
    #[serde(default = "default_week_start")]
    pub week_start: Weekday,
    #[serde(default = "default_granularities")]
    pub granularities: Vec<Granularity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_compute_timeout_secs")]
    pub compute_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_number_users")]
    pub number_users: usize,
    #[serde(default = "default_min_start_date")]
    pub min_start_date: NaiveDate,
    #[serde(default = "default_max_end_date")]
    pub max_end_date: NaiveDate,
    #[serde(default)]
    pub seed: Option<u64>,
}

// Default functions
fn default_padding_periods() -> u32 {
    1
}
fn default_week_start() -> Weekday {
    Weekday::Mon
}
fn default_granularities() -> Vec<Granularity> {
    Granularity::ALL.to_vec()
}
fn default_compute_timeout_secs() -> u64 {
    60
}
fn default_number_users() -> usize {
    1000
}
fn default_min_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
}
fn default_max_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            padding_periods: default_padding_periods(),
            percentage_precision: 0,
            week_start: default_week_start(),
            granularities: default_granularities(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            compute_timeout_secs: default_compute_timeout_secs(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            number_users: default_number_users(),
            min_start_date: default_min_start_date(),
            max_end_date: default_max_end_date(),
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.percentage_precision > MAX_PERCENTAGE_PRECISION {
            return Err(AnalyticsError::Config(format!(
                "engine.percentage_precision must be at most {MAX_PERCENTAGE_PRECISION}, got {}",
                self.percentage_precision
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load(path: Option<&str>) -> AnalyticsResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("SUBSCRIPTION_PULSE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("engine.granularities"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.engine.validate()?;
        Ok(config)
    }
}
