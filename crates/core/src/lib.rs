pub mod config;
pub mod dataset;
pub mod error;
pub mod types;

pub use config::{AppConfig, EngineConfig};
pub use dataset::{Dataset, DatasetSummary};
pub use error::{AnalyticsError, AnalyticsResult};
pub use types::{Granularity, StatusLabel, SubscriptionRecord};
