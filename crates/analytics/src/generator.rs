//! Synthetic subscription datasets for demos and load testing.

use chrono::NaiveDate;
use rand::Rng;
use subscription_core::config::GeneratorConfig;
use subscription_core::types::period_instant;
use subscription_core::{AnalyticsError, AnalyticsResult, SubscriptionRecord};
use tracing::debug;
use uuid::Builder;

#[derive(Debug, Clone)]
pub struct DatasetGenerator {
    pub number_users: usize,
    pub min_start_date: NaiveDate,
    pub max_end_date: NaiveDate,
}

impl DatasetGenerator {
    pub fn new(number_users: usize, min_start_date: NaiveDate, max_end_date: NaiveDate) -> Self {
        Self {
            number_users,
            min_start_date,
            max_end_date,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(
            config.number_users,
            config.min_start_date,
            config.max_end_date,
        )
    }

    /// One subscription per user. Starts are drawn up to `today` (or the max
    /// end date, whichever is earlier); ends falling on or after `today` are
    /// left open.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        today: NaiveDate,
    ) -> AnalyticsResult<Vec<SubscriptionRecord>> {
        let start_window_end = self.max_end_date.min(today);
        if start_window_end < self.min_start_date {
            return Err(AnalyticsError::InvalidRange {
                start: self.min_start_date,
                end: start_window_end,
            });
        }
        let start_span = (start_window_end - self.min_start_date).num_days();

        let records: Vec<SubscriptionRecord> = (0..self.number_users)
            .map(|_| {
                let user_id = Builder::from_random_bytes(rng.gen()).into_uuid();
                let subscription_id = Builder::from_random_bytes(rng.gen()).into_uuid();

                let start =
                    self.min_start_date + chrono::Duration::days(rng.gen_range(0..=start_span));
                let end_span = (self.max_end_date - start).num_days();
                let end = start + chrono::Duration::days(rng.gen_range(0..=end_span));

                SubscriptionRecord::new(
                    user_id.to_string(),
                    subscription_id.to_string(),
                    period_instant(start),
                    (end < today).then(|| period_instant(end)),
                )
            })
            .collect();

        debug!(
            users = records.len(),
            open_ended = records.iter().filter(|r| r.is_open_ended()).count(),
            "Generated synthetic dataset"
        );
        Ok(records)
    }
}
