//! Validated subscription dataset: the only input the analytics engine accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use tracing::{debug, warn};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::types::SubscriptionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub users: usize,
    pub subscriptions: usize,
    pub open_ended_subscriptions: usize,
    pub min_start_date: DateTime<Utc>,
    /// Latest start or end date present in the records.
    pub max_known_date: DateTime<Utc>,
}

/// Non-empty, interval-checked records grouped per user (users sorted by id,
/// each user's subscriptions sorted by start date).
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<SubscriptionRecord>,
    users: Vec<(String, Range<usize>)>,
    summary: DatasetSummary,
}

impl Dataset {
    pub fn new(mut records: Vec<SubscriptionRecord>) -> AnalyticsResult<Self> {
        let Some(first_start) = records.first().map(|r| r.start_date) else {
            return Err(AnalyticsError::InsufficientData(
                "dataset contains no subscription records".to_string(),
            ));
        };

        if let Some(bad) = records
            .iter()
            .find(|r| r.end_date.is_some_and(|end| end < r.start_date))
        {
            metrics::counter!("pulse.records.rejected").increment(1);
            warn!(
                user_id = %bad.user_id,
                subscription_id = %bad.subscription_id,
                "Rejecting dataset with inverted subscription interval"
            );
            return Err(AnalyticsError::DataIntegrity {
                user_id: bad.user_id.clone(),
                subscription_id: bad.subscription_id.clone(),
                start_date: bad.start_date,
                end_date: bad.end_date.unwrap_or(bad.start_date),
            });
        }

        records.sort_by(|a, b| {
            a.user_id
                .cmp(&b.user_id)
                .then(a.start_date.cmp(&b.start_date))
        });

        let mut users: Vec<(String, Range<usize>)> = Vec::new();
        for (idx, record) in records.iter().enumerate() {
            match users.last_mut() {
                Some((user_id, span)) if *user_id == record.user_id => span.end = idx + 1,
                _ => users.push((record.user_id.clone(), idx..idx + 1)),
            }
        }

        let subscriptions: HashSet<&str> = records
            .iter()
            .map(|r| r.subscription_id.as_str())
            .collect();
        let (min_start_date, max_known_date) =
            records
                .iter()
                .fold((first_start, first_start), |(min, max), r| {
                    let latest = r.end_date.map_or(r.start_date, |end| end.max(r.start_date));
                    (min.min(r.start_date), max.max(latest))
                });

        let summary = DatasetSummary {
            users: users.len(),
            subscriptions: subscriptions.len(),
            open_ended_subscriptions: records.iter().filter(|r| r.is_open_ended()).count(),
            min_start_date,
            max_known_date,
        };

        metrics::counter!("pulse.records.ingested").increment(records.len() as u64);
        debug!(
            users = summary.users,
            subscriptions = summary.subscriptions,
            open_ended = summary.open_ended_subscriptions,
            "Dataset validated"
        );

        Ok(Self {
            records,
            users,
            summary,
        })
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    pub fn records(&self) -> &[SubscriptionRecord] {
        &self.records
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Users in id order with their subscriptions.
    pub fn by_user(&self) -> impl Iterator<Item = (&str, &[SubscriptionRecord])> + '_ {
        self.users
            .iter()
            .map(|(user_id, span)| (user_id.as_str(), &self.records[span.clone()]))
    }
}
