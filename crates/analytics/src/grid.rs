//! Period grids: ordered, gap-free boundary sequences for one granularity.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::Serialize;
use subscription_core::types::period_instant;
use subscription_core::{AnalyticsError, AnalyticsResult, Granularity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodGrid {
    granularity: Granularity,
    #[serde(skip)]
    week_start: Weekday,
    periods: Vec<NaiveDate>,
}

impl PeriodGrid {
    /// Boundaries from the one at or before `min` up to the one at or before
    /// `max`, both inclusive.
    pub fn build(
        granularity: Granularity,
        week_start: Weekday,
        min: NaiveDate,
        max: NaiveDate,
    ) -> AnalyticsResult<Self> {
        if min > max {
            return Err(AnalyticsError::InvalidRange {
                start: min,
                end: max,
            });
        }

        let last = granularity.align(max, week_start);
        let mut current = granularity.align(min, week_start);
        let mut periods = Vec::new();
        loop {
            periods.push(current);
            if current >= last {
                break;
            }
            current = granularity
                .advance(current, 1)
                .ok_or(AnalyticsError::InvalidRange {
                    start: min,
                    end: max,
                })?;
        }

        Ok(Self {
            granularity,
            week_start,
            periods,
        })
    }

    /// Like [`PeriodGrid::build`] with `padding` extra periods on both ends.
    pub fn covering(
        granularity: Granularity,
        week_start: Weekday,
        padding: u32,
        min: NaiveDate,
        max: NaiveDate,
    ) -> AnalyticsResult<Self> {
        let invalid = || AnalyticsError::InvalidRange {
            start: min,
            end: max,
        };
        if min > max {
            return Err(invalid());
        }
        let first = granularity
            .retreat(granularity.align(min, week_start), padding)
            .ok_or_else(invalid)?;
        let last = granularity
            .advance(granularity.align(max, week_start), padding)
            .ok_or_else(invalid)?;
        Self::build(granularity, week_start, first, last)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NaiveDate> {
        self.periods.get(index).copied()
    }

    /// Exact grid point lookup.
    pub fn index_of(&self, period: NaiveDate) -> Option<usize> {
        self.periods.binary_search(&period).ok()
    }

    /// Midnight UTC instants of every period, in order.
    pub fn instants(&self) -> Vec<DateTime<Utc>> {
        self.periods.iter().copied().map(period_instant).collect()
    }
}
