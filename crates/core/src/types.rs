use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One subscription interval held by a user. `end_date = None` means the
/// subscription is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub subscription_id: String,
    #[serde(with = "flexible_date")]
    pub start_date: DateTime<Utc>,
    #[serde(default, with = "flexible_date_opt")]
    pub end_date: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    pub fn new(
        user_id: impl Into<String>,
        subscription_id: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            subscription_id: subscription_id.into(),
            start_date,
            end_date,
        }
    }

    /// `[start, end)` containment; an open end never closes.
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start_date <= instant && self.end_date.map_or(true, |end| instant < end)
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_date.is_none()
    }
}

/// Time bucketing scheme used to build period grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Natural period boundary at or before `date`.
    pub fn align(self, date: NaiveDate, week_start: Weekday) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => {
                let back = (date.weekday().num_days_from_monday() + 7
                    - week_start.num_days_from_monday())
                    % 7;
                date - chrono::Duration::days(i64::from(back))
            }
            Self::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Move `steps` periods forward. `None` only on calendar overflow.
    pub fn advance(self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Day => date.checked_add_signed(chrono::Duration::days(i64::from(steps))),
            Self::Week => date.checked_add_signed(chrono::Duration::weeks(i64::from(steps))),
            Self::Month => date.checked_add_months(Months::new(steps)),
        }
    }

    /// Move `steps` periods backward. `None` only on calendar overflow.
    pub fn retreat(self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Day => date.checked_sub_signed(chrono::Duration::days(i64::from(steps))),
            Self::Week => date.checked_sub_signed(chrono::Duration::weeks(i64::from(steps))),
            Self::Month => date.checked_sub_months(Months::new(steps)),
        }
    }

    /// Number of whole periods from `from` to `to`, negative when `to` is
    /// earlier. Both dates are expected to be aligned boundaries.
    pub fn steps_between(self, from: NaiveDate, to: NaiveDate) -> i64 {
        match self {
            Self::Day => (to - from).num_days(),
            Self::Week => (to - from).num_days() / 7,
            Self::Month => {
                i64::from(to.year() - from.year()) * 12 + i64::from(to.month())
                    - i64::from(from.month())
            }
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

/// Transition label attached to one (user, period) observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    NewActive,
    Resurrected,
    Churn,
}

/// Midnight UTC of `date`; the instant a period boundary stands for.
pub fn period_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and plain `YYYY-MM-DD`.
pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(period_instant)
}

pub mod flexible_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_datetime(&raw).map_err(serde::de::Error::custom)
    }
}

pub mod flexible_date_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => s.serialize_some(&dt.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => super::parse_datetime(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
