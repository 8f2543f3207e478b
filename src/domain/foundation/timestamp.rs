//! Timestamp value object and business-local time conversion.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Timezone in which product pages and metadata express dispatch times.
pub const BUSINESS_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Formats accepted for business-local date-times, tried in order.
const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Creates a timestamp from Unix seconds, `None` when out of range.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        match Utc.timestamp_opt(secs, 0) {
            LocalResult::Single(dt) => Some(Self(dt)),
            _ => None,
        }
    }

    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    pub fn plus_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }

    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Interprets a wall-clock time in [`BUSINESS_TIMEZONE`].
    ///
    /// Ambiguous times (DST fall-back) resolve to the earlier instant; times
    /// inside a DST gap are rejected.
    pub fn from_business_local(local: NaiveDateTime) -> Result<Self, ValidationError> {
        match BUSINESS_TIMEZONE.from_local_datetime(&local) {
            LocalResult::Single(dt) => Ok(Self(dt.with_timezone(&Utc))),
            LocalResult::Ambiguous(earliest, _) => Ok(Self(earliest.with_timezone(&Utc))),
            LocalResult::None => Err(ValidationError::invalid_format(
                "dispatchTime",
                format!("{} does not exist in {}", local, BUSINESS_TIMEZONE),
            )),
        }
    }

    /// Parses a business-local date-time string such as `2024-03-01T18:00`.
    pub fn parse_business_local(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        let naive = LOCAL_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| {
                ValidationError::invalid_format("dispatchTime", format!("unparseable '{}'", raw))
            })?;
        Self::from_business_local(naive)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn winter_local_time_is_five_hours_behind_utc() {
        let ts = Timestamp::from_business_local(local(2024, 1, 15, 18, 0)).unwrap();
        assert_eq!(ts.as_datetime().to_rfc3339(), "2024-01-15T23:00:00+00:00");
    }

    #[test]
    fn summer_local_time_is_four_hours_behind_utc() {
        let ts = Timestamp::from_business_local(local(2024, 7, 4, 12, 30)).unwrap();
        assert_eq!(ts.as_datetime().to_rfc3339(), "2024-07-04T16:30:00+00:00");
    }

    #[test]
    fn nonexistent_spring_forward_time_is_rejected() {
        let result = Timestamp::from_business_local(local(2024, 3, 10, 2, 30));
        assert!(result.is_err());
    }

    #[test]
    fn ambiguous_fall_back_time_resolves_to_earliest() {
        let ts = Timestamp::from_business_local(local(2024, 11, 3, 1, 30)).unwrap();
        assert_eq!(ts.as_datetime().to_rfc3339(), "2024-11-03T05:30:00+00:00");
    }

    #[test]
    fn parse_business_local_accepts_minute_precision() {
        let ts = Timestamp::parse_business_local("2024-01-15T18:00").unwrap();
        assert_eq!(ts.as_unix_secs(), 1_705_359_600);
    }

    #[test]
    fn parse_business_local_rejects_garbage() {
        let err = Timestamp::parse_business_local("next tuesday").unwrap_err();
        assert_eq!(err.field(), "dispatchTime");
    }

    #[test]
    fn unix_round_trip_preserves_seconds() {
        let ts = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        assert_eq!(ts.as_unix_secs(), 1_700_000_000);
    }

    #[test]
    fn plus_hours_moves_forward() {
        let ts = Timestamp::from_unix_secs(0).unwrap();
        assert_eq!(ts.plus_hours(4).as_unix_secs(), 14_400);
        assert!(ts.plus_hours(4).is_after(&ts));
    }
}
