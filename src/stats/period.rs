//! Half-open `[start, end)` time windows, usually a calendar month.

use crate::models::ValidationError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// A date argument: `YYYY-MM-DD`, `YYYY-MM` (first of the month) or an RFC 3339
/// timestamp, whose UTC calendar day is used.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d"))
        .or_else(|_| {
            DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize)]
pub struct Period {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl Period {
    /// Whole history.
    pub fn all() -> Self {
        Self::default()
    }

    /// Calendar month (UTC) containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let first = date.with_day(1).unwrap_or(date);
        let next = if first.month() == 12 {
            NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
        };
        Self {
            start: Some(midnight(first)),
            end: next.map(midnight),
        }
    }

    /// `YYYY-MM`, or any date or timestamp [`parse_date`] accepts (its month is used).
    pub fn parse_month(raw: &str) -> Result<Self, ValidationError> {
        let date =
            parse_date(raw).map_err(|_| ValidationError::InvalidMonth(raw.trim().to_string()))?;
        Ok(Self::month_of(date))
    }

    /// Explicit bounds. A start without an end means the start's month.
    pub fn between(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Self, ValidationError> {
        match (start, end) {
            (Some(s), Some(e)) if s >= e => Err(ValidationError::InvalidPeriod),
            (Some(s), None) => Ok(Self::month_of(s)),
            (s, e) => Ok(Self {
                start: s.map(midnight),
                end: e.map(midnight),
            }),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at < e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn month_window_is_half_open() {
        let p = Period::parse_month("2024-12").unwrap();
        assert!(p.contains(Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()));
        assert!(p.contains(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()));
        assert!(!p.contains(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(!p.contains(Utc.with_ymd_and_hms(2024, 11, 30, 23, 0, 0).unwrap()));
    }

    #[test]
    fn parse_month_accepts_full_dates() {
        assert_eq!(
            Period::parse_month("2024-05-17").unwrap(),
            Period::parse_month("2024-05").unwrap()
        );
        assert!(Period::parse_month("May 2024").is_err());
        assert!(Period::parse_month("2024-13").is_err());
    }

    #[test]
    fn dates_accept_client_timestamps() {
        let march = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_date("2024-03-01").unwrap(), march);
        assert_eq!(parse_date("2024-03").unwrap(), march);
        assert_eq!(parse_date("2024-03-01T00:00:00.000Z").unwrap(), march);
        // the UTC day of a local timestamp
        let local = parse_date("2024-03-01T00:30:00+01:00").unwrap();
        assert_eq!(local, march.pred_opt().unwrap());
        assert_eq!(
            parse_date("soon"),
            Err(ValidationError::InvalidDate("soon".into()))
        );
        assert_eq!(
            Period::parse_month("2024-03-01T00:00:00.000Z").unwrap(),
            Period::month_of(march)
        );
    }

    #[test]
    fn start_only_means_its_month() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(
            Period::between(Some(start), None).unwrap(),
            Period::month_of(start)
        );
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            Period::between(Some(start), Some(end)),
            Err(ValidationError::InvalidPeriod)
        );
        assert_eq!(Period::between(None, None).unwrap(), Period::all());
    }
}
