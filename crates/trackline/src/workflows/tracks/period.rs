use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const PERIOD_LENGTH_DAYS: i64 = 7;

/// Weekday anchoring a track's recurring window, carried on the wire as
/// 0 through 6 with Monday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PeriodStartDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl PeriodStartDay {
    pub const fn index(self) -> u8 {
        match self {
            PeriodStartDay::Monday => 0,
            PeriodStartDay::Tuesday => 1,
            PeriodStartDay::Wednesday => 2,
            PeriodStartDay::Thursday => 3,
            PeriodStartDay::Friday => 4,
            PeriodStartDay::Saturday => 5,
            PeriodStartDay::Sunday => 6,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PeriodStartDay::Monday => "monday",
            PeriodStartDay::Tuesday => "tuesday",
            PeriodStartDay::Wednesday => "wednesday",
            PeriodStartDay::Thursday => "thursday",
            PeriodStartDay::Friday => "friday",
            PeriodStartDay::Saturday => "saturday",
            PeriodStartDay::Sunday => "sunday",
        }
    }
}

impl TryFrom<u8> for PeriodStartDay {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PeriodStartDay::Monday),
            1 => Ok(PeriodStartDay::Tuesday),
            2 => Ok(PeriodStartDay::Wednesday),
            3 => Ok(PeriodStartDay::Thursday),
            4 => Ok(PeriodStartDay::Friday),
            5 => Ok(PeriodStartDay::Saturday),
            6 => Ok(PeriodStartDay::Sunday),
            other => Err(format!("period start day must be 0-6, got {other}")),
        }
    }
}

impl From<PeriodStartDay> for u8 {
    fn from(day: PeriodStartDay) -> Self {
        day.index()
    }
}

/// Inclusive UTC bounds of one recurring window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolves the window containing `instant` for a track anchored on
/// `start_day`. The start is the most recent UTC midnight falling on the
/// anchor weekday at or before the instant; the end is the last
/// representable millisecond of the window. Every instant inside a window
/// resolves to the same bounds.
pub fn period_bounds(instant: DateTime<Utc>, start_day: PeriodStartDay) -> PeriodBounds {
    let midnight = instant.date_naive().and_time(NaiveTime::MIN).and_utc();
    let days_back = (instant.weekday().num_days_from_monday() as i64
        - i64::from(start_day.index()))
    .rem_euclid(PERIOD_LENGTH_DAYS);
    let start = midnight - Duration::days(days_back);

    PeriodBounds {
        start,
        end: start + Duration::days(PERIOD_LENGTH_DAYS) - Duration::milliseconds(1),
    }
}

/// Start of the window immediately after one beginning at `period_start`.
pub fn next_period_start(period_start: DateTime<Utc>) -> DateTime<Utc> {
    period_start + Duration::days(PERIOD_LENGTH_DAYS)
}
