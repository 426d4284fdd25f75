use serde::Serialize;
use time::{Date, Duration};

use crate::error::{AppError, AppResult};

/// Longest period accepted from a caller, in days.
pub const MAX_PERIOD_DAYS: i64 = 366;

/// Inclusive range of calendar dates. No time zone arithmetic is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    #[serde(with = "iso_date")]
    pub start: Date,
    #[serde(with = "iso_date")]
    pub end: Date,
}

impl Period {
    pub fn new(start: Date, end: Date) -> AppResult<Self> {
        if start > end {
            return Err(AppError::validation(format!(
                "period start {start} is after end {end}"
            )));
        }
        if (end - start).whole_days() + 1 > MAX_PERIOD_DAYS {
            return Err(AppError::validation(format!(
                "period {start}..{end} is longer than {MAX_PERIOD_DAYS} days"
            )));
        }
        Ok(Self { start, end })
    }

    /// The calendar month containing `date`.
    pub fn month_of(date: Date) -> Self {
        let start = date - Duration::days(i64::from(date.day()) - 1);
        let len = time::util::days_in_year_month(date.year(), date.month());
        Self {
            start,
            end: start + Duration::days(i64::from(len) - 1),
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// Builds a period from optional `YYYY-MM-DD` query values.
    ///
    /// Both bounds or neither must be given.
    pub fn from_params(from: Option<&str>, to: Option<&str>) -> AppResult<Option<Self>> {
        match (from, to) {
            (None, None) => Ok(None),
            (Some(from), Some(to)) => {
                Self::new(parse_date_param("from", from)?, parse_date_param("to", to)?).map(Some)
            }
            _ => Err(AppError::validation("from and to must be given together")),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = Date> {
        let end = self.end;
        std::iter::successors(Some(self.start), |d| d.next_day()).take_while(move |d| *d <= end)
    }
}

pub fn parse_date_param(field: &str, value: &str) -> AppResult<Date> {
    iso_date::parse(value)
        .map_err(|_| AppError::validation(format!("invalid {field} {value:?}, expected YYYY-MM-DD")))
}

/// `YYYY-MM-DD` rendering for plain calendar dates.
pub(crate) mod iso_date {
    use serde::Serializer;
    use time::{macros::format_description, Date};

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(date)
    }

    pub fn parse(text: &str) -> Result<Date, time::error::Parse> {
        Date::parse(text.trim(), format_description!("[year]-[month]-[day]"))
    }
}
