use serde::{Deserialize, Serialize};
use time::Date;

use super::engine::{AdherenceSummary, DayStatus};
use super::period::{iso_date, Period};

#[derive(Debug, Deserialize)]
pub struct AdherenceQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub today: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DayEntry {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub status: DayStatus,
}

#[derive(Debug, Serialize)]
pub struct AdherenceResponse {
    pub period: Period,
    #[serde(with = "iso_date")]
    pub reference_date: Date,
    pub streak: u32,
    pub adherence_rate: u32,
    pub today_taken: bool,
    pub days: Vec<DayEntry>,
    pub taken_dates: Vec<String>,
    pub missed_dates: Vec<String>,
}

impl From<AdherenceSummary> for AdherenceResponse {
    fn from(s: AdherenceSummary) -> Self {
        Self {
            period: s.period,
            reference_date: s.reference_date,
            streak: s.streak,
            adherence_rate: s.adherence_rate,
            today_taken: s.today_taken,
            days: s
                .day_status
                .into_iter()
                .map(|(date, status)| DayEntry { date, status })
                .collect(),
            taken_dates: s.taken_dates.iter().map(Date::to_string).collect(),
            missed_dates: s.missed_dates.iter().map(Date::to_string).collect(),
        }
    }
}
