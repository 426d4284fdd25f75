//! Adherence engine.
//!
//! Derives per-day status, the current streak and the adherence rate from a
//! snapshot of medication records. Pure and synchronous: no I/O, no shared
//! state, input is never mutated. Callers cache above it if they need to.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::Date;

use super::period::Period;
use crate::medications::model::MedicationRecord;

/// Longest streak reported, in days.
pub const STREAK_CAP: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Taken,
    Missed,
    None,
}

impl DayStatus {
    /// Classifies a day from its dose counts.
    ///
    /// A fully taken day is `Taken` wherever it falls. Otherwise only days
    /// strictly before `reference` can be `Missed`; today and later stay `None`.
    fn classify(total: usize, taken: usize, day: Date, reference: Date) -> Self {
        if total == 0 {
            DayStatus::None
        } else if taken == total {
            DayStatus::Taken
        } else if day < reference {
            DayStatus::Missed
        } else {
            DayStatus::None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdherenceSummary {
    pub period: Period,
    pub reference_date: Date,
    /// Every date of the period, in order.
    pub day_status: BTreeMap<Date, DayStatus>,
    pub streak: u32,
    /// Whole percent, 0..=100.
    pub adherence_rate: u32,
    pub today_taken: bool,
    pub taken_dates: BTreeSet<Date>,
    pub missed_dates: BTreeSet<Date>,
}

pub fn compute(records: &[MedicationRecord], reference: Date, period: Period) -> AdherenceSummary {
    let classified = classify_days(records, reference);
    let status_of = |day: Date| {
        classified
            .get(&day)
            .copied()
            .unwrap_or(DayStatus::None)
    };

    let day_status: BTreeMap<Date, DayStatus> =
        period.days().map(|day| (day, status_of(day))).collect();
    let dates_with = |wanted: DayStatus| -> BTreeSet<Date> {
        day_status
            .iter()
            .filter(|(_, s)| **s == wanted)
            .map(|(d, _)| *d)
            .collect()
    };
    let taken_dates = dates_with(DayStatus::Taken);
    let missed_dates = dates_with(DayStatus::Missed);

    AdherenceSummary {
        period,
        reference_date: reference,
        streak: streak(&classified, reference),
        adherence_rate: adherence_rate(&taken_dates, reference, period),
        today_taken: status_of(reference) == DayStatus::Taken,
        day_status,
        taken_dates,
        missed_dates,
    }
}

/// Status of every date that has at least one record in the snapshot,
/// including dates outside the requested period.
fn classify_days(records: &[MedicationRecord], reference: Date) -> BTreeMap<Date, DayStatus> {
    let mut counts: BTreeMap<Date, (usize, usize)> = BTreeMap::new();
    for r in records {
        let (total, taken) = counts.entry(r.scheduled_date).or_default();
        *total += 1;
        if r.taken {
            *taken += 1;
        }
    }
    counts
        .into_iter()
        .map(|(day, (total, taken))| (day, DayStatus::classify(total, taken, day, reference)))
        .collect()
}

fn streak(classified: &BTreeMap<Date, DayStatus>, reference: Date) -> u32 {
    let mut count = 0;
    let mut day = Some(reference);
    while let Some(d) = day {
        if count >= STREAK_CAP || classified.get(&d) != Some(&DayStatus::Taken) {
            break;
        }
        count += 1;
        day = d.previous_day();
    }
    count
}

/// Share of elapsed period days that were fully taken.
///
/// The elapsed window is `[period.start, min(reference, period.end)]`.
fn adherence_rate(taken_dates: &BTreeSet<Date>, reference: Date, period: Period) -> u32 {
    if reference < period.start {
        return 0;
    }
    let window_end = reference.min(period.end);
    let elapsed = (window_end - period.start).whole_days() + 1;
    let taken = taken_dates.range(period.start..=window_end).count();
    ((taken as f64 * 100.0) / elapsed as f64).round() as u32
}
