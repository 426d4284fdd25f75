use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::adherence::period::{iso_date, parse_date_param};
use crate::error::{AppError, AppResult};

/// One scheduled dose owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MedicationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub dosage: String,
    #[serde(with = "iso_date")]
    pub scheduled_date: Date,
    /// Display only; never used for aggregation.
    pub scheduled_time: String,
    pub taken: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub taken_at: Option<OffsetDateTime>,
    pub photo_ref: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload as submitted. Every field is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMedication {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
}

/// A draft that passed validation and can be handed to the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMedication {
    pub name: String,
    pub dosage: String,
    pub scheduled_date: Date,
    pub scheduled_time: String,
}

impl NewMedication {
    pub fn validate(self) -> AppResult<ValidMedication> {
        Ok(ValidMedication {
            name: required("name", self.name)?,
            dosage: required("dosage", self.dosage)?,
            scheduled_date: parse_date(&required("scheduled_date", self.scheduled_date)?)?,
            scheduled_time: parse_time(required("scheduled_time", self.scheduled_time)?)?,
        })
    }
}

/// Edit payload. Absent fields are left alone; present ones must be valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationPatch {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
}

impl MedicationPatch {
    pub fn validate(self) -> AppResult<RecordChanges> {
        let changes = RecordChanges {
            name: self.name.map(|v| required("name", Some(v))).transpose()?,
            dosage: self.dosage.map(|v| required("dosage", Some(v))).transpose()?,
            scheduled_date: self
                .scheduled_date
                .map(|v| required("scheduled_date", Some(v)).and_then(|s| parse_date(&s)))
                .transpose()?,
            scheduled_time: self
                .scheduled_time
                .map(|v| required("scheduled_time", Some(v)).and_then(parse_time))
                .transpose()?,
            ..RecordChanges::default()
        };
        if changes.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }
        Ok(changes)
    }
}

/// Partial overwrite applied by the record store.
///
/// Nullable columns use a nested `Option`: the outer level says whether to
/// write the column at all, the inner one is the value (possibly `NULL`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChanges {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub scheduled_date: Option<Date>,
    pub scheduled_time: Option<String>,
    pub taken: Option<bool>,
    pub taken_at: Option<Option<OffsetDateTime>>,
    pub photo_ref: Option<Option<String>>,
}

impl RecordChanges {
    pub fn mark_taken(now: OffsetDateTime, photo_ref: Option<String>) -> Self {
        Self {
            taken: Some(true),
            taken_at: Some(Some(now)),
            photo_ref: Some(photo_ref),
            ..Self::default()
        }
    }

    /// Leaves `photo_ref` untouched in both directions.
    pub fn toggle(current_taken: bool, now: OffsetDateTime) -> Self {
        let taken = !current_taken;
        Self {
            taken: Some(taken),
            taken_at: Some(taken.then_some(now)),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, record: &mut MedicationRecord) {
        if let Some(v) = &self.name {
            record.name = v.clone();
        }
        if let Some(v) = &self.dosage {
            record.dosage = v.clone();
        }
        if let Some(v) = self.scheduled_date {
            record.scheduled_date = v;
        }
        if let Some(v) = &self.scheduled_time {
            record.scheduled_time = v.clone();
        }
        if let Some(v) = self.taken {
            record.taken = v;
        }
        if let Some(v) = self.taken_at {
            record.taken_at = v;
        }
        if let Some(v) = &self.photo_ref {
            record.photo_ref = v.clone();
        }
    }
}

fn required(field: &str, value: Option<String>) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

fn parse_date(value: &str) -> AppResult<Date> {
    parse_date_param("scheduled_date", value)
}

fn parse_time(value: String) -> AppResult<String> {
    lazy_static! {
        static ref TIME_RE: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d(:[0-5]\d)?$").unwrap();
    }
    if TIME_RE.is_match(&value) {
        Ok(value)
    } else {
        Err(AppError::validation(format!(
            "invalid scheduled_time {value:?}, expected HH:MM"
        )))
    }
}
