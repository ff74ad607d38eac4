//! Statutory response deadlines for data-subject requests.
//!
//! The 21-day window for erasure and objection requests is a business rule carried over
//! from the existing registry, not a cited statutory constant; confirm it with the data
//! protection officer before relying on it for anything user-facing beyond reminders.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{AnswerMap, FieldId};

pub const STANDARD_RESPONSE_DAYS: i64 = 30;
pub const SHORTENED_RESPONSE_DAYS: i64 = 21;
pub const EXTENSION_DAYS: i64 = 60;

/// Data-subject right exercised by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    Access,
    Rectification,
    Erasure,
    Restriction,
    Portability,
    Objection,
}

impl RequestCategory {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Access,
            Self::Rectification,
            Self::Erasure,
            Self::Restriction,
            Self::Portability,
            Self::Objection,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Rectification => "rectification",
            Self::Erasure => "erasure",
            Self::Restriction => "restriction",
            Self::Portability => "portability",
            Self::Objection => "objection",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Access => "Right of access",
            Self::Rectification => "Right to rectification",
            Self::Erasure => "Right to erasure",
            Self::Restriction => "Right to restriction of processing",
            Self::Portability => "Right to data portability",
            Self::Objection => "Right to object",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        Self::ordered()
            .into_iter()
            .find(|category| category.key().eq_ignore_ascii_case(needle))
    }

    pub const fn baseline_days(self) -> i64 {
        match self {
            Self::Erasure | Self::Objection => SHORTENED_RESPONSE_DAYS,
            _ => STANDARD_RESPONSE_DAYS,
        }
    }
}

/// Derived due date; `Undetermined` until every input is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "date", rename_all = "snake_case")]
pub enum Deadline {
    Undetermined,
    Due(NaiveDate),
}

impl Deadline {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            Deadline::Due(date) => Some(date),
            Deadline::Undetermined => None,
        }
    }

    /// Negative once the deadline has passed.
    pub fn days_remaining(self, today: NaiveDate) -> Option<i64> {
        self.date().map(|due| (due - today).num_days())
    }

    pub fn is_overdue(self, today: NaiveDate) -> bool {
        self.date().map(|due| due < today).unwrap_or(false)
    }
}

pub fn compute_deadline(
    reference_date: Option<NaiveDate>,
    category: RequestCategory,
    extended: bool,
) -> Deadline {
    let Some(reference_date) = reference_date else {
        return Deadline::Undetermined;
    };

    let mut days = category.baseline_days();
    if extended {
        days += EXTENSION_DAYS;
    }

    reference_date
        .checked_add_signed(Duration::days(days))
        .map(Deadline::Due)
        .unwrap_or(Deadline::Undetermined)
}

/// Inputs of the calculator as read from a wizard's answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineInput {
    pub reference_date: Option<NaiveDate>,
    pub category: Option<RequestCategory>,
    pub extended: bool,
}

impl DeadlineInput {
    pub fn from_answers(
        answers: &AnswerMap,
        reference_date: &FieldId,
        category: &FieldId,
        extended: &FieldId,
    ) -> Self {
        Self {
            reference_date: answers.value(reference_date.as_str()).as_date(),
            category: answers
                .value(category.as_str())
                .as_text()
                .and_then(RequestCategory::parse),
            extended: answers
                .value(extended.as_str())
                .as_bool()
                .unwrap_or(false),
        }
    }

    pub fn deadline(&self) -> Deadline {
        match self.category {
            Some(category) => compute_deadline(self.reference_date, category, self.extended),
            None => Deadline::Undetermined,
        }
    }
}
