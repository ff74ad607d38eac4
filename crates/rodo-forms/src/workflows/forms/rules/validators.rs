use std::sync::OnceLock;

use regex::Regex;

use super::Validator;
use crate::workflows::forms::domain::{AnswerMap, AnswerValue, FieldId};
use crate::workflows::forms::validation::ValidationError;

pub fn email() -> Validator {
    Validator::standalone(|value| match value.as_text() {
        Some(text) if is_email(text) => None,
        _ => Some(ValidationError::format("expected an e-mail address")),
    })
}

pub fn date() -> Validator {
    Validator::standalone(|value| match value.as_date() {
        Some(_) => None,
        None => Some(ValidationError::format("expected a date in YYYY-MM-DD form")),
    })
}

/// Checkbox-style consent: the value must be an explicit `true`.
pub fn accepted() -> Validator {
    Validator::standalone(|value| match value.as_bool() {
        Some(true) => None,
        _ => Some(ValidationError::format("must be accepted")),
    })
}

pub fn min_length(min: usize) -> Validator {
    Validator::standalone(move |value| {
        let length = value
            .as_text()
            .map(|text| text.chars().count())
            .unwrap_or(0);
        if length >= min {
            None
        } else {
            Some(ValidationError::format(format!(
                "must be at least {min} characters long"
            )))
        }
    })
}

/// Confirmation inputs: the value must equal the other field's value.
pub fn matches_field(other: &str) -> Validator {
    let key = FieldId::from(other);
    Validator::new([other], move |value: &AnswerValue, answers: &AnswerMap| {
        if answers.value(key.as_str()) == value {
            None
        } else {
            Some(ValidationError::CrossField {
                other: key.clone(),
                reason: "values do not match".to_string(),
            })
        }
    })
}

/// Date ranges: the value must not fall before the other field's date.
pub fn not_before_field(other: &str) -> Validator {
    let key = FieldId::from(other);
    Validator::new([other], move |value: &AnswerValue, answers: &AnswerMap| {
        let Some(date) = value.as_date() else {
            return Some(ValidationError::format("expected a date in YYYY-MM-DD form"));
        };
        match answers.value(key.as_str()).as_date() {
            Some(start) if date < start => Some(ValidationError::CrossField {
                other: key.clone(),
                reason: format!("must not be before {start}"),
            }),
            _ => None,
        }
    })
}

/// Free-text input checked against a regular expression; surrounding whitespace is ignored.
pub fn matches_pattern(
    pattern: &str,
    reason: impl Into<String>,
) -> Result<Validator, regex::Error> {
    let pattern = Regex::new(pattern)?;
    let reason = reason.into();
    Ok(Validator::standalone(move |value| match value.as_text() {
        Some(text) if pattern.is_match(text.trim()) => None,
        _ => Some(ValidationError::format(reason.clone())),
    }))
}

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$";

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
        .as_ref()
}

/// Shared by the `email` validator and the e-mail field kind.
pub(crate) fn is_email(raw: &str) -> bool {
    email_pattern().is_some_and(|pattern| pattern.is_match(raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn email_shapes() {
        assert!(is_email("iod@firma.pl"));
        assert!(is_email(" jan.kowalski@urzad.gov.pl "));
        assert!(!is_email("jan kowalski@firma.pl"));
        assert!(!is_email("no-at-sign.pl"));
        assert!(!is_email("a@b@c.pl"));
        assert!(!is_email("a@localhost"));
        assert!(!is_email("a@firma..pl"));
        assert!(!is_email("a@.pl"));
        assert!(!is_email(""));
    }

    #[test]
    fn email_validator_and_field_kind_agree() {
        let validator = email();
        let answers = AnswerMap::new();
        for candidate in ["iod@firma.pl", "a@localhost", "a@b@c.pl", "jan kowalski@firma.pl"] {
            assert_eq!(
                validator
                    .check(&AnswerValue::text(candidate), &answers)
                    .is_none(),
                is_email(candidate),
                "{candidate}"
            );
        }
        assert!(validator.check(&AnswerValue::bool(true), &answers).is_some());
    }

    #[test]
    fn pattern_validator_reports_its_reason() {
        let validator = matches_pattern(r"^\+?[0-9 ()-]{7,20}$", "expected a phone number")
            .expect("valid pattern");
        let answers = AnswerMap::new();
        assert!(validator
            .check(&AnswerValue::text("+48 22 123 45 67"), &answers)
            .is_none());
        assert_eq!(
            validator.check(&AnswerValue::text("call me"), &answers),
            Some(ValidationError::format("expected a phone number"))
        );
        assert!(matches_pattern("(unclosed", "never built").is_err());
    }

    #[test]
    fn confirmation_must_match_other_field() {
        let answers: AnswerMap = [("new_password", AnswerValue::text("correct horse"))]
            .into_iter()
            .collect();
        let validator = matches_field("new_password");

        assert_eq!(
            validator.check(&AnswerValue::text("correct horse"), &answers),
            None
        );
        assert!(matches!(
            validator.check(&AnswerValue::text("battery staple"), &answers),
            Some(ValidationError::CrossField { ref other, .. }) if other.as_str() == "new_password"
        ));
    }

    #[test]
    fn end_date_cannot_precede_start_date() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date");
        let answers: AnswerMap = [("period_start", AnswerValue::date(start))]
            .into_iter()
            .collect();
        let validator = not_before_field("period_start");

        assert!(validator
            .check(&AnswerValue::text("2024-03-09"), &answers)
            .is_some());
        assert!(validator
            .check(&AnswerValue::text("2024-03-10"), &answers)
            .is_none());
    }

    #[test]
    fn min_length_counts_characters() {
        let validator = min_length(4);
        let answers = AnswerMap::new();
        assert!(validator.check(&AnswerValue::text("żółć"), &answers).is_none());
        assert!(validator.check(&AnswerValue::text("abc"), &answers).is_some());
    }
}
