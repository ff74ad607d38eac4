use super::Predicate;
use crate::workflows::forms::domain::{AnswerMap, FieldId, Scalar};

/// True when the field holds a boolean `true` (or "yes"/"true" text).
pub fn is_true(field: &str) -> Predicate {
    let key = field.to_string();
    Predicate::new([field], move |answers: &AnswerMap| {
        answers.value(&key).as_bool().unwrap_or(false)
    })
}

/// True when the field holds exactly the given text option.
pub fn equals(field: &str, expected: impl Into<String>) -> Predicate {
    let key = field.to_string();
    let expected = expected.into();
    Predicate::new([field], move |answers: &AnswerMap| {
        answers.value(&key).as_text() == Some(expected.as_str())
    })
}

/// True when the field holds any of the given text options.
pub fn one_of(field: &str, options: &[&str]) -> Predicate {
    let key = field.to_string();
    let options: Vec<String> = options.iter().map(|option| option.to_string()).collect();
    Predicate::new([field], move |answers: &AnswerMap| {
        answers
            .value(&key)
            .as_text()
            .map(|value| options.iter().any(|option| option == value))
            .unwrap_or(false)
    })
}

/// True when the field has a non-empty value.
pub fn is_filled(field: &str) -> Predicate {
    let key = field.to_string();
    Predicate::new([field], move |answers: &AnswerMap| {
        !answers.value(&key).is_empty()
    })
}

/// True when at least one of the fields holds the given text option.
pub fn any_equals(fields: &[&str], expected: impl Into<String>) -> Predicate {
    let keys: Vec<FieldId> = fields.iter().map(|field| FieldId::from(*field)).collect();
    let expected = Scalar::Text(expected.into());
    Predicate::new(keys.clone(), move |answers: &AnswerMap| {
        keys.iter()
            .any(|key| answers.value(key.as_str()).as_scalar() == Some(&expected))
    })
}
