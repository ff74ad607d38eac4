use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Key of a single form field, unique across a form schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FieldId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the backend to a created record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

/// Single typed value entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(value) => Some(*value),
            Scalar::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Some(true),
                "false" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Dates arrive either typed or as ISO `YYYY-MM-DD` text from form inputs.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(date) => Some(*date),
            Scalar::Text(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(value) if value.is_finite() => Some(*value),
            Scalar::Text(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(text) if text.trim().is_empty())
    }
}

/// Opaque reference to an uploaded file; file contents never travel with the answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Value held by one field of the answer map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    #[default]
    Empty,
    Scalar(Scalar),
    List(Vec<Scalar>),
    Files(Vec<FileRef>),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::Text(value.into()))
    }

    pub fn number(value: f64) -> Self {
        Self::Scalar(Scalar::Number(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }

    pub fn date(value: NaiveDate) -> Self {
        Self::Scalar(Scalar::Date(value))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(
            items
                .into_iter()
                .map(|item| Scalar::Text(item.into()))
                .collect(),
        )
    }

    pub fn files(files: Vec<FileRef>) -> Self {
        Self::Files(files)
    }

    /// Blank text, empty lists and empty uploads all count as "nothing entered".
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Empty => true,
            AnswerValue::Scalar(scalar) => scalar.is_blank(),
            AnswerValue::List(items) => items.is_empty(),
            AnswerValue::Files(files) => files.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            AnswerValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_text)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_scalar().and_then(Scalar::as_bool)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_scalar().and_then(Scalar::as_date)
    }

    pub fn as_number(&self) -> Option<f64> {
        self.as_scalar().and_then(Scalar::as_number)
    }
}

static EMPTY_VALUE: AnswerValue = AnswerValue::Empty;

/// Current value of a field plus whether the user has interacted with it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Answer {
    pub value: AnswerValue,
    pub touched: bool,
}

/// The wizard's single source of truth for entered values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap {
    entries: BTreeMap<FieldId, Answer>,
}

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Answer> {
        self.entries.get(field)
    }

    /// Value of a field, `Empty` when the field has never been set.
    pub fn value(&self, field: &str) -> &AnswerValue {
        self.entries
            .get(field)
            .map(|answer| &answer.value)
            .unwrap_or(&EMPTY_VALUE)
    }

    pub fn is_touched(&self, field: &str) -> bool {
        self.entries
            .get(field)
            .map(|answer| answer.touched)
            .unwrap_or(false)
    }

    /// Records a user edit. Returns whether the stored value changed.
    pub fn set(&mut self, field: FieldId, value: AnswerValue) -> bool {
        let answer = self.entries.entry(field).or_default();
        answer.touched = true;
        if answer.value == value {
            return false;
        }
        answer.value = value;
        true
    }

    /// Stores a value without marking it touched (seeding and derived values).
    pub fn put(&mut self, field: FieldId, value: AnswerValue) {
        self.entries.entry(field).or_default().value = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &Answer)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for AnswerMap
where
    K: Into<FieldId>,
    V: Into<AnswerValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = AnswerMap::new();
        for (field, value) in iter {
            map.put(field.into(), value.into());
        }
        map
    }
}
