//! Serializable form description supplied by each concrete feature.

use serde::{Deserialize, Serialize};

use super::domain::FieldId;

/// Input widget family; also drives the generic format checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    Email,
    Number,
    Boolean,
    Date,
    Select { options: Vec<String> },
    MultiSelect { options: Vec<String> },
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: FieldId,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl FieldSpec {
    pub fn new(id: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            id: FieldId::from(id),
            label: label.to_string(),
            kind,
            help: None,
        }
    }

    pub fn text(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::Text)
    }

    pub fn long_text(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::LongText)
    }

    pub fn email(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::Email)
    }

    pub fn number(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::Number)
    }

    pub fn boolean(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::Boolean)
    }

    pub fn date(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::Date)
    }

    pub fn select(id: &str, label: &str, options: &[&str]) -> Self {
        Self::new(
            id,
            label,
            FieldKind::Select {
                options: options.iter().map(|option| option.to_string()).collect(),
            },
        )
    }

    pub fn multi_select(id: &str, label: &str, options: &[&str]) -> Self {
        Self::new(
            id,
            label,
            FieldKind::MultiSelect {
                options: options.iter().map(|option| option.to_string()).collect(),
            },
        )
    }

    pub fn file(id: &str, label: &str) -> Self {
        Self::new(id, label, FieldKind::File)
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }
}

/// Validity condition of one field.
///
/// With `required_when` set, the named predicate alone decides whether the field is
/// required; otherwise `mandatory` does. `validate` names an extra check run once the
/// field holds a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: FieldId,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<String>,
}

impl FieldRule {
    pub fn mandatory(field: &str) -> Self {
        Self {
            field: FieldId::from(field),
            mandatory: true,
            required_when: None,
            validate: None,
        }
    }

    pub fn optional(field: &str) -> Self {
        Self {
            mandatory: false,
            ..Self::mandatory(field)
        }
    }

    pub fn required_when(field: &str, predicate: &str) -> Self {
        Self {
            mandatory: false,
            required_when: Some(predicate.to_string()),
            ..Self::mandatory(field)
        }
    }

    pub fn validated_by(mut self, validator: &str) -> Self {
        self.validate = Some(validator.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSchema {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub rules: Vec<FieldRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activate_when: Option<String>,
}

impl StepSchema {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            fields: Vec::new(),
            rules: Vec::new(),
            activate_when: None,
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn activate_when(mut self, predicate: &str) -> Self {
        self.activate_when = Some(predicate.to_string());
        self
    }
}

/// How a read-only field is computed from other answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Derivation {
    StatutoryDeadline {
        reference_date: FieldId,
        category: FieldId,
        extended: FieldId,
    },
}

impl Derivation {
    pub fn inputs(&self) -> Vec<&FieldId> {
        match self {
            Derivation::StatutoryDeadline {
                reference_date,
                category,
                extended,
            } => vec![reference_date, category, extended],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedField {
    pub field: FieldId,
    pub label: String,
    pub derivation: Derivation,
}

impl DerivedField {
    pub fn statutory_deadline(
        field: &str,
        label: &str,
        reference_date: &str,
        category: &str,
        extended: &str,
    ) -> Self {
        Self {
            field: FieldId::from(field),
            label: label.to_string(),
            derivation: Derivation::StatutoryDeadline {
                reference_date: FieldId::from(reference_date),
                category: FieldId::from(category),
                extended: FieldId::from(extended),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: String,
    pub title: String,
    pub steps: Vec<StepSchema>,
    #[serde(default)]
    pub derived: Vec<DerivedField>,
}

impl FormSchema {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            steps: Vec::new(),
            derived: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepSchema) -> Self {
        self.steps.push(step);
        self
    }

    pub fn derived(mut self, field: DerivedField) -> Self {
        self.derived.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_round_trips_through_json_without_code() {
        let schema = FormSchema::new("subject_request", "Subject request")
            .step(
                StepSchema::new("details", "Details")
                    .field(FieldSpec::select(
                        "category",
                        "Category",
                        &["access", "erasure"],
                    ))
                    .field(FieldSpec::boolean("extended", "Extended"))
                    .field(FieldSpec::long_text("extension_reason", "Reason"))
                    .rule(FieldRule::mandatory("category"))
                    .rule(FieldRule::required_when("extension_reason", "is_extended")),
            )
            .derived(DerivedField::statutory_deadline(
                "due_date",
                "Due date",
                "received_on",
                "category",
                "extended",
            ));

        let json = serde_json::to_value(&schema).expect("schema serializes");
        assert_eq!(json["steps"][0]["fields"][0]["kind"]["type"], "select");
        assert_eq!(
            json["steps"][0]["rules"][1]["required_when"],
            "is_extended"
        );
        assert_eq!(json["derived"][0]["derivation"]["type"], "statutory_deadline");

        let restored: FormSchema = serde_json::from_value(json).expect("schema deserializes");
        assert_eq!(restored, schema);
    }
}
