use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{AnswerMap, AnswerValue, FieldId, Scalar};
use super::form::{CompiledForm, FormField, Requirement};
use super::rules::validators::is_email;
use super::schema::FieldKind;

/// Field-level problem rendered next to the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("this field is required")]
    Required,
    #[error("invalid value: {reason}")]
    InvalidFormat { reason: String },
    #[error("inconsistent with `{other}`: {reason}")]
    CrossField { other: FieldId, reason: String },
}

impl ValidationError {
    pub fn format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }
}

/// Stateless evaluator of a compiled form's rules against an answer map.
#[derive(Debug, Clone, Copy)]
pub struct ValidationEngine<'a> {
    form: &'a CompiledForm,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(form: &'a CompiledForm) -> Self {
        Self { form }
    }

    pub fn is_step_active(&self, step: usize, answers: &AnswerMap) -> bool {
        match self.form.step(step) {
            Some(step) => step
                .activation
                .as_ref()
                .map(|predicate| predicate.evaluate(answers))
                .unwrap_or(true),
            None => false,
        }
    }

    /// Schema indices of the steps shown for the current answers, in order.
    pub fn active_steps(&self, answers: &AnswerMap) -> Vec<usize> {
        (0..self.form.steps().len())
            .filter(|index| self.is_step_active(*index, answers))
            .collect()
    }

    /// A field is required only while its step is active and its requirement holds.
    pub fn is_required(&self, field: &str, answers: &AnswerMap) -> bool {
        match self.form.field(field) {
            Some(definition) => {
                self.is_step_active(definition.step, answers)
                    && requirement_holds(definition, answers)
            }
            None => false,
        }
    }

    pub fn validate_field(&self, field: &str, answers: &AnswerMap) -> Option<ValidationError> {
        let definition = self.form.field(field)?;
        if !self.is_step_active(definition.step, answers) {
            return None;
        }

        // Fields without an active requirement are never checked, whatever they hold.
        if !requirement_holds(definition, answers) {
            return None;
        }
        let value = answers.value(field);
        if value.is_empty() {
            return Some(ValidationError::Required);
        }

        check_kind(&definition.spec.kind, value).or_else(|| {
            definition
                .validator
                .as_ref()
                .and_then(|validator| validator.check(value, answers))
        })
    }

    /// All outstanding errors of one step; empty for inactive steps.
    pub fn validate_step(
        &self,
        step: usize,
        answers: &AnswerMap,
    ) -> BTreeMap<FieldId, ValidationError> {
        let Some(definition) = self.form.step(step) else {
            return BTreeMap::new();
        };
        if !self.is_step_active(step, answers) {
            return BTreeMap::new();
        }

        definition
            .fields
            .iter()
            .filter_map(|field| {
                self.validate_field(field.as_str(), answers)
                    .map(|error| (field.clone(), error))
            })
            .collect()
    }

    pub fn can_advance(&self, step: usize, answers: &AnswerMap) -> bool {
        self.validate_step(step, answers).is_empty()
    }
}

fn requirement_holds(definition: &FormField, answers: &AnswerMap) -> bool {
    match &definition.requirement {
        Requirement::Always => true,
        Requirement::When(predicate) => predicate.evaluate(answers),
        Requirement::Optional | Requirement::Disabled => false,
    }
}

/// Generic checks implied by the widget kind, identical for every form.
fn check_kind(kind: &FieldKind, value: &AnswerValue) -> Option<ValidationError> {
    match kind {
        FieldKind::Text | FieldKind::LongText => match value {
            AnswerValue::Scalar(Scalar::Text(_)) => None,
            _ => Some(ValidationError::format("expected text")),
        },
        FieldKind::Email => match value.as_text() {
            Some(text) if is_email(text) => None,
            _ => Some(ValidationError::format("expected an e-mail address")),
        },
        FieldKind::Number => match value.as_number() {
            Some(_) => None,
            None => Some(ValidationError::format("expected a number")),
        },
        FieldKind::Boolean => match value.as_bool() {
            Some(_) => None,
            None => Some(ValidationError::format("expected yes or no")),
        },
        FieldKind::Date => match value.as_date() {
            Some(_) => None,
            None => Some(ValidationError::format("expected a date in YYYY-MM-DD form")),
        },
        FieldKind::Select { options } => match value.as_text() {
            Some(choice) if options.iter().any(|option| option == choice) => None,
            Some(choice) => Some(ValidationError::format(format!(
                "`{choice}` is not one of the available options"
            ))),
            None => Some(ValidationError::format("expected one option")),
        },
        FieldKind::MultiSelect { options } => match value {
            AnswerValue::List(items) => items.iter().find_map(|item| match item.as_text() {
                Some(choice) if options.iter().any(|option| option == choice) => None,
                Some(choice) => Some(ValidationError::format(format!(
                    "`{choice}` is not one of the available options"
                ))),
                None => Some(ValidationError::format("expected a list of options")),
            }),
            _ => Some(ValidationError::format("expected a list of options")),
        },
        FieldKind::File => match value {
            AnswerValue::Files(_) => None,
            _ => Some(ValidationError::format("expected uploaded files")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::forms::rules::{predicates, FunctionRegistry};
    use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};

    fn form() -> CompiledForm {
        let schema = FormSchema::new("sample", "Sample").step(
            StepSchema::new("one", "One")
                .field(FieldSpec::boolean("breach_occurred", "Breach occurred"))
                .field(FieldSpec::long_text("affected_data", "Affected data"))
                .field(FieldSpec::email("contact", "Contact"))
                .field(FieldSpec::select("severity", "Severity", &["low", "high"]))
                .field(FieldSpec::text("ghosted", "Ghosted"))
                .rule(FieldRule::mandatory("breach_occurred"))
                .rule(FieldRule::required_when("affected_data", "breach"))
                .rule(FieldRule::optional("contact"))
                .rule(FieldRule::mandatory("severity"))
                .rule(FieldRule::required_when("ghosted", "unknown_predicate")),
        );
        let registry = FunctionRegistry::with_builtins()
            .with_predicate("breach", predicates::is_true("breach_occurred"));
        CompiledForm::compile(schema, &registry).expect("compiles")
    }

    #[test]
    fn mandatory_fields_report_required() {
        let form = form();
        let engine = ValidationEngine::new(&form);
        let answers = AnswerMap::new();

        let errors = engine.validate_step(0, &answers);
        assert_eq!(
            errors.get("breach_occurred"),
            Some(&ValidationError::Required)
        );
        assert_eq!(errors.get("severity"), Some(&ValidationError::Required));
        assert!(!errors.contains_key("affected_data"));
        assert!(!errors.contains_key("contact"));
        assert!(!engine.can_advance(0, &answers));
    }

    #[test]
    fn optional_fields_are_never_validated() {
        let form = form();
        let engine = ValidationEngine::new(&form);
        let mut answers: AnswerMap = [
            ("breach_occurred", AnswerValue::bool(false)),
            ("severity", AnswerValue::text("low")),
        ]
        .into_iter()
        .collect();
        assert!(engine.can_advance(0, &answers));

        answers.set(FieldId::from("contact"), AnswerValue::text("not-an-email"));
        assert_eq!(engine.validate_field("contact", &answers), None);
        assert!(engine.validate_step(0, &answers).is_empty());
        assert!(engine.can_advance(0, &answers));
        assert!(!engine.is_required("contact", &answers));
    }

    #[test]
    fn disabled_rules_never_require_the_field() {
        let form = form();
        let engine = ValidationEngine::new(&form);
        let answers = AnswerMap::new();
        assert!(!engine.is_required("ghosted", &answers));
        assert_eq!(engine.validate_field("ghosted", &answers), None);
        assert_eq!(engine.validate_field("not_a_field", &answers), None);
    }

    #[test]
    fn select_values_must_be_declared_options() {
        let form = form();
        let engine = ValidationEngine::new(&form);
        let answers: AnswerMap = [("severity", AnswerValue::text("catastrophic"))]
            .into_iter()
            .collect();
        assert!(matches!(
            engine.validate_field("severity", &answers),
            Some(ValidationError::InvalidFormat { ref reason }) if reason.contains("catastrophic")
        ));
    }

    #[test]
    fn conditional_requirement_follows_gate() {
        let form = form();
        let engine = ValidationEngine::new(&form);
        let mut answers: AnswerMap = [
            ("breach_occurred", AnswerValue::bool(true)),
            ("severity", AnswerValue::text("high")),
        ]
        .into_iter()
        .collect();

        assert!(engine.is_required("affected_data", &answers));
        assert_eq!(
            engine.validate_field("affected_data", &answers),
            Some(ValidationError::Required)
        );

        answers.set(FieldId::from("breach_occurred"), AnswerValue::bool(false));
        assert!(!engine.is_required("affected_data", &answers));
        assert!(engine.can_advance(0, &answers));
    }
}
