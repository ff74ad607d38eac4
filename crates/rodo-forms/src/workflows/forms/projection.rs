//! Read-only projection handed to renderers.

use serde::Serialize;

use super::domain::{AnswerValue, FieldId, RecordId};
use super::schema::FieldKind;
use super::submission::SubmissionError;
use super::validation::{ValidationEngine, ValidationError};
use super::wizard::{SubmissionState, WizardPhase, WizardStateMachine};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub id: FieldId,
    pub label: String,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub value: AnswerValue,
    pub touched: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    /// Index in the schema, accepted by `jump_to`.
    pub index: usize,
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldView>,
    pub can_advance: bool,
    pub validated: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardView {
    pub form_id: String,
    pub title: String,
    pub active_step_index: usize,
    pub active_step_count: usize,
    pub is_last_step: bool,
    pub can_advance: bool,
    /// Active steps only; skipped steps are never listed.
    pub steps: Vec<StepView>,
    pub computed: Vec<FieldView>,
    pub dirty: bool,
    pub phase: WizardPhase,
    pub submission_state: SubmissionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_error: Option<SubmissionError>,
}

impl WizardView {
    pub fn of(wizard: &WizardStateMachine) -> Self {
        let form = wizard.form();
        let answers = wizard.answers();
        let engine = ValidationEngine::new(form);
        let current = wizard.current_step_index();
        let active = engine.active_steps(answers);

        let steps = active
            .iter()
            .filter_map(|index| form.step(*index).map(|step| (*index, step)))
            .map(|(index, step)| StepView {
                index,
                id: step.id.clone(),
                title: step.title.clone(),
                fields: step
                    .fields
                    .iter()
                    .filter_map(|field| form.field(field.as_str()))
                    .map(|field| {
                        let id = field.spec.id.as_str();
                        FieldView {
                            id: field.spec.id.clone(),
                            label: field.spec.label.clone(),
                            kind: field.spec.kind.clone(),
                            help: field.spec.help.clone(),
                            value: answers.value(id).clone(),
                            touched: answers.is_touched(id),
                            required: engine.is_required(id, answers),
                            error: wizard.errors().get(id).cloned(),
                            read_only: false,
                        }
                    })
                    .collect(),
                can_advance: engine.can_advance(index, answers),
                validated: wizard.is_validated(index),
                is_current: index == current,
            })
            .collect();

        let computed = form
            .derived()
            .iter()
            .map(|derived| FieldView {
                id: derived.field.clone(),
                label: derived.label.clone(),
                kind: FieldKind::Date,
                help: None,
                value: answers.value(derived.field.as_str()).clone(),
                touched: false,
                required: false,
                error: None,
                read_only: true,
            })
            .collect();

        Self {
            form_id: form.id().to_string(),
            title: form.title().to_string(),
            active_step_index: wizard.active_step_index(),
            active_step_count: active.len(),
            is_last_step: active.last() == Some(&current),
            can_advance: engine.can_advance(current, answers),
            steps,
            computed,
            dirty: wizard.is_dirty(),
            phase: wizard.phase(),
            submission_state: wizard.submission_state(),
            record_id: wizard.record_id().cloned(),
            submission_error: wizard.last_failure().cloned(),
        }
    }

    pub fn current_step(&self) -> Option<&StepView> {
        self.steps.iter().find(|step| step.is_current)
    }

    pub fn field(&self, id: &str) -> Option<&FieldView> {
        self.steps
            .iter()
            .flat_map(|step| step.fields.iter())
            .chain(self.computed.iter())
            .find(|field| field.id.as_str() == id)
    }
}
