use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::workflows::catalog::FormCatalog;

use crate::workflows::forms::domain::{AnswerValue, FieldId, FileRef, RecordId};
use crate::workflows::forms::form::CompiledForm;
use crate::workflows::forms::rules::{predicates, FunctionRegistry};
use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};
use crate::workflows::forms::service::WizardService;
use crate::workflows::forms::submission::{
    SubmissionCoordinator, SubmissionError, SubmissionHooks, SubmissionPayload, SubmitOperation,
};
use crate::workflows::forms::wizard::WizardStateMachine;

pub(super) const DETAILS: usize = 0;
pub(super) const ASSESSMENT: usize = 1;
pub(super) const NOTIFICATION: usize = 2;
pub(super) const REVIEW: usize = 3;

/// Four-step breach report; the notification step only appears for breaches.
pub(super) fn breach_schema() -> FormSchema {
    FormSchema::new("breach_report", "Breach report")
        .step(
            StepSchema::new("details", "Details")
                .field(FieldSpec::text("title", "Title"))
                .field(FieldSpec::email("contact", "Contact"))
                .field(FieldSpec::file("evidence", "Evidence"))
                .rule(FieldRule::mandatory("title"))
                .rule(FieldRule::optional("contact"))
                .rule(FieldRule::optional("evidence")),
        )
        .step(
            StepSchema::new("assessment", "Assessment")
                .field(FieldSpec::boolean("breach_occurred", "Breach occurred"))
                .field(FieldSpec::long_text("affected_data", "Affected data"))
                .rule(FieldRule::mandatory("breach_occurred"))
                .rule(FieldRule::required_when("affected_data", "breach")),
        )
        .step(
            StepSchema::new("notification", "Notification")
                .activate_when("breach")
                .field(FieldSpec::date("notified_on", "Notified on"))
                .rule(FieldRule::mandatory("notified_on")),
        )
        .step(
            StepSchema::new("review", "Review")
                .field(FieldSpec::boolean("confirmed", "Confirmed"))
                .rule(FieldRule::mandatory("confirmed").validated_by("accepted")),
        )
}

pub(super) fn breach_registry() -> FunctionRegistry {
    FunctionRegistry::with_builtins().with_predicate("breach", predicates::is_true("breach_occurred"))
}

pub(super) fn breach_form() -> Arc<CompiledForm> {
    Arc::new(CompiledForm::compile(breach_schema(), &breach_registry()).expect("fixture compiles"))
}

pub(super) fn wizard() -> WizardStateMachine {
    WizardStateMachine::new(breach_form())
}

pub(super) fn set(wizard: &mut WizardStateMachine, field: &str, value: AnswerValue) {
    wizard
        .set_answer(field, value)
        .unwrap_or_else(|error| panic!("setting `{field}` failed: {error}"));
}

/// Values of a complete, valid record.
pub(super) fn valid_values(breach: bool) -> Vec<(FieldId, AnswerValue)> {
    let mut values = vec![
        (FieldId::from("title"), AnswerValue::text("Lost laptop")),
        (
            FieldId::from("evidence"),
            AnswerValue::files(vec![FileRef {
                name: "police-report.pdf".to_string(),
                storage_key: "uploads/police-report.pdf".to_string(),
                size_bytes: Some(48_213),
            }]),
        ),
        (FieldId::from("breach_occurred"), AnswerValue::bool(breach)),
        (FieldId::from("confirmed"), AnswerValue::bool(true)),
    ];
    if breach {
        values.push((
            FieldId::from("affected_data"),
            AnswerValue::text("Customer addresses"),
        ));
        values.push((FieldId::from("notified_on"), AnswerValue::text("2024-04-02")));
    }
    values
}

/// Wizard filled with valid answers and advanced to the review step.
pub(super) fn wizard_on_review(breach: bool) -> WizardStateMachine {
    let mut wizard = wizard();
    for (field, value) in valid_values(breach) {
        set(&mut wizard, field.as_str(), value);
        if wizard.can_advance() && wizard.current_step_index() != REVIEW {
            wizard.next().expect("valid step advances");
        }
    }
    while wizard.current_step_index() != REVIEW {
        wizard.next().expect("valid step advances");
    }
    wizard
}

/// Service over a catalog holding only the breach report.
pub(super) fn breach_service(
    operation: RecordingOperation,
) -> Arc<WizardService<RecordingOperation>> {
    let mut catalog = FormCatalog::new();
    catalog
        .register(breach_schema(), &breach_registry())
        .expect("fixture compiles");
    let coordinator = SubmissionCoordinator::new(Arc::new(operation));
    Arc::new(WizardService::new(Arc::new(catalog), coordinator))
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Submit operation recording every call. Optionally waits on a gate before answering.
#[derive(Default)]
pub(super) struct RecordingOperation {
    calls: AtomicUsize,
    payloads: Mutex<Vec<SubmissionPayload>>,
    failures: Mutex<Vec<SubmissionError>>,
    gate: Option<Arc<Notify>>,
}

impl RecordingOperation {
    pub(super) fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let operation = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (operation, gate)
    }

    pub(super) fn failing_once(error: SubmissionError) -> Self {
        Self {
            failures: Mutex::new(vec![error]),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn payloads(&self) -> Vec<SubmissionPayload> {
        self.payloads.lock().expect("payload mutex poisoned").clone()
    }
}

impl SubmitOperation for RecordingOperation {
    async fn submit(
        &self,
        _form_id: &str,
        payload: SubmissionPayload,
    ) -> Result<RecordId, SubmissionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.payloads
            .lock()
            .expect("payload mutex poisoned")
            .push(payload);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let failure = self.failures.lock().expect("failure mutex poisoned").pop();
        match failure {
            Some(error) => Err(error),
            None => Ok(RecordId(format!("rec-{call:06}"))),
        }
    }
}

#[derive(Default)]
pub(super) struct RecordingHooks {
    pub(super) successes: Mutex<Vec<RecordId>>,
    pub(super) failures: Mutex<Vec<SubmissionError>>,
}

impl SubmissionHooks for RecordingHooks {
    fn on_success(&self, _form_id: &str, record_id: &RecordId) {
        self.successes
            .lock()
            .expect("hook mutex poisoned")
            .push(record_id.clone());
    }

    fn on_failure(&self, _form_id: &str, error: &SubmissionError) {
        self.failures
            .lock()
            .expect("hook mutex poisoned")
            .push(error.clone());
    }
}
