//! Single in-flight submission of a finished wizard.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::domain::{AnswerValue, FieldId, FileRef, RecordId, Scalar};
use super::wizard::{StateError, WizardStateMachine};

/// Backend failure; the wizard keeps its answers and the caller may submit again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SubmissionError {
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("submission timed out after {0} ms")]
    TimedOut(u64),
}

/// Flat value sent to the backend. File fields travel as attachment references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
    Attachments(Vec<FileRef>),
}

impl PayloadValue {
    /// `None` for empty answers, which are left out of the payload.
    pub fn from_answer(value: &AnswerValue) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        match value {
            AnswerValue::Empty => None,
            AnswerValue::Scalar(scalar) => Some(PayloadValue::Scalar(scalar.clone())),
            AnswerValue::List(items) => Some(PayloadValue::List(items.clone())),
            AnswerValue::Files(files) => Some(PayloadValue::Attachments(files.clone())),
        }
    }

    pub fn into_answer(self) -> AnswerValue {
        match self {
            PayloadValue::Scalar(scalar) => AnswerValue::Scalar(scalar),
            PayloadValue::List(items) => AnswerValue::List(items),
            PayloadValue::Attachments(files) => AnswerValue::Files(files),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub form_id: String,
    pub fields: BTreeMap<FieldId, PayloadValue>,
}

impl SubmissionPayload {
    pub fn get(&self, field: &str) -> Option<&PayloadValue> {
        self.fields.get(field)
    }

    /// Values suitable for seeding an edit-mode wizard from a stored record.
    pub fn into_values(self) -> impl Iterator<Item = (FieldId, AnswerValue)> {
        self.fields
            .into_iter()
            .map(|(field, value)| (field, value.into_answer()))
    }
}

/// Handle of one started submission, returned by `WizardStateMachine::begin_submission`.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    pub form_id: String,
    pub payload: SubmissionPayload,
    pub generation: u64,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Another submission was already in flight.
    Ignored,
    Succeeded { record_id: RecordId },
    Failed { error: SubmissionError },
    /// The wizard was detached or cancelled before the result arrived.
    Discarded,
}

/// Abstract backend call creating a record.
pub trait SubmitOperation: Send + Sync {
    fn submit(
        &self,
        form_id: &str,
        payload: SubmissionPayload,
    ) -> impl Future<Output = Result<RecordId, SubmissionError>> + Send;
}

/// Side effects run after a submission settles (sounds, toasts, audit trail).
pub trait SubmissionHooks: Send + Sync {
    fn on_success(&self, _form_id: &str, _record_id: &RecordId) {}

    fn on_failure(&self, _form_id: &str, _error: &SubmissionError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl SubmissionHooks for NoopHooks {}

/// Runs the submit operation for a wizard at most once at a time.
pub struct SubmissionCoordinator<S> {
    operation: Arc<S>,
    hooks: Arc<dyn SubmissionHooks>,
    timeout: Option<Duration>,
}

impl<S> SubmissionCoordinator<S>
where
    S: SubmitOperation + 'static,
{
    pub fn new(operation: Arc<S>) -> Self {
        Self {
            operation,
            hooks: Arc::new(NoopHooks),
            timeout: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SubmissionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Caller-side limit around the submit operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn operation(&self) -> &Arc<S> {
        &self.operation
    }

    /// Submits the wizard's payload. The lock is never held across the backend call.
    pub async fn submit(
        &self,
        wizard: &Mutex<WizardStateMachine>,
    ) -> Result<SubmitOutcome, StateError> {
        let ticket = {
            let mut guard = wizard.lock().unwrap_or_else(PoisonError::into_inner);
            guard.begin_submission()?
        };
        let Some(ticket) = ticket else {
            debug!("submission already in flight; request ignored");
            return Ok(SubmitOutcome::Ignored);
        };

        let form_id = ticket.form_id.clone();
        let cancellation = ticket.cancellation.clone();
        info!(form = %form_id, fields = ticket.payload.fields.len(), "submitting wizard");

        let call = self.bounded(self.operation.submit(&form_id, ticket.payload.clone()));
        let result = tokio::select! {
            _ = cancellation.cancelled() => {
                info!(form = %form_id, "wizard detached; submission result will be discarded");
                return Ok(SubmitOutcome::Discarded);
            }
            result = call => result,
        };

        let outcome = wizard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .complete_submission(ticket, result);

        match &outcome {
            SubmitOutcome::Succeeded { record_id } => {
                info!(form = %form_id, record = %record_id.0, "submission succeeded");
                self.hooks.on_success(&form_id, record_id);
            }
            SubmitOutcome::Failed { error } => {
                warn!(form = %form_id, %error, "submission failed");
                self.hooks.on_failure(&form_id, error);
            }
            SubmitOutcome::Discarded => {
                debug!(form = %form_id, "late submission result discarded");
            }
            SubmitOutcome::Ignored => {}
        }

        Ok(outcome)
    }

    async fn bounded<F>(&self, call: F) -> Result<RecordId, SubmissionError>
    where
        F: Future<Output = Result<RecordId, SubmissionError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(SubmissionError::TimedOut(limit.as_millis() as u64))),
            None => call.await,
        }
    }
}
