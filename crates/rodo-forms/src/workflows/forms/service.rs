use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{AnswerValue, FieldId};
use super::projection::WizardView;
use super::submission::{SubmissionCoordinator, SubmitOperation, SubmitOutcome};
use super::wizard::{Advance, StateError, WizardStateMachine};
use crate::workflows::catalog::FormCatalog;

/// Identifier of one open wizard session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("wiz-{id:06}"))
}

/// Projection of a session returned to hosts after every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub wizard: WizardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SubmitOutcome>,
}

type SharedWizard = Arc<Mutex<WizardStateMachine>>;

/// Open wizard sessions over the form catalog, submitted through one coordinator.
///
/// Sessions live in memory only; they are dropped on cancel and on successful
/// submission.
pub struct WizardService<S> {
    catalog: Arc<FormCatalog>,
    sessions: Mutex<BTreeMap<SessionId, SharedWizard>>,
    coordinator: SubmissionCoordinator<S>,
}

impl<S> WizardService<S>
where
    S: SubmitOperation + 'static,
{
    pub fn new(catalog: Arc<FormCatalog>, coordinator: SubmissionCoordinator<S>) -> Self {
        Self {
            catalog,
            sessions: Mutex::new(BTreeMap::new()),
            coordinator,
        }
    }

    pub fn catalog(&self) -> &FormCatalog {
        &self.catalog
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator<S> {
        &self.coordinator
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Opens a session; a non-empty `seed` puts the wizard in edit mode.
    pub fn open(
        &self,
        form_id: &str,
        seed: BTreeMap<FieldId, AnswerValue>,
    ) -> Result<SessionView, WizardServiceError> {
        let form = self
            .catalog
            .get(form_id)
            .ok_or_else(|| WizardServiceError::UnknownForm(form_id.to_string()))?;

        let edit_mode = !seed.is_empty();
        let wizard = WizardStateMachine::seeded(form, seed);
        let session_id = next_session_id();
        let view = project(&session_id, &wizard, None);

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.clone(), Arc::new(Mutex::new(wizard)));
        info!(session = %session_id, form = form_id, edit_mode, "wizard session opened");
        Ok(view)
    }

    pub fn view(&self, session_id: &SessionId) -> Result<SessionView, WizardServiceError> {
        self.apply(session_id, |_| Ok(()))
    }

    pub fn set_answer(
        &self,
        session_id: &SessionId,
        field: &str,
        value: AnswerValue,
    ) -> Result<SessionView, WizardServiceError> {
        self.apply(session_id, |wizard| wizard.set_answer(field, value))
    }

    /// Advances the wizard; on the last active step this submits.
    pub async fn next(&self, session_id: &SessionId) -> Result<SessionView, WizardServiceError> {
        let session = self.session(session_id)?;
        let advance = lock(&session).next()?;
        if advance == Advance::ReadyToSubmit {
            return self.submit_session(session_id, &session).await;
        }
        let view = project(session_id, &lock(&session), None);
        Ok(view)
    }

    pub fn back(&self, session_id: &SessionId) -> Result<SessionView, WizardServiceError> {
        self.apply(session_id, |wizard| wizard.back().map(|_| ()))
    }

    pub fn jump(
        &self,
        session_id: &SessionId,
        step: usize,
    ) -> Result<SessionView, WizardServiceError> {
        self.apply(session_id, |wizard| wizard.jump_to(step))
    }

    pub async fn submit(&self, session_id: &SessionId) -> Result<SessionView, WizardServiceError> {
        let session = self.session(session_id)?;
        self.submit_session(session_id, &session).await
    }

    /// Cancels the wizard, detaching any in-flight submission, and closes the session.
    pub fn cancel(&self, session_id: &SessionId) -> Result<SessionView, WizardServiceError> {
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .ok_or_else(|| WizardServiceError::UnknownSession(session_id.clone()))?;

        let mut wizard = lock(&session);
        wizard.cancel();
        info!(session = %session_id, form = wizard.form().id(), "wizard session cancelled");
        Ok(project(session_id, &wizard, None))
    }

    async fn submit_session(
        &self,
        session_id: &SessionId,
        session: &SharedWizard,
    ) -> Result<SessionView, WizardServiceError> {
        let outcome = self.coordinator.submit(session).await?;
        if matches!(outcome, SubmitOutcome::Succeeded { .. }) {
            self.sessions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(session_id);
        }
        Ok(project(session_id, &lock(session), Some(outcome)))
    }

    fn session(&self, session_id: &SessionId) -> Result<SharedWizard, WizardServiceError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .ok_or_else(|| WizardServiceError::UnknownSession(session_id.clone()))
    }

    fn apply<F>(&self, session_id: &SessionId, transition: F) -> Result<SessionView, WizardServiceError>
    where
        F: FnOnce(&mut WizardStateMachine) -> Result<(), StateError>,
    {
        let session = self.session(session_id)?;
        let mut wizard = lock(&session);
        transition(&mut *wizard)?;
        Ok(project(session_id, &wizard, None))
    }
}

fn lock(session: &SharedWizard) -> std::sync::MutexGuard<'_, WizardStateMachine> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn project(
    session_id: &SessionId,
    wizard: &WizardStateMachine,
    outcome: Option<SubmitOutcome>,
) -> SessionView {
    SessionView {
        session_id: session_id.clone(),
        wizard: wizard.view(),
        outcome,
    }
}

/// Error raised by the wizard service.
#[derive(Debug, thiserror::Error)]
pub enum WizardServiceError {
    #[error("unknown form `{0}`")]
    UnknownForm(String),
    #[error("unknown session `{0}`")]
    UnknownSession(SessionId),
    #[error(transparent)]
    State(#[from] StateError),
}
