//! Wizard state machine.
//!
//! All transitions are synchronous and return a `StateError` instead of mutating state
//! when they are not allowed, so a misbehaving renderer cannot corrupt the wizard. The
//! list of active steps is derived from the answers on every call and never cached.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::deadline::DeadlineInput;
use super::domain::{AnswerMap, AnswerValue, FieldId, RecordId};
use super::form::{CompiledForm, FormStep};
use super::projection::WizardView;
use super::schema::Derivation;
use super::submission::{
    PayloadValue, SubmissionError, SubmissionPayload, SubmissionTicket, SubmitOutcome,
};
use super::validation::{ValidationEngine, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    Editing,
    Submitted,
    Cancelled,
}

/// Result of a successful `next` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Advance {
    /// Moved between schema step indices.
    Moved { from: usize, to: usize },
    /// The last active step validated; the caller should submit.
    ReadyToSubmit,
}

/// Rejected transition. The wizard is left untouched apart from surfaced errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("the current step has {count} outstanding validation error(s)")]
    StepInvalid { count: usize },
    #[error("already on the first step")]
    AtFirstStep,
    #[error("step {index} does not exist")]
    UnknownStep { index: usize },
    #[error("step `{step}` is skipped for the current answers")]
    StepSkipped { step: String },
    #[error("step `{step}` has not been validated in this session")]
    ForwardJump { step: String },
    #[error("unknown field `{0}`")]
    UnknownField(FieldId),
    #[error("field `{0}` is computed and cannot be edited")]
    ReadOnlyField(FieldId),
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("submission is only possible from the last active step")]
    NotOnLastStep,
    #[error("the wizard is closed ({0:?})")]
    Closed(WizardPhase),
}

/// One editing session over a compiled form.
#[derive(Debug)]
pub struct WizardStateMachine {
    form: Arc<CompiledForm>,
    answers: AnswerMap,
    current: usize,
    validated: BTreeSet<usize>,
    errors: BTreeMap<FieldId, ValidationError>,
    dirty: bool,
    submission: SubmissionState,
    phase: WizardPhase,
    record_id: Option<RecordId>,
    last_failure: Option<SubmissionError>,
    generation: u64,
    cancellation: CancellationToken,
}

impl WizardStateMachine {
    /// Fresh wizard for a new record.
    pub fn new(form: Arc<CompiledForm>) -> Self {
        Self::seeded(form, std::iter::empty::<(FieldId, AnswerValue)>())
    }

    /// Wizard in edit mode, seeded from an existing record's values.
    ///
    /// Seeded values are not marked touched. Unknown and derived fields are ignored;
    /// derived values are recomputed from the seeded inputs.
    pub fn seeded<I>(form: Arc<CompiledForm>, values: I) -> Self
    where
        I: IntoIterator<Item = (FieldId, AnswerValue)>,
    {
        let mut answers = AnswerMap::new();
        for (field, value) in values {
            if form.field(field.as_str()).is_some() {
                answers.put(field, value);
            } else {
                debug!(form = form.id(), %field, "ignoring seeded value for unknown field");
            }
        }

        let mut wizard = Self {
            form,
            answers,
            current: 0,
            validated: BTreeSet::new(),
            errors: BTreeMap::new(),
            dirty: false,
            submission: SubmissionState::Idle,
            phase: WizardPhase::Editing,
            record_id: None,
            last_failure: None,
            generation: 0,
            cancellation: CancellationToken::new(),
        };
        wizard.refresh_derived();
        wizard
    }

    pub fn form(&self) -> &CompiledForm {
        &self.form
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn errors(&self) -> &BTreeMap<FieldId, ValidationError> {
        &self.errors
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submission
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    pub fn last_failure(&self) -> Option<&SubmissionError> {
        self.last_failure.as_ref()
    }

    fn engine(&self) -> ValidationEngine<'_> {
        ValidationEngine::new(&self.form)
    }

    /// Schema indices of the active steps for the current answers.
    pub fn active_steps(&self) -> Vec<usize> {
        self.engine().active_steps(&self.answers)
    }

    /// Position of the current step within the active steps.
    pub fn active_step_index(&self) -> usize {
        let position = self
            .active_steps()
            .iter()
            .position(|step| *step == self.current);
        debug_assert!(
            position.is_some(),
            "current step {} is not active",
            self.current
        );
        position.unwrap_or(0)
    }

    /// Schema index of the current step.
    pub fn current_step_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &FormStep {
        &self.form.steps()[self.current]
    }

    pub fn is_last_step(&self) -> bool {
        self.active_steps().last() == Some(&self.current)
    }

    pub fn can_advance(&self) -> bool {
        self.engine().can_advance(self.current, &self.answers)
    }

    pub fn is_validated(&self, step: usize) -> bool {
        self.validated.contains(&step)
    }

    pub fn view(&self) -> WizardView {
        WizardView::of(self)
    }

    pub fn set_answer(&mut self, field: &str, value: AnswerValue) -> Result<(), StateError> {
        self.ensure_editable()?;
        if self.form.is_derived(field) {
            return Err(StateError::ReadOnlyField(FieldId::from(field)));
        }
        if self.form.field(field).is_none() {
            return Err(StateError::UnknownField(FieldId::from(field)));
        }

        let field_id = FieldId::from(field);
        if self.answers.set(field_id.clone(), value) {
            self.dirty = true;
        }

        self.refresh_derived();
        self.clamp_current_step();
        self.revalidate_after_change(&field_id);
        Ok(())
    }

    /// On the last active step `next` means submit. Repeating it while the submission is
    /// in flight is not an error; the coordinator ignores the second submit.
    pub fn next(&mut self) -> Result<Advance, StateError> {
        if self.phase == WizardPhase::Editing
            && self.submission == SubmissionState::InFlight
            && self.is_last_step()
        {
            return Ok(Advance::ReadyToSubmit);
        }
        self.ensure_editable()?;
        self.validate_current_step()?;

        let from = self.current;
        match self.active_steps().into_iter().find(|step| *step > from) {
            Some(to) => {
                self.current = to;
                debug!(form = self.form.id(), from, to, "wizard advanced");
                Ok(Advance::Moved { from, to })
            }
            None => Ok(Advance::ReadyToSubmit),
        }
    }

    pub fn back(&mut self) -> Result<usize, StateError> {
        self.ensure_editable()?;
        let current = self.current;
        match self
            .active_steps()
            .into_iter()
            .rev()
            .find(|step| *step < current)
        {
            Some(previous) => {
                self.current = previous;
                debug!(form = self.form.id(), from = current, to = previous, "wizard moved back");
                Ok(previous)
            }
            None => Err(StateError::AtFirstStep),
        }
    }

    /// Moves to a schema step index. Backward jumps are always allowed; forward jumps
    /// only reach steps validated earlier in this session, across steps that still
    /// validate.
    pub fn jump_to(&mut self, target: usize) -> Result<(), StateError> {
        self.ensure_editable()?;
        let Some(step) = self.form.step(target) else {
            return Err(StateError::UnknownStep { index: target });
        };

        let engine = self.engine();
        if !engine.is_step_active(target, &self.answers) {
            return Err(StateError::StepSkipped {
                step: step.id.clone(),
            });
        }

        if target > self.current {
            if !self.validated.contains(&target) {
                return Err(StateError::ForwardJump {
                    step: step.id.clone(),
                });
            }
            let blocking = engine
                .active_steps(&self.answers)
                .into_iter()
                .filter(|index| *index >= self.current && *index < target)
                .find(|index| !engine.can_advance(*index, &self.answers));
            if let Some(blocking) = blocking {
                return Err(StateError::ForwardJump {
                    step: self.form.steps()[blocking].id.clone(),
                });
            }
        }

        self.current = target;
        Ok(())
    }

    /// Detaches the in-flight submission, if any: its result will be discarded and
    /// the wizard stays editable.
    pub fn detach(&mut self) {
        self.cancellation.cancel();
        self.cancellation = CancellationToken::new();
        if self.submission == SubmissionState::InFlight {
            self.submission = SubmissionState::Idle;
            debug!(form = self.form.id(), "in-flight submission detached");
        }
    }

    /// Moves the wizard to `Cancelled`, detaching any in-flight submission.
    pub fn cancel(&mut self) {
        if self.phase == WizardPhase::Cancelled {
            return;
        }
        self.detach();
        self.phase = WizardPhase::Cancelled;
        debug!(form = self.form.id(), "wizard cancelled");
    }

    /// Starts a submission from the last active step.
    ///
    /// Returns `Ok(None)` while another submission is in flight: the request is
    /// ignored rather than queued.
    pub fn begin_submission(&mut self) -> Result<Option<SubmissionTicket>, StateError> {
        if self.phase != WizardPhase::Editing {
            return Err(StateError::Closed(self.phase));
        }
        if self.submission == SubmissionState::InFlight {
            return Ok(None);
        }
        if !self.is_last_step() {
            return Err(StateError::NotOnLastStep);
        }
        self.validate_current_step()?;

        self.submission = SubmissionState::InFlight;
        self.generation += 1;
        Ok(Some(SubmissionTicket {
            form_id: self.form.id().to_string(),
            payload: self.payload(),
            generation: self.generation,
            cancellation: self.cancellation.clone(),
        }))
    }

    /// Applies the result of the submission started by `ticket`.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        result: Result<RecordId, SubmissionError>,
    ) -> SubmitOutcome {
        if ticket.cancellation.is_cancelled()
            || self.phase != WizardPhase::Editing
            || self.submission != SubmissionState::InFlight
            || ticket.generation != self.generation
        {
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(record_id) => {
                self.submission = SubmissionState::Succeeded;
                self.phase = WizardPhase::Submitted;
                self.record_id = Some(record_id.clone());
                self.last_failure = None;
                self.dirty = false;
                SubmitOutcome::Succeeded { record_id }
            }
            Err(error) => {
                self.submission = SubmissionState::Failed;
                self.last_failure = Some(error.clone());
                SubmitOutcome::Failed { error }
            }
        }
    }

    /// Flat payload of the non-empty answers on active steps plus derived values.
    pub fn payload(&self) -> SubmissionPayload {
        let mut fields = BTreeMap::new();
        for step in self.active_steps() {
            for field in &self.form.steps()[step].fields {
                let value = self.answers.value(field.as_str());
                if let Some(converted) = PayloadValue::from_answer(value) {
                    fields.insert(field.clone(), converted);
                }
            }
        }
        for derived in self.form.derived() {
            let value = self.answers.value(derived.field.as_str());
            if let Some(converted) = PayloadValue::from_answer(value) {
                fields.insert(derived.field.clone(), converted);
            }
        }

        SubmissionPayload {
            form_id: self.form.id().to_string(),
            fields,
        }
    }

    fn ensure_editable(&self) -> Result<(), StateError> {
        if self.phase != WizardPhase::Editing {
            return Err(StateError::Closed(self.phase));
        }
        if self.submission == SubmissionState::InFlight {
            return Err(StateError::SubmissionInFlight);
        }
        Ok(())
    }

    /// Step-level trigger: surfaces every outstanding error of the current step.
    fn validate_current_step(&mut self) -> Result<(), StateError> {
        let form = Arc::clone(&self.form);
        let engine = ValidationEngine::new(&form);
        let step_errors = engine.validate_step(self.current, &self.answers);

        for field in &form.steps()[self.current].fields {
            self.errors.remove(field);
        }

        if step_errors.is_empty() {
            self.validated.insert(self.current);
            return Ok(());
        }

        let count = step_errors.len();
        self.errors.extend(step_errors);
        self.validated.remove(&self.current);
        debug!(form = form.id(), step = %form.steps()[self.current].id, count, "step blocked");
        Err(StateError::StepInvalid { count })
    }

    /// Field-level trigger after `field` changed.
    fn revalidate_after_change(&mut self, field: &FieldId) {
        let form = Arc::clone(&self.form);
        let engine = ValidationEngine::new(&form);

        match engine.validate_field(field.as_str(), &self.answers) {
            Some(error) => {
                self.errors.insert(field.clone(), error);
            }
            None => {
                self.errors.remove(field);
            }
        }

        for dependent in form.dependents_of(field.as_str()) {
            match engine.validate_field(dependent.as_str(), &self.answers) {
                None => {
                    self.errors.remove(dependent);
                }
                Some(error) => {
                    if self.answers.is_touched(dependent.as_str())
                        || self.errors.contains_key(dependent)
                    {
                        self.errors.insert(dependent.clone(), error);
                    }
                }
            }
        }

        // Errors of fields that stopped being relevant are dropped, the rest refreshed.
        let stale: Vec<FieldId> = self.errors.keys().cloned().collect();
        for key in stale {
            match engine.validate_field(key.as_str(), &self.answers) {
                Some(error) => {
                    self.errors.insert(key, error);
                }
                None => {
                    self.errors.remove(&key);
                }
            }
        }

        let answers = &self.answers;
        self.validated
            .retain(|step| engine.can_advance(*step, answers) && engine.is_step_active(*step, answers));
    }

    /// Keeps the current step active: falls back to the nearest active step at or
    /// before it. The first step is always active.
    fn clamp_current_step(&mut self) {
        let current = self.current;
        let engine = self.engine();
        if engine.is_step_active(current, &self.answers) {
            return;
        }

        let fallback = engine
            .active_steps(&self.answers)
            .into_iter()
            .rev()
            .find(|step| *step <= current)
            .unwrap_or(0);
        debug!(form = self.form.id(), from = current, to = fallback, "current step deactivated");
        self.current = fallback;
    }

    fn refresh_derived(&mut self) {
        let form = Arc::clone(&self.form);
        for derived in form.derived() {
            let value = match &derived.derivation {
                Derivation::StatutoryDeadline {
                    reference_date,
                    category,
                    extended,
                } => DeadlineInput::from_answers(&self.answers, reference_date, category, extended)
                    .deadline()
                    .date()
                    .map(AnswerValue::date)
                    .unwrap_or_default(),
            };
            self.answers.put(derived.field.clone(), value);
        }
    }
}
