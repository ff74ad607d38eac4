//! Schema-driven multi-step wizard engine.
//!
//! A feature supplies a `FormSchema` plus the named predicates and validators it
//! references. The schema is compiled once into a `CompiledForm`; each editing session
//! owns a `WizardStateMachine` over it, and a `SubmissionCoordinator` performs the
//! single asynchronous submit at the end.

pub mod deadline;
pub mod domain;
pub mod form;
pub mod projection;
pub mod router;
pub mod rules;
pub mod schema;
pub mod service;
pub mod submission;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use deadline::{compute_deadline, Deadline, DeadlineInput, RequestCategory};
pub use domain::{Answer, AnswerMap, AnswerValue, FieldId, FileRef, RecordId, Scalar};
pub use form::{CompiledForm, FormField, FormStep, SchemaError};
pub use projection::{FieldView, StepView, WizardView};
pub use router::{answer_from_json, wizard_router};
pub use rules::{FunctionRegistry, Predicate, Validator};
pub use schema::{
    Derivation, DerivedField, FieldKind, FieldRule, FieldSpec, FormSchema, StepSchema,
};
pub use service::{SessionId, SessionView, WizardService, WizardServiceError};
pub use submission::{
    NoopHooks, PayloadValue, SubmissionCoordinator, SubmissionError, SubmissionHooks,
    SubmissionPayload, SubmissionTicket, SubmitOperation, SubmitOutcome,
};
pub use validation::{ValidationEngine, ValidationError};
pub use wizard::{Advance, StateError, SubmissionState, WizardPhase, WizardStateMachine};
