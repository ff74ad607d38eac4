//! Schema-local function registry.
//!
//! Schemas stay plain data: `requiredWhen`, `activateWhen` and `validate` entries are
//! string names resolved here when the schema is compiled. Every registered function
//! declares the fields it reads so the compiler can reject references to unknown
//! fields and the wizard can re-validate dependants when one of those fields changes.

pub mod predicates;
pub mod validators;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::domain::{AnswerMap, AnswerValue, FieldId};
use super::validation::ValidationError;

type PredicateFn = dyn Fn(&AnswerMap) -> bool + Send + Sync;
type ValidatorFn = dyn Fn(&AnswerValue, &AnswerMap) -> Option<ValidationError> + Send + Sync;

/// Boolean condition over the answer map.
#[derive(Clone)]
pub struct Predicate {
    reads: Vec<FieldId>,
    eval: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<I, F>(reads: I, eval: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldId>,
        F: Fn(&AnswerMap) -> bool + Send + Sync + 'static,
    {
        Self {
            reads: reads.into_iter().map(Into::into).collect(),
            eval: Arc::new(eval),
        }
    }

    pub fn reads(&self) -> &[FieldId] {
        &self.reads
    }

    pub fn evaluate(&self, answers: &AnswerMap) -> bool {
        (self.eval)(answers)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

/// Field-level check run against a non-empty value.
#[derive(Clone)]
pub struct Validator {
    reads: Vec<FieldId>,
    check: Arc<ValidatorFn>,
}

impl Validator {
    pub fn new<I, F>(reads: I, check: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldId>,
        F: Fn(&AnswerValue, &AnswerMap) -> Option<ValidationError> + Send + Sync + 'static,
    {
        Self {
            reads: reads.into_iter().map(Into::into).collect(),
            check: Arc::new(check),
        }
    }

    /// Validator that only looks at the field's own value.
    pub fn standalone<F>(check: F) -> Self
    where
        F: Fn(&AnswerValue) -> Option<ValidationError> + Send + Sync + 'static,
    {
        Self::new(Vec::<FieldId>::new(), move |value, _| check(value))
    }

    /// Other fields this validator reads, excluding the validated field itself.
    pub fn reads(&self) -> &[FieldId] {
        &self.reads
    }

    pub fn check(&self, value: &AnswerValue, answers: &AnswerMap) -> Option<ValidationError> {
        (self.check)(value, answers)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

/// Named predicates and validators available to one schema.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    predicates: BTreeMap<String, Predicate>,
    validators: BTreeMap<String, Validator>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the parameterless format validators.
    pub fn with_builtins() -> Self {
        Self::new()
            .with_validator("email", validators::email())
            .with_validator("date", validators::date())
            .with_validator("accepted", validators::accepted())
    }

    pub fn with_predicate(mut self, name: impl Into<String>, predicate: Predicate) -> Self {
        self.register_predicate(name, predicate);
        self
    }

    pub fn with_validator(mut self, name: impl Into<String>, validator: Validator) -> Self {
        self.register_validator(name, validator);
        self
    }

    pub fn register_predicate(&mut self, name: impl Into<String>, predicate: Predicate) {
        self.predicates.insert(name.into(), predicate);
    }

    pub fn register_validator(&mut self, name: impl Into<String>, validator: Validator) {
        self.validators.insert(name.into(), validator);
    }

    pub fn predicate(&self, name: &str) -> Option<&Predicate> {
        self.predicates.get(name)
    }

    pub fn validator(&self, name: &str) -> Option<&Validator> {
        self.validators.get(name)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("predicates", &self.predicates.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}
