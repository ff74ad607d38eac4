//! Built-in form schemas of the compliance application.

pub mod assessment;
pub mod document;
pub mod incident;
pub mod report;
pub mod settings;
pub mod subject_request;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::workflows::forms::form::{CompiledForm, SchemaError};
use crate::workflows::forms::rules::FunctionRegistry;
use crate::workflows::forms::schema::FormSchema;

/// Compiled forms available to a host, keyed by form id.
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: BTreeMap<String, Arc<CompiledForm>>,
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    pub steps: usize,
    pub conditional_steps: usize,
    pub diagnostics: usize,
}

impl FormCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the six standard forms.
    pub fn standard() -> Result<Self, SchemaError> {
        let mut catalog = Self::new();
        for (schema, registry) in standard_definitions() {
            catalog.register(schema, &registry)?;
        }
        Ok(catalog)
    }

    /// Compiles and adds a form, replacing any form with the same id.
    pub fn register(
        &mut self,
        schema: FormSchema,
        registry: &FunctionRegistry,
    ) -> Result<Arc<CompiledForm>, SchemaError> {
        let form = Arc::new(CompiledForm::compile(schema, registry)?);
        self.forms.insert(form.id().to_string(), Arc::clone(&form));
        Ok(form)
    }

    pub fn get(&self, form_id: &str) -> Option<Arc<CompiledForm>> {
        self.forms.get(form_id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.forms.keys().map(String::as_str)
    }

    pub fn summaries(&self) -> Vec<FormSummary> {
        self.forms
            .values()
            .map(|form| FormSummary {
                id: form.id().to_string(),
                title: form.title().to_string(),
                steps: form.steps().len(),
                conditional_steps: form
                    .steps()
                    .iter()
                    .filter(|step| step.is_conditional())
                    .count(),
                diagnostics: form.diagnostics().len(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

fn standard_definitions() -> Vec<(FormSchema, FunctionRegistry)> {
    vec![
        (incident::schema(), incident::registry()),
        (subject_request::schema(), subject_request::registry()),
        (document::schema(), document::registry()),
        (report::schema(), report::registry()),
        (settings::schema(), settings::registry()),
        (assessment::schema(), assessment::registry()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_forms_compile_without_diagnostics() {
        let catalog = FormCatalog::standard().expect("standard catalog compiles");
        assert_eq!(catalog.len(), 6);
        for summary in catalog.summaries() {
            assert_eq!(
                summary.diagnostics, 0,
                "form `{}` has schema authoring problems",
                summary.id
            );
        }
    }

    #[test]
    fn conditional_steps_are_counted() {
        let catalog = FormCatalog::standard().expect("standard catalog compiles");
        let summaries = catalog.summaries();
        let incident = summaries
            .iter()
            .find(|summary| summary.id == incident::FORM_ID)
            .expect("incident form listed");
        assert_eq!(incident.steps, 4);
        assert_eq!(incident.conditional_steps, 1);
        assert!(catalog.get("unknown").is_none());
    }

    #[test]
    fn subject_request_exposes_the_due_date_as_derived() {
        let catalog = FormCatalog::standard().expect("standard catalog compiles");
        let form = catalog.get(subject_request::FORM_ID).expect("registered");
        assert!(form.is_derived("due_date"));
        assert!(form.field("due_date").is_none());
    }
}
