//! Compilation of a `FormSchema` against its function registry.
//!
//! Authoring mistakes never abort compilation except for a schema without steps. Each
//! one is recorded as a `SchemaError` diagnostic, logged, and the offending rule is
//! disabled so the wizard keeps working.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use super::domain::FieldId;
use super::rules::{FunctionRegistry, Predicate, Validator};
use super::schema::{DerivedField, FieldSpec, FormSchema};

/// Malformed schema content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("form `{form}` declares no steps")]
    NoSteps { form: String },
    #[error("field `{field}` in step `{step}` is already declared by step `{first_step}`")]
    DuplicateField {
        field: FieldId,
        step: String,
        first_step: String,
    },
    #[error("rule in step `{step}` targets field `{field}` which the step does not declare")]
    RuleForUndeclaredField { field: FieldId, step: String },
    #[error("field `{field}` has more than one rule; extra rules are ignored")]
    DuplicateRule { field: FieldId },
    #[error("{owner} references unknown predicate `{name}`")]
    UnknownPredicate { owner: String, name: String },
    #[error("field `{field}` references unknown validator `{name}`")]
    UnknownValidator { field: FieldId, name: String },
    #[error("{owner} reads unknown field `{referenced}`")]
    UnknownFieldReference { owner: String, referenced: FieldId },
    #[error("derived field `{field}` is also declared as editable in step `{step}`")]
    EditableDerivedField { field: FieldId, step: String },
    #[error("first step `{step}` is always active; its activation predicate is ignored")]
    ConditionalFirstStep { step: String },
}

/// Whether a field must hold a value for its step to advance.
#[derive(Debug, Clone)]
pub(crate) enum Requirement {
    Always,
    Optional,
    When(Predicate),
    /// Predicate failed to resolve; the field is treated as not required.
    Disabled,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub spec: FieldSpec,
    pub step: usize,
    pub(crate) requirement: Requirement,
    pub(crate) validator: Option<Validator>,
}

#[derive(Debug, Clone)]
pub struct FormStep {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldId>,
    pub(crate) activation: Option<Predicate>,
}

impl FormStep {
    pub fn is_conditional(&self) -> bool {
        self.activation.is_some()
    }
}

/// Immutable, validated form definition shared by every wizard instance of a form.
#[derive(Debug, Clone)]
pub struct CompiledForm {
    id: String,
    title: String,
    steps: Vec<FormStep>,
    fields: BTreeMap<FieldId, FormField>,
    derived: Vec<DerivedField>,
    dependents: BTreeMap<FieldId, BTreeSet<FieldId>>,
    diagnostics: Vec<SchemaError>,
}

impl CompiledForm {
    pub fn compile(schema: FormSchema, registry: &FunctionRegistry) -> Result<Self, SchemaError> {
        let FormSchema {
            id,
            title,
            steps: step_schemas,
            derived: derived_schemas,
        } = schema;

        if step_schemas.is_empty() {
            return Err(SchemaError::NoSteps { form: id });
        }

        let mut diagnostics = Vec::new();
        let derived_ids: BTreeSet<FieldId> = derived_schemas
            .iter()
            .map(|derived| derived.field.clone())
            .collect();

        let mut fields: BTreeMap<FieldId, FormField> = BTreeMap::new();
        let mut steps: Vec<FormStep> = Vec::with_capacity(step_schemas.len());

        for (index, step) in step_schemas.iter().enumerate() {
            let mut declared = Vec::with_capacity(step.fields.len());
            for spec in &step.fields {
                if derived_ids.contains(&spec.id) {
                    diagnostics.push(SchemaError::EditableDerivedField {
                        field: spec.id.clone(),
                        step: step.id.clone(),
                    });
                    continue;
                }
                if let Some(existing) = fields.get(&spec.id) {
                    diagnostics.push(SchemaError::DuplicateField {
                        field: spec.id.clone(),
                        step: step.id.clone(),
                        first_step: step_schemas[existing.step].id.clone(),
                    });
                    continue;
                }
                fields.insert(
                    spec.id.clone(),
                    FormField {
                        spec: spec.clone(),
                        step: index,
                        requirement: Requirement::Optional,
                        validator: None,
                    },
                );
                declared.push(spec.id.clone());
            }

            steps.push(FormStep {
                id: step.id.clone(),
                title: step.title.clone(),
                fields: declared,
                activation: None,
            });
        }

        let known = |field: &FieldId| fields.contains_key(field) || derived_ids.contains(field);

        let mut derived = Vec::with_capacity(derived_schemas.len());
        for field in derived_schemas {
            let unknown: Vec<FieldId> = field
                .derivation
                .inputs()
                .into_iter()
                .filter(|input| !known(*input))
                .cloned()
                .collect();
            if unknown.is_empty() {
                derived.push(field);
            } else {
                for referenced in unknown {
                    diagnostics.push(SchemaError::UnknownFieldReference {
                        owner: format!("derived field `{}`", field.field),
                        referenced,
                    });
                }
            }
        }

        let mut resolved_rules: BTreeMap<FieldId, (Requirement, Option<Validator>)> =
            BTreeMap::new();
        let mut activations: Vec<Option<Predicate>> = vec![None; steps.len()];

        for (index, step) in step_schemas.iter().enumerate() {
            for rule in &step.rules {
                if !steps[index].fields.contains(&rule.field) {
                    diagnostics.push(SchemaError::RuleForUndeclaredField {
                        field: rule.field.clone(),
                        step: step.id.clone(),
                    });
                    continue;
                }
                if resolved_rules.contains_key(&rule.field) {
                    diagnostics.push(SchemaError::DuplicateRule {
                        field: rule.field.clone(),
                    });
                    continue;
                }

                let requirement = match &rule.required_when {
                    None if rule.mandatory => Requirement::Always,
                    None => Requirement::Optional,
                    Some(name) => {
                        let owner = format!("rule for field `{}`", rule.field);
                        match resolve_predicate(registry, name, &owner, &known, &mut diagnostics)
                        {
                            Some(predicate) => Requirement::When(predicate),
                            None => Requirement::Disabled,
                        }
                    }
                };

                let validator = rule.validate.as_ref().and_then(|name| {
                    let Some(validator) = registry.validator(name) else {
                        diagnostics.push(SchemaError::UnknownValidator {
                            field: rule.field.clone(),
                            name: name.clone(),
                        });
                        return None;
                    };
                    let missing: Vec<FieldId> = validator
                        .reads()
                        .iter()
                        .filter(|read| !known(*read))
                        .cloned()
                        .collect();
                    if missing.is_empty() {
                        Some(validator.clone())
                    } else {
                        for referenced in missing {
                            diagnostics.push(SchemaError::UnknownFieldReference {
                                owner: format!("validator `{name}` of field `{}`", rule.field),
                                referenced,
                            });
                        }
                        None
                    }
                });

                resolved_rules.insert(rule.field.clone(), (requirement, validator));
            }

            if let Some(name) = &step.activate_when {
                if index == 0 {
                    diagnostics.push(SchemaError::ConditionalFirstStep {
                        step: step.id.clone(),
                    });
                } else {
                    let owner = format!("step `{}`", step.id);
                    activations[index] =
                        resolve_predicate(registry, name, &owner, &known, &mut diagnostics);
                }
            }
        }

        for (step, activation) in steps.iter_mut().zip(activations) {
            step.activation = activation;
        }

        let mut dependents: BTreeMap<FieldId, BTreeSet<FieldId>> = BTreeMap::new();
        for (field, (requirement, validator)) in resolved_rules {
            if let Requirement::When(predicate) = &requirement {
                for read in predicate.reads() {
                    dependents
                        .entry(read.clone())
                        .or_default()
                        .insert(field.clone());
                }
            }
            if let Some(validator) = &validator {
                for read in validator.reads() {
                    dependents
                        .entry(read.clone())
                        .or_default()
                        .insert(field.clone());
                }
            }
            if let Some(entry) = fields.get_mut(&field) {
                entry.requirement = requirement;
                entry.validator = validator;
            }
        }

        for diagnostic in &diagnostics {
            warn!(form = %id, "schema authoring problem: {diagnostic}");
        }

        Ok(Self {
            id,
            title,
            steps,
            fields,
            derived,
            dependents,
            diagnostics,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn steps(&self) -> &[FormStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&FormStep> {
        self.steps.get(index)
    }

    pub fn field(&self, field: &str) -> Option<&FormField> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.values()
    }

    pub fn derived(&self) -> &[DerivedField] {
        &self.derived
    }

    pub fn is_derived(&self, field: &str) -> bool {
        self.derived
            .iter()
            .any(|derived| derived.field.as_str() == field)
    }

    /// Fields whose requirement or validation reads `field`.
    pub fn dependents_of(&self, field: &str) -> impl Iterator<Item = &FieldId> {
        self.dependents.get(field).into_iter().flatten()
    }

    /// Authoring problems found while compiling; each one disabled a rule.
    pub fn diagnostics(&self) -> &[SchemaError] {
        &self.diagnostics
    }
}

fn resolve_predicate(
    registry: &FunctionRegistry,
    name: &str,
    owner: &str,
    known: &dyn Fn(&FieldId) -> bool,
    diagnostics: &mut Vec<SchemaError>,
) -> Option<Predicate> {
    let Some(predicate) = registry.predicate(name) else {
        diagnostics.push(SchemaError::UnknownPredicate {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        return None;
    };

    let mut resolved = true;
    for read in predicate.reads() {
        if !known(read) {
            diagnostics.push(SchemaError::UnknownFieldReference {
                owner: owner.to_string(),
                referenced: read.clone(),
            });
            resolved = false;
        }
    }

    resolved.then(|| predicate.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::forms::rules::predicates;
    use crate::workflows::forms::schema::{FieldRule, FieldSpec, StepSchema};

    fn registry() -> FunctionRegistry {
        FunctionRegistry::with_builtins()
            .with_predicate("breach", predicates::is_true("breach_occurred"))
            .with_predicate("ghost", predicates::is_true("does_not_exist"))
    }

    #[test]
    fn empty_schema_is_rejected() {
        let error = CompiledForm::compile(FormSchema::new("empty", "Empty"), &registry())
            .expect_err("no steps");
        assert_eq!(
            error,
            SchemaError::NoSteps {
                form: "empty".to_string()
            }
        );
    }

    #[test]
    fn duplicate_fields_keep_the_first_declaration() {
        let schema = FormSchema::new("dup", "Duplicate")
            .step(StepSchema::new("one", "One").field(FieldSpec::text("name", "Name")))
            .step(StepSchema::new("two", "Two").field(FieldSpec::text("name", "Name again")));

        let form = CompiledForm::compile(schema, &registry()).expect("compiles");
        assert_eq!(form.field("name").map(|field| field.step), Some(0));
        assert!(form.steps()[1].fields.is_empty());
        assert!(matches!(
            form.diagnostics(),
            [SchemaError::DuplicateField { first_step, .. }] if first_step == "one"
        ));
    }

    #[test]
    fn unresolvable_predicates_disable_the_rule() {
        let schema = FormSchema::new("broken", "Broken").step(
            StepSchema::new("one", "One")
                .field(FieldSpec::text("a", "A"))
                .field(FieldSpec::text("b", "B"))
                .field(FieldSpec::text("c", "C"))
                .rule(FieldRule::required_when("a", "ghost"))
                .rule(FieldRule::required_when("b", "not_registered"))
                .rule(FieldRule::mandatory("c").validated_by("nope"))
                .rule(FieldRule::mandatory("missing")),
        );

        let form = CompiledForm::compile(schema, &registry()).expect("compiles");
        assert!(matches!(
            form.field("a").map(|f| &f.requirement),
            Some(Requirement::Disabled)
        ));
        assert!(matches!(
            form.field("b").map(|f| &f.requirement),
            Some(Requirement::Disabled)
        ));
        assert!(form.field("c").and_then(|f| f.validator.as_ref()).is_none());
        assert_eq!(form.diagnostics().len(), 4);
    }

    #[test]
    fn derived_fields_cannot_be_editable() {
        let schema = FormSchema::new("request", "Request")
            .step(
                StepSchema::new("details", "Details")
                    .field(FieldSpec::date("received_on", "Received"))
                    .field(FieldSpec::text("category", "Category"))
                    .field(FieldSpec::boolean("extended", "Extended"))
                    .field(FieldSpec::date("due_date", "Due date")),
            )
            .derived(DerivedField::statutory_deadline(
                "due_date",
                "Due date",
                "received_on",
                "category",
                "extended",
            ));

        let form = CompiledForm::compile(schema, &registry()).expect("compiles");
        assert!(form.field("due_date").is_none());
        assert!(form.is_derived("due_date"));
        assert!(matches!(
            form.diagnostics(),
            [SchemaError::EditableDerivedField { .. }]
        ));
    }

    #[test]
    fn first_step_is_never_conditional_and_dependents_are_tracked() {
        let schema = FormSchema::new("incident", "Incident")
            .step(
                StepSchema::new("assessment", "Assessment")
                    .activate_when("breach")
                    .field(FieldSpec::boolean("breach_occurred", "Breach?"))
                    .field(FieldSpec::long_text("affected_data", "Affected data"))
                    .rule(FieldRule::required_when("affected_data", "breach")),
            )
            .step(StepSchema::new("notify", "Notify").activate_when("breach"));

        let form = CompiledForm::compile(schema, &registry()).expect("compiles");
        assert!(!form.steps()[0].is_conditional());
        assert!(form.steps()[1].is_conditional());
        assert_eq!(
            form.dependents_of("breach_occurred").collect::<Vec<_>>(),
            vec![&FieldId::from("affected_data")]
        );
    }
}
