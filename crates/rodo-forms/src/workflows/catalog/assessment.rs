//! Compliance self-assessment questionnaire.

use crate::workflows::forms::domain::AnswerMap;
use crate::workflows::forms::rules::{predicates, FunctionRegistry, Predicate};
use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};

pub const FORM_ID: &str = "compliance_assessment";

const ANSWERS: &[&str] = &["yes", "partially", "no"];

const QUESTIONS: &[(&str, &str)] = &[
    ("records_of_processing", "Records of processing activities are maintained"),
    ("dpia_performed", "Impact assessments are performed for high-risk processing"),
    ("processor_agreements", "Processor agreements are signed with every vendor"),
    ("breach_procedure", "A breach notification procedure is in place"),
    ("staff_training", "Staff completed data protection training this year"),
];

pub fn schema() -> FormSchema {
    let mut questionnaire = StepSchema::new("questionnaire", "Questionnaire")
        .field(FieldSpec::text("organisation_unit", "Organisational unit"))
        .rule(FieldRule::mandatory("organisation_unit"));
    for (id, label) in QUESTIONS {
        questionnaire = questionnaire
            .field(FieldSpec::select(id, label, ANSWERS))
            .rule(FieldRule::mandatory(id));
    }

    FormSchema::new(FORM_ID, "Compliance self-assessment")
        .step(questionnaire)
        .step(
            StepSchema::new("remediation", "Remediation plan")
                .activate_when("has_gaps")
                .field(FieldSpec::long_text("remediation_plan", "Planned actions"))
                .field(FieldSpec::text("responsible", "Responsible person"))
                .field(FieldSpec::date("target_date", "Target date"))
                .rule(FieldRule::mandatory("remediation_plan"))
                .rule(FieldRule::mandatory("responsible"))
                .rule(FieldRule::mandatory("target_date")),
        )
        .step(
            StepSchema::new("summary", "Summary")
                .field(FieldSpec::long_text("comments", "Comments"))
                .rule(FieldRule::optional("comments")),
        )
}

pub fn registry() -> FunctionRegistry {
    let questions: Vec<&str> = QUESTIONS.iter().map(|(id, _)| *id).collect();
    let gaps = predicates::any_equals(&questions, "no");
    let partial = predicates::any_equals(&questions, "partially");
    // Any "no" or "partially" answer calls for a remediation plan.
    let has_gaps = Predicate::new(gaps.reads().to_vec(), move |answers: &AnswerMap| {
        gaps.evaluate(answers) || partial.evaluate(answers)
    });

    FunctionRegistry::with_builtins().with_predicate("has_gaps", has_gaps)
}
