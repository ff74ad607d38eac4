//! Compliance report configuration.

use crate::workflows::forms::rules::{predicates, validators, FunctionRegistry};
use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};

pub const FORM_ID: &str = "report_config";

pub fn schema() -> FormSchema {
    FormSchema::new(FORM_ID, "Report configuration")
        .step(
            StepSchema::new("type", "Report type")
                .field(FieldSpec::select(
                    "report_type",
                    "Report",
                    &["incidents", "requests", "documents", "assessments"],
                ))
                .field(FieldSpec::select("format", "Format", &["pdf", "csv", "xlsx"]))
                .rule(FieldRule::mandatory("report_type"))
                .rule(FieldRule::mandatory("format")),
        )
        .step(
            StepSchema::new("range", "Date range")
                .field(FieldSpec::date("start_date", "From"))
                .field(FieldSpec::date("end_date", "To"))
                .rule(FieldRule::mandatory("start_date"))
                .rule(FieldRule::mandatory("end_date").validated_by("end_after_start")),
        )
        .step(
            StepSchema::new("delivery", "Delivery")
                .field(FieldSpec::boolean("scheduled", "Send on a schedule"))
                .field(FieldSpec::select(
                    "frequency",
                    "Frequency",
                    &["weekly", "monthly", "quarterly"],
                ))
                .field(FieldSpec::text("recipients", "Recipients"))
                .rule(FieldRule::optional("scheduled"))
                .rule(FieldRule::required_when("frequency", "scheduled"))
                .rule(FieldRule::required_when("recipients", "scheduled")),
        )
}

pub fn registry() -> FunctionRegistry {
    FunctionRegistry::with_builtins()
        .with_predicate("scheduled", predicates::is_true("scheduled"))
        .with_validator("end_after_start", validators::not_before_field("start_date"))
}
