//! Personal-data incident report.

use crate::workflows::forms::rules::{predicates, validators, FunctionRegistry};
use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};

pub const FORM_ID: &str = "incident_report";

pub fn schema() -> FormSchema {
    FormSchema::new(FORM_ID, "Personal data incident report")
        .step(
            StepSchema::new("details", "Incident details")
                .field(FieldSpec::text("title", "Title"))
                .field(FieldSpec::date("detected_on", "Detected on"))
                .field(FieldSpec::long_text("description", "What happened"))
                .field(FieldSpec::email("reporter_email", "Reporter e-mail"))
                .rule(FieldRule::mandatory("title"))
                .rule(FieldRule::mandatory("detected_on"))
                .rule(FieldRule::mandatory("description").validated_by("description_length"))
                .rule(FieldRule::mandatory("reporter_email")),
        )
        .step(
            StepSchema::new("assessment", "Breach assessment")
                .field(
                    FieldSpec::boolean("breach_occurred", "Personal data breach occurred")
                        .with_help("Loss of confidentiality, integrity or availability of personal data"),
                )
                .field(FieldSpec::long_text("affected_data", "Affected data categories"))
                .field(FieldSpec::number("affected_subjects", "Approximate number of data subjects"))
                .field(FieldSpec::select(
                    "risk_level",
                    "Risk to the rights and freedoms of data subjects",
                    &["low", "medium", "high"],
                ))
                .rule(FieldRule::mandatory("breach_occurred"))
                .rule(FieldRule::required_when("affected_data", "breach_occurred"))
                .rule(FieldRule::optional("affected_subjects"))
                .rule(FieldRule::required_when("risk_level", "breach_occurred")),
        )
        .step(
            StepSchema::new("notification", "Notification")
                .activate_when("breach_occurred")
                .field(FieldSpec::boolean("authority_notified", "Supervisory authority notified"))
                .field(FieldSpec::date("notified_on", "Notification date"))
                .field(FieldSpec::boolean("subjects_informed", "Data subjects informed"))
                .rule(FieldRule::mandatory("authority_notified"))
                .rule(
                    FieldRule::required_when("notified_on", "authority_notified")
                        .validated_by("notified_after_detection"),
                )
                .rule(FieldRule::optional("subjects_informed")),
        )
        .step(
            StepSchema::new("review", "Review")
                .field(FieldSpec::boolean("confirmed", "I confirm the report is accurate"))
                .rule(FieldRule::mandatory("confirmed").validated_by("accepted")),
        )
}

pub fn registry() -> FunctionRegistry {
    FunctionRegistry::with_builtins()
        .with_predicate("breach_occurred", predicates::is_true("breach_occurred"))
        .with_predicate("authority_notified", predicates::is_true("authority_notified"))
        .with_validator("description_length", validators::min_length(20))
        .with_validator(
            "notified_after_detection",
            validators::not_before_field("detected_on"),
        )
}
