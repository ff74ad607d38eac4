//! Data-subject request (access, erasure and the other GDPR rights).

use crate::workflows::forms::deadline::RequestCategory;
use crate::workflows::forms::rules::{predicates, validators, FunctionRegistry};
use crate::workflows::forms::schema::{
    DerivedField, FieldRule, FieldSpec, FormSchema, StepSchema,
};

pub const FORM_ID: &str = "subject_request";

const PHONE_PATTERN: &str = r"^\+?[0-9 ()-]{7,20}$";

pub fn schema() -> FormSchema {
    let categories: Vec<&str> = RequestCategory::ordered()
        .into_iter()
        .map(RequestCategory::key)
        .collect();

    FormSchema::new(FORM_ID, "Data subject request")
        .step(
            StepSchema::new("requester", "Requester")
                .field(FieldSpec::text("full_name", "Full name"))
                .field(FieldSpec::email("email", "E-mail"))
                .field(FieldSpec::text("phone", "Phone"))
                .rule(FieldRule::mandatory("full_name"))
                .rule(FieldRule::mandatory("email"))
                .rule(
                    FieldRule::required_when("phone", "phone_given").validated_by("phone_number"),
                ),
        )
        .step(
            StepSchema::new("request", "Request details")
                .field(FieldSpec::select("category", "Request type", &categories))
                .field(FieldSpec::date("received_on", "Received on"))
                .field(FieldSpec::long_text("details", "Request content"))
                .field(
                    FieldSpec::boolean("extended", "Deadline extended")
                        .with_help("Complex or numerous requests may be extended by two further months"),
                )
                .field(FieldSpec::long_text("extension_reason", "Reason for extension"))
                .rule(FieldRule::mandatory("category"))
                .rule(FieldRule::mandatory("received_on"))
                .rule(FieldRule::mandatory("details"))
                .rule(FieldRule::optional("extended"))
                .rule(FieldRule::required_when("extension_reason", "is_extended")),
        )
        .step(
            StepSchema::new("attachments", "Attachments")
                .field(FieldSpec::file("identity_proof", "Proof of identity"))
                .field(FieldSpec::file("supporting_documents", "Supporting documents"))
                .rule(FieldRule::required_when("identity_proof", "identity_needed"))
                .rule(FieldRule::optional("supporting_documents")),
        )
        .step(
            StepSchema::new("review", "Review")
                .field(FieldSpec::boolean("confirmed", "Request details are complete"))
                .rule(FieldRule::mandatory("confirmed").validated_by("accepted")),
        )
        .derived(DerivedField::statutory_deadline(
            "due_date",
            "Response due",
            "received_on",
            "category",
            "extended",
        ))
}

pub fn registry() -> FunctionRegistry {
    let registry = FunctionRegistry::with_builtins()
        .with_predicate("phone_given", predicates::is_filled("phone"))
        .with_predicate("is_extended", predicates::is_true("extended"))
        .with_predicate(
            "identity_needed",
            predicates::one_of("category", &["access", "portability"]),
        );
    // Left unregistered, a broken pattern fails compilation as an unknown validator.
    match validators::matches_pattern(PHONE_PATTERN, "expected a phone number") {
        Ok(phone) => registry.with_validator("phone_number", phone),
        Err(_) => registry,
    }
}
