//! Document intake into the processing-records registry.

use crate::workflows::forms::rules::{predicates, FunctionRegistry};
use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};

pub const FORM_ID: &str = "document_intake";

pub fn schema() -> FormSchema {
    FormSchema::new(FORM_ID, "Document intake")
        .step(
            StepSchema::new("metadata", "Document")
                .field(FieldSpec::text("name", "Name"))
                .field(FieldSpec::text("owner", "Owner"))
                .field(FieldSpec::date("issued_on", "Issued on"))
                .rule(FieldRule::mandatory("name"))
                .rule(FieldRule::mandatory("owner"))
                .rule(FieldRule::optional("issued_on")),
        )
        .step(
            StepSchema::new("classification", "Classification")
                .field(FieldSpec::select(
                    "document_type",
                    "Type",
                    &["policy", "procedure", "contract", "register", "other"],
                ))
                .field(FieldSpec::select(
                    "confidentiality",
                    "Confidentiality",
                    &["public", "internal", "confidential"],
                ))
                .field(FieldSpec::boolean(
                    "contains_personal_data",
                    "Contains personal data",
                ))
                .rule(FieldRule::mandatory("document_type"))
                .rule(FieldRule::mandatory("confidentiality"))
                .rule(FieldRule::mandatory("contains_personal_data")),
        )
        .step(
            StepSchema::new("upload", "Upload")
                .field(FieldSpec::file("files", "Files"))
                .rule(FieldRule::mandatory("files")),
        )
        .step(
            StepSchema::new("retention", "Retention")
                .activate_when("has_personal_data")
                .field(FieldSpec::number("retention_months", "Retention period (months)"))
                .field(FieldSpec::multi_select(
                    "legal_basis",
                    "Legal basis",
                    &[
                        "consent",
                        "contract",
                        "legal_obligation",
                        "vital_interests",
                        "public_task",
                        "legitimate_interests",
                    ],
                ))
                .rule(FieldRule::mandatory("retention_months"))
                .rule(FieldRule::mandatory("legal_basis")),
        )
}

pub fn registry() -> FunctionRegistry {
    FunctionRegistry::with_builtins().with_predicate(
        "has_personal_data",
        predicates::is_true("contains_personal_data"),
    )
}
