//! Account settings: profile, security and notifications.

use crate::workflows::forms::rules::{predicates, validators, FunctionRegistry};
use crate::workflows::forms::schema::{FieldRule, FieldSpec, FormSchema, StepSchema};

pub const FORM_ID: &str = "account_settings";

pub const MIN_PASSWORD_LENGTH: usize = 12;

pub fn schema() -> FormSchema {
    FormSchema::new(FORM_ID, "Account settings")
        .step(
            StepSchema::new("profile", "Profile")
                .field(FieldSpec::text("display_name", "Display name"))
                .field(FieldSpec::email("email", "E-mail"))
                .field(FieldSpec::text("position", "Position"))
                .rule(FieldRule::mandatory("display_name"))
                .rule(FieldRule::mandatory("email"))
                .rule(FieldRule::optional("position")),
        )
        .step(
            StepSchema::new("security", "Security")
                .field(FieldSpec::text("new_password", "New password"))
                .field(FieldSpec::text("confirm_password", "Confirm password"))
                .field(FieldSpec::boolean("two_factor", "Two-factor authentication"))
                .rule(
                    FieldRule::required_when("new_password", "changing_password")
                        .validated_by("password_strength"),
                )
                .rule(
                    FieldRule::required_when("confirm_password", "changing_password")
                        .validated_by("password_confirmation"),
                )
                .rule(FieldRule::optional("two_factor")),
        )
        .step(
            StepSchema::new("notifications", "Notifications")
                .field(FieldSpec::boolean("email_digest", "E-mail digest"))
                .field(FieldSpec::select(
                    "digest_frequency",
                    "Digest frequency",
                    &["daily", "weekly"],
                ))
                .field(FieldSpec::multi_select(
                    "alert_topics",
                    "Alerts",
                    &["incidents", "requests", "deadlines"],
                ))
                .rule(FieldRule::optional("email_digest"))
                .rule(FieldRule::required_when("digest_frequency", "digest_enabled"))
                .rule(FieldRule::optional("alert_topics")),
        )
}

pub fn registry() -> FunctionRegistry {
    FunctionRegistry::with_builtins()
        .with_predicate("changing_password", predicates::is_filled("new_password"))
        .with_predicate("digest_enabled", predicates::is_true("email_digest"))
        .with_validator("password_strength", validators::min_length(MIN_PASSWORD_LENGTH))
        .with_validator(
            "password_confirmation",
            validators::matches_field("new_password"),
        )
}
