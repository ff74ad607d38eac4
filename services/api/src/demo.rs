use crate::infra::{AuditLogHooks, InMemoryRecordStore};
use chrono::{Local, NaiveDate};
use clap::Args;
use rodo_forms::error::AppError;
use rodo_forms::workflows::catalog::{incident, FormCatalog};
use rodo_forms::workflows::forms::{
    compute_deadline, AnswerValue, RequestCategory, SessionView, SubmissionCoordinator,
    SubmitOutcome, WizardService, WizardServiceError,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct FormsArgs {
    /// Print the catalog as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the incident was detected (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) detected_on: Option<NaiveDate>,
    /// Report an incident without a personal data breach; the notification step is skipped.
    #[arg(long)]
    pub(crate) no_breach: bool,
    /// Make the first submission fail to show the retry path.
    #[arg(long)]
    pub(crate) fail_first: bool,
}

pub(crate) fn run_forms(args: FormsArgs) -> Result<(), AppError> {
    let catalog = FormCatalog::standard()?;
    let summaries = catalog.summaries();

    if args.json {
        let rendered = serde_json::to_string_pretty(&summaries).map_err(std::io::Error::from)?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Built-in forms");
    for summary in summaries {
        println!(
            "- {} ({}): {} steps, {} conditional",
            summary.id, summary.title, summary.steps, summary.conditional_steps
        );
        if let Some(form) = catalog.get(&summary.id) {
            for (index, step) in form.steps().iter().enumerate() {
                let marker = if step.is_conditional() { " [conditional]" } else { "" };
                println!(
                    "    {}. {}{} ({} fields)",
                    index + 1,
                    step.title,
                    marker,
                    step.fields.len()
                );
            }
        }
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        detected_on,
        no_breach,
        fail_first,
    } = args;
    let detected_on = detected_on.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(InMemoryRecordStore::with_failures(u32::from(fail_first)));
    let coordinator =
        SubmissionCoordinator::new(Arc::clone(&store)).with_hooks(Arc::new(AuditLogHooks));
    let service = WizardService::new(Arc::new(FormCatalog::standard()?), coordinator);

    println!("Incident report wizard demo");
    let view = service
        .open(incident::FORM_ID, BTreeMap::new())
        .map_err(demo_failure)?;
    let session = view.session_id.clone();
    render_view(&view);

    let details = [
        ("title", AnswerValue::text("Misaddressed payroll e-mail")),
        ("detected_on", AnswerValue::date(detected_on)),
        (
            "description",
            AnswerValue::text("Payroll summary for March was sent to an external address."),
        ),
        ("reporter_email", AnswerValue::text("dpo@example.com")),
    ];
    for (field, value) in details {
        service
            .set_answer(&session, field, value)
            .map_err(demo_failure)?;
    }
    render_view(&service.next(&session).await.map_err(demo_failure)?);

    service
        .set_answer(&session, "breach_occurred", AnswerValue::bool(!no_breach))
        .map_err(demo_failure)?;
    if !no_breach {
        let assessment = [
            ("affected_data", AnswerValue::text("Names, salaries, bank accounts")),
            ("affected_subjects", AnswerValue::number(42.0)),
            ("risk_level", AnswerValue::text("high")),
        ];
        for (field, value) in assessment {
            service
                .set_answer(&session, field, value)
                .map_err(demo_failure)?;
        }
    }
    let view = service.next(&session).await.map_err(demo_failure)?;
    render_view(&view);

    if !no_breach {
        let notified_on = detected_on + chrono::Duration::days(2);
        service
            .set_answer(&session, "authority_notified", AnswerValue::bool(true))
            .map_err(demo_failure)?;
        service
            .set_answer(&session, "notified_on", AnswerValue::date(notified_on))
            .map_err(demo_failure)?;
        render_view(&service.next(&session).await.map_err(demo_failure)?);
    }

    service
        .set_answer(&session, "confirmed", AnswerValue::bool(true))
        .map_err(demo_failure)?;
    let mut view = service.next(&session).await.map_err(demo_failure)?;
    if let Some(SubmitOutcome::Failed { error }) = &view.outcome {
        println!("\nSubmission failed ({error}); answers kept, retrying once");
        view = service.submit(&session).await.map_err(demo_failure)?;
    }

    match &view.outcome {
        Some(SubmitOutcome::Succeeded { record_id }) => {
            println!("\nRecord {} created", record_id.0);
            if let Some(record) = store.get(record_id) {
                println!(
                    "  form {} with {} submitted fields",
                    record.form_id,
                    record.payload.fields.len()
                );
                for (field, value) in &record.payload.fields {
                    let rendered = serde_json::to_string(value).unwrap_or_default();
                    println!("    {field}: {rendered}");
                }
            }
        }
        other => println!("\nSubmission did not complete: {other:?}"),
    }
    println!(
        "Stored records: {}, open sessions: {}",
        store.len(),
        service.session_count()
    );

    render_deadlines(detected_on);
    Ok(())
}

fn render_view(view: &SessionView) {
    let wizard = &view.wizard;
    let current = wizard
        .current_step()
        .map(|step| step.title.as_str())
        .unwrap_or("-");
    println!(
        "\n[{}] step {}/{}: {}",
        view.session_id,
        wizard.active_step_index + 1,
        wizard.active_step_count,
        current
    );
    let titles: Vec<&str> = wizard.steps.iter().map(|step| step.title.as_str()).collect();
    println!("  active steps: {}", titles.join(" -> "));
    for step in &wizard.steps {
        for (label, error) in step
            .fields
            .iter()
            .filter_map(|field| field.error.as_ref().map(|error| (&field.label, error)))
        {
            println!("  ! {label}: {error}");
        }
    }
}

fn render_deadlines(received_on: NaiveDate) {
    println!("\nStatutory response deadlines for a request received on {received_on}");
    for category in RequestCategory::ordered() {
        let standard = compute_deadline(Some(received_on), category, false);
        let extended = compute_deadline(Some(received_on), category, true);
        println!(
            "  {:<36} {}  (extended: {})",
            category.label(),
            render_date(standard.date()),
            render_date(extended.date())
        );
    }
}

fn render_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.to_string())
        .unwrap_or_else(|| "undetermined".to_string())
}

fn demo_failure(error: WizardServiceError) -> AppError {
    AppError::Io(std::io::Error::other(format!(
        "demo wizard rejected a step: {error}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_completes_with_and_without_breach() {
        let detected_on = NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date");
        run_demo(DemoArgs {
            detected_on: Some(detected_on),
            no_breach: false,
            fail_first: true,
        })
        .await
        .expect("breach demo completes");

        run_demo(DemoArgs {
            detected_on: Some(detected_on),
            no_breach: true,
            fail_first: false,
        })
        .await
        .expect("no-breach demo completes");
    }

    #[test]
    fn forms_listing_renders() {
        run_forms(FormsArgs { json: false }).expect("table renders");
        run_forms(FormsArgs { json: true }).expect("json renders");
    }
}
