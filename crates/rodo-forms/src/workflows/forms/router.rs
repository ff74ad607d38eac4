use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{AnswerValue, FieldId, FileRef};
use super::service::{SessionId, SessionView, WizardService, WizardServiceError};
use super::submission::{SubmitOperation, SubmitOutcome};

/// Router exposing wizard sessions to a renderer.
pub fn wizard_router<S>(service: Arc<WizardService<S>>) -> Router
where
    S: SubmitOperation + 'static,
{
    Router::new()
        .route("/api/v1/forms", get(forms_handler::<S>))
        .route("/api/v1/forms/:form_id/sessions", post(open_handler::<S>))
        .route("/api/v1/sessions/:session_id", get(view_handler::<S>))
        .route(
            "/api/v1/sessions/:session_id/answers/:field_id",
            put(answer_handler::<S>),
        )
        .route("/api/v1/sessions/:session_id/next", post(next_handler::<S>))
        .route("/api/v1/sessions/:session_id/back", post(back_handler::<S>))
        .route(
            "/api/v1/sessions/:session_id/jump/:step",
            post(jump_handler::<S>),
        )
        .route(
            "/api/v1/sessions/:session_id/submit",
            post(submit_handler::<S>),
        )
        .route(
            "/api/v1/sessions/:session_id/cancel",
            post(cancel_handler::<S>),
        )
        .with_state(service)
}

/// Optional seed values for an edit-mode session.
#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub value: Value,
}

pub(crate) async fn forms_handler<S>(State(service): State<Arc<WizardService<S>>>) -> Response
where
    S: SubmitOperation + 'static,
{
    let forms = service.catalog().summaries();
    (StatusCode::OK, axum::Json(json!({ "forms": forms }))).into_response()
}

pub(crate) async fn open_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path(form_id): Path<String>,
    body: Option<axum::Json<OpenSessionRequest>>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let request = body.map(|axum::Json(request)| request).unwrap_or_default();
    let mut seed = BTreeMap::new();
    for (field, raw) in request.values {
        match answer_from_json(raw) {
            Ok(value) => {
                seed.insert(FieldId::from(field), value);
            }
            Err(reason) => return bad_request(format!("field `{field}`: {reason}")),
        }
    }

    match service.open(&form_id, seed) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(error) => error_response(&service, None, error),
    }
}

pub(crate) async fn view_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let session_id = SessionId(session_id);
    respond(&service, &session_id, service.view(&session_id))
}

pub(crate) async fn answer_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path((session_id, field_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<AnswerRequest>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let value = match answer_from_json(request.value) {
        Ok(value) => value,
        Err(reason) => return bad_request(format!("field `{field_id}`: {reason}")),
    };
    let session_id = SessionId(session_id);
    respond(
        &service,
        &session_id,
        service.set_answer(&session_id, &field_id, value),
    )
}

pub(crate) async fn next_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let session_id = SessionId(session_id);
    let result = service.next(&session_id).await;
    respond(&service, &session_id, result)
}

pub(crate) async fn back_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let session_id = SessionId(session_id);
    respond(&service, &session_id, service.back(&session_id))
}

pub(crate) async fn jump_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path((session_id, step)): Path<(String, usize)>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let session_id = SessionId(session_id);
    respond(&service, &session_id, service.jump(&session_id, step))
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let session_id = SessionId(session_id);
    let result = service.submit(&session_id).await;
    respond(&service, &session_id, result)
}

pub(crate) async fn cancel_handler<S>(
    State(service): State<Arc<WizardService<S>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    let session_id = SessionId(session_id);
    respond(&service, &session_id, service.cancel(&session_id))
}

fn respond<S>(
    service: &WizardService<S>,
    session_id: &SessionId,
    result: Result<SessionView, WizardServiceError>,
) -> Response
where
    S: SubmitOperation + 'static,
{
    match result {
        Ok(view) => {
            let status = match &view.outcome {
                None => StatusCode::OK,
                Some(SubmitOutcome::Succeeded { .. }) => StatusCode::CREATED,
                Some(SubmitOutcome::Ignored) => StatusCode::ACCEPTED,
                Some(SubmitOutcome::Failed { .. }) => StatusCode::BAD_GATEWAY,
                Some(SubmitOutcome::Discarded) => StatusCode::CONFLICT,
            };
            (status, axum::Json(view)).into_response()
        }
        Err(error) => error_response(service, Some(session_id), error),
    }
}

fn error_response<S>(
    service: &WizardService<S>,
    session_id: Option<&SessionId>,
    error: WizardServiceError,
) -> Response
where
    S: SubmitOperation + 'static,
{
    match error {
        WizardServiceError::UnknownForm(_) | WizardServiceError::UnknownSession(_) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        WizardServiceError::State(_) => {
            // Rejected transitions may have surfaced step errors worth rendering.
            let session = session_id.and_then(|id| service.view(id).ok());
            let payload = json!({
                "error": error.to_string(),
                "session": session,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
    }
}

fn bad_request(reason: String) -> Response {
    let payload = json!({
        "error": reason,
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

/// Plain JSON from a renderer: strings, numbers, booleans, string arrays for
/// multi-selects and `{name, storage_key}` arrays for uploads. `null` clears the field.
pub fn answer_from_json(raw: Value) -> Result<AnswerValue, String> {
    match raw {
        Value::Null => Ok(AnswerValue::Empty),
        Value::Bool(flag) => Ok(AnswerValue::bool(flag)),
        Value::Number(number) => number
            .as_f64()
            .map(AnswerValue::number)
            .ok_or_else(|| "number out of range".to_string()),
        Value::String(text) => Ok(AnswerValue::text(text)),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(AnswerValue::list(
            items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string)),
        )),
        Value::Array(items) => serde_json::from_value::<Vec<FileRef>>(Value::Array(items))
            .map(AnswerValue::files)
            .map_err(|error| format!("expected a list of options or files: {error}")),
        Value::Object(object) => serde_json::from_value::<AnswerValue>(Value::Object(object))
            .map_err(|error| format!("unsupported value: {error}")),
    }
}
