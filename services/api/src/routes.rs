use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use rodo_forms::workflows::forms::{wizard_router, SubmitOperation, WizardService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_wizard_routes<S>(service: Arc<WizardService<S>>) -> axum::Router
where
    S: SubmitOperation + 'static,
{
    wizard_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryRecordStore;
    use axum::body::Body;
    use axum::http::Request;
    use rodo_forms::workflows::catalog::FormCatalog;
    use rodo_forms::workflows::forms::SubmissionCoordinator;
    use tower::ServiceExt;

    fn router() -> axum::Router {
        let catalog = Arc::new(FormCatalog::standard().expect("catalog compiles"));
        let coordinator = SubmissionCoordinator::new(Arc::new(InMemoryRecordStore::default()));
        with_wizard_routes(Arc::new(WizardService::new(catalog, coordinator)))
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn wizard_routes_are_mounted_next_to_health() {
        let response = router()
            .oneshot(
                Request::get("/api/v1/forms")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router()
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
