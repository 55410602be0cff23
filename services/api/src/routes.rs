use crate::infra::{AppState, ProofVault, ProofVaultError};
use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use trackline::workflows::tracks::{track_router, NotificationPublisher, TrackService, TrackStore};

/// Header naming the uploaded proof artifact.
pub(crate) const PROOF_FILENAME_HEADER: &str = "x-proof-filename";

pub(crate) fn with_track_routes<S, N>(service: Arc<TrackService<S, N>>) -> axum::Router
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    track_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/proofs", axum::routing::post(proof_upload_endpoint))
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

#[derive(Debug, Serialize)]
pub(crate) struct ProofUploadView {
    pub(crate) url: String,
    pub(crate) kind: &'static str,
}

pub(crate) async fn proof_upload_endpoint(
    Extension(vault): Extension<Arc<dyn ProofVault>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let filename = headers
        .get(PROOF_FILENAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if filename.is_empty() {
        let payload = json!({
            "error": format!("missing {PROOF_FILENAME_HEADER} header"),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }

    match vault.store(filename, &body) {
        Ok(reference) => {
            let view = ProofUploadView {
                url: reference.url,
                kind: reference.kind.label(),
            };
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error @ ProofVaultError::TooLarge { .. }) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::PAYLOAD_TOO_LARGE, Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryProofVault;
    use axum::http::HeaderValue;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    async fn read_json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 65_536)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn proof_headers(filename: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(PROOF_FILENAME_HEADER, HeaderValue::from_static(filename));
        headers
    }

    #[tokio::test]
    async fn proof_upload_classifies_images() {
        let vault = Arc::new(MemoryProofVault::new(1024));
        let as_trait: Arc<dyn ProofVault> = vault.clone();

        let response = proof_upload_endpoint(
            Extension(as_trait),
            proof_headers("run-42.png"),
            Bytes::from_static(b"png bytes"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = read_json_body(response).await;
        assert_eq!(payload.get("kind"), Some(&serde_json::json!("image")));
        assert!(payload
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .ends_with("run-42.png"));
        assert_eq!(vault.stored_count(), 1);
    }

    #[tokio::test]
    async fn proof_upload_treats_documents_as_files() {
        let vault: Arc<dyn ProofVault> = Arc::new(MemoryProofVault::new(1024));

        let response = proof_upload_endpoint(
            Extension(vault),
            proof_headers("evidence.pdf"),
            Bytes::from_static(b"pdf bytes"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = read_json_body(response).await;
        assert_eq!(payload.get("kind"), Some(&serde_json::json!("file")));
    }

    #[tokio::test]
    async fn proof_upload_enforces_the_size_cap() {
        let vault: Arc<dyn ProofVault> = Arc::new(MemoryProofVault::new(4));

        let response = proof_upload_endpoint(
            Extension(vault),
            proof_headers("run-42.png"),
            Bytes::from_static(b"way past the cap"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn proof_upload_requires_a_filename() {
        let vault: Arc<dyn ProofVault> = Arc::new(MemoryProofVault::new(1024));

        let response = proof_upload_endpoint(
            Extension(vault),
            HeaderMap::new(),
            Bytes::from_static(b"bytes"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn readiness_endpoint_reports_state() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(handle),
        };

        let response = readiness_endpoint(Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state
            .readiness
            .store(true, std::sync::atomic::Ordering::Release);
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(payload) = healthcheck().await;
        assert_eq!(payload.get("status"), Some(&serde_json::json!("ok")));
    }
}
