//! HTTP API server implementation

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::RouterConfig;
use crate::core::errors::TranslationError;
use crate::core::models::{TranslationRequest, TranslationResult};
use crate::core::router::{FallbackRouter, RouterStats};

/// Application state
#[derive(Clone)]
pub struct AppState {
    router: Arc<FallbackRouter>,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// Translation request payload
#[derive(Deserialize)]
pub struct TranslatePayload {
    /// Texts to translate, order-preserving
    pub texts: Vec<String>,
    /// ISO 639-1 source language code
    pub source_lang: String,
    /// ISO 639-1 target language code
    pub target_lang: String,
    /// Optional hint forwarded to providers
    #[serde(default)]
    pub context_hint: Option<String>,
}

/// Translation response payload
#[derive(Serialize)]
pub struct TranslateResponse {
    /// Per-text results in input order
    pub results: Vec<TranslationResult>,
    /// Number of translated texts
    pub translated: usize,
    /// Number of failed texts
    pub failed: usize,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorDetail,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorDetail {
    /// Human-readable message
    pub message: String,
    /// Machine-readable code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

fn error_response(error: &TranslationError) -> (StatusCode, axum::Json<ErrorResponse>) {
    let status = match error {
        TranslationError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        TranslationError::AllProvidersExhausted { .. } => StatusCode::BAD_GATEWAY,
        TranslationError::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        axum::Json(ErrorResponse {
            error: ErrorDetail {
                message: error.to_string(),
                code: Some(error.kind().to_string()),
            },
        }),
    )
}

/// Health check handler
async fn health_check() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Batch translation handler
async fn translate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TranslatePayload>,
) -> Result<axum::Json<TranslateResponse>, (StatusCode, axum::Json<ErrorResponse>)> {
    let mut request = TranslationRequest::new(
        payload.texts,
        payload.source_lang,
        payload.target_lang,
    );
    if let Some(hint) = payload.context_hint {
        request = request.with_context_hint(hint);
    }

    match state.router.translate(&request).await {
        Ok(outcome) => Ok(axum::Json(TranslateResponse {
            translated: outcome.translated_count(),
            failed: outcome.failed_count(),
            results: outcome.results,
        })),
        Err(e) => {
            warn!("Translation failed: {}", e);
            Err(error_response(&e))
        }
    }
}

/// Router statistics handler
async fn stats(State(state): State<Arc<AppState>>) -> axum::Json<RouterStats> {
    axum::Json(state.router.stats().await)
}

/// Run the HTTP server
pub async fn run_server(host: String, port: u16) -> anyhow::Result<()> {
    let config = RouterConfig::load()?;
    let router = Arc::new(FallbackRouter::from_config(config)?);

    run_server_with_router(host, port, router).await
}

/// Run the HTTP server over an existing router instance
pub async fn run_server_with_router(
    host: String,
    port: u16,
    router: Arc<FallbackRouter>,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState { router });

    let app = Router::new()
        .route("/", get(health_check))
        .route("/translate", post(translate))
        .route("/stats", get(stats))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    use crate::core::errors::ErrorKind;

    #[test]
    fn test_translate_response_shape() {
        let response = TranslateResponse {
            results: vec![
                TranslationResult::Translated {
                    text: "hei".to_string(),
                    provider: "deepl".to_string(),
                    tier: 2,
                    cache_hit: false,
                },
                TranslationResult::Failed {
                    error_kind: ErrorKind::Exhausted,
                },
            ],
            translated: 1,
            failed: 1,
        };

        assert_json_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "results": [
                    {
                        "status": "translated",
                        "text": "hei",
                        "provider": "deepl",
                        "tier": 2,
                        "cache_hit": false
                    },
                    {
                        "status": "failed",
                        "error_kind": "exhausted"
                    }
                ],
                "translated": 1,
                "failed": 1
            })
        );
    }

    #[test]
    fn test_error_response_status_mapping() {
        let (status, _) = error_response(&TranslationError::InvalidRequest {
            message: "empty".into(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = error_response(&TranslationError::AllProvidersExhausted {
            last_error: "none".into(),
        });
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _) = error_response(&TranslationError::TimeoutError);
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_translate_payload_parsing() {
        let payload: TranslatePayload = serde_json::from_str(
            r#"{"texts": ["hello"], "source_lang": "en", "target_lang": "fi"}"#,
        )
        .unwrap();

        assert_eq!(payload.texts, vec!["hello"]);
        assert!(payload.context_hint.is_none());
    }
}
