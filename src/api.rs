//! REST API server for the assistant
//!
//! A thin surface over the router: one request string in, one response
//! string out, per turn. The chat UI itself lives elsewhere.

use axum::{extract::State, http::StatusCode, routing::post, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::router::Router;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<Router>,
}

/// =============================
/// Helpers: Session Ids
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Endpoints
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Empty message".into())),
        );
    }

    let session_id = parse_or_stable_uuid(req.session_id.as_deref(), "anonymous-session");
    info!(session_id = %session_id, "Received chat request");

    let answer = state.router.route(session_id, &message).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "answer": answer,
            "session_id": session_id.to_string(),
        }))),
    )
}

/// =============================
/// Router & Server Startup
/// =============================

pub fn create_app(router: Arc<Router>) -> axum::Router {
    let state = ApiState { router };

    axum::Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(
    router: Arc<Router>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let app = create_app(router);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_uuid_is_deterministic() {
        let a = stable_uuid_from_string("chat-42");
        let b = stable_uuid_from_string("chat-42");
        let c = stable_uuid_from_string("chat-43");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_or_stable_uuid() {
        let explicit = uuid::Uuid::new_v4();
        assert_eq!(
            parse_or_stable_uuid(Some(&explicit.to_string()), "seed"),
            explicit
        );
        // Unparseable values still map deterministically.
        assert_eq!(
            parse_or_stable_uuid(Some("not-a-uuid"), "seed"),
            parse_or_stable_uuid(Some("not-a-uuid"), "other-seed"),
        );
        assert_eq!(
            parse_or_stable_uuid(None, "seed"),
            stable_uuid_from_string("seed")
        );
    }
}
