//! MCP-compatible HTTP server.
//!
//! Exposes the ingestion pipeline as a single tool, `convert_to_markdown`,
//! over a JSON HTTP API suitable for integration with MCP-compatible AI
//! agents.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry the sanitized message for the failure class:
//!
//! ```json
//! { "error": { "code": "forbidden_address", "message": "access to private or internal addresses is forbidden" } }
//! ```
//!
//! # Security headers
//!
//! Every response — success or error, any route — carries the fixed
//! hardening header set (nosniff, frame denial, CSP, referrer and
//! permissions policies).

use axum::{
    extract::{Path, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::IngestError;
use crate::ingest::{IngestRequest, Ingestor};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(ingestor: Arc<Ingestor>) -> Self {
        Self { ingestor }
    }
}

/// Fixed security response headers, applied to every response.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("content-security-policy", "default-src 'self'"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "geolocation=(), microphone=(), camera=()",
    ),
];

async fn apply_security_headers(request: axum::extract::Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

/// Builds the application router. Exposed separately from [`run_server`] so
/// tests can drive it over an ephemeral listener.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        // Layers wrap outside-in as added: the header middleware goes last so
        // it is outermost and stamps CORS preflight responses too.
        .layer(cors)
        .layer(middleware::from_fn(apply_security_headers))
        .with_state(state)
}

/// Starts the server on the configured bind address and runs until the
/// process is terminated. The converter and telemetry collaborators are
/// instantiated once at startup and injected through `ingestor`.
pub async fn run_server(config: &Config, ingestor: Arc<Ingestor>) -> anyhow::Result<()> {
    let app = router(AppState::new(ingestor));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("mdgate MCP server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable failure class (e.g. `"forbidden_address"`).
    code: String,
    /// The sanitized user-facing message.
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Maps a pipeline failure onto an HTTP status. The message is the error's
/// `Display` text, which is sanitized by construction.
fn classify_ingest_error(err: IngestError) -> AppError {
    let status = match &err {
        IngestError::Input
        | IngestError::InvalidUrl
        | IngestError::SchemeNotAllowed
        | IngestError::Resolution
        | IngestError::Encoding => StatusCode::BAD_REQUEST,
        IngestError::ForbiddenAddress
        | IngestError::BlockedContentType { .. }
        | IngestError::SizeLimit { .. } => StatusCode::FORBIDDEN,
        IngestError::Timeout => StatusCode::REQUEST_TIMEOUT,
        IngestError::HttpStatus { .. } | IngestError::Network => StatusCode::BAD_GATEWAY,
        IngestError::Conversion { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::Staging => StatusCode::INTERNAL_SERVER_ERROR,
    };
    AppError {
        status,
        code: err.class().to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

/// JSON Schema for the `convert_to_markdown` tool input: an object with
/// optional `fileUrl` and `fileBase64`, exactly one required.
fn convert_tool_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "fileUrl": {
                "type": "string",
                "description": "URL of the document to convert"
            },
            "fileBase64": {
                "type": "string",
                "description": "Base64-encoded file content (alternative to fileUrl)"
            }
        },
        "oneOf": [
            { "required": ["fileUrl"] },
            { "required": ["fileBase64"] }
        ]
    })
}

async fn handle_list_tools() -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: vec![ToolInfo {
            name: "convert_to_markdown".to_string(),
            description: "Convert documents (PDF, DOCX, PPTX, XLSX, HTML, CSV, and more) \
                          to clean Markdown. Accepts a document URL or inline base64 content."
                .to_string(),
            parameters: convert_tool_schema(),
        }],
    })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    if name != "convert_to_markdown" {
        return Err(not_found(format!("no tool registered with name: {}", name)));
    }

    let request: IngestRequest = serde_json::from_value(params).map_err(|_| AppError {
        status: StatusCode::BAD_REQUEST,
        code: "input".to_string(),
        message: "request must contain fileUrl or fileBase64".to_string(),
    })?;

    let markdown = state
        .ingestor
        .ingest(&request)
        .await
        .map_err(classify_ingest_error)?;

    Ok(Json(serde_json::json!({ "result": markdown })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_blocks_are_forbidden_with_sanitized_message() {
        let err = classify_ingest_error(IngestError::ForbiddenAddress);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "forbidden_address");
        assert!(!err.message.contains("169.254"));
    }

    #[test]
    fn upstream_status_maps_to_bad_gateway() {
        let err = classify_ingest_error(IngestError::HttpStatus { status: 404 });
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(err.message.contains("HTTP 404"));
    }

    #[test]
    fn conversion_failure_is_unprocessable() {
        let err = classify_ingest_error(IngestError::Conversion { class: "pdf" });
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("verify the file format"));
    }

    #[test]
    fn tool_schema_requires_exactly_one_field() {
        let schema = convert_tool_schema();
        assert!(schema["properties"]["fileUrl"].is_object());
        assert_eq!(schema["oneOf"].as_array().unwrap().len(), 2);
    }
}
