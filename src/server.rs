//! Tool server: MCP over stdio or HTTP.
//!
//! `colh serve` runs one of two transports:
//!
//! - **stdio** (default): MCP JSON-RPC framed on stdin/stdout, which is
//!   what desktop MCP clients launch. Logs go to stderr.
//! - **http**: an axum server on `[server].bind` with the MCP streamable
//!   HTTP endpoint plus plain JSON endpoints.
//!
//! # HTTP Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `*`    | `/mcp` | MCP streamable HTTP transport |
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call any registered tool by name |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "query: not found: collection 'docs'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `forbidden` (403), `not_found` (404),
//! `store_error`, `embedding_error`, `io_error` and `tool_error` (500).
//!
//! # MCP Client Configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "collection-harness": {
//!       "command": "colh",
//!       "args": ["--config", "/path/to/colh.toml", "serve"]
//!     }
//!   }
//! }
//! ```

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use collection_harness_core::Error;

use crate::config::{Config, Transport};
use crate::mcp::McpBridge;
use crate::query::QueryService;
use crate::traits::{ToolContext, ToolRegistry};

/// Shared state passed to the JSON route handlers.
#[derive(Clone)]
struct AppState {
    service: Arc<QueryService>,
    tools: Arc<ToolRegistry>,
}

/// `colh serve` entry point.
pub async fn run_server(config: &Config, transport: Transport) -> anyhow::Result<()> {
    let service = Arc::new(QueryService::connect(config).await?);
    match transport {
        Transport::Stdio => run_stdio(service).await,
        Transport::Http => {
            let listener = TcpListener::bind(&config.server.bind).await?;
            serve_http(listener, service).await
        }
    }
}

/// Serve MCP on stdin/stdout until the client disconnects.
pub async fn run_stdio(service: Arc<QueryService>) -> anyhow::Result<()> {
    let bridge = McpBridge::new(service, Arc::new(ToolRegistry::with_builtins()));
    info!("MCP server listening on stdio");
    let running = bridge.serve(rmcp::transport::stdio()).await?;
    let reason = running.waiting().await?;
    info!(?reason, "MCP stdio session ended");
    Ok(())
}

/// Serve the HTTP router on an already-bound listener.
pub async fn serve_http(listener: TcpListener, service: Arc<QueryService>) -> anyhow::Result<()> {
    let app = router(service, Arc::new(ToolRegistry::with_builtins()));
    info!("MCP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the HTTP router: `/mcp`, `/health`, `/tools/list`, `/tools/{name}`.
pub fn router(service: Arc<QueryService>, tools: Arc<ToolRegistry>) -> Router {
    let bridge = McpBridge::new(service.clone(), tools.clone());
    let mcp = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .with_state(AppState { service, tools })
        .nest_service("/mcp", mcp)
        .layer(cors)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
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

/// Map a tool failure to a status code by its typed error kind.
///
/// Errors that are not a [`collection_harness_core::Error`] are reported as
/// `500 tool_error`.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let message = format!("{}: {}", tool_name, err);
    match err.downcast_ref::<Error>() {
        Some(typed) => {
            let status = match typed {
                Error::Validation(_) => StatusCode::BAD_REQUEST,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Permission(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status.is_server_error() {
                warn!(tool = tool_name, error = %typed, "tool call failed");
            }
            AppError {
                status,
                code: typed.code().to_string(),
                message,
            }
        }
        None => {
            warn!(tool = tool_name, error = %err, "tool call failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "tool_error".to_string(),
                message,
            }
        }
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
    builtin: bool,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo {
            name: t.name().to_string(),
            description: t.description().to_string(),
            builtin: t.is_builtin(),
            parameters: t.parameters_schema(),
        })
        .collect();

    Json(ToolListResponse { tools })
}

// ============ POST /tools/{name} ============

/// Dispatch a tool by name and wrap its output as `{ "result": ... }`.
async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let ctx = ToolContext::new(state.service.clone());
    let result = tool
        .execute(params, &ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_typed_errors() {
        let cases = [
            (Error::Validation("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (Error::Permission("x".into()), StatusCode::FORBIDDEN, "forbidden"),
            (Error::Store("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        ];
        for (err, status, code) in cases {
            let app_err = classify_tool_error("query", err.into());
            assert_eq!(app_err.status, status);
            assert_eq!(app_err.code, code);
            assert!(app_err.message.starts_with("query: "));
        }
    }

    #[test]
    fn test_classify_untyped_error() {
        let app_err = classify_tool_error("custom", anyhow::anyhow!("boom"));
        assert_eq!(app_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app_err.code, "tool_error");
    }
}
