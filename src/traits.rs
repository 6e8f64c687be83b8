//! Tool trait and registry.
//!
//! Every tool exposed over MCP or the JSON endpoints implements [`Tool`].
//! The built-in set is `ping`, `ping_store` and `query`; additional tools
//! can be registered in Rust at startup.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │   ┌──────┐  ┌────────────┐  ┌───────┐    │
//! │   │ ping │  │ ping_store │  │ query │    │
//! │   └──────┘  └────────────┘  └───────┘    │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     McpBridge (stdio / streamable HTTP)
//!     POST /tools/{name} (JSON)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use collection_harness::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::with_builtins();
//! assert!(tools.find("query").is_some());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use collection_harness_core::Error;

use crate::query::QueryService;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that agents can discover and call.
///
/// # Lifecycle
///
/// 1. The tool is registered via [`ToolRegistry::register`].
/// 2. [`name`](Tool::name), [`description`](Tool::description), and
///    [`parameters_schema`](Tool::parameters_schema) are read when a client
///    lists tools.
/// 3. [`execute`](Tool::execute) runs on every invocation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, used as the MCP tool name and
    /// the `POST /tools/{name}` route.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with the harness. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool. `params` is always a JSON object.
    ///
    /// Parameter problems should surface as [`Error::Validation`] so the
    /// HTTP layer can answer with `400`.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// What a tool can reach while it runs: the shared [`QueryService`].
#[derive(Clone)]
pub struct ToolContext {
    service: Arc<QueryService>,
}

impl ToolContext {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &QueryService {
        &self.service
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| Error::Validation(format!("invalid parameters: {}", e)).into())
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

/// Liveness check for the tool server itself.
pub struct PingTool;

#[async_trait]
impl Tool for PingTool {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check that the server is up; returns \"pong\""
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        Ok(Value::String(ctx.service().ping().to_string()))
    }
}

/// Round trip to the document store.
pub struct PingStoreTool;

#[async_trait]
impl Tool for PingStoreTool {
    fn name(&self) -> &str {
        "ping_store"
    }

    fn description(&self) -> &str {
        "Check that the document store is reachable; returns its heartbeat in nanoseconds"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let nanos = ctx.service().ping_store().await?;
        Ok(Value::from(nanos))
    }
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    query_text: String,
    #[serde(default, alias = "contains_exact")]
    exact_filter: Option<String>,
}

/// Similarity search over the served collection.
pub struct QueryTool;

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        "query"
    }

    fn description(&self) -> &str {
        "Return the two documents closest to query_text, optionally only those containing exact_filter"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query_text": { "type": "string", "description": "Free text to search for" },
                "exact_filter": {
                    "type": "string",
                    "description": "Only consider documents containing this exact substring"
                }
            },
            "required": ["query_text"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let params: QueryParams = parse_params(params)?;
        let text = ctx
            .service()
            .query(&params.query_text, params.exact_filter)
            .await?;
        Ok(Value::String(text))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for tools.
///
/// Use [`ToolRegistry::with_builtins`] for the standard `ping`,
/// `ping_store` and `query` set, then optionally
/// [`register`](ToolRegistry::register) more.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Create a registry pre-loaded with `ping`, `ping_store` and `query`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PingTool));
        registry.register(Box::new(PingStoreTool));
        registry.register(Box::new(QueryTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
