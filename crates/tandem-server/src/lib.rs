//! Tandem Server
//!
//! HTTP API over the planning-conversation core: chat turns, document
//! generation and review, and board snapshots. This is a library crate —
//! the server is started via `start_server()`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{http::Method, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use tandem_core::agents::{AgentRegistry, AgentRoutingTable};
use tandem_core::documents::{DocumentSink, FsDocumentSink};
use tandem_core::gateway::{ExecutionGateway, HttpModelClient, ModelClient};
use tandem_core::storage::{Database, UsageStore};
use tandem_core::Orchestrator;

pub mod error;
pub mod routes;
pub mod types;

/// Configuration for starting the server.
pub struct ServerConfig {
    /// Port to listen on (default: 3100).
    pub port: u16,
    /// SQLite database path.
    pub db_path: PathBuf,
    /// Directory for rendered document copies; None disables export.
    pub documents_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tandem");
        Self {
            port: 3100,
            db_path: data_dir.join("tandem.db"),
            documents_dir: Some(data_dir.join("documents")),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// SQLite database path (opened per request).
    pub db_path: Arc<PathBuf>,
    /// Turn orchestrator for the chat endpoint.
    pub orchestrator: Arc<Orchestrator>,
    /// Model gateway for direct document generation.
    pub gateway: Arc<ExecutionGateway>,
    /// Filesystem export of generated documents (None disables it).
    pub document_sink: Option<Arc<dyn DocumentSink>>,
}

/// Build the model client from environment overrides.
pub fn create_model_client() -> Arc<dyn ModelClient> {
    let api_url = std::env::var("TANDEM_API_URL")
        .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string());
    let api_key = std::env::var("TANDEM_API_KEY").unwrap_or_else(|_| {
        tracing::warn!("TANDEM_API_KEY not set; model calls will be rejected by the provider");
        String::new()
    });
    let model =
        std::env::var("TANDEM_MODEL").unwrap_or_else(|_| "balanced-latest".to_string());
    let provider =
        std::env::var("TANDEM_PROVIDER").unwrap_or_else(|_| "anthropic".to_string());

    Arc::new(HttpModelClient::new(api_url, api_key, model, provider))
}

/// Start the HTTP server with the given configuration.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Run migrations up front so the first request doesn't pay for them
    let _db = Database::new(&config.db_path)?;

    let registry = Arc::new(AgentRegistry::builtin());
    let routing = AgentRoutingTable::builtin();
    let client = create_model_client();
    let usage_sink = Arc::new(UsageStore::new(config.db_path.clone()));
    let gateway = Arc::new(ExecutionGateway::new(
        client,
        registry.clone(),
        usage_sink,
    ));

    let document_sink: Option<Arc<dyn DocumentSink>> = config
        .documents_dir
        .map(|dir| Arc::new(FsDocumentSink::new(dir)) as Arc<dyn DocumentSink>);

    let mut orchestrator = Orchestrator::new(
        config.db_path.clone(),
        gateway.clone(),
        registry,
        routing,
    );
    if let Some(sink) = &document_sink {
        orchestrator = orchestrator.with_document_sink(sink.clone());
    }

    let state = AppState {
        db_path: Arc::new(config.db_path),
        orchestrator: Arc::new(orchestrator),
        gateway,
        document_sink,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    tracing::info!("Starting tandem-server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Tandem Server"
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
