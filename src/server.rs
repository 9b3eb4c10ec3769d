//! MCP server initialization for stdio and HTTP transports.
//!
//! Provides [`serve`] which wires the embedding provider, Qdrant connector, and MCP tool
//! handler into a running server. The embedding model is not loaded here; the first tool
//! call that needs it triggers the load.

use crate::config::Settings;
use crate::embedding;
use crate::qdrant::QdrantConnector;
use crate::tools::QdrantTools;
use anyhow::Result;
use clap::ValueEnum;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Transport protocol for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Sse,
    StreamableHttp,
}

impl Transport {
    /// HTTP path the MCP service is mounted at. `None` for stdio.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Stdio => None,
            Self::Sse => Some("/sse"),
            Self::StreamableHttp => Some("/mcp"),
        }
    }
}

/// Shared setup: validate settings, create embedding provider and connector.
fn setup_shared_state(settings: Settings) -> Result<(Arc<QdrantConnector>, Arc<Settings>)> {
    settings.validate()?;

    let embedding = embedding::create_provider(&settings.embedding)?;
    tracing::info!(
        model = %settings.embedding.model,
        vector = %embedding.vector_name(),
        "embedding provider ready (model loads on first use)"
    );

    let connector = QdrantConnector::new(&settings.qdrant, embedding)?;
    tracing::info!(
        url = settings.qdrant.url.as_deref().unwrap_or_default(),
        collection = settings.qdrant.collection_name.as_deref().unwrap_or("(per call)"),
        read_only = settings.qdrant.read_only,
        "qdrant connector ready"
    );

    Ok((Arc::new(connector), Arc::new(settings)))
}

/// Start the MCP server on the given transport.
pub async fn serve(settings: Settings, transport: Transport) -> Result<()> {
    match transport.endpoint() {
        None => serve_stdio(settings).await,
        Some(endpoint) => serve_http(settings, endpoint).await,
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(settings: Settings) -> Result<()> {
    tracing::info!("starting MCP server on stdio");

    let (connector, settings) = setup_shared_state(settings)?;

    let tools = QdrantTools::new(connector, settings);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP, mounted at `endpoint`.
pub async fn serve_http(settings: Settings, endpoint: &str) -> Result<()> {
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, endpoint, "starting MCP server on HTTP");

    let (connector, settings) = setup_shared_state(settings)?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(QdrantTools::new(connector.clone(), settings.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service(endpoint, service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}{endpoint}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
