//! Tandem Server
//!
//! HTTP API over the planning-conversation core.

use std::path::PathBuf;

use tandem_server::{start_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(port) = std::env::var("PORT") {
        config.port = port.parse()?;
    }
    if let Ok(path) = std::env::var("TANDEM_DB_PATH") {
        config.db_path = PathBuf::from(path);
    }
    if let Ok(dir) = std::env::var("TANDEM_DOCUMENTS_DIR") {
        config.documents_dir = Some(PathBuf::from(dir));
    }

    start_server(config).await
}
