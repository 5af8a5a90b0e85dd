use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use greenbay_api::config::{config, StoreBackend};
use greenbay_api::database::{DataAccess, DatabaseManager, IndexOptions};
use greenbay_api::filter::Document;
use greenbay_api::server::{app, AppState};
use greenbay_api::types::Collection;

#[derive(Parser, Debug)]
#[command(name = "greenbay", version, about = "GreenBay property management API")]
struct Args {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Document store backend (overrides STORE_BACKEND)
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DB_CON_STRING, DB_NAME, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = config().clone();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(store) = args.store {
        config.database.backend = store;
    }
    info!(
        "Starting GreenBay API in {:?} mode with {:?} store",
        config.environment, config.database.backend
    );
    info!(
        "Outbound timeouts (ms): connect {}, call {}, read {}, write {}",
        config.network.connect_timeout_ms,
        config.network.call_timeout_ms,
        config.network.read_timeout_ms,
        config.network.write_timeout_ms
    );

    let store = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open document store")?;
    let data = DataAccess::new(store);

    if config.api.unique_usernames {
        let mut keys = Document::new();
        keys.insert("username".to_string(), json!(1));
        let options = IndexOptions { name: None, unique: true };
        if let Err(e) = data.create_index(Collection::Users.name(), keys, options).await {
            warn!("Unique username index not created: {}", e);
        }
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    let port = listener.local_addr()?.port();
    info!("GreenBay API listening on http://{}:{}", config.server.host, port);

    let state = AppState { data, port, max_body_kb: config.api.max_body_kb };
    axum::serve(listener, app(state, config.api.enable_request_logging))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("GreenBay API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
