use std::env;
use std::sync::Arc;

use hydrogen_auth::AuthManager;
use hydrogen_server::{load_config, ConnectionPlane};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config_path = env::var("HYDROGEN_CONFIG").unwrap_or_else(|_| "hydrogen-server.toml".to_owned());
    let config = match load_config(std::path::Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            info!(error = %e, "no usable config file found, starting from defaults");
            hydrogen_server::load_config_from_str("", "HYDROGEN_").expect("default config is always valid")
        }
    };

    let bind_addr = format!("{}:{}", config.tcp.server_address, config.tcp.server_port);
    let auth = AuthManager::new(Default::default());
    let plane = ConnectionPlane::new(config, auth);

    plane.start().await.expect("failed to start connection plane");
    let listener_task = hydrogen_server::serve_tcp(plane.clone(), &bind_addr)
        .await
        .expect("failed to bind tcp listener");
    info!(addr = %bind_addr, "hydrogen-server listening");

    shutdown_signal().await;
    listener_task.abort();
    plane.stop().await.expect("failed to stop connection plane cleanly");
    info!("hydrogen-server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
