use std::process::ExitCode;
use std::sync::Arc;

use logger_httpd::{Recorder, Server, ServerConfig};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let recorder = Arc::new(Recorder::new());
    let root = config.root_dir.clone();
    let server = match Server::start(config, &recorder).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "server failed to start");
            return ExitCode::FAILURE;
        }
    };

    server.add_byte_resource(
        "version",
        format!("{}\n", env!("CARGO_PKG_VERSION")).into_bytes(),
        "text/plain",
    );
    match server.store().add_directory(&root) {
        Ok(count) => info!(count, root = %root.display(), "registered root files"),
        Err(e) => warn!(root = %root.display(), error = %e, "could not scan root directory"),
    }

    info!("logger HTTP server running on http://{}", server.local_addr());

    shutdown_signal().await;
    info!("shutdown signal received, stopping server...");

    if let Err(e) = server.stop().await {
        error!(error = %e, "server stopped with error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
