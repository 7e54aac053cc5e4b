use crate::{build_subscriber, ServerConfig};
use relay_control::ControlServer;
use relay_network::ConnectionSet;

use std::{path::Path, sync::Arc};
use tracing_subscriber::util::SubscriberInitExt;

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

async fn do_run_server(config: ServerConfig) -> Result<(), anyhow::Error> {
    build_subscriber(config.log.clone())?.init();

    if config.log.uses_files() {
        tracing::info!(dir = ?config.log.dir, "Writing log files");
    }

    let connections = Arc::new(ConnectionSet::from_configs(config.connections));
    tracing::info!("Loaded {} relay connections", connections.len());

    let mut control = ControlServer::new(config.control)?;
    control.set_connection_registry(connections);

    let ready = control.start().await?;
    ready.await?;

    if let Some(addr) = control.local_addr() {
        tracing::info!(%addr, "Control server ready");
    }

    shutdown_signal().await?;
    tracing::info!("Received shutdown signal");

    control.stop().await?;

    let stats = control.statistics();
    tracing::info!(
        accepted = stats.sessions_accepted,
        active = stats.sessions_active,
        "Control server stopped"
    );

    Ok(())
}

/// Run a relay server.
///
/// Loads a [`ServerConfig`] from `server_config_path`, installs the logging
/// configuration it describes as the global default subscriber, and starts a
/// control server over the configured relay connections. Runs until SIGINT or
/// SIGTERM is received, then stops the control server before returning.
///
/// This creates its own tokio runtime, so must not be called from within one.
pub fn run_server(server_config_path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
    let config = ServerConfig::load_file(&server_config_path)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(do_run_server(config))
}
