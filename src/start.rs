//! Startup helpers for the topic chat server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::llm::{self, LlmConfig};
use crate::server::{self, AppState, ServerConfig};

/// Run the server (used by the `topic-chat-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting topic chat v{}", env!("CARGO_PKG_VERSION"));

    let (state, port) = match initialize() {
        Ok(init) => init,
        Err(e) => {
            tracing::error!("Failed to create state: {e:#}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(state, port, ctrl_c())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// Returns the state and the configured port.
///
/// # Errors
/// Returns an error if configuration or generator setup fails.
pub fn initialize() -> anyhow::Result<(Arc<AppState>, u16)> {
    let llm_config = LlmConfig::from_env().context("invalid model settings")?;
    let server_config = ServerConfig::from_env().context("invalid server settings")?;

    let generator = llm::build_generator(&llm_config).context("failed to build text generator")?;
    let state = AppState::new(generator, server_config.chat, server_config.max_sessions)
        .context("invalid chat settings")?;

    Ok((state, server_config.port))
}

/// Resolve on Ctrl-C. If the handler cannot be installed, never resolve.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
