//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT, SIGTERM and SIGQUIT
//! - Translate the first received signal into a shutdown event
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Non-unix targets fall back to Ctrl+C only

/// Resolve once any termination signal arrives.
pub async fn termination_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    let quit = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::quit())
            .expect("Failed to install SIGQUIT handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
        _ = quit => tracing::info!("SIGQUIT received"),
    }
}
