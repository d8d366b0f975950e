//! Command implementations

pub mod start;
pub mod stop;

/// Exit code for a run interrupted by Ctrl-C or SIGTERM.
pub const INTERRUPTED: u8 = 130;

/// Resolve on Ctrl-C, or on SIGTERM where supported.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            tracing::info!("received shutdown signal");
            return;
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received shutdown signal");
}
