use anyhow::Result;
use tokio::signal;

/// Resolve on Ctrl+C or SIGTERM, whichever comes first.
pub async fn wait_for_shutdown() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.map_err(|e| {
            tracing::error!(%e, "failed to listen for Ctrl+C");
            e
        })
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
            tracing::error!(%e, "failed to install SIGTERM handler");
            e
        })?;
        sigterm.recv().await;
        Ok::<(), std::io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            tracing::info!("received Ctrl+C");
        }
        result = terminate => {
            result?;
            tracing::info!("received SIGTERM");
        }
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    Ok(())
}
