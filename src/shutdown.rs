use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancel the returned token on the first SIGTERM or SIGINT.
///
/// Must be called from within a Tokio runtime. Open status streams are
/// dropped when the token fires, which also abandons their pending Nomad
/// lookups.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down status server");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down status server");
            }
        }
        trigger.cancel();
    });

    Ok(token)
}
