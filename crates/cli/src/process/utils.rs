use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Spawns a task that cancels the returned token on SIGINT or SIGTERM.
///
/// Long running commands watch the token and stop at the next item,
///  reporting what they got through.
pub fn cancel_on_shutdown() -> std::io::Result<CancellationToken> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = CancellationToken::new();
    let signal_token = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                tracing::debug!("cancelling on SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::debug!("cancelling on SIGTERM");
            }
        }
        signal_token.cancel();
    });

    Ok(token)
}

/// Registers a panic hook that logs panics using the `tracing` crate
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| match panic.location() {
        Some(loc) => {
            tracing::error!(
                message = %panic,
                panic.file = loc.file(),
                panic.line = loc.line(),
                panic.column = loc.column(),
            );
        }
        None => tracing::error!(message = %panic),
    }));
}

pub fn report_build_info() {
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        build_profile = if cfg!(debug_assertions) { "debug" } else { "release" },
        "dfs starting up"
    );
}
