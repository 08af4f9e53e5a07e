use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::layout::ScopePlan;

/// Expand `pattern`, handing every match to `emit`.
///
/// Returns `false` if expansion stopped early, either because of
///  cancellation or because `emit` refused a path.
pub(super) fn expand<F>(pattern: &str, cancel: &CancellationToken, mut emit: F) -> bool
where
    F: FnMut(PathBuf) -> bool,
{
    let paths = match ::glob::glob(pattern) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid glob pattern");
            return true;
        }
    };

    for entry in paths {
        if cancel.is_cancelled() {
            return false;
        }
        match entry {
            Ok(path) => {
                if !emit(path) {
                    return false;
                }
            }
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e.error(), "skipping unreadable path");
            }
        }
    }
    true
}

pub(super) fn spawn(plan: ScopePlan, tx: flume::Sender<PathBuf>, cancel: CancellationToken) {
    tokio::task::spawn_blocking(move || {
        let pattern = plan.pattern();
        expand(&pattern, &cancel, |path| tx.send(path).is_ok());
        tracing::debug!(pattern = %pattern, "glob discovery finished");
    });
}
