pub mod utils;

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use utils::cancel_on_shutdown;

/// Where and how loudly to log
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: tracing::Level,
    /// Directory for log files (logs to stderr only if not set)
    pub log_dir: Option<PathBuf>,
}

impl LogConfig {
    /// Warnings only, or info and up when verbose
    pub fn new(verbose: bool, log_dir: Option<PathBuf>) -> Self {
        Self {
            log_level: if verbose {
                tracing::Level::INFO
            } else {
                tracing::Level::WARN
            },
            log_dir,
        }
    }
}

/// Initialize logging and the panic handler.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(config: &LogConfig) -> Vec<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let mut guards = Vec::new();

    // Command output goes to stdout, so logs go to stderr
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(stderr_guard);

    let stderr_env_filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(stderr_env_filter);

    if let Some(log_dir) = &config.log_dir {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, "dfs.log");
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        let file_env_filter = EnvFilter::builder()
            .with_default_directive(config.log_level.into())
            .from_env_lossy();

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(file_env_filter);

        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(stderr_layer).init();
    }

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}
