use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that turns on debug logging.
pub const DEBUG_ENV: &str = "TASKMON_DEBUG";

/// Initialise logging to stderr and, when `log_dir` is given, to a daily
/// rolling `taskmon.log` there.
///
/// The default level is `info`, or `debug` when `debug` is set; `RUST_LOG`
/// overrides either. Keep the returned guard alive for the process lifetime
/// or buffered file output is lost.
pub fn init(debug: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "taskmon.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    guard
}

/// Whether [`DEBUG_ENV`] asks for debug output.
pub fn debug_requested() -> bool {
    std::env::var_os(DEBUG_ENV).is_some_and(|v| !v.is_empty() && v != "0")
}
