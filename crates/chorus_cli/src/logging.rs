use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CHORUS_CRATES: [&str; 3] = ["chorus_core", "chorus_discord", "chorus_cli"];

/// Default filter: chorus crates at `info` (or `debug`), everything else at
/// `warn`
pub fn default_filter(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    let mut directives: Vec<String> = CHORUS_CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect();
    directives.push("serenity=warn".to_string());
    directives.push("warn".to_string());
    directives.join(",")
}

/// Console output plus a daily log file under `log_dir`.
///
/// `RUST_LOG` wins over the default filter. Keep the returned guard alive
/// for as long as the file should be written.
pub fn init(debug: bool, log_dir: &Path) -> WorkerGuard {
    // Without a log directory the file layer is dropped silently
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "chorus.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if debug {
        EnvFilter::new(default_filter(true))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(false).into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            // Console output
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_timer(tracing_subscriber::fmt::time::LocalTime::rfc_3339())
                .compact(),
        )
        .with(
            // File output
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    guard
}
