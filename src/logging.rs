use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const DEFAULT_DIRECTIVES: &str = "cardspawn=debug,sqlx=warn";

/// Initialize logging with a console layer and, when `config.dir` is set and
/// writable, a daily rotating file.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{}", config.level, DEFAULT_DIRECTIVES)));

    let log_dir = config.dir.as_deref().filter(|dir| writable_log_dir(dir));
    let file_layer = log_dir.map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, "cardspawn.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Keep the guard alive for the life of the process
        Box::leak(Box::new(guard));

        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
    });

    // Console layer, plain or JSON
    let plain_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });
    let json_layer = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(plain_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init();

    if installed.is_ok() {
        if let Some(dir) = log_dir {
            tracing::info!("File logging enabled: {}/cardspawn.log.*", dir.display());
        }
    }
}

/// Minimal logging for one-shot CLI commands
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

/// `rolling::daily` panics if it cannot create the first file, so check first
fn writable_log_dir(dir: &Path) -> bool {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "Warning: Could not create log directory {} ({}), file logging disabled",
            dir.display(),
            e
        );
        return false;
    }

    let marker = dir.join(".cardspawn_write_test");
    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            false
        }
    }
}
