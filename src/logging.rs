/*!
 * Diagnostic logging for the pipeline stages
 *
 * Events go to stderr in compact form, or as JSON lines to a file when one
 * is configured. Every event carries the name of the stage thread that
 * emitted it.
 */

use std::fs::File;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::PipelineConfig;
use crate::error::{HeadcutError, Result};

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_logging(config: &PipelineConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("headcut={}", effective_level(config)))
            .map_err(|e| HeadcutError::Config(format!("Invalid log filter: {}", e)))?,
    };

    let json_layer = match config.log_file {
        Some(ref path) => {
            let file = File::create(path).map_err(|e| {
                HeadcutError::Config(format!(
                    "Failed to create log file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
        }
        None => None,
    };

    let stderr_layer = json_layer.is_none().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(true)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| HeadcutError::Config(format!("Logging already initialized: {}", e)))
}

fn effective_level(config: &PipelineConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Route stage events through the test harness output, once per binary
#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("headcut=debug"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init();
    });
}
