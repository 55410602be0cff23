use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Failures while standing up the tracing stack.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("subscriber failed to install: {0}")]
    Install(Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global fmt subscriber. A `RUST_LOG` directive wins when one
/// is set; otherwise the configured level seeds the filter. Emits a single
/// startup event naming the active directive so operators can tell which
/// source took effect.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let (env_filter, directive) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, "RUST_LOG".to_string()),
        Err(_) => {
            let filter =
                EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::Filter {
                    value: config.log_level.clone(),
                    source,
                })?;
            (filter, config.log_level.clone())
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)?;

    tracing::info!(%directive, "telemetry online");
    Ok(())
}
