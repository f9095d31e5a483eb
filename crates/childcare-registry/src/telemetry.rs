use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Directives appended when the filter is built from `APP_LOG_LEVEL`, so
/// import and migration runs are not drowned in per-connection noise.
const DEPENDENCY_CAPS: &[&str] = &["hyper=warn", "mio=warn"];

#[derive(Debug)]
pub enum TelemetryError {
    Filter {
        directives: String,
        source: ParseError,
    },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directives, .. } => {
                write!(f, "invalid log filter '{directives}'")
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(registry_filter(config)?)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

/// An explicit `RUST_LOG` wins wholesale; otherwise the configured level
/// applies to the registry with the dependency caps appended.
fn registry_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = directives_for(&config.log_level);
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter { directives, source })
}

fn directives_for(level: &str) -> String {
    std::iter::once(level.trim())
        .chain(DEPENDENCY_CAPS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_gains_dependency_caps() {
        assert_eq!(directives_for("debug"), "debug,hyper=warn,mio=warn");
        assert_eq!(directives_for(" info "), "info,hyper=warn,mio=warn");
    }

    #[test]
    fn capped_directives_parse_as_a_filter() {
        assert!(EnvFilter::try_new(directives_for("info")).is_ok());
    }
}
