//! Engine errors.

use crate::config::ConfigError;

/// Errors surfaced by [`Engine`](crate::Engine).
///
/// Nothing inside the search itself fails: timeouts, stale table moves and
/// terminal positions all resolve to ordinary results.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request needs an idle engine but a search is running.
    #[error("a search is already in progress")]
    SearchInProgress,

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The search thread could not be started.
    #[error("failed to spawn search thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_convert() {
        let err: EngineError = ConfigError::Threads { threads: 0 }.into();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.to_string().contains("thread count 0"));
    }
}
