/// Errors the engine raises to its caller.
///
/// Data-layer failures during a bulk update never show up here; they are
/// folded into the report. These variants mark caller or programmer defects.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid engine configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The aggregated report does not account for every request.
    #[error(
        "bulk report accounts for {accounted} of {requested} requests \
         ({succeeded} succeeded, {failed} failed)"
    )]
    ReportMismatch {
        requested: usize,
        accounted: usize,
        succeeded: usize,
        failed: usize,
    },
}

/// Errors raised while loading or validating an [`EngineConfig`].
///
/// [`EngineConfig`]: crate::EngineConfig
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse engine config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A numeric setting that must be positive was zero.
    #[error("config value '{field}' must be at least 1")]
    Zero { field: &'static str },

    #[error("config value 'staleness_days' must be between 0 and {max}, got {days}")]
    StalenessOutOfRange { days: i64, max: i64 },
}
