//! Engine configuration.
//!
//! All settings have defaults matching the production thresholds, so an
//! empty TOML document is a valid config.
//!
//! # Example
//!
//! ```toml
//! batch_size = 500
//! staleness_days = 14
//! max_attempts = 3
//! retry_delay_ms = 1000
//! fallback_concurrency = 10
//! default_department = "Unassigned"
//! ```

use std::num::{NonZeroU32, NonZeroUsize};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::RetryPolicy;
use crate::derive::DeriveSettings;
use crate::error::ConfigError;

/// Upper bound on `staleness_days`, roughly a century.
pub const MAX_STALENESS_DAYS: i64 = 36_500;

/// Tunables for the bulk-mutation path and the derivation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Requests per atomic batch. Clamped to the store's own ceiling.
    pub batch_size: usize,
    /// Minimum age, in days, of a sale that counts as the last transaction.
    pub staleness_days: i64,
    /// Attempts per record on the fallback path, including the first.
    pub max_attempts: u32,
    /// Fixed delay between fallback attempts.
    pub retry_delay_ms: u64,
    /// Concurrent single-record updates on the fallback path.
    pub fallback_concurrency: usize,
    /// Department shown for customers that have none.
    pub default_department: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: salesdesk_store::BATCH_CEILING,
            staleness_days: 14,
            max_attempts: 3,
            retry_delay_ms: 1000,
            fallback_concurrency: 10,
            default_department: "Unassigned".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject settings that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Zero { field: "batch_size" });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_attempts",
            });
        }
        if self.fallback_concurrency == 0 {
            return Err(ConfigError::Zero {
                field: "fallback_concurrency",
            });
        }
        if !(0..=MAX_STALENESS_DAYS).contains(&self.staleness_days) {
            return Err(ConfigError::StalenessOutOfRange {
                days: self.staleness_days,
                max: MAX_STALENESS_DAYS,
            });
        }
        Ok(())
    }

    /// Chunk size to use against a store with the given ceiling.
    pub(crate) fn chunk_size(&self, store_ceiling: usize) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.batch_size.min(store_ceiling)).ok_or(ConfigError::Zero {
            field: "batch_size",
        })
    }

    /// Retry budget for the fallback path. Fails on a zero attempt count
    /// or concurrency.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy {
            max_attempts: NonZeroU32::new(self.max_attempts).ok_or(ConfigError::Zero {
                field: "max_attempts",
            })?,
            delay: Duration::from_millis(self.retry_delay_ms),
            concurrency: NonZeroUsize::new(self.fallback_concurrency).ok_or(
                ConfigError::Zero {
                    field: "fallback_concurrency",
                },
            )?,
        })
    }

    /// Derivation thresholds. `staleness_days` is clamped to
    /// `0..=MAX_STALENESS_DAYS`; call [`validate`](Self::validate) to reject
    /// out-of-range values instead.
    pub fn derive_settings(&self) -> DeriveSettings {
        DeriveSettings {
            staleness: time::Duration::days(self.staleness_days.clamp(0, MAX_STALENESS_DAYS)),
            default_department: self.default_department.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.staleness_days, 14);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            batch_size = 100
            default_department = "General"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.default_department, "General");
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = EngineConfig::from_toml_str("batch_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Zero { field: "batch_size" }));
    }

    #[test]
    fn staleness_must_stay_within_a_century() {
        let err = EngineConfig::from_toml_str("staleness_days = 9223372036854775807").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::StalenessOutOfRange {
                days: i64::MAX,
                max: MAX_STALENESS_DAYS
            }
        ));
        let err = EngineConfig::from_toml_str("staleness_days = -1").unwrap_err();
        assert!(matches!(err, ConfigError::StalenessOutOfRange { days: -1, .. }));

        let config = EngineConfig::from_toml_str("staleness_days = 36500").unwrap();
        assert_eq!(config.derive_settings().staleness, time::Duration::days(36_500));
    }

    #[test]
    fn derive_settings_never_overflows() {
        let config = EngineConfig {
            staleness_days: i64::MAX,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.derive_settings().staleness,
            time::Duration::days(MAX_STALENESS_DAYS)
        );
    }

    #[test]
    fn retry_policy_refuses_zero_budgets() {
        let config = EngineConfig {
            max_attempts: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.retry_policy(),
            Err(ConfigError::Zero {
                field: "max_attempts"
            })
        ));

        let config = EngineConfig {
            fallback_concurrency: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.retry_policy(),
            Err(ConfigError::Zero {
                field: "fallback_concurrency"
            })
        ));

        let policy = EngineConfig::default().retry_policy().unwrap();
        assert_eq!(policy.max_attempts.get(), 3);
        assert_eq!(policy.concurrency.get(), 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml_str("batch_sise = 10").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn chunk_size_is_clamped_to_store_ceiling() {
        let config = EngineConfig {
            batch_size: 500,
            ..EngineConfig::default()
        };
        assert_eq!(config.chunk_size(3).unwrap().get(), 3);
        assert_eq!(config.chunk_size(1000).unwrap().get(), 500);
        assert!(config.chunk_size(0).is_err());
    }
}
