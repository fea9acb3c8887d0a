//! Configuration management for the request-security core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{RampartError, Result};

/// Main configuration for the rampart primitives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RampartConfig {
    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// CSRF protection configuration
    #[serde(default)]
    pub csrf: CsrfConfig,
}

impl Default for RampartConfig {
    fn default() -> Self {
        Self {
            rate_limiting: RateLimitingConfig::default(),
            csrf: CsrfConfig::default(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Length of the counting window in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound on distinct tracked identifiers
    #[serde(default = "default_max_identifiers")]
    pub max_identifiers: usize,

    /// Background sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_identifiers: default_max_identifiers(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_max_identifiers() -> usize {
    10_000
}

fn default_sweep_interval() -> u64 {
    60
}

impl RateLimitingConfig {
    /// Get the counting window as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Get the background sweep period as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Check the startup-time invariants.
    ///
    /// A zero interval would expire every window immediately; a zero
    /// identifier capacity could never admit a counter. Both are programmer
    /// errors and should be caught before serving traffic.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(RampartError::InvalidConfiguration(
                "interval must be positive".to_string(),
            ));
        }
        if self.max_identifiers == 0 {
            return Err(RampartError::InvalidConfiguration(
                "max_identifiers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Number of random bytes per generated token
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_bytes: default_token_bytes(),
        }
    }
}

fn default_token_bytes() -> usize {
    32
}

impl CsrfConfig {
    /// Check the startup-time invariants.
    ///
    /// Tokens must carry at least 256 bits of entropy.
    pub fn validate(&self) -> Result<()> {
        if self.token_bytes < 32 {
            return Err(RampartError::InvalidConfiguration(
                "token_bytes must be at least 32 (256 bits of entropy)".to_string(),
            ));
        }
        Ok(())
    }
}

impl RampartConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RampartConfig =
            serde_yaml::from_str(&contents).map_err(|e| RampartError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.validate()?;
        self.csrf.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RampartConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limiting.interval(), Duration::from_secs(60));
        assert_eq!(config.rate_limiting.max_identifiers, 10_000);
        assert_eq!(config.csrf.token_bytes, 32);
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
rate_limiting:
  interval_ms: 1000
"#;
        let config: RampartConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.rate_limiting.interval_ms, 1000);
        assert_eq!(config.rate_limiting.max_identifiers, 10_000);
        assert_eq!(config.csrf.token_bytes, 32);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = RateLimitingConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RampartError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = RateLimitingConfig {
            max_identifiers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RampartError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_undersized_token_rejected() {
        let config = CsrfConfig { token_bytes: 16 };
        assert!(matches!(
            config.validate(),
            Err(RampartError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = RampartConfig::from_file("/nonexistent/rampart.yaml");
        assert!(matches!(result, Err(RampartError::Io(_))));
    }
}
