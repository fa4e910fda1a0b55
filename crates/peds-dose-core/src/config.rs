//! Wizard configuration.
//!
//! Loaded from JSON; every key is optional and falls back to the defaults
//! below. Values are checked by [`WizardConfig::validate`] after loading.

use std::path::Path;

use peds_dose_api::{ApiConfig, FrequencyCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for the dose wizard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardConfig {
    /// The months field is shown while `ageYears` is below this value
    pub months_field_threshold_years: f64,
    /// Upper bound accepted for `ageYears`
    pub max_age_years: f64,
    /// Upper bound accepted for weight in kg
    pub max_weight_kg: f64,
    /// Offered when the drug detail call fails or lists no frequencies
    pub fallback_frequencies: Vec<FrequencyCode>,
    /// Calculation service location
    pub api: ApiConfig,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            months_field_threshold_years: 3.0,
            max_age_years: 18.0,
            max_weight_kg: 150.0,
            fallback_frequencies: ["q4h", "q6h", "q8h", "q12h", "q24h"]
                .into_iter()
                .map(FrequencyCode::new)
                .collect(),
            api: ApiConfig::default(),
        }
    }
}

impl WizardConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        fn positive(field: &'static str, value: f64) -> ConfigResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a positive number, got {}", value),
                })
            }
        }

        positive("monthsFieldThresholdYears", self.months_field_threshold_years)?;
        positive("maxAgeYears", self.max_age_years)?;
        positive("maxWeightKg", self.max_weight_kg)?;

        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api.baseUrl",
                reason: "must not be empty".into(),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "api.timeoutSecs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
