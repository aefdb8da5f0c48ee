//! Configuration for write validation.

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Configuration validation error.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

const DEFAULT_MAX_FIELD_NAME_BYTES: usize = 64;
const DEFAULT_MAX_FIELD_VALUE_BYTES: usize = 1024 * 1024;

/// Byte-length limits applied to entry fields on every mutating operation.
///
/// The defaults are far above anything a well-formed contract writes; the
/// limits exist to bound row growth, not to shape the schema.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum UTF-8 byte length of a field name.
    #[serde(default = "default_max_field_name_bytes")]
    #[builder(default = DEFAULT_MAX_FIELD_NAME_BYTES)]
    pub max_field_name_bytes: usize,
    /// Maximum UTF-8 byte length of a field value.
    #[serde(default = "default_max_field_value_bytes")]
    #[builder(default = DEFAULT_MAX_FIELD_VALUE_BYTES)]
    pub max_field_value_bytes: usize,
}

fn default_max_field_name_bytes() -> usize {
    DEFAULT_MAX_FIELD_NAME_BYTES
}

fn default_max_field_value_bytes() -> usize {
    DEFAULT_MAX_FIELD_VALUE_BYTES
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_field_name_bytes: DEFAULT_MAX_FIELD_NAME_BYTES,
            max_field_value_bytes: DEFAULT_MAX_FIELD_VALUE_BYTES,
        }
    }
}

impl ValidationConfig {
    /// Checks cross-field constraints after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if either limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_field_name_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "max_field_name_bytes must be nonzero".to_string(),
            });
        }
        if self.max_field_value_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "max_field_value_bytes must be nonzero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ValidationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_field_name_bytes, 64);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = ValidationConfig::builder().max_field_name_bytes(0).build();
        assert!(config.validate().is_err());
    }
}
