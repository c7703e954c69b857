use std::fmt;

/// A rejected configuration value.
///
/// Setters that return this error leave the previous value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Name of the offending setting, e.g. `"interval_ms"`.
    pub field: &'static str,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, msg: impl Into<String>) -> Self {
        Self { field, message: msg.into() }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration for `{}`: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Requires a finite, strictly positive value.
pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::new(field, format!("expected a positive number, got {value}")))
    }
}

/// Requires a finite value within `[min, max]`.
pub(crate) fn in_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(ConfigError::new(field, format!("expected a value in {min}..={max}, got {value}")))
    }
}
