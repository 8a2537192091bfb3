//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref PROPERTY_NAME: Regex =
        Regex::new("^[A-Za-z][A-Za-z0-9]*$").expect("property name pattern is valid");
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate that every required property is a plausible property name.
pub fn validate_property_names(names: &[String]) -> Result<(), ValidationError> {
    if names.iter().all(|name| PROPERTY_NAME.is_match(name)) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_property_name"))
    }
}

/// Validate log level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_names() {
        let ok = vec!["IsMobile".to_string(), "ScreenPixelsWidth".to_string()];
        assert!(validate_property_names(&ok).is_ok());
        assert!(validate_property_names(&[]).is_ok());
        assert!(validate_property_names(&["Is Mobile".to_string()]).is_err());
        assert!(validate_property_names(&["9Lives".to_string()]).is_err());
        assert!(validate_property_names(&[String::new()]).is_err());
    }

    #[test]
    fn log_levels() {
        assert!(validate_log_level("INFO").is_ok());
        assert!(validate_log_level("warn").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
