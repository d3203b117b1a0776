use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::models::{LoggingConfig, ServerConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if let Err(e) = Self::validate_logging(&config.logging) {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(&errors),
            }),
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// The level must parse as an `EnvFilter` directive
    fn validate_logging(logging: &LoggingConfig) -> ValidationResult<()> {
        if logging.level.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "logging.level".to_string(),
                message: "Log level cannot be empty".to_string(),
            });
        }
        EnvFilter::try_new(&logging.level).map_err(|e| ValidationError::InvalidField {
            field: "logging.level".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: &[ValidationError]) -> String {
        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_defaults() {
        assert!(ServerConfigValidator::validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_listen_address() {
        let config = ServerConfig::builder().listen_addr("localhost").build();
        assert!(matches!(
            ServerConfigValidator::validate(&config),
            Err(ValidationError::InvalidListenAddress { .. })
        ));
    }

    #[test]
    fn validate_rejects_empty_log_level() {
        let config = ServerConfig::builder().log_level(" ").build();
        assert!(matches!(
            ServerConfigValidator::validate(&config),
            Err(ValidationError::InvalidField { .. })
        ));
    }

    #[test]
    fn validate_collects_multiple_errors() {
        let config = ServerConfig::builder()
            .listen_addr("nowhere")
            .log_level("")
            .build();
        let err = ServerConfigValidator::validate(&config).unwrap_err();
        let ValidationError::ValidationFailed { message } = err else {
            panic!("expected aggregated error, got {err:?}");
        };
        assert!(message.starts_with("Found 2 validation errors"));
    }
}
