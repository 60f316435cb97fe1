//! Error handling for Ambiente
//!
//! Engine operations never fail; errors only surface from configuration
//! loading, domain/layer parsing and audio context acquisition.

use thiserror::Error;

/// Result type alias for Ambiente operations
pub type Result<T> = std::result::Result<T, AmbienteError>;

/// Main error type for Ambiente operations
#[derive(Error, Debug)]
pub enum AmbienteError {
    // Platform Errors
    #[error("Audio context unavailable: {reason}")]
    ContextUnavailable { reason: String },

    // Configuration Errors
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    // Routing Errors
    #[error("Unknown domain: {tag}")]
    UnknownDomain { tag: String },

    #[error("Unknown layer '{key}' for engine {engine}")]
    UnknownLayer { engine: String, key: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AmbienteError {
    /// Shorthand for an [`AmbienteError::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AmbienteError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AmbienteError::ContextUnavailable { .. } => "CONTEXT_UNAVAILABLE",
            AmbienteError::InvalidConfig { .. } => "INVALID_CONFIG",
            AmbienteError::UnknownDomain { .. } => "UNKNOWN_DOMAIN",
            AmbienteError::UnknownLayer { .. } => "UNKNOWN_LAYER",
            AmbienteError::Io(_) => "IO_ERROR",
            AmbienteError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// A missing audio context degrades the engine to a silent no-op, so it
    /// counts as recoverable; bad input has to be fixed by the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AmbienteError::ContextUnavailable { .. })
    }

    /// Get a short recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            AmbienteError::ContextUnavailable { .. } => {
                "Audio stays silent; check the output device and sample rate"
            }
            AmbienteError::InvalidConfig { .. } => {
                "Fix the named field or remove it to fall back to the default"
            }
            AmbienteError::UnknownDomain { .. } => {
                "Use one of: home, geometry, medicine, tantra, relationship, marketing, tarot"
            }
            AmbienteError::UnknownLayer { .. } => {
                "Run 'ambiente-cli domains' to list the layers of each engine"
            }
            AmbienteError::Io(_) => "Check the file path and permissions",
            AmbienteError::Serialization(_) => "Check the JSON syntax of the configuration file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AmbienteError::UnknownDomain {
            tag: "opera".to_string(),
        };
        assert_eq!(err.error_code(), "UNKNOWN_DOMAIN");
        assert_eq!(err.to_string(), "Unknown domain: opera");
    }

    #[test]
    fn test_invalid_config_message() {
        let err = AmbienteError::invalid_config("sample_rate", "must be at least 8000 Hz");
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("sample_rate"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_context_unavailable_is_recoverable() {
        let err = AmbienteError::ContextUnavailable {
            reason: "no device".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(!err.recovery_hint().is_empty());
    }

    #[test]
    fn test_serialization_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AmbienteError = json_err.into();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }
}
