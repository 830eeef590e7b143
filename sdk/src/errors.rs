//! Error types and handling
//!
//! This module provides the error taxonomy used throughout the TiaBridge
//! engine. All errors implement the `BridgeErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Propagation policy
//!
//! - Configuration errors (malformed registry entry, bad config file) are
//!   fatal at startup: the process refuses to serve requests.
//! - Planning failures abort the whole request; nothing is executed.
//! - Step errors are contained to one plan step and recorded in the result
//!   bundle; they never escape `execute`.
//!
//! All error messages are safe to display to end users: no API keys, no
//! internal paths.

use thiserror::Error;

/// Trait for TiaBridge error extensions
///
/// Provides additional context for errors, including user-friendly hints
/// and recoverability information. All engine errors implement this trait.
pub trait BridgeErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// secrets, file paths, or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require fixing the configuration and restarting.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid config file or malformed operation catalog
/// - **Planning**: the LLM produced an invalid or unusable plan
/// - **LLM Provider**: API failures, authentication errors
/// - **Network**: transport failures talking to a backend
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors — fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed operation catalog: {0}")]
    Catalog(String),

    // Planning errors — abort the request, nothing executed
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Plan validation failed: {0}")]
    PlanInvalid(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("All LLM providers exhausted")]
    AllProvidersExhausted,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    // Registry lookup errors
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            EngineError::Config(_) => {
                "Check the configuration file at ~/.tiabridge/config.toml for syntax errors."
            }
            EngineError::Catalog(_) => {
                "The operation catalog is malformed. This is a build problem, not a usage problem."
            }
            EngineError::Planning(_) | EngineError::PlanInvalid(_) => {
                "I could not understand the request. Try rephrasing the question."
            }
            EngineError::LlmProvider(_) => {
                "The language model provider returned an error. Check API keys and try again."
            }
            EngineError::AllProvidersExhausted => {
                "No language model provider is currently available. Try again later."
            }
            EngineError::Network(_) => {
                "A network request failed. The upstream API may be temporarily unreachable."
            }
            EngineError::Timeout => "The request took too long and was cancelled.",
            EngineError::UnknownOperation(_) => {
                "The requested operation does not exist in the catalog."
            }
            EngineError::Serialization(_) => "Received data in an unexpected format.",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Fatal: fix config and restart
            EngineError::Config(_) | EngineError::Catalog(_) => false,
            // Everything else is scoped to one request or one step
            EngineError::Planning(_)
            | EngineError::PlanInvalid(_)
            | EngineError::LlmProvider(_)
            | EngineError::AllProvidersExhausted
            | EngineError::Network(_)
            | EngineError::Timeout
            | EngineError::UnknownOperation(_)
            | EngineError::Serialization(_) => true,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        assert!(!EngineError::Config("bad toml".into()).is_recoverable());
        assert!(!EngineError::Catalog("duplicate name".into()).is_recoverable());
    }

    #[test]
    fn test_request_scoped_errors_are_recoverable() {
        assert!(EngineError::Planning("unknown op".into()).is_recoverable());
        assert!(EngineError::Network("connection refused".into()).is_recoverable());
        assert!(EngineError::Timeout.is_recoverable());
        assert!(EngineError::AllProvidersExhausted.is_recoverable());
    }

    #[test]
    fn test_user_hints_are_never_empty() {
        let errors = vec![
            EngineError::Config("x".into()),
            EngineError::Catalog("x".into()),
            EngineError::Planning("x".into()),
            EngineError::PlanInvalid("x".into()),
            EngineError::LlmProvider("x".into()),
            EngineError::AllProvidersExhausted,
            EngineError::Network("x".into()),
            EngineError::Timeout,
            EngineError::UnknownOperation("x".into()),
            EngineError::Serialization("x".into()),
        ];
        for err in errors {
            assert!(!err.user_hint().is_empty());
        }
    }

    #[test]
    fn test_display_includes_context() {
        let err = EngineError::UnknownOperation("get_blocks".into());
        assert!(err.to_string().contains("get_blocks"));
    }
}
