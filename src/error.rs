//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Player not found in queue: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Storage failure: {message}")]
    StorageFailure { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Shorthand for rejecting a malformed request
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Shorthand for a store that could not serve a request
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailure {
            message: message.into(),
        }
    }
}

/// Look through an `anyhow::Error` for the typed matchmaking error, if any
pub fn classify(error: &anyhow::Error) -> Option<&MatchmakingError> {
    error.downcast_ref::<MatchmakingError>()
}

/// Whether the error was caused by bad caller input rather than the service
pub fn is_invalid_input(error: &anyhow::Error) -> bool {
    matches!(classify(error), Some(MatchmakingError::InvalidInput { .. }))
}
