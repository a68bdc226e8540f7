//! Error types for the personal assistant orchestrator

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Domain Errors
    // =============================

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    // =============================
    // Routing / Classification
    // =============================

    #[error("Routing error: {0}")]
    Routing(String),

    // =============================
    // Infrastructure
    // =============================

    #[error("Store error: {0}")]
    Store(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Mail provider error: {0}")]
    Provider(String),

    /// Raised by the mail provider when an access token is rejected.
    /// The session manager intercepts this to run the silent refresh path.
    #[error("Access token expired: {0}")]
    TokenExpired(String),

    #[error("Database error: {0}")]
    Database(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
