use thiserror::Error;

/// Lead routing engine errors
#[derive(Error, Debug)]
pub enum LeadError {
    /// Malformed or missing input, rejected before any state change
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lifecycle transition that the state machine does not allow
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Unknown enquiry, rule or handler reference
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic version check failed on write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Audit append failed; the enclosing transition must be abandoned
    #[error("Audit error: {0}")]
    Audit(String),

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LeadError {
    /// Create a new Validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new InvalidTransition error
    pub fn invalid_transition<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new Audit error
    pub fn audit<S: Into<String>>(msg: S) -> Self {
        Self::Audit(msg.into())
    }

    /// Create a new Notification error
    pub fn notification<S: Into<String>>(msg: S) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from a store or delivery channel rather than
    /// from the caller's input.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::Audit(_)
                | Self::Notification(_)
                | Self::Internal(_)
        )
    }
}

/// Result type for lead routing operations
pub type Result<T> = std::result::Result<T, LeadError>;
