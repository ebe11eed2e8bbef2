//! Error types for calc-dispatch.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Expression validation and evaluation errors.
///
/// `Empty` and `InvalidCharacter` are input validation failures; the rest
/// surface while converting or evaluating a well-formed character stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("Expression is empty")]
    Empty,

    #[error("Invalid character: '{0}'")]
    InvalidCharacter(char),

    #[error("Mismatched parentheses")]
    MismatchedParentheses,

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid expression")]
    InvalidExpression,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result out of range")]
    Overflow,

    #[error("Unknown operation: {0}")]
    UnknownOperator(String),
}

impl EvalError {
    /// Whether this is an input validation failure rather than an evaluation one.
    pub fn is_validation(&self) -> bool {
        matches!(self, EvalError::Empty | EvalError::InvalidCharacter(_))
    }
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Failed to generate token: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Worker ↔ server transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid orchestrator address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("RPC failed: {0}")]
    Rpc(#[from] tonic::Status),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_class() {
        assert!(EvalError::Empty.is_validation());
        assert!(EvalError::InvalidCharacter('x').is_validation());
        assert!(!EvalError::DivisionByZero.is_validation());
        assert!(!EvalError::MismatchedParentheses.is_validation());
        assert!(!EvalError::Overflow.is_validation());
    }
}
