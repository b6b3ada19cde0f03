use crate::database::DatabaseError;
use crate::pricing::PricingError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to touch the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with current state (book already rented, duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Business logic errors
    #[error("Business logic error: {0}")]
    BusinessLogic(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Feature not configured on this deployment
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parsing errors
    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) | AppError::Serialization(_) | AppError::InvalidUuid(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::BusinessLogic(_) => 422,
            AppError::ExternalService(_) => 502,
            AppError::Unavailable(_) => 503,
            AppError::Config(_) | AppError::Database(_) | AppError::Sqlx(_) | AppError::Message(_) => 500,
        }
    }

    /// Message safe to return to API clients. Internal failures are not echoed.
    pub fn client_message(&self) -> String {
        match self.status_code() {
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Row changed under us (status already moved on, book already claimed)
    #[error("Stale state: {0}")]
    StaleState(String),

    /// Business rule violation (e.g., insufficient Brocks)
    #[error("Business rule violation: {0}")]
    BusinessRule(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(msg),
            RepositoryError::StaleState(msg) => AppError::Conflict(msg),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
            RepositoryError::BusinessRule(msg) => AppError::BusinessLogic(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        let (code, message) = match &err {
            SqlxError::RowNotFound => {
                return RepositoryError::NotFound("Record not found".to_string())
            }
            SqlxError::Database(db_err) => (
                db_err.code().map(|c| c.to_string()),
                db_err.message().to_string(),
            ),
            _ => return RepositoryError::Query(err),
        };

        match code.as_deref() {
            // Unique violation
            Some("23505") => RepositoryError::Duplicate(message),
            // Foreign key / check constraint violation
            Some("23503") | Some("23514") => RepositoryError::ConstraintViolation(message),
            _ => RepositoryError::Query(err),
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("book".into()).status_code(), 404);
        assert_eq!(AppError::Unauthorized("token".into()).status_code(), 401);
        assert_eq!(AppError::Forbidden("owner".into()).status_code(), 403);
        assert_eq!(AppError::Conflict("rented".into()).status_code(), 409);
        assert_eq!(AppError::BusinessLogic("brocks".into()).status_code(), 422);
        assert_eq!(AppError::Config("x".into()).status_code(), 500);
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = AppError::Message("connection refused at 10.0.0.3".into());
        assert_eq!(err.client_message(), "Internal server error");

        let err = AppError::Validation("title is required".into());
        assert!(err.client_message().contains("title is required"));
    }

    #[test]
    fn test_repository_error_mapping() {
        let app: AppError = RepositoryError::StaleState("rental already returned".into()).into();
        assert_eq!(app.status_code(), 409);

        let app: AppError = RepositoryError::BusinessRule("Insufficient Brocks".into()).into();
        assert_eq!(app.status_code(), 422);

        let app: AppError = RepositoryError::NotFound("user".into()).into();
        assert!(app.is_not_found());
    }
}
