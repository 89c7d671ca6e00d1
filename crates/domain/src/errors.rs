use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found")]
    NotFound,

    #[error("duplicate entry: {0}")]
    Duplicate(String),

    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Error taxonomy surfaced by the session, password-reset, and invitation services.
///
/// Kinds map 1:1 onto the operations in `application::services`; callers switch on the
/// variant, never on the wrapped message.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password too weak: {0}")]
    PasswordTooWeak(String),
    #[error("password confirmation does not match")]
    PasswordMismatch,
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("account not found")]
    AccountNotFound,
    #[error("account is inactive")]
    AccountInactive,
    #[error("email already exists")]
    EmailAlreadyExists,
    #[error("username already exists")]
    UsernameAlreadyExists,
    #[error("role not found")]
    RoleNotFound,
    #[error("permission not found")]
    PermissionNotFound,
    #[error("parent account not found")]
    ParentAccountNotFound,

    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token not found")]
    TokenNotFound,

    #[error("invitation not found")]
    InvitationNotFound,
    #[error("invitation expired")]
    InvitationExpired,
    #[error("invitation already used")]
    InvitationUsed,
    #[error("first and last name are required")]
    InvitationNameRequired,

    #[error("rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimitExceeded {
        attempts: i32,
        retry_at: chrono::DateTime<chrono::Utc>,
        retry_after_seconds: i64,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AuthError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AuthError::AccountNotFound,
            RepositoryError::Duplicate(msg) => AuthError::Internal(format!("duplicate: {msg}")),
            RepositoryError::Database(msg) => AuthError::Internal(msg),
            RepositoryError::Transaction(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Internal(e.to_string())
    }
}

#[derive(Error, Debug, Clone)]
pub enum EmailError {
    #[error("template render failed: {0}")]
    Render(String),
    #[error("transport error: {0}")]
    Transport(String),
}
