//! Authorization error taxonomy and boundary codes

use thiserror::Error;

/// Authentication and authorization failures.
///
/// Every variant terminates the request it occurred in; none of these are
/// retryable. `code()` gives the structured code surfaced in bus replies.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token revoked")]
    TokenRevoked,

    #[error("account not found")]
    AccountNotFound,

    #[error("account disabled")]
    AccountDisabled,

    #[error("account locked")]
    AccountLocked,

    #[error("missing permission: {0}")]
    Forbidden(String),

    #[error("revocation store error: {0}")]
    Store(String),

    #[error("account lookup error: {0}")]
    Lookup(String),
}

impl AuthError {
    /// Structured code reported at the message-bus boundary.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            AuthError::AccountDisabled => "ACCOUNT_DISABLED",
            AuthError::AccountLocked => "ACCOUNT_LOCKED",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::Store(_) | AuthError::Lookup(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_codes_match_contract() {
        assert_eq!(AuthError::TokenExpired.code(), "TOKEN_EXPIRED");
        assert_eq!(AuthError::InvalidToken("x".into()).code(), "INVALID_TOKEN");
        assert_eq!(AuthError::TokenRevoked.code(), "TOKEN_REVOKED");
        assert_eq!(AuthError::AccountNotFound.code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(AuthError::AccountDisabled.code(), "ACCOUNT_DISABLED");
        assert_eq!(AuthError::AccountLocked.code(), "ACCOUNT_LOCKED");
        assert_eq!(AuthError::Forbidden("p".into()).code(), "FORBIDDEN");
    }
}
