//! Token validation pipeline
//!
//! Order of checks is fixed: signature/expiry first, then revocation by
//! credential id, then account existence/status. A token that fails an
//! earlier check never reaches a later one.

use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::store::{AccountLookup, RevocationStore};

/// Verified token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id (subject).
    pub sub: String,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    /// Credential identifier, checked against the revocation store.
    pub jti: String,
}

/// HS256 token validator.
pub struct AuthService {
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    /// Verify signature and expiry only. Malformed tokens, wrong signatures
    /// and wrong algorithms all map to `InvalidToken`.
    pub fn validate_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Full validation: signature/expiry, revocation, account status.
    pub async fn validate_token(
        &self,
        token: &str,
        revocations: &dyn RevocationStore,
        accounts: &dyn AccountLookup,
    ) -> Result<AuthContext, AuthError> {
        let claims = self.validate_claims(token)?;

        if revocations.is_revoked(&claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }

        let account_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("subject is not a valid account id".into()))?;

        let account = accounts
            .find(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !account.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if let Some(locked_until) = account.locked_until {
            if locked_until > Utc::now() {
                return Err(AuthError::AccountLocked);
            }
        }

        Ok(AuthContext {
            account_id,
            username: claims.username,
            role: claims.role,
            permissions: claims.permissions.into_iter().collect(),
            token_jti: claims.jti,
        })
    }

    /// Revoke a credential id (logout or explicit revocation). Idempotent;
    /// the entry expires after the maximum token validity window.
    pub async fn revoke_token(
        &self,
        jti: &str,
        revocations: &dyn RevocationStore,
    ) -> Result<(), AuthError> {
        revocations.revoke(jti).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountRecord, InMemoryAccountLookup, InMemoryRevocationStore};
    use chrono::Duration as ChronoDuration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-used-only-in-unit-tests";

    fn mint_token(sub: &str, jti: &str, expires_in_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            username: "trader".into(),
            role: "trader".into(),
            permissions: vec!["strategies:execute".into()],
            exp: now + expires_in_secs,
            iat: now,
            jti: jti.to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn active_account(id: Uuid) -> AccountRecord {
        AccountRecord {
            id,
            is_active: true,
            locked_until: None,
        }
    }

    #[tokio::test]
    async fn valid_token_yields_context() {
        let service = AuthService::new(SECRET);
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();
        let id = Uuid::new_v4();
        accounts.insert(active_account(id));

        let token = mint_token(&id.to_string(), "jti-1", 900);
        let ctx = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap();

        assert_eq!(ctx.account_id, id);
        assert_eq!(ctx.token_jti, "jti-1");
        assert!(ctx.has_permission("strategies:execute"));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let service = AuthService::new(SECRET);
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();

        // Past the default decoder leeway
        let token = mint_token(&Uuid::new_v4().to_string(), "jti-1", -3600);
        let err = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn wrong_signature_is_invalid() {
        let service = AuthService::new("a-different-secret-entirely-here");
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();

        let token = mint_token(&Uuid::new_v4().to_string(), "jti-1", 900);
        let err = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let service = AuthService::new(SECRET);
        let err = service.validate_claims("not.a.token").unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn revoked_token_fails_even_with_valid_signature() {
        let service = AuthService::new(SECRET);
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();
        let id = Uuid::new_v4();
        accounts.insert(active_account(id));

        service.revoke_token("jti-1", &revocations).await.unwrap();

        let token = mint_token(&id.to_string(), "jti-1", 900);
        let err = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "TOKEN_REVOKED");
    }

    #[tokio::test]
    async fn unknown_account_is_rejected() {
        let service = AuthService::new(SECRET);
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();

        let token = mint_token(&Uuid::new_v4().to_string(), "jti-1", 900);
        let err = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");
    }

    #[tokio::test]
    async fn disabled_account_is_rejected() {
        let service = AuthService::new(SECRET);
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();
        let id = Uuid::new_v4();
        accounts.insert(AccountRecord {
            id,
            is_active: false,
            locked_until: None,
        });

        let token = mint_token(&id.to_string(), "jti-1", 900);
        let err = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "ACCOUNT_DISABLED");
    }

    #[tokio::test]
    async fn locked_account_is_rejected_until_lock_expires() {
        let service = AuthService::new(SECRET);
        let revocations = InMemoryRevocationStore::new();
        let accounts = InMemoryAccountLookup::new();
        let id = Uuid::new_v4();
        accounts.insert(AccountRecord {
            id,
            is_active: true,
            locked_until: Some(Utc::now() + ChronoDuration::hours(1)),
        });

        let token = mint_token(&id.to_string(), "jti-1", 900);
        let err = service
            .validate_token(&token, &revocations, &accounts)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ACCOUNT_LOCKED");

        // A lock in the past no longer blocks validation
        accounts.insert(AccountRecord {
            id,
            is_active: true,
            locked_until: Some(Utc::now() - ChronoDuration::hours(1)),
        });
        assert!(service
            .validate_token(&token, &revocations, &accounts)
            .await
            .is_ok());
    }
}
