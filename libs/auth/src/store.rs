//! External collaborators: revocation store and account lookup
//!
//! Both are specified at their interface only; production deployments back
//! them with a shared cache and the account database. The in-memory
//! implementations here serve process-local wiring and tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AuthError;

/// Revocation entries live exactly as long as the maximum token validity
/// window, so an entry always outlives every token it could apply to.
pub const REVOCATION_TTL: Duration = Duration::from_secs(86_400);

/// Store keying convention shared with the rest of the platform.
fn blacklist_key(jti: &str) -> String {
    format!("token_blacklist:{jti}")
}

/// Presence-only store of revoked credential identifiers.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark a credential id revoked for [`REVOCATION_TTL`]. Idempotent.
    async fn revoke(&self, jti: &str) -> Result<(), AuthError>;

    /// Whether an active revocation entry exists for this credential id.
    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError>;
}

/// In-memory revocation store with per-entry expiry.
#[derive(Debug)]
pub struct InMemoryRevocationStore {
    entries: DashMap<String, Instant>,
    ttl: Duration,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::with_ttl(REVOCATION_TTL)
    }

    /// Shortened TTL for tests exercising expiry.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl Default for InMemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, jti: &str) -> Result<(), AuthError> {
        self.entries
            .insert(blacklist_key(jti), Instant::now() + self.ttl);
        tracing::info!(jti, "credential revoked");
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let key = blacklist_key(jti);
        let expired = match self.entries.get(&key) {
            Some(expires_at) if *expires_at > Instant::now() => return Ok(true),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(&key);
        }
        Ok(false)
    }
}

/// Account state relevant to authorization decisions.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: Uuid,
    pub is_active: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Resolves the account referenced by a token's subject claim.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn find(&self, account_id: Uuid) -> Result<Option<AccountRecord>, AuthError>;
}

/// In-memory account lookup for wiring and tests.
#[derive(Debug, Default)]
pub struct InMemoryAccountLookup {
    accounts: DashMap<Uuid, AccountRecord>,
}

impl InMemoryAccountLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: AccountRecord) {
        self.accounts.insert(record.id, record);
    }
}

#[async_trait]
impl AccountLookup for InMemoryAccountLookup {
    async fn find(&self, account_id: Uuid) -> Result<Option<AccountRecord>, AuthError> {
        Ok(self.accounts.get(&account_id).map(|r| r.clone()))
    }
}
