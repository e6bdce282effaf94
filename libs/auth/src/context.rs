//! Authenticated identity and capability checks

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::AuthError;

/// Capability tokens understood by the platform.
pub mod permissions {
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CANCEL: &str = "orders:cancel";
    pub const ORDERS_READ_ALL: &str = "orders:read_all";
    pub const POSITIONS_READ: &str = "positions:read";
    pub const POSITIONS_READ_ALL: &str = "positions:read_all";
    pub const MARKET_READ: &str = "market:read";
    pub const MARKET_SUBSCRIBE: &str = "market:subscribe";
    pub const STRATEGIES_READ: &str = "strategies:read";
    pub const STRATEGIES_CREATE: &str = "strategies:create";
    pub const STRATEGIES_EXECUTE: &str = "strategies:execute";
    pub const ACCOUNTS_READ_ALL: &str = "accounts:read_all";

    /// Wildcard capability that satisfies every check.
    pub const ADMIN_FULL: &str = "admin:full";
}

/// Identity plus capability bundle attached to every protected operation.
///
/// Constructed once per validated token or inbound message, never persisted,
/// discarded at end of request. The permission set is never mutated after
/// construction.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub username: String,
    pub role: String,
    pub permissions: HashSet<String>,
    /// Unique id of the credential that produced this context, used for
    /// revocation checks. Empty for contexts rebuilt from bus envelopes.
    pub token_jti: String,
}

impl AuthContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission) || self.permissions.contains(permissions::ADMIN_FULL)
    }

    pub fn can_access_account(&self, target: &Uuid) -> bool {
        &self.account_id == target
            || self.has_permission(permissions::ADMIN_FULL)
            || self.has_permission(permissions::ACCOUNTS_READ_ALL)
    }

    /// Guard for protected operations: succeeds if the context holds any of
    /// the required capabilities, fails with `Forbidden` otherwise. Call this
    /// before performing any side effect of the operation.
    pub fn require_any(&self, required: &[&str]) -> Result<(), AuthError> {
        if required.iter().any(|p| self.has_permission(p)) {
            return Ok(());
        }
        Err(AuthError::Forbidden(required.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(perms: &[&str]) -> AuthContext {
        AuthContext {
            account_id: Uuid::new_v4(),
            username: "trader".into(),
            role: "trader".into(),
            permissions: perms.iter().map(|p| p.to_string()).collect(),
            token_jti: "jti-1".into(),
        }
    }

    #[test]
    fn direct_permission_grants_access() {
        let ctx = context_with(&[permissions::ORDERS_CREATE]);
        assert!(ctx.has_permission(permissions::ORDERS_CREATE));
        assert!(!ctx.has_permission(permissions::ORDERS_CANCEL));
    }

    #[test]
    fn admin_full_satisfies_every_check() {
        let ctx = context_with(&[permissions::ADMIN_FULL]);
        assert!(ctx.has_permission(permissions::ORDERS_CREATE));
        assert!(ctx.has_permission(permissions::STRATEGIES_EXECUTE));
        assert!(ctx.can_access_account(&Uuid::new_v4()));
    }

    #[test]
    fn own_account_is_always_accessible() {
        let ctx = context_with(&[]);
        let own = ctx.account_id;
        assert!(ctx.can_access_account(&own));
        assert!(!ctx.can_access_account(&Uuid::new_v4()));
    }

    #[test]
    fn read_all_grants_cross_account_access() {
        let ctx = context_with(&[permissions::ACCOUNTS_READ_ALL]);
        assert!(ctx.can_access_account(&Uuid::new_v4()));
    }

    #[test]
    fn require_any_accepts_one_of_several() {
        let ctx = context_with(&[permissions::STRATEGIES_READ]);
        assert!(ctx
            .require_any(&[permissions::STRATEGIES_EXECUTE, permissions::STRATEGIES_READ])
            .is_ok());
    }

    #[test]
    fn require_any_rejects_with_forbidden() {
        let ctx = context_with(&[permissions::MARKET_READ]);
        let err = ctx
            .require_any(&[permissions::STRATEGIES_EXECUTE])
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }
}
