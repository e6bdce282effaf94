//! Authenticated message envelope and wire payloads
//!
//! Every outbound payload carrying identity is wrapped with a serialized
//! authorization context under the reserved `auth` field; the raw bearer
//! token never crosses the bus. Inbound handlers rebuild an [`AuthContext`]
//! from that field before invoking any protected operation. A message whose
//! `auth` field is absent or fails validation is an unauthenticated request
//! and is rejected before it reaches strategy logic.

use auth::{AuthContext, AuthError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::momentum::{Bar, Signal};

/// Serialized authorization context carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthPayload {
    pub account_id: String,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
}

impl AuthPayload {
    pub fn from_context(ctx: &AuthContext) -> Self {
        Self {
            account_id: ctx.account_id.to_string(),
            username: ctx.username.clone(),
            role: ctx.role.clone(),
            permissions: ctx.permissions.iter().cloned().collect(),
        }
    }

    /// Rebuild the context this payload was serialized from.
    ///
    /// The credential id is not carried across the bus, so the rebuilt
    /// context has an empty `token_jti`.
    pub fn into_context(self) -> Result<AuthContext, AuthError> {
        let account_id = Uuid::parse_str(&self.account_id)
            .map_err(|_| AuthError::InvalidToken("envelope account id is not a UUID".into()))?;

        Ok(AuthContext {
            account_id,
            username: self.username,
            role: self.role,
            permissions: self.permissions.into_iter().collect(),
            token_jti: String::new(),
        })
    }
}

/// Typed envelope: identity under the reserved `auth` field, payload fields
/// alongside it per the platform wire contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedMessage<T> {
    pub auth: AuthPayload,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> AuthenticatedMessage<T> {
    pub fn new(ctx: &AuthContext, payload: T) -> Self {
        Self {
            auth: AuthPayload::from_context(ctx),
            payload,
        }
    }
}

/// `strategy.signals.request` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRequest {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    pub symbol: String,
    #[serde(default)]
    pub current_position: Decimal,
}

fn default_strategy() -> String {
    "momentum".to_string()
}

/// `strategy.signals.request` reply payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResponse {
    pub success: bool,
    /// `null` whenever no signal was produced.
    #[serde(default)]
    pub signal: Option<Signal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl SignalResponse {
    pub fn ok(signal: Option<Signal>) -> Self {
        Self {
            success: true,
            signal,
            error: None,
            code: None,
        }
    }

    pub fn failure(error: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            signal: None,
            error: Some(error.into()),
            code: code.map(|c| c.to_string()),
        }
    }
}

/// `market.ticks` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickPayload {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub last_price: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

impl From<&TickPayload> for Bar {
    fn from(tick: &TickPayload) -> Self {
        Bar {
            symbol: tick.symbol.clone(),
            open: tick.open,
            high: tick.high,
            low: tick.low,
            close: tick.last_price,
            volume: tick.volume,
            timestamp: tick.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::permissions;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn context() -> AuthContext {
        AuthContext {
            account_id: Uuid::new_v4(),
            username: "trader".into(),
            role: "trader".into(),
            permissions: [permissions::STRATEGIES_EXECUTE.to_string()]
                .into_iter()
                .collect::<HashSet<_>>(),
            token_jti: "jti-1".into(),
        }
    }

    #[test]
    fn envelope_round_trips_identity_without_credential() {
        let ctx = context();
        let message = AuthenticatedMessage::new(
            &ctx,
            SignalRequest {
                strategy: "momentum".into(),
                symbol: "BTC-USD".into(),
                current_position: dec!(1.5),
            },
        );

        let bytes = serde_json::to_vec(&message).unwrap();
        let parsed: AuthenticatedMessage<SignalRequest> = serde_json::from_slice(&bytes).unwrap();

        let rebuilt = parsed.auth.into_context().unwrap();
        assert_eq!(rebuilt.account_id, ctx.account_id);
        assert!(rebuilt.has_permission(permissions::STRATEGIES_EXECUTE));
        // The credential id never crosses the bus
        assert!(rebuilt.token_jti.is_empty());
        assert_eq!(parsed.payload.symbol, "BTC-USD");
        assert_eq!(parsed.payload.current_position, dec!(1.5));
    }

    #[test]
    fn envelope_serializes_auth_as_reserved_field() {
        let message = AuthenticatedMessage::new(
            &context(),
            SignalRequest {
                strategy: "momentum".into(),
                symbol: "BTC-USD".into(),
                current_position: Decimal::ZERO,
            },
        );

        let value: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert!(value.get("auth").is_some());
        // Payload fields sit alongside auth, not nested under a wrapper
        assert_eq!(value.get("symbol").unwrap(), "BTC-USD");
    }

    #[test]
    fn missing_auth_field_fails_to_parse() {
        let raw = r#"{"strategy":"momentum","symbol":"BTC-USD","current_position":0}"#;
        let parsed: Result<AuthenticatedMessage<SignalRequest>, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn invalid_account_id_is_rejected_on_rebuild() {
        let payload = AuthPayload {
            account_id: "not-a-uuid".into(),
            username: "trader".into(),
            role: "trader".into(),
            permissions: vec![],
        };
        let err = payload.into_context().unwrap_err();
        assert_eq!(err.code(), "INVALID_TOKEN");
    }

    #[test]
    fn request_defaults_apply() {
        let raw = r#"{"auth":{"account_id":"00000000-0000-0000-0000-000000000000","username":"u","role":"r","permissions":[]},"symbol":"ETH-USD"}"#;
        let parsed: AuthenticatedMessage<SignalRequest> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.payload.strategy, "momentum");
        assert_eq!(parsed.payload.current_position, Decimal::ZERO);
    }

    #[test]
    fn success_reply_carries_null_signal_when_none() {
        let value = serde_json::to_value(SignalResponse::ok(None)).unwrap();
        assert_eq!(value.get("success").unwrap(), true);
        assert!(value.get("signal").unwrap().is_null());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn failure_reply_carries_error_and_code() {
        let value = serde_json::to_value(SignalResponse::failure(
            "missing permission: strategies:execute",
            Some("FORBIDDEN"),
        ))
        .unwrap();
        assert_eq!(value.get("success").unwrap(), false);
        assert_eq!(value.get("code").unwrap(), "FORBIDDEN");
    }

    #[test]
    fn tick_maps_last_price_to_close() {
        let tick = TickPayload {
            symbol: "BTC-USD".into(),
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            last_price: dec!(105),
            volume: dec!(3),
            timestamp: 42,
        };
        let bar = Bar::from(&tick);
        assert_eq!(bar.close, dec!(105));
        assert_eq!(bar.symbol, "BTC-USD");
    }
}
