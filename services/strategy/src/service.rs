//! Service orchestrator: bus wiring, handlers, resilience
//!
//! Handlers run as independently scheduled tasks per inbound message; a
//! failing handler logs and replies with a structured error, it never takes
//! down the subscription loop or other in-flight handlers.

use std::sync::Arc;

use analytics::{TwapCalculator, VwapCalculator};
use anyhow::Context as _;
use auth::{
    AccountLookup, AuthContext, AuthError, AuthService, InMemoryAccountLookup,
    InMemoryRevocationStore, RevocationStore,
};
use futures::StreamExt;
use resilience::{
    with_retry, CircuitBreakerConfig, CircuitBreakerManager, CircuitState, NoOpMetrics,
    ResilienceMetrics, RetryPolicy,
};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::envelope::{AuthenticatedMessage, SignalRequest, SignalResponse, TickPayload};
use crate::metrics::{NoOpStrategyMetrics, StrategyMetrics};
use crate::momentum::{Bar, MomentumStrategy, StrategySnapshot};

pub const TICKS_SUBJECT: &str = "market.ticks";
pub const SIGNALS_SUBJECT: &str = "strategy.signals.request";

const PUBLISH_BREAKER: &str = "nats_publish";
const CONNECT_ATTEMPTS: usize = 5;

struct ServiceInner {
    client: async_nats::Client,
    strategy: MomentumStrategy,
    vwap: VwapCalculator,
    twap: TwapCalculator,
    breakers: CircuitBreakerManager,
    auth: AuthService,
    revocations: Arc<dyn RevocationStore>,
    accounts: Arc<dyn AccountLookup>,
    metrics: Arc<dyn StrategyMetrics>,
}

/// Momentum strategy service wired to the message bus.
pub struct StrategyService {
    inner: Arc<ServiceInner>,
}

impl StrategyService {
    /// Connect with no-op metrics sinks and in-memory auth collaborators.
    pub async fn connect(config: ServiceConfig) -> anyhow::Result<Self> {
        Self::connect_with(
            config,
            Arc::new(NoOpMetrics),
            Arc::new(NoOpStrategyMetrics),
            Arc::new(InMemoryRevocationStore::new()),
            Arc::new(InMemoryAccountLookup::new()),
        )
        .await
    }

    /// Connect with explicitly injected metrics sinks and auth
    /// collaborators.
    ///
    /// Connection establishment is retried with backoff; no breaker guards
    /// it, there is nothing to probe before a connection exists.
    pub async fn connect_with(
        config: ServiceConfig,
        resilience_metrics: Arc<dyn ResilienceMetrics>,
        strategy_metrics: Arc<dyn StrategyMetrics>,
        revocations: Arc<dyn RevocationStore>,
        accounts: Arc<dyn AccountLookup>,
    ) -> anyhow::Result<Self> {
        let policy = RetryPolicy::with_max_attempts(CONNECT_ATTEMPTS);
        let nats_url = config.nats_url.clone();
        let client = with_retry("nats_connect", &policy, resilience_metrics.as_ref(), || {
            async_nats::connect(nats_url.clone())
        })
        .await
        .context("failed to connect to NATS")?;
        info!(url = %config.nats_url, "connected to NATS");

        Ok(Self {
            inner: Arc::new(ServiceInner {
                client,
                strategy: MomentumStrategy::new(config.momentum.clone()),
                vwap: VwapCalculator::new(config.vwap_window),
                twap: TwapCalculator::new(config.twap_window),
                breakers: CircuitBreakerManager::new(resilience_metrics),
                auth: AuthService::new(&config.jwt_secret),
                revocations,
                accounts,
                metrics: strategy_metrics,
            }),
        })
    }

    /// Subscribe and process messages until shutdown.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticks = self
            .inner
            .client
            .subscribe(TICKS_SUBJECT)
            .await
            .context("failed to subscribe to market ticks")?;
        let mut requests = self
            .inner
            .client
            .subscribe(SIGNALS_SUBJECT)
            .await
            .context("failed to subscribe to signal requests")?;

        info!("strategy service started");

        loop {
            tokio::select! {
                Some(msg) = ticks.next() => {
                    let inner = self.inner.clone();
                    tokio::spawn(async move { inner.handle_market_tick(msg) });
                }
                Some(msg) = requests.next() => {
                    let inner = self.inner.clone();
                    tokio::spawn(async move { inner.handle_signal_request(msg).await });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
                else => {
                    warn!("bus subscriptions closed");
                    break;
                }
            }
        }

        info!("strategy service stopped");
        Ok(())
    }

    /// Validate a bearer token against the wired revocation store and
    /// account lookup.
    pub async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.inner
            .auth
            .validate_token(token, self.inner.revocations.as_ref(), self.inner.accounts.as_ref())
            .await
    }

    /// Revoke a credential id for the maximum token validity window.
    pub async fn revoke_token(&self, jti: &str) -> Result<(), AuthError> {
        self.inner
            .auth
            .revoke_token(jti, self.inner.revocations.as_ref())
            .await
    }

    pub fn vwap(&self, symbol: &str) -> Option<Decimal> {
        self.inner.vwap.vwap(symbol)
    }

    pub fn twap(&self, symbol: &str) -> Option<Decimal> {
        self.inner.twap.twap(symbol)
    }

    pub fn strategy_snapshot(&self) -> StrategySnapshot {
        self.inner.strategy.state_snapshot()
    }

    pub fn breaker_states(&self) -> Vec<(String, CircuitState)> {
        self.inner.breakers.states()
    }
}

impl ServiceInner {
    fn handle_market_tick(&self, msg: async_nats::Message) {
        if let Err(e) = apply_market_tick(&self.strategy, &self.vwap, &self.twap, &msg.payload) {
            warn!(error = %e, "dropping malformed market tick");
        }
    }

    async fn handle_signal_request(&self, msg: async_nats::Message) {
        let response = build_signal_response(&self.strategy, self.metrics.as_ref(), &msg.payload);

        let Some(reply) = msg.reply else {
            return;
        };
        let bytes = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to serialize signal reply");
                return;
            }
        };

        let breaker = self
            .breakers
            .get_or_create(PUBLISH_BREAKER, CircuitBreakerConfig::default());
        if let Err(e) = breaker
            .execute(|| self.client.publish(reply, bytes.into()))
            .await
        {
            error!(error = %e, "failed to publish signal reply");
        }
    }
}

/// Update momentum history and both aggregators from a tick payload.
pub(crate) fn apply_market_tick(
    strategy: &MomentumStrategy,
    vwap: &VwapCalculator,
    twap: &TwapCalculator,
    payload: &[u8],
) -> Result<(), serde_json::Error> {
    let tick: TickPayload = serde_json::from_slice(payload)?;

    strategy.update_bar(&Bar::from(&tick));
    vwap.add_trade(&tick.symbol, tick.last_price, tick.volume, tick.timestamp);
    twap.add_price(&tick.symbol, tick.last_price, tick.timestamp);
    Ok(())
}

/// Build the reply for one signal request.
///
/// The envelope is validated and the authorization context rebuilt before
/// any strategy dispatch; failures map to the structured reply shape, never
/// a crashed handler.
pub(crate) fn build_signal_response(
    strategy: &MomentumStrategy,
    metrics: &dyn StrategyMetrics,
    payload: &[u8],
) -> SignalResponse {
    let request: AuthenticatedMessage<SignalRequest> = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejecting unauthenticated or malformed signal request");
            return SignalResponse::failure(format!("unauthenticated request: {e}"), None);
        }
    };

    let ctx = match request.auth.into_context() {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = %e, "rejecting signal request with invalid auth payload");
            return SignalResponse::failure(e.to_string(), Some(e.code()));
        }
    };

    let SignalRequest {
        strategy: strategy_name,
        symbol,
        current_position,
    } = request.payload;

    if strategy_name != "momentum" {
        return SignalResponse::failure(format!("unknown strategy: {strategy_name}"), None);
    }

    match strategy.generate_signal(&ctx, &symbol, current_position) {
        Ok(Some(signal)) => {
            info!(
                symbol = %signal.symbol,
                side = ?signal.side,
                strength = signal.strength,
                "signal generated"
            );
            metrics.record_signal(&strategy_name, &signal.symbol, signal.side);
            SignalResponse::ok(Some(signal))
        }
        Ok(None) => SignalResponse::ok(None),
        Err(e) => {
            warn!(symbol = %symbol, code = e.code(), error = %e, "signal request denied");
            SignalResponse::failure(e.to_string(), Some(e.code()))
        }
    }
}
