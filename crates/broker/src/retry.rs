//! Bounded retry for idempotent collaborator reads.
//!
//! Only transient errors (timeouts and collaborator failures) are retried.
//! Order transmission is never wrapped: a retried submit could transmit twice.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use riskdesk_core::{
    AccountSummary, GreeksFeed, MarketContext, MarketContextFeed, Order, Position, PositionGreeks,
    Result, SimulationResult, WhatIfSimulator,
};

/// Attempt budget and fixed backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Upper bound on attempts per call.
    pub const MAX_ATTEMPTS: u32 = 2;

    /// `max_attempts` is clamped to `1..=2`.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, Self::MAX_ATTEMPTS),
            backoff,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(500))
    }
}

/// Runs `op`, retrying transient failures up to the policy's attempt budget.
///
/// # Errors
/// Returns the last error once attempts are exhausted, or the first
/// non-transient error immediately.
pub async fn retry_bounded<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Transient collaborator failure, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wraps a read-only collaborator so every call goes through [`retry_bounded`].
pub struct Retrying<T: ?Sized> {
    inner: Arc<T>,
    policy: RetryPolicy,
}

impl<T: ?Sized> Retrying<T> {
    pub fn new(inner: Arc<T>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: GreeksFeed + ?Sized> GreeksFeed for Retrying<T> {
    async fn fetch_account(&self, account_id: &str) -> Result<AccountSummary> {
        retry_bounded(&self.policy, "fetch_account", || self.inner.fetch_account(account_id)).await
    }

    async fn fetch_positions(&self, account_id: &str) -> Result<Vec<Position>> {
        retry_bounded(&self.policy, "fetch_positions", || {
            self.inner.fetch_positions(account_id)
        })
        .await
    }

    async fn fetch_greeks(&self, positions: Vec<Position>) -> Result<Vec<PositionGreeks>> {
        retry_bounded(&self.policy, "fetch_greeks", || {
            self.inner.fetch_greeks(positions.clone())
        })
        .await
    }

    async fn portfolio_summary(
        &self,
        positions: &[PositionGreeks],
    ) -> Result<riskdesk_core::PortfolioGreeks> {
        self.inner.portfolio_summary(positions).await
    }
}

#[async_trait]
impl<T: MarketContextFeed + ?Sized> MarketContextFeed for Retrying<T> {
    async fn market_context(&self) -> Result<MarketContext> {
        retry_bounded(&self.policy, "market_context", || self.inner.market_context()).await
    }
}

#[async_trait]
impl<T: WhatIfSimulator + ?Sized> WhatIfSimulator for Retrying<T> {
    async fn simulate(&self, order: &Order) -> Result<SimulationResult> {
        retry_bounded(&self.policy, "what_if", || self.inner.simulate(order)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskdesk_core::RiskError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn attempts_are_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(10, Duration::ZERO).max_attempts(), 2);
    }

    #[tokio::test]
    async fn transient_failure_retried_once() {
        let calls = AtomicU32::new(0);
        let result = retry_bounded(&fast(2), "fetch", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RiskError::collaborator("fetch", "session expired"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_bounded(&fast(2), "fetch", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RiskError::timeout("fetch", Duration::from_secs(1)))
        })
        .await;
        assert!(matches!(result, Err(RiskError::CollaboratorTimeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn contract_violations_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_bounded(&fast(2), "fetch", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RiskError::Validation("bad leg".to_string()))
        })
        .await;
        assert!(matches!(result, Err(RiskError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct FlakyMarket {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MarketContextFeed for FlakyMarket {
        async fn market_context(&self) -> Result<MarketContext> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RiskError::collaborator("market_context", "401"));
            }
            Ok(MarketContext {
                vix: rust_decimal_macros::dec!(18),
                term_structure: rust_decimal_macros::dec!(1.05),
                recession_probability: None,
                spx_price: rust_decimal_macros::dec!(5000),
                timestamp: chrono::Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn wrapper_retries_reads() {
        let inner = Arc::new(FlakyMarket {
            calls: AtomicU32::new(0),
        });
        let feed = Retrying::new(inner.clone(), fast(2));
        assert!(feed.market_context().await.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
