//! Interfaces to the collaborators around the risk core.
//!
//! Implementations own their transport, caching and staleness policy. The
//! core wraps every call in a timeout and treats failures as typed results.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::alert::AlertPayload;
use crate::error::Result;
use crate::greeks::{PortfolioGreeks, Position, PositionGreeks};
use crate::market::{AccountSummary, MarketContext};
use crate::order::{BrokerAck, BrokerOrderStatus, Order, SimulationResult, SubmissionRoute};
use crate::regime::Regime;
use crate::trade::BreachEvent;

/// Position and Greeks feed.
#[async_trait]
pub trait GreeksFeed: Send + Sync {
    async fn fetch_account(&self, account_id: &str) -> Result<AccountSummary>;

    async fn fetch_positions(&self, account_id: &str) -> Result<Vec<Position>>;

    async fn fetch_greeks(&self, positions: Vec<Position>) -> Result<Vec<PositionGreeks>>;

    /// Aggregates position Greeks into a portfolio snapshot.
    async fn portfolio_summary(&self, positions: &[PositionGreeks]) -> Result<PortfolioGreeks> {
        Ok(PortfolioGreeks::aggregate(positions, Utc::now()))
    }
}

/// VIX, term structure and macro inputs.
#[async_trait]
pub trait MarketContextFeed: Send + Sync {
    async fn market_context(&self) -> Result<MarketContext>;
}

/// Read-only margin and Greek impact estimation. Never transmits.
#[async_trait]
pub trait WhatIfSimulator: Send + Sync {
    async fn simulate(&self, order: &Order) -> Result<SimulationResult>;
}

/// Order transmission and status observation.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Transmits the order for execution.
    async fn submit(&self, order: &Order, route: SubmissionRoute) -> Result<BrokerAck>;

    /// Places the order at the broker without transmitting it.
    async fn stage(&self, order: &Order, route: SubmissionRoute) -> Result<BrokerAck>;

    /// Transmits a previously staged order.
    async fn transmit(&self, broker_order_id: &str) -> Result<()>;

    async fn cancel(&self, broker_order_id: &str) -> Result<()>;

    /// Latest broker status, or `None` if the broker cannot say.
    async fn poll_status(&self, broker_order_id: &str) -> Result<Option<BrokerOrderStatus>>;
}

/// Outbound alert delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &AlertPayload) -> Result<()>;
}

/// Snapshot handed to the advisory commentary collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorySnapshot {
    pub account_id: String,
    pub regime: Regime,
    pub greeks: PortfolioGreeks,
    pub breaches: Vec<BreachEvent>,
}

/// Free-text commentary generator. Output is untrusted and validated by the caller.
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    /// Raw response text, expected to hold commentary and up to three suggestions.
    async fn commentary(&self, snapshot: &AdvisorySnapshot) -> Result<String>;
}
