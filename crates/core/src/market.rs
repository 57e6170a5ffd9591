//! Market context and account state read from collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::regime::Regime;

/// Volatility and macro inputs used for regime classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub vix: Decimal,
    /// Forward / spot VIX ratio. Above 1.0 is contango, below is inversion.
    pub term_structure: Decimal,
    /// Probability in [0, 1], when a macro model is available.
    #[serde(default)]
    pub recession_probability: Option<Decimal>,
    /// Price of the reference index used to size hedges.
    pub spx_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Account balances as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub net_liquidation: Decimal,
    pub margin_used: Decimal,
    pub buying_power: Decimal,
}

/// Per-cycle record of account state, persisted for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub net_liquidation: Decimal,
    pub margin_used: Decimal,
    pub regime: Regime,
    pub vix: Decimal,
    pub captured_at: DateTime<Utc>,
}
