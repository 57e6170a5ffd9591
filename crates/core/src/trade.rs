//! Breaches, hedge candidates, persisted proposals and advisory suggestions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::greeks::GreekChange;
use crate::order::OrderLeg;
use crate::regime::Regime;

/// Greek metric checked against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachMetric {
    Delta,
    Vega,
    Theta,
    Gamma,
}

impl BreachMetric {
    /// Tie-break precedence; lower is reported first.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Delta => 0,
            Self::Vega => 1,
            Self::Theta => 2,
            Self::Gamma => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Vega => "vega",
            Self::Theta => "theta",
            Self::Gamma => "gamma",
        }
    }
}

impl std::fmt::Display for BreachMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far past its limit a metric is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachSeverity {
    Warning,
    Critical,
}

/// A limit breach detected in one evaluation cycle.
///
/// Self-contained: carries everything needed to render it or to generate
/// hedges without re-reading portfolio state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreachEvent {
    pub account_id: String,
    pub metric: BreachMetric,
    pub current: Decimal,
    pub limit: Decimal,
    pub severity: BreachSeverity,
    pub regime: Regime,
    pub vix: Decimal,
    pub margin_used: Decimal,
    pub detected_at: DateTime<Utc>,
}

impl BreachEvent {
    /// Distance past the limit, positive while breached.
    #[must_use]
    pub fn excess(&self) -> Decimal {
        excess_for(self.metric, self.current, self.limit)
    }
}

/// Distance of `value` past `limit` for `metric`; positive means breached.
///
/// Delta and gamma are bounded in absolute value. Vega is bounded below by a
/// negative threshold (excess short vega). Theta is bounded below by a
/// minimum daily income.
#[must_use]
pub fn excess_for(metric: BreachMetric, value: Decimal, limit: Decimal) -> Decimal {
    match metric {
        BreachMetric::Delta | BreachMetric::Gamma => value.abs() - limit,
        BreachMetric::Vega | BreachMetric::Theta => limit - value,
    }
}

/// Structure family of a hedge candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeStrategy {
    FutureHedge,
    StockHedge,
    ClosePosition,
    ReducePosition,
    LongPutSpread,
    ShortPutSpread,
}

/// Projected effect of a candidate on margin and Greeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeImpact {
    /// Initial margin consumed (negative when margin is released).
    pub margin_impact: Decimal,
    pub change: GreekChange,
    /// True when the figures came from a broker what-if call.
    pub simulated: bool,
}

/// A proposed hedge built in response to a breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrade {
    /// Allow-listed benchmark the structure trades.
    pub benchmark: String,
    pub legs: Vec<OrderLeg>,
    pub strategy: HedgeStrategy,
    /// Metric this candidate targets.
    pub target: BreachMetric,
    /// The breach that produced this candidate.
    pub breach: BreachEvent,
    #[serde(default)]
    pub impact: Option<TradeImpact>,
    #[serde(default)]
    pub score: Option<Decimal>,
    pub justification: String,
}

impl CandidateTrade {
    /// Margin impact used for tie-breaks; unknown impact sorts last.
    #[must_use]
    pub fn margin_impact(&self) -> Decimal {
        self.impact
            .as_ref()
            .map_or(Decimal::MAX, |impact| impact.margin_impact)
    }
}

/// Review status of a persisted proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Superseded,
}

impl ProposalStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Superseded => "superseded",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate persisted for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTrade {
    pub id: i64,
    pub account_id: String,
    /// Generation batch; all rows of one `persist_top3` call share it.
    pub batch_id: Uuid,
    /// Position within the ranked batch, starting at 1.
    pub rank: u32,
    pub candidate: CandidateTrade,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// A remediation trade suggested by the advisory commentary collaborator.
///
/// Advisory only; it becomes an order solely through explicit human action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiTradeSuggestion {
    pub id: Uuid,
    pub legs: Vec<OrderLeg>,
    pub projected_delta_change: Decimal,
    pub projected_theta_cost: Decimal,
    pub rationale: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn excess_sign_conventions() {
        assert_eq!(excess_for(BreachMetric::Delta, dec!(-700), dec!(600)), dec!(100));
        assert_eq!(excess_for(BreachMetric::Gamma, dec!(50), dec!(100)), dec!(-50));
        assert_eq!(excess_for(BreachMetric::Vega, dec!(-8000), dec!(-4800)), dec!(3200));
        assert_eq!(excess_for(BreachMetric::Vega, dec!(2000), dec!(-4800)), dec!(-6800));
        assert_eq!(excess_for(BreachMetric::Theta, dec!(40), dec!(100)), dec!(60));
    }

    #[test]
    fn precedence_order() {
        let mut metrics = vec![
            BreachMetric::Gamma,
            BreachMetric::Theta,
            BreachMetric::Delta,
            BreachMetric::Vega,
        ];
        metrics.sort_by_key(|m| m.precedence());
        assert_eq!(
            metrics,
            vec![
                BreachMetric::Delta,
                BreachMetric::Vega,
                BreachMetric::Theta,
                BreachMetric::Gamma
            ]
        );
    }

    #[test]
    fn proposal_status_roundtrip_strings() {
        for status in [
            ProposalStatus::Pending,
            ProposalStatus::Approved,
            ProposalStatus::Rejected,
            ProposalStatus::Superseded,
        ] {
            assert_eq!(ProposalStatus::parse(status.as_str()), Some(status));
        }
        assert!(!ProposalStatus::Pending.is_terminal());
        assert!(ProposalStatus::Superseded.is_terminal());
    }
}
