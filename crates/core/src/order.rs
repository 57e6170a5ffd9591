//! Orders and the order lifecycle state machine.
//!
//! Every status change goes through [`Order::transition`] or
//! [`Order::confirm_transmission`], both of which check an explicit
//! allow-list and leave the order untouched on failure. The two transitions
//! that put an order in front of the market (SIMULATED -> PENDING for direct
//! submission, SIMULATED -> STAGED for broker staging) additionally require a
//! [`HumanConfirmation`] bound to the order.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, RiskError};
use crate::greeks::{GreekChange, InstrumentKind, OptionRight};
use crate::trade::{AiTradeSuggestion, ProposalStatus, ProposedTrade};

/// Maximum number of legs in one order.
pub const MAX_LEGS: usize = 4;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegAction {
    Buy,
    Sell,
}

impl LegAction {
    /// +1 for buys, -1 for sells.
    #[must_use]
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for LegAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// One leg of an order or candidate trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub symbol: String,
    pub kind: InstrumentKind,
    pub action: LegAction,
    pub quantity: u32,
    #[serde(default)]
    pub strike: Option<Decimal>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    #[serde(default)]
    pub right: Option<OptionRight>,
    /// Broker instrument identifier, when resolved.
    #[serde(default)]
    pub conid: Option<i64>,
}

impl OrderLeg {
    /// A futures or stock leg.
    #[must_use]
    pub fn outright(symbol: &str, kind: InstrumentKind, action: LegAction, quantity: u32) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            kind,
            action,
            quantity,
            strike: None,
            expiry: None,
            right: None,
            conid: None,
        }
    }

    /// An option leg.
    #[must_use]
    pub fn option(
        symbol: &str,
        action: LegAction,
        quantity: u32,
        strike: Decimal,
        expiry: NaiveDate,
        right: OptionRight,
    ) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            kind: InstrumentKind::Option,
            action,
            quantity,
            strike: Some(strike),
            expiry: Some(expiry),
            right: Some(right),
            conid: None,
        }
    }

    /// Human-readable leg (e.g. "SELL 2 SPX 4900P 2026-11-20").
    #[must_use]
    pub fn describe(&self) -> String {
        match (self.strike, self.right, self.expiry) {
            (Some(strike), Some(right), Some(expiry)) => format!(
                "{} {} {} {}{} {}",
                self.action, self.quantity, self.symbol, strike, right, expiry
            ),
            _ => format!("{} {} {}", self.action, self.quantity, self.symbol),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.quantity == 0 {
            return Err(RiskError::Validation(format!(
                "leg {} has zero quantity",
                self.symbol
            )));
        }
        if self.kind == InstrumentKind::Option
            && (self.strike.is_none() || self.expiry.is_none() || self.right.is_none())
        {
            return Err(RiskError::Validation(format!(
                "option leg {} requires strike, expiry and right",
                self.symbol
            )));
        }
        Ok(())
    }
}

/// Order pricing instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit { price: Decimal },
}

/// Canonical order status shared by the staging and direct-submit flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Draft,
    Simulated,
    Staged,
    Submitted,
    Pending,
    PartialFill,
    Filled,
    #[serde(alias = "CANCELED")]
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        Self::Draft,
        Self::Simulated,
        Self::Staged,
        Self::Submitted,
        Self::Pending,
        Self::PartialFill,
        Self::Filled,
        Self::Cancelled,
        Self::Rejected,
    ];

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Simulated => "SIMULATED",
            Self::Staged => "STAGED",
            Self::Submitted => "SUBMITTED",
            Self::Pending => "PENDING",
            Self::PartialFill => "PARTIAL_FILL",
            Self::Filled => "FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses a status string; "CANCELED" is accepted as "CANCELLED".
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CANCELED" => Some(Self::Cancelled),
            other => Self::ALL.into_iter().find(|st| st.as_str() == other),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every legal `(from, to)` status pair.
pub const ALLOWED_TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Draft, OrderStatus::Simulated),
    (OrderStatus::Draft, OrderStatus::Cancelled),
    (OrderStatus::Simulated, OrderStatus::Draft),
    (OrderStatus::Simulated, OrderStatus::Staged),
    (OrderStatus::Simulated, OrderStatus::Pending),
    (OrderStatus::Simulated, OrderStatus::Cancelled),
    (OrderStatus::Staged, OrderStatus::Submitted),
    (OrderStatus::Staged, OrderStatus::Cancelled),
    (OrderStatus::Submitted, OrderStatus::Pending),
    (OrderStatus::Submitted, OrderStatus::Rejected),
    (OrderStatus::Pending, OrderStatus::PartialFill),
    (OrderStatus::Pending, OrderStatus::Filled),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Pending, OrderStatus::Rejected),
    (OrderStatus::PartialFill, OrderStatus::Filled),
    (OrderStatus::PartialFill, OrderStatus::Cancelled),
];

/// Transitions that hand the order to the market.
const TRANSMITTING: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Simulated, OrderStatus::Pending),
    (OrderStatus::Simulated, OrderStatus::Staged),
];

/// Returns true if `from -> to` is on the allow-list.
#[must_use]
pub fn is_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    ALLOWED_TRANSITIONS.contains(&(from, to))
}

/// Evidence that a human explicitly approved transmitting one specific order.
///
/// Only obtainable through [`HumanConfirmation::acknowledge`], which the UI or
/// CLI calls after an explicit confirmation action.
#[derive(Debug, Clone)]
pub struct HumanConfirmation {
    order_id: Uuid,
    operator: String,
    confirmed_at: DateTime<Utc>,
}

impl HumanConfirmation {
    /// Records an operator's explicit confirmation for `order_id`.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` if `acknowledged` is false or no operator is named.
    pub fn acknowledge(order_id: Uuid, operator: &str, acknowledged: bool) -> Result<Self> {
        if !acknowledged {
            return Err(RiskError::PreconditionFailed(
                "order transmission requires explicit confirmation".to_string(),
            ));
        }
        if operator.trim().is_empty() {
            return Err(RiskError::PreconditionFailed(
                "confirmation must name an operator".to_string(),
            ));
        }
        Ok(Self {
            order_id,
            operator: operator.trim().to_string(),
            confirmed_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    #[must_use]
    pub fn operator(&self) -> &str {
        &self.operator
    }

    #[must_use]
    pub fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }
}

/// Result of a read-only what-if call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub margin_requirement: Decimal,
    pub equity_before: Decimal,
    pub equity_after: Decimal,
    #[serde(default)]
    pub greek_change: Option<GreekChange>,
    /// Broker-reported failure; a result with an error is not a valid simulation.
    #[serde(default)]
    pub error: Option<String>,
}

impl SimulationResult {
    /// A simulation that failed with `message`.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            margin_requirement: Decimal::ZERO,
            equity_before: Decimal::ZERO,
            equity_after: Decimal::ZERO,
            greek_change: None,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// How an order's legs are handed to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionRoute {
    /// Single-leg order.
    Single,
    /// One linked combo instruction; all legs fill together or not at all.
    Combo,
    /// Legs sent independently; no fill atomicity across legs.
    PerLeg,
}

impl SubmissionRoute {
    #[must_use]
    pub fn is_atomic(self) -> bool {
        matches!(self, Self::Single | Self::Combo)
    }
}

/// Order identity handed back by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAck {
    pub broker_order_id: String,
    pub route: SubmissionRoute,
}

/// Status reported by the broker for a transmitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerOrderStatus {
    Working,
    PartialFill,
    Filled,
    Cancelled,
    Rejected,
}

impl BrokerOrderStatus {
    /// The order status this broker status maps onto, if it changes anything.
    #[must_use]
    pub fn as_order_status(self) -> Option<OrderStatus> {
        match self {
            Self::Working => None,
            Self::PartialFill => Some(OrderStatus::PartialFill),
            Self::Filled => Some(OrderStatus::Filled),
            Self::Cancelled => Some(OrderStatus::Cancelled),
            Self::Rejected => Some(OrderStatus::Rejected),
        }
    }
}

/// A multi-leg order owned by exactly one workflow at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub account_id: String,
    legs: Vec<OrderLeg>,
    pub order_type: OrderType,
    status: OrderStatus,
    simulation: Option<SimulationResult>,
    broker_order_id: Option<String>,
    pub rationale: String,
    /// Advisory suggestion this order was built from, if any.
    pub suggestion_id: Option<Uuid>,
    /// Persisted proposal this order was built from, if any.
    pub proposal_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a DRAFT order.
    ///
    /// # Errors
    /// Returns `Validation` if the leg count is outside 1..=4 or any leg is malformed.
    pub fn new(
        account_id: &str,
        legs: Vec<OrderLeg>,
        order_type: OrderType,
        rationale: impl Into<String>,
    ) -> Result<Self> {
        validate_legs(&legs)?;
        if let OrderType::Limit { price } = &order_type {
            if price.is_sign_negative() {
                return Err(RiskError::Validation(format!(
                    "limit price {price} is negative"
                )));
            }
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            account_id: account_id.to_string(),
            legs,
            order_type,
            status: OrderStatus::Draft,
            simulation: None,
            broker_order_id: None,
            rationale: rationale.into(),
            suggestion_id: None,
            proposal_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn legs(&self) -> &[OrderLeg] {
        &self.legs
    }

    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub fn simulation(&self) -> Option<&SimulationResult> {
        self.simulation.as_ref()
    }

    #[must_use]
    pub fn broker_order_id(&self) -> Option<&str> {
        self.broker_order_id.as_deref()
    }

    /// Routing this order would use if transmitted now.
    #[must_use]
    pub fn submission_route(&self) -> SubmissionRoute {
        if self.legs.len() == 1 {
            SubmissionRoute::Single
        } else if self.legs.iter().all(|leg| leg.conid.is_some()) {
            SubmissionRoute::Combo
        } else {
            SubmissionRoute::PerLeg
        }
    }

    /// Fails unless the order is currently in `expected`.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` naming the actual status.
    pub fn ensure_status(&self, expected: OrderStatus) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(RiskError::PreconditionFailed(format!(
                "order {} is {} (expected {})",
                self.id, self.status, expected
            )))
        }
    }

    /// Applies a non-transmitting transition from the allow-list.
    ///
    /// # Errors
    /// Returns `StateTransition` for pairs off the allow-list, and
    /// `PreconditionFailed` for transmitting pairs, which need
    /// [`Order::confirm_transmission`]. The status is unchanged on error.
    pub fn transition(&mut self, next: OrderStatus) -> Result<()> {
        if !is_allowed(self.status, next) {
            return Err(RiskError::transition(self.status, next));
        }
        if TRANSMITTING.contains(&(self.status, next)) {
            return Err(RiskError::PreconditionFailed(format!(
                "{} -> {} requires human confirmation",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a successful what-if and moves DRAFT -> SIMULATED.
    ///
    /// # Errors
    /// Returns `Validation` if the result carries an error, or a transition
    /// error if the order is not in DRAFT.
    pub fn record_simulation(&mut self, result: SimulationResult) -> Result<()> {
        if let Some(err) = &result.error {
            return Err(RiskError::Validation(format!(
                "cannot record failed simulation: {err}"
            )));
        }
        self.transition(OrderStatus::Simulated)?;
        self.simulation = Some(result);
        Ok(())
    }

    /// Applies SIMULATED -> PENDING or SIMULATED -> STAGED after the broker accepted the order.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` if the confirmation belongs to another order
    /// or the order is not SIMULATED, and `StateTransition` for any other target.
    pub fn confirm_transmission(
        &mut self,
        confirmation: &HumanConfirmation,
        next: OrderStatus,
        broker_order_id: String,
    ) -> Result<()> {
        if confirmation.order_id() != self.id {
            return Err(RiskError::PreconditionFailed(format!(
                "confirmation for order {} cannot transmit order {}",
                confirmation.order_id(),
                self.id
            )));
        }
        self.ensure_status(OrderStatus::Simulated)?;
        if !TRANSMITTING.contains(&(self.status, next)) {
            return Err(RiskError::transition(self.status, next));
        }
        self.status = next;
        self.broker_order_id = Some(broker_order_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Builds a DRAFT order from a reviewed proposal.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` unless the proposal was approved, or
    /// `Validation` if its legs are malformed.
    pub fn from_proposal(proposal: &ProposedTrade) -> Result<Self> {
        if proposal.status != ProposalStatus::Approved {
            return Err(RiskError::PreconditionFailed(format!(
                "proposal {} is {} (expected approved)",
                proposal.id, proposal.status
            )));
        }
        let mut order = Self::new(
            &proposal.account_id,
            proposal.candidate.legs.clone(),
            OrderType::Market,
            proposal.candidate.justification.clone(),
        )?;
        order.proposal_id = Some(proposal.id);
        Ok(order)
    }

    /// Builds a DRAFT order from an advisory suggestion the operator chose to act on.
    ///
    /// # Errors
    /// Returns `Validation` if the suggestion's legs are malformed.
    pub fn from_suggestion(account_id: &str, suggestion: &AiTradeSuggestion) -> Result<Self> {
        let mut order = Self::new(
            account_id,
            suggestion.legs.clone(),
            OrderType::Market,
            suggestion.rationale.clone(),
        )?;
        order.suggestion_id = Some(suggestion.id);
        Ok(order)
    }
}

/// Checks the leg-count and per-leg invariants shared by orders and candidates.
///
/// # Errors
/// Returns `Validation` describing the first violated invariant.
pub fn validate_legs(legs: &[OrderLeg]) -> Result<()> {
    if legs.is_empty() || legs.len() > MAX_LEGS {
        return Err(RiskError::Validation(format!(
            "order must have 1 to {MAX_LEGS} legs, got {}",
            legs.len()
        )));
    }
    legs.iter().try_for_each(OrderLeg::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(action: LegAction) -> OrderLeg {
        OrderLeg::option(
            "SPX",
            action,
            1,
            dec!(5000),
            NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
            OptionRight::Put,
        )
    }

    fn draft() -> Order {
        Order::new(
            "U123",
            vec![leg(LegAction::Buy)],
            OrderType::Limit { price: dec!(12.5) },
            "test",
        )
        .unwrap()
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = draft();
        order.status = status;
        order
    }

    #[test]
    fn rejects_zero_and_five_legs() {
        assert!(matches!(
            Order::new("U1", vec![], OrderType::Market, ""),
            Err(RiskError::Validation(_))
        ));
        let five = vec![leg(LegAction::Buy); 5];
        assert!(matches!(
            Order::new("U1", five, OrderType::Market, ""),
            Err(RiskError::Validation(_))
        ));
        let four = vec![leg(LegAction::Buy); 4];
        assert!(Order::new("U1", four, OrderType::Market, "").is_ok());
    }

    #[test]
    fn rejects_option_leg_without_strike() {
        let mut bad = leg(LegAction::Sell);
        bad.strike = None;
        assert!(Order::new("U1", vec![bad], OrderType::Market, "").is_err());
    }

    #[test]
    fn new_order_starts_in_draft() {
        assert_eq!(draft().status(), OrderStatus::Draft);
    }

    #[test]
    fn every_disallowed_pair_is_rejected_and_leaves_status_unchanged() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if is_allowed(from, to) {
                    continue;
                }
                let mut order = order_in(from);
                let before = order.clone();
                let result = order.transition(to);
                assert!(
                    matches!(result, Err(RiskError::StateTransition { .. })),
                    "{from} -> {to} should be rejected"
                );
                assert_eq!(order, before, "{from} -> {to} mutated the order");
            }
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(OrderStatus::ALL.into_iter().all(|to| !is_allowed(from, to)));
        }
    }

    #[test]
    fn transmitting_transitions_need_confirmation() {
        let mut order = order_in(OrderStatus::Simulated);
        assert!(matches!(
            order.transition(OrderStatus::Pending),
            Err(RiskError::PreconditionFailed(_))
        ));
        assert!(matches!(
            order.transition(OrderStatus::Staged),
            Err(RiskError::PreconditionFailed(_))
        ));
        assert_eq!(order.status(), OrderStatus::Simulated);

        let confirmation = HumanConfirmation::acknowledge(order.id, "alice", true).unwrap();
        order
            .confirm_transmission(&confirmation, OrderStatus::Pending, "B-1".to_string())
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.broker_order_id(), Some("B-1"));
    }

    #[test]
    fn confirmation_is_bound_to_one_order() {
        let mut order = order_in(OrderStatus::Simulated);
        let other = HumanConfirmation::acknowledge(Uuid::new_v4(), "alice", true).unwrap();
        assert!(order
            .confirm_transmission(&other, OrderStatus::Pending, "B-1".to_string())
            .is_err());
        assert_eq!(order.status(), OrderStatus::Simulated);
    }

    #[test]
    fn confirmation_requires_acknowledgement() {
        assert!(HumanConfirmation::acknowledge(Uuid::new_v4(), "alice", false).is_err());
        assert!(HumanConfirmation::acknowledge(Uuid::new_v4(), "  ", true).is_err());
    }

    #[test]
    fn confirm_transmission_from_draft_fails() {
        let mut order = draft();
        let confirmation = HumanConfirmation::acknowledge(order.id, "alice", true).unwrap();
        assert!(matches!(
            order.confirm_transmission(&confirmation, OrderStatus::Pending, "B".to_string()),
            Err(RiskError::PreconditionFailed(_))
        ));
        assert_eq!(order.status(), OrderStatus::Draft);
        assert_eq!(order.broker_order_id(), None);
    }

    #[test]
    fn failed_simulation_is_not_recorded() {
        let mut order = draft();
        assert!(order
            .record_simulation(SimulationResult::failed("no market data"))
            .is_err());
        assert_eq!(order.status(), OrderStatus::Draft);
        assert!(order.simulation().is_none());
    }

    #[test]
    fn canceled_spelling_is_equivalent() {
        assert_eq!(OrderStatus::parse("CANCELED"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse("cancelled"), Some(OrderStatus::Cancelled));
        let parsed: OrderStatus = serde_json::from_str("\"CANCELED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Cancelled);
    }

    #[test]
    fn route_depends_on_leg_resolution() {
        let mut legs = vec![leg(LegAction::Buy), leg(LegAction::Sell)];
        let order = Order::new("U1", legs.clone(), OrderType::Market, "").unwrap();
        assert_eq!(order.submission_route(), SubmissionRoute::PerLeg);

        legs[0].conid = Some(1);
        legs[1].conid = Some(2);
        let order = Order::new("U1", legs, OrderType::Market, "").unwrap();
        assert_eq!(order.submission_route(), SubmissionRoute::Combo);
        assert_eq!(draft().submission_route(), SubmissionRoute::Single);
    }

    #[test]
    fn suggestion_becomes_linked_draft() {
        let suggestion = AiTradeSuggestion {
            id: Uuid::new_v4(),
            legs: vec![leg(LegAction::Buy), leg(LegAction::Sell)],
            projected_delta_change: dec!(-50),
            projected_theta_cost: dec!(-12),
            rationale: "trim downside".to_string(),
        };
        let order = Order::from_suggestion("U1", &suggestion).unwrap();
        assert_eq!(order.status(), OrderStatus::Draft);
        assert_eq!(order.suggestion_id, Some(suggestion.id));
        assert_eq!(order.legs().len(), 2);

        let empty = AiTradeSuggestion {
            legs: Vec::new(),
            ..suggestion
        };
        assert!(matches!(
            Order::from_suggestion("U1", &empty),
            Err(RiskError::Validation(_))
        ));
    }
}
