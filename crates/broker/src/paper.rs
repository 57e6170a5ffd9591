//! Paper trading broker.
//!
//! Serves account, Greeks and market context from a [`PaperState`], answers
//! what-if requests from the state's instrument models, and simulates order
//! handling without touching a real broker. Fills are applied to the held
//! positions so the next cycle sees the hedged book.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, info};

use riskdesk_core::{
    AccountSummary, BrokerAck, BrokerOrderStatus, GreekChange, GreeksFeed, InstrumentKind,
    LegAction, MarketContext, MarketContextFeed, Order, OrderGateway, OrderLeg, Position,
    PositionGreeks, Result, RiskError, SimulationResult, SubmissionRoute, WhatIfSimulator,
};

use crate::state::{signed_quantity, FillMode, PaperState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaperOrderState {
    Staged,
    Transmitted,
    Filled,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone)]
struct PaperOrder {
    legs: Vec<OrderLeg>,
    state: PaperOrderState,
}

/// Deterministic in-process broker.
pub struct PaperBroker {
    state: RwLock<PaperState>,
    orders: Mutex<HashMap<String, PaperOrder>>,
    sequence: AtomicU64,
}

impl PaperBroker {
    #[must_use]
    pub fn new(state: PaperState) -> Self {
        Self {
            state: RwLock::new(state),
            orders: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
        }
    }

    /// Loads the broker from a JSON state file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> AnyResult<Self> {
        let state = PaperState::load(path)?;
        info!(
            path = %path.display(),
            account_id = %state.account.account_id,
            positions = state.positions.len(),
            "Paper broker loaded"
        );
        Ok(Self::new(state))
    }

    /// Writes the current state, including applied fills, to `path`.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> AnyResult<()> {
        self.state.read().save(path)
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PaperState {
        self.state.read().clone()
    }

    pub fn set_fill_mode(&self, mode: FillMode) {
        self.state.write().fill_mode = mode;
    }

    fn next_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("PAPER-{}-{seq}", Utc::now().timestamp_millis())
    }

    fn effective_route(&self, requested: SubmissionRoute) -> SubmissionRoute {
        if requested == SubmissionRoute::Combo && !self.state.read().combo_supported {
            SubmissionRoute::PerLeg
        } else {
            requested
        }
    }

    fn place(&self, order: &Order, route: SubmissionRoute, state: PaperOrderState) -> BrokerAck {
        let broker_order_id = self.next_id();
        let route = self.effective_route(route);
        self.orders.lock().insert(
            broker_order_id.clone(),
            PaperOrder {
                legs: order.legs().to_vec(),
                state,
            },
        );
        info!(
            order_id = %order.id,
            broker_order_id = %broker_order_id,
            ?route,
            ?state,
            "Paper order accepted"
        );
        BrokerAck {
            broker_order_id,
            route,
        }
    }

    /// Applies filled legs to the held positions.
    fn apply_fill(&self, legs: &[OrderLeg]) {
        let mut state = self.state.write();
        for leg in legs {
            let Some(unit) = state.unit_greeks(leg) else {
                debug!(leg = %leg.describe(), "No paper model for filled leg, position not tracked");
                continue;
            };
            let delta_qty = signed_quantity(leg);
            let change = scale(&unit, Decimal::from(delta_qty));

            match state.held_index(leg) {
                Some(i) => {
                    let held = &mut state.positions[i];
                    let new_qty = i64::from(held.position.quantity) + delta_qty;
                    held.spx_delta += change.spx_delta;
                    held.gamma += change.gamma;
                    held.theta += change.theta;
                    held.vega += change.vega;
                    held.position.quantity = i32::try_from(new_qty).unwrap_or(i32::MAX);
                    if new_qty == 0 {
                        state.positions.remove(i);
                    }
                }
                None => {
                    let multiplier = match leg.kind {
                        InstrumentKind::Option => leg
                            .right
                            .and_then(|right| state.option_model(&leg.symbol, right))
                            .map_or(Decimal::ONE_HUNDRED, |m| m.multiplier),
                        InstrumentKind::Future | InstrumentKind::Stock => Decimal::ONE,
                    };
                    state.positions.push(PositionGreeks {
                        position: Position {
                            symbol: leg.symbol.clone(),
                            kind: leg.kind,
                            right: leg.right,
                            strike: leg.strike,
                            expiry: leg.expiry,
                            quantity: i32::try_from(delta_qty).unwrap_or(i32::MAX),
                            multiplier,
                            conid: leg.conid,
                        },
                        spx_delta: change.spx_delta,
                        gamma: change.gamma,
                        theta: change.theta,
                        vega: change.vega,
                    });
                }
            }
        }
    }

    fn leg_margin(state: &PaperState, leg: &OrderLeg) -> Option<Decimal> {
        let qty = Decimal::from(leg.quantity);
        match leg.kind {
            InstrumentKind::Future | InstrumentKind::Stock => {
                Some(state.linear(&leg.symbol)?.margin_per_unit * qty)
            }
            InstrumentKind::Option => {
                let model = state.option_model(&leg.symbol, leg.right?)?;
                let per_short = model.short_margin(leg.strike?);
                let held_short = state
                    .held_index(leg)
                    .is_some_and(|i| state.positions[i].position.quantity < 0);
                Some(match (leg.action, held_short) {
                    (LegAction::Sell, _) => per_short * qty,
                    (LegAction::Buy, true) => -per_short * qty,
                    (LegAction::Buy, false) => Decimal::ZERO,
                })
            }
        }
    }
}

fn scale(unit: &GreekChange, n: Decimal) -> GreekChange {
    GreekChange {
        spx_delta: unit.spx_delta * n,
        gamma: unit.gamma * n,
        theta: unit.theta * n,
        vega: unit.vega * n,
    }
}

#[async_trait]
impl GreeksFeed for PaperBroker {
    async fn fetch_account(&self, account_id: &str) -> Result<AccountSummary> {
        let state = self.state.read();
        if state.account.account_id != account_id {
            return Err(RiskError::collaborator(
                "fetch_account",
                format!("unknown account {account_id}"),
            ));
        }
        Ok(state.account.clone())
    }

    async fn fetch_positions(&self, account_id: &str) -> Result<Vec<Position>> {
        let state = self.state.read();
        if state.account.account_id != account_id {
            return Err(RiskError::collaborator(
                "fetch_positions",
                format!("unknown account {account_id}"),
            ));
        }
        Ok(state.positions.iter().map(|p| p.position.clone()).collect())
    }

    async fn fetch_greeks(&self, positions: Vec<Position>) -> Result<Vec<PositionGreeks>> {
        let state = self.state.read();
        positions
            .into_iter()
            .map(|position| {
                state
                    .positions
                    .iter()
                    .find(|p| p.position == position)
                    .cloned()
                    .ok_or_else(|| {
                        RiskError::collaborator(
                            "fetch_greeks",
                            format!("no Greeks for {}", position.display_name()),
                        )
                    })
            })
            .collect()
    }
}

#[async_trait]
impl MarketContextFeed for PaperBroker {
    async fn market_context(&self) -> Result<MarketContext> {
        let market = self.state.read().market.clone();
        Ok(MarketContext {
            vix: market.vix,
            term_structure: market.term_structure,
            recession_probability: market.recession_probability,
            spx_price: market.spx_price,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl WhatIfSimulator for PaperBroker {
    async fn simulate(&self, order: &Order) -> Result<SimulationResult> {
        let state = self.state.read();
        let mut margin = Decimal::ZERO;
        let mut change = GreekChange::default();
        let mut units = Decimal::ZERO;

        for leg in order.legs() {
            let (Some(leg_margin), Some(unit)) = (Self::leg_margin(&state, leg), state.unit_greeks(leg))
            else {
                return Ok(SimulationResult::failed(format!(
                    "no paper model for {}",
                    leg.describe()
                )));
            };
            let leg_change = scale(&unit, Decimal::from(signed_quantity(leg)));
            margin += leg_margin;
            change.spx_delta += leg_change.spx_delta;
            change.gamma += leg_change.gamma;
            change.theta += leg_change.theta;
            change.vega += leg_change.vega;
            units += Decimal::from(leg.quantity);
        }

        let fees = units * state.commission_per_unit;
        debug!(order_id = %order.id, %margin, %fees, "Paper what-if");
        Ok(SimulationResult {
            margin_requirement: margin,
            equity_before: state.account.net_liquidation,
            equity_after: state.account.net_liquidation - fees,
            greek_change: Some(change),
            error: None,
        })
    }
}

#[async_trait]
impl OrderGateway for PaperBroker {
    async fn submit(&self, order: &Order, route: SubmissionRoute) -> Result<BrokerAck> {
        Ok(self.place(order, route, PaperOrderState::Transmitted))
    }

    async fn stage(&self, order: &Order, route: SubmissionRoute) -> Result<BrokerAck> {
        Ok(self.place(order, route, PaperOrderState::Staged))
    }

    async fn transmit(&self, broker_order_id: &str) -> Result<()> {
        let mut orders = self.orders.lock();
        match orders.get_mut(broker_order_id) {
            Some(o) if o.state == PaperOrderState::Staged => {
                o.state = PaperOrderState::Transmitted;
                info!(broker_order_id, "Paper staged order transmitted");
                Ok(())
            }
            Some(o) => Err(RiskError::collaborator(
                "transmit",
                format!("order {broker_order_id} is {:?}, not staged", o.state),
            )),
            None => Err(RiskError::collaborator(
                "transmit",
                format!("unknown order {broker_order_id}"),
            )),
        }
    }

    async fn cancel(&self, broker_order_id: &str) -> Result<()> {
        let mut orders = self.orders.lock();
        let Some(o) = orders.get_mut(broker_order_id) else {
            return Err(RiskError::collaborator(
                "cancel",
                format!("unknown order {broker_order_id}"),
            ));
        };
        if matches!(o.state, PaperOrderState::Staged | PaperOrderState::Transmitted) {
            o.state = PaperOrderState::Cancelled;
            info!(broker_order_id, "Paper order cancelled");
        }
        Ok(())
    }

    async fn poll_status(&self, broker_order_id: &str) -> Result<Option<BrokerOrderStatus>> {
        let mode = self.state.read().fill_mode;
        let filled_legs = {
            let mut orders = self.orders.lock();
            let Some(o) = orders.get_mut(broker_order_id) else {
                return Ok(None);
            };
            match (o.state, mode) {
                (PaperOrderState::Staged, _) => return Ok(Some(BrokerOrderStatus::Working)),
                (PaperOrderState::Filled, _) => return Ok(Some(BrokerOrderStatus::Filled)),
                (PaperOrderState::Rejected, _) => return Ok(Some(BrokerOrderStatus::Rejected)),
                (PaperOrderState::Cancelled, _) => return Ok(Some(BrokerOrderStatus::Cancelled)),
                (PaperOrderState::Transmitted, FillMode::Work) => {
                    return Ok(Some(BrokerOrderStatus::Working))
                }
                (PaperOrderState::Transmitted, FillMode::Silent) => return Ok(None),
                (PaperOrderState::Transmitted, FillMode::Reject) => {
                    o.state = PaperOrderState::Rejected;
                    return Ok(Some(BrokerOrderStatus::Rejected));
                }
                (PaperOrderState::Transmitted, FillMode::Fill) => {
                    o.state = PaperOrderState::Filled;
                    o.legs.clone()
                }
            }
        };

        self.apply_fill(&filled_legs);
        info!(broker_order_id, legs = filled_legs.len(), "Paper fill applied");
        Ok(Some(BrokerOrderStatus::Filled))
    }
}
