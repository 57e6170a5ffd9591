//! Order workflows over the canonical order state machine.
//!
//! Direct submission (SIMULATED -> PENDING) and broker staging
//! (SIMULATED -> STAGED -> SUBMITTED -> PENDING) are two call sites of the
//! same [`Order`] state machine and end in the same terminal states.
//!
//! # Safety Guarantees
//!
//! 1. **Simulate before submit** - every transmitting call checks that the
//!    order is SIMULATED before any network call is made.
//! 2. **Human confirmation** - transmitting calls take a
//!    [`HumanConfirmation`] bound to the order. Nothing in this module
//!    constructs one, and no timer or scheduler calls these methods.
//! 3. **No guessed fills** - status polling is bounded; when the broker cannot
//!    say, the order stays PENDING and is reported as unverified.
//! 4. **Compensation** - a staged order that cannot be persisted is cancelled
//!    at the broker and the persistence error is re-raised.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use riskdesk_core::{
    with_timeout, BrokerOrderStatus, HumanConfirmation, Order, OrderGateway, OrderStatus, Result,
    RiskError, SimulationResult, SubmissionRoute, TimeoutConfig, WhatIfSimulator,
};

use crate::store::{JournalEntry, ProposalStore};

/// What the broker accepted for a transmitted or staged order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub broker_order_id: String,
    pub route: SubmissionRoute,
    /// False when legs went out independently and may fill separately.
    pub atomic: bool,
}

/// Result of bounded status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillOutcome {
    /// The broker reported a terminal status.
    Settled(OrderStatus),
    /// Polling ran out of time; the order keeps its last known status and
    /// needs manual verification.
    Unverified(OrderStatus),
}

/// Drives individual orders through simulation, transmission and fills.
#[derive(Clone)]
pub struct OrderWorkflow {
    simulator: Arc<dyn WhatIfSimulator>,
    gateway: Arc<dyn OrderGateway>,
    store: Arc<dyn ProposalStore>,
    timeouts: TimeoutConfig,
}

impl OrderWorkflow {
    pub fn new(
        simulator: Arc<dyn WhatIfSimulator>,
        gateway: Arc<dyn OrderGateway>,
        store: Arc<dyn ProposalStore>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            simulator,
            gateway,
            store,
            timeouts,
        }
    }

    /// Persists a freshly built DRAFT order.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` if the order is not DRAFT, or `Persistence`.
    pub async fn create(&self, order: &Order) -> Result<()> {
        order.ensure_status(OrderStatus::Draft)?;
        self.record(order, None, &format!("created: {}", order.rationale))
            .await
    }

    /// Runs a read-only what-if and moves DRAFT -> SIMULATED on success.
    ///
    /// Collaborator failures and timeouts come back as a failed
    /// [`SimulationResult`] with the order left in DRAFT.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` if the order is not DRAFT, or `Persistence`
    /// if the simulated order cannot be saved.
    pub async fn simulate(&self, order: &mut Order) -> Result<SimulationResult> {
        order.ensure_status(OrderStatus::Draft)?;

        let result = match with_timeout(
            "what_if",
            self.timeouts.what_if(),
            self.simulator.simulate(order),
        )
        .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "What-if simulation failed");
                SimulationResult::failed(e.to_string())
            }
        };

        if !result.is_ok() {
            tracing::warn!(
                order_id = %order.id,
                error = ?result.error,
                "Simulation rejected, order stays DRAFT"
            );
            return Ok(result);
        }

        order.record_simulation(result.clone())?;
        tracing::info!(
            order_id = %order.id,
            margin = %result.margin_requirement,
            "Order simulated"
        );
        self.record(order, Some(OrderStatus::Draft), "what-if simulated")
            .await?;
        Ok(result)
    }

    /// Transmits a SIMULATED order for execution (SIMULATED -> PENDING).
    ///
    /// # Errors
    /// Returns `PreconditionFailed` before any network call if the order is
    /// not SIMULATED or the confirmation belongs to another order. Gateway
    /// failures and timeouts leave the order SIMULATED.
    pub async fn submit_live(
        &self,
        order: &mut Order,
        confirmation: &HumanConfirmation,
    ) -> Result<SubmissionReceipt> {
        Self::check_gate(order, confirmation, OrderStatus::Simulated)?;
        let route = Self::announce_route(order);

        let ack = with_timeout(
            "submit",
            self.timeouts.submit(),
            self.gateway.submit(order, route),
        )
        .await?;

        order.confirm_transmission(confirmation, OrderStatus::Pending, ack.broker_order_id.clone())?;
        tracing::info!(
            order_id = %order.id,
            broker_order_id = %ack.broker_order_id,
            operator = confirmation.operator(),
            ?route,
            "Order transmitted"
        );

        if let Err(e) = self
            .record(
                order,
                Some(OrderStatus::Simulated),
                &format!("transmitted, confirmed by {}", confirmation.operator()),
            )
            .await
        {
            tracing::error!(
                order_id = %order.id,
                broker_order_id = %ack.broker_order_id,
                error = %e,
                "Live order transmitted but not persisted, reconcile manually"
            );
            return Err(e);
        }

        Ok(SubmissionReceipt {
            atomic: ack.route.is_atomic(),
            broker_order_id: ack.broker_order_id,
            route: ack.route,
        })
    }

    /// Places a SIMULATED order at the broker without transmitting it.
    ///
    /// # Errors
    /// Same gate as [`OrderWorkflow::submit_live`]. If the staged order cannot
    /// be persisted it is cancelled at the broker and `Persistence` is returned.
    pub async fn stage(
        &self,
        order: &mut Order,
        confirmation: &HumanConfirmation,
    ) -> Result<SubmissionReceipt> {
        Self::check_gate(order, confirmation, OrderStatus::Simulated)?;
        let route = Self::announce_route(order);

        let ack = with_timeout(
            "stage",
            self.timeouts.submit(),
            self.gateway.stage(order, route),
        )
        .await?;
        order.confirm_transmission(confirmation, OrderStatus::Staged, ack.broker_order_id.clone())?;

        if let Err(e) = self
            .record(order, Some(OrderStatus::Simulated), "staged at broker")
            .await
        {
            tracing::error!(
                order_id = %order.id,
                broker_order_id = %ack.broker_order_id,
                error = %e,
                "Failed to persist staged order, cancelling at broker"
            );
            match with_timeout(
                "cancel",
                self.timeouts.submit(),
                self.gateway.cancel(&ack.broker_order_id),
            )
            .await
            {
                Ok(()) => {
                    order.transition(OrderStatus::Cancelled)?;
                }
                Err(cancel_err) => tracing::error!(
                    broker_order_id = %ack.broker_order_id,
                    error = %cancel_err,
                    "Compensating cancel failed, staged order needs manual reconciliation"
                ),
            }
            return Err(e);
        }

        tracing::info!(order_id = %order.id, broker_order_id = %ack.broker_order_id, "Order staged");
        Ok(SubmissionReceipt {
            atomic: ack.route.is_atomic(),
            broker_order_id: ack.broker_order_id,
            route: ack.route,
        })
    }

    /// Transmits a staged order (STAGED -> SUBMITTED -> PENDING).
    ///
    /// # Errors
    /// Returns `PreconditionFailed` before any network call unless the order
    /// is STAGED and the confirmation is bound to it.
    pub async fn transmit_staged(
        &self,
        order: &mut Order,
        confirmation: &HumanConfirmation,
    ) -> Result<()> {
        Self::check_gate(order, confirmation, OrderStatus::Staged)?;
        let broker_order_id = order
            .broker_order_id()
            .ok_or_else(|| RiskError::PreconditionFailed(format!("order {} has no broker id", order.id)))?
            .to_string();

        with_timeout(
            "transmit",
            self.timeouts.submit(),
            self.gateway.transmit(&broker_order_id),
        )
        .await?;

        order.transition(OrderStatus::Submitted)?;
        self.record(order, Some(OrderStatus::Staged), &format!("transmitted by {}", confirmation.operator()))
            .await?;
        order.transition(OrderStatus::Pending)?;
        self.record(order, Some(OrderStatus::Submitted), "working at broker")
            .await?;
        Ok(())
    }

    /// Polls the broker until a terminal status or the poll budget runs out.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` if the order was never transmitted, a
    /// transition error if the broker reports an impossible status, or
    /// `Persistence`.
    pub async fn await_fill(&self, order: &mut Order) -> Result<FillOutcome> {
        if !matches!(
            order.status(),
            OrderStatus::Submitted | OrderStatus::Pending | OrderStatus::PartialFill
        ) {
            return Err(RiskError::PreconditionFailed(format!(
                "order {} is {} and has nothing to poll",
                order.id,
                order.status()
            )));
        }
        let broker_order_id = order
            .broker_order_id()
            .ok_or_else(|| RiskError::PreconditionFailed(format!("order {} has no broker id", order.id)))?
            .to_string();

        let deadline = Instant::now() + self.timeouts.poll();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match with_timeout(
                "poll_status",
                remaining,
                self.gateway.poll_status(&broker_order_id),
            )
            .await
            {
                Ok(Some(status)) => {
                    self.apply_broker_status(order, status).await?;
                    if order.status().is_terminal() {
                        tracing::info!(order_id = %order.id, status = %order.status(), "Order settled");
                        return Ok(FillOutcome::Settled(order.status()));
                    }
                }
                Ok(None) => {
                    tracing::debug!(order_id = %order.id, "Broker status unknown");
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Status poll failed");
                }
            }
            sleep(self.timeouts.poll_interval().min(deadline.saturating_duration_since(Instant::now())))
                .await;
        }

        tracing::warn!(
            order_id = %order.id,
            broker_order_id = %broker_order_id,
            status = %order.status(),
            "Order status unverified after polling budget, verify manually"
        );
        Ok(FillOutcome::Unverified(order.status()))
    }

    /// Cancels a non-terminal order, at the broker first if it was sent.
    ///
    /// # Errors
    /// Returns a transition error for orders that cannot be cancelled, or the
    /// gateway error (order unchanged).
    pub async fn cancel(&self, order: &mut Order) -> Result<()> {
        let from = order.status();
        if !riskdesk_core::order::is_allowed(from, OrderStatus::Cancelled) {
            return Err(RiskError::transition(from, OrderStatus::Cancelled));
        }
        if let Some(id) = order.broker_order_id().map(ToString::to_string) {
            with_timeout("cancel", self.timeouts.submit(), self.gateway.cancel(&id)).await?;
        }
        order.transition(OrderStatus::Cancelled)?;
        self.record(order, Some(from), "cancelled").await
    }

    async fn apply_broker_status(&self, order: &mut Order, status: BrokerOrderStatus) -> Result<()> {
        let Some(target) = status.as_order_status() else {
            if order.status() == OrderStatus::Submitted {
                order.transition(OrderStatus::Pending)?;
                self.record(order, Some(OrderStatus::Submitted), "working at broker")
                    .await?;
            }
            return Ok(());
        };
        if target == order.status() {
            return Ok(());
        }
        if order.status() == OrderStatus::Submitted && target != OrderStatus::Rejected {
            order.transition(OrderStatus::Pending)?;
            self.record(order, Some(OrderStatus::Submitted), "working at broker")
                .await?;
        }
        let from = order.status();
        order.transition(target)?;
        self.record(order, Some(from), &format!("broker reported {status:?}"))
            .await
    }

    fn check_gate(order: &Order, confirmation: &HumanConfirmation, expected: OrderStatus) -> Result<()> {
        order.ensure_status(expected)?;
        if confirmation.order_id() != order.id {
            return Err(RiskError::PreconditionFailed(format!(
                "confirmation for order {} cannot transmit order {}",
                confirmation.order_id(),
                order.id
            )));
        }
        Ok(())
    }

    fn announce_route(order: &Order) -> SubmissionRoute {
        let route = order.submission_route();
        if route == SubmissionRoute::PerLeg {
            tracing::warn!(
                order_id = %order.id,
                legs = order.legs().len(),
                "Not every leg has a resolved instrument id; legs go out independently and may fill separately"
            );
        }
        route
    }

    async fn record(&self, order: &Order, from: Option<OrderStatus>, note: &str) -> Result<()> {
        let budget = self.timeouts.database();
        with_timeout("save_order", budget, self.store.save_order(order))
            .await
            .map_err(into_persistence)?;
        let entry = JournalEntry::new(order.id, from, order.status(), note);
        with_timeout("append_journal", budget, self.store.append_journal(&entry))
            .await
            .map_err(into_persistence)
    }
}

fn into_persistence(err: RiskError) -> RiskError {
    match err {
        RiskError::Persistence(_) => err,
        other => RiskError::Persistence(other.to_string()),
    }
}
