//! Close-all-short-options safety batch.
//!
//! A flatten needs its own [`FlattenConfirmation`]; a single-order
//! confirmation cannot authorise it. Orders in the batch are submitted
//! concurrently and each one stands alone: a failure never rolls back the
//! others.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use riskdesk_core::{
    HumanConfirmation, LegAction, Order, OrderLeg, OrderType, Position, Result, RiskError,
};

use crate::lifecycle::{OrderWorkflow, SubmissionReceipt};

/// Operator sign-off for one flatten batch, bound to the ids of the
/// orders the operator reviewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenConfirmation {
    operator: String,
    order_ids: BTreeSet<Uuid>,
    confirmed_at: DateTime<Utc>,
}

impl FlattenConfirmation {
    /// Records that `operator` reviewed exactly these closing orders.
    ///
    /// # Errors
    /// Returns `PreconditionFailed` unless `acknowledged` is set and the operator is named.
    pub fn acknowledge(operator: &str, orders: &[Order], acknowledged: bool) -> Result<Self> {
        if !acknowledged {
            return Err(RiskError::PreconditionFailed(
                "flatten requires its own explicit confirmation".to_string(),
            ));
        }
        if operator.trim().is_empty() {
            return Err(RiskError::PreconditionFailed(
                "flatten confirmation requires an operator".to_string(),
            ));
        }
        Ok(Self {
            operator: operator.trim().to_string(),
            order_ids: orders.iter().map(|o| o.id).collect(),
            confirmed_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn operator(&self) -> &str {
        &self.operator
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.order_ids.len()
    }

    /// True if `orders` is exactly the reviewed batch.
    #[must_use]
    pub fn covers(&self, orders: &[Order]) -> bool {
        orders.len() == self.order_ids.len() && orders.iter().all(|o| self.order_ids.contains(&o.id))
    }

    #[must_use]
    pub fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }
}

/// Outcome of one order in a flatten batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenResult {
    pub order_id: Uuid,
    pub description: String,
    pub receipt: Option<SubmissionReceipt>,
    pub error: Option<String>,
}

/// One market closing order per short option position.
#[must_use]
pub fn build_flatten_batch(account_id: &str, positions: &[Position]) -> Vec<Order> {
    positions
        .iter()
        .filter(|p| p.is_short_option())
        .filter_map(|p| {
            let (strike, expiry, right) = (p.strike?, p.expiry?, p.right?);
            let mut leg = OrderLeg::option(
                &p.symbol,
                LegAction::Buy,
                p.quantity.unsigned_abs(),
                strike,
                expiry,
                right,
            );
            leg.conid = p.conid;
            match Order::new(
                account_id,
                vec![leg],
                OrderType::Market,
                format!("flatten: close {}", p.display_name()),
            ) {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::warn!(position = %p.display_name(), error = %e, "Skipping unflattenable position");
                    None
                }
            }
        })
        .collect()
}

/// Simulates and submits every order in the batch concurrently.
///
/// # Errors
/// Returns `PreconditionFailed` before any order is touched if the
/// confirmation was given for a different batch. Per-order failures are
/// reported in the results, not as an error.
pub async fn execute_flatten(
    workflow: &OrderWorkflow,
    orders: Vec<Order>,
    confirmation: &FlattenConfirmation,
) -> Result<Vec<FlattenResult>> {
    if !confirmation.covers(&orders) {
        return Err(RiskError::PreconditionFailed(format!(
            "flatten confirmation covers {} reviewed orders, not this batch of {}",
            confirmation.order_count(),
            orders.len()
        )));
    }
    tracing::warn!(
        operator = confirmation.operator(),
        orders = orders.len(),
        "Flattening all short option positions"
    );

    let tasks = orders.into_iter().map(|mut order| async move {
        let description = order.rationale.clone();
        let outcome = submit_one(workflow, &mut order, confirmation.operator()).await;
        match outcome {
            Ok(receipt) => FlattenResult {
                order_id: order.id,
                description,
                receipt: Some(receipt),
                error: None,
            },
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "Flatten order failed");
                FlattenResult {
                    order_id: order.id,
                    description,
                    receipt: None,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    Ok(join_all(tasks).await)
}

async fn submit_one(
    workflow: &OrderWorkflow,
    order: &mut Order,
    operator: &str,
) -> Result<SubmissionReceipt> {
    workflow.create(order).await?;
    let simulation = workflow.simulate(order).await?;
    if let Some(err) = simulation.error {
        return Err(RiskError::collaborator("what_if", err));
    }
    // Covered by the batch-level flatten confirmation.
    let confirmation = HumanConfirmation::acknowledge(order.id, operator, true)?;
    workflow.submit_live(order, &confirmation).await
}
