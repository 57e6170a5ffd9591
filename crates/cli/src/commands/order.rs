//! Order simulation, staging and live submission.
//!
//! Transmitting commands refuse to run without `--confirm` and a named
//! operator; the confirmation is bound to the single order id given.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use riskdesk_core::{HumanConfirmation, Order};
use riskdesk_engine::{FillOutcome, ProposalStore};

use crate::desk::{Desk, DeskArgs};

#[derive(Subcommand, Debug)]
pub enum OrderCommand {
    /// Run a read-only what-if for a DRAFT order
    Simulate {
        /// Order id
        id: Uuid,
    },
    /// Transmit a SIMULATED order and wait for the fill
    Submit(TransmitArgs),
    /// Place a SIMULATED order at the broker without transmitting it
    Stage(TransmitArgs),
    /// Cancel a working or staged order
    Cancel {
        /// Order id
        id: Uuid,
    },
    /// Show an order and its journal
    Show {
        /// Order id
        id: Uuid,
    },
}

#[derive(Args, Debug)]
pub struct TransmitArgs {
    /// Order id
    pub id: Uuid,

    /// Operator confirming the order
    #[arg(long, env = "RISKDESK_OPERATOR")]
    pub operator: String,

    /// Explicit confirmation; nothing is sent without it
    #[arg(long)]
    pub confirm: bool,
}

pub async fn run_order(args: &DeskArgs, cmd: OrderCommand) -> Result<()> {
    let desk = Desk::open(args).await?;
    let workflow = desk.workflow();

    match cmd {
        OrderCommand::Simulate { id } => {
            let mut order = load(&desk, id).await?;
            let result = workflow.simulate(&mut order).await?;
            if let Some(error) = &result.error {
                println!("Simulation failed, order stays {}: {error}", order.status());
            } else {
                println!("Order {} is {}", order.id, order.status());
                println!("  margin requirement {}", result.margin_requirement.round_dp(2));
                println!(
                    "  equity {} -> {}",
                    result.equity_before.round_dp(2),
                    result.equity_after.round_dp(2)
                );
                if let Some(change) = &result.greek_change {
                    println!(
                        "  delta {:+}  vega {:+}  theta {:+}  gamma {:+}",
                        change.spx_delta.round_dp(2),
                        change.vega.round_dp(2),
                        change.theta.round_dp(2),
                        change.gamma.round_dp(4)
                    );
                }
            }
        }
        OrderCommand::Submit(t) => {
            let mut order = load(&desk, t.id).await?;
            let confirmation = HumanConfirmation::acknowledge(order.id, &t.operator, t.confirm)?;
            let receipt = workflow.submit_live(&mut order, &confirmation).await?;
            if !receipt.atomic {
                println!("WARNING: legs were sent independently and may fill separately");
            }
            println!("Transmitted as {} ({:?})", receipt.broker_order_id, receipt.route);

            match workflow.await_fill(&mut order).await? {
                FillOutcome::Settled(status) => println!("Order {} settled: {status}", order.id),
                FillOutcome::Unverified(status) => println!(
                    "Order {} status unknown, still {status}. Verify manually at the broker.",
                    order.id
                ),
            }
            desk.persist_broker()?;
        }
        OrderCommand::Stage(t) => {
            let mut order = load(&desk, t.id).await?;
            let confirmation = HumanConfirmation::acknowledge(order.id, &t.operator, t.confirm)?;
            let receipt = workflow.stage(&mut order, &confirmation).await?;
            println!(
                "Staged as {} ({:?}). Transmit from the broker when ready.",
                receipt.broker_order_id, receipt.route
            );
        }
        OrderCommand::Cancel { id } => {
            let mut order = load(&desk, id).await?;
            workflow.cancel(&mut order).await?;
            println!("Order {} is {}", order.id, order.status());
        }
        OrderCommand::Show { id } => {
            let order = load(&desk, id).await?;
            println!("{}", serde_json::to_string_pretty(&order)?);
            for entry in desk.store.journal(id).await? {
                println!(
                    "  {} {} -> {}  {}",
                    entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                    entry
                        .from_status
                        .map_or_else(|| "-".to_string(), |s| s.to_string()),
                    entry.to_status,
                    entry.note
                );
            }
        }
    }
    Ok(())
}

async fn load(desk: &Desk, id: Uuid) -> Result<Order> {
    desk.store
        .load_order(id)
        .await?
        .with_context(|| format!("Order {id} not found"))
}
