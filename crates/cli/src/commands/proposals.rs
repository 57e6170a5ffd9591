//! Human review of persisted hedge proposals.

use anyhow::Result;
use clap::{Args, Subcommand};

use riskdesk_core::{Order, ProposedTrade};
use riskdesk_engine::ProposalStore;

use crate::desk::{Desk, DeskArgs};

#[derive(Subcommand, Debug)]
pub enum ProposalsCommand {
    /// List pending proposals, or recent history with --all
    List(ListArgs),
    /// Approve a pending proposal and create a DRAFT order from it
    Approve {
        /// Proposal id
        id: i64,
    },
    /// Reject a pending proposal
    Reject {
        /// Proposal id
        id: i64,
    },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Include decided and superseded proposals
    #[arg(long)]
    pub all: bool,

    /// Maximum rows with --all
    #[arg(long, default_value = "20")]
    pub limit: u32,
}

pub async fn run_proposals(args: &DeskArgs, cmd: ProposalsCommand) -> Result<()> {
    let desk = Desk::open(args).await?;
    let account_id = desk.config.proposer.account_id.clone();

    match cmd {
        ProposalsCommand::List(list) => {
            let proposals = if list.all {
                desk.store.history(&account_id, list.limit).await?
            } else {
                desk.store.pending(&account_id).await?
            };
            if proposals.is_empty() {
                println!("No proposals for {account_id}");
            }
            for p in &proposals {
                print_proposal(p);
            }
        }
        ProposalsCommand::Approve { id } => {
            let approved = desk.store.approve(id).await?;
            tracing::info!(proposal_id = id, "Proposal approved");
            let order = Order::from_proposal(&approved)?;
            desk.workflow().create(&order).await?;
            print_proposal(&approved);
            println!("\nDRAFT order {} created. Next: riskdesk order simulate {}", order.id, order.id);
        }
        ProposalsCommand::Reject { id } => {
            let rejected = desk.store.reject(id).await?;
            tracing::info!(proposal_id = id, "Proposal rejected");
            print_proposal(&rejected);
        }
    }
    Ok(())
}

fn print_proposal(p: &ProposedTrade) {
    let legs: Vec<String> = p.candidate.legs.iter().map(|l| l.describe()).collect();
    let margin = p
        .candidate
        .impact
        .as_ref()
        .map_or_else(|| "-".to_string(), |i| i.margin_impact.round_dp(2).to_string());
    let score = p
        .candidate
        .score
        .map_or_else(|| "-".to_string(), |s| s.round_dp(4).to_string());
    println!(
        "[{}] {} #{} {} {:?} for {}: {}  margin {margin}  score {score}",
        p.id,
        p.status,
        p.rank,
        p.created_at.format("%Y-%m-%d %H:%M"),
        p.candidate.strategy,
        p.candidate.target,
        legs.join(" / ")
    );
    println!("      {}", p.candidate.justification);
}
