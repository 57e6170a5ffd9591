//! Emergency flatten of every short option position.
//!
//! Takes its own `--confirm-flatten` flag. The per-order `--confirm` flag is
//! deliberately not accepted here.

use anyhow::Result;
use clap::Args;

use riskdesk_core::GreeksFeed;
use riskdesk_engine::{build_flatten_batch, execute_flatten, FlattenConfirmation};

use crate::desk::{Desk, DeskArgs};

#[derive(Args, Debug)]
pub struct FlattenArgs {
    /// Operator confirming the flatten
    #[arg(long, env = "RISKDESK_OPERATOR")]
    pub operator: String,

    /// Confirms closing every short option position at market
    #[arg(long)]
    pub confirm_flatten: bool,

    /// Rejected: single-order confirmation does not authorise a flatten
    #[arg(long, hide = true)]
    pub confirm: bool,

    /// List the closing orders without sending anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Checks the flag combination before anything is loaded.
pub fn check_flags(args: &FlattenArgs) -> Result<()> {
    if args.confirm && !args.confirm_flatten {
        anyhow::bail!("flatten requires --confirm-flatten; --confirm does not authorise a flatten");
    }
    if !args.confirm_flatten && !args.dry_run {
        anyhow::bail!("flatten requires --confirm-flatten (or --dry-run to preview)");
    }
    Ok(())
}

pub async fn run_flatten(args: &DeskArgs, flatten: FlattenArgs) -> Result<()> {
    check_flags(&flatten)?;
    let desk = Desk::open(args).await?;
    let account_id = desk.config.proposer.account_id.clone();

    let positions = desk.broker.fetch_positions(&account_id).await?;
    let batch = build_flatten_batch(&account_id, &positions);
    if batch.is_empty() {
        println!("No short option positions to flatten for {account_id}");
        return Ok(());
    }

    println!("Flatten batch for {account_id}: {} orders", batch.len());
    for order in &batch {
        println!("  {}", order.rationale);
    }
    if flatten.dry_run {
        println!("\nDry run, nothing sent.");
        return Ok(());
    }

    let confirmation =
        FlattenConfirmation::acknowledge(&flatten.operator, &batch, flatten.confirm_flatten)?;
    let results = execute_flatten(&desk.workflow(), batch, &confirmation).await?;

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    for r in &results {
        match (&r.receipt, &r.error) {
            (Some(receipt), _) => println!(
                "  SENT   {} as {} ({:?})",
                r.description, receipt.broker_order_id, receipt.route
            ),
            (None, Some(error)) => println!("  FAILED {}: {error}", r.description),
            (None, None) => println!("  ?      {}", r.description),
        }
    }
    desk.persist_broker()?;

    if failed > 0 {
        anyhow::bail!("{failed} of {} flatten orders failed", results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(confirm: bool, confirm_flatten: bool, dry_run: bool) -> FlattenArgs {
        FlattenArgs {
            operator: "desk-lead".to_string(),
            confirm_flatten,
            confirm,
            dry_run,
        }
    }

    #[test]
    fn single_order_confirm_is_rejected() {
        let err = check_flags(&args(true, false, false)).unwrap_err();
        assert!(err.to_string().contains("--confirm-flatten"));
    }

    #[test]
    fn no_flags_is_rejected() {
        assert!(check_flags(&args(false, false, false)).is_err());
    }

    #[test]
    fn flatten_flag_or_dry_run_passes() {
        assert!(check_flags(&args(false, true, false)).is_ok());
        assert!(check_flags(&args(true, true, false)).is_ok());
        assert!(check_flags(&args(false, false, true)).is_ok());
    }
}
