//! Proposer loop and one-shot check.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use riskdesk_core::RiskLimitWatcher;
use riskdesk_engine::{CycleOutcome, CycleReport, ProposerOrchestrator};

use crate::desk::{Desk, DeskArgs};

/// Runs the proposer on its interval until SIGINT or SIGTERM.
pub async fn run_proposer(args: &DeskArgs) -> Result<()> {
    let desk = Desk::open(args).await?;
    let (watcher, limits_rx) =
        RiskLimitWatcher::new(&desk.config.risk_limits_path, desk.limits.clone());
    let orchestrator = ProposerOrchestrator::new(
        desk.config.clone(),
        limits_rx,
        desk.collaborators()?,
        desk.store.clone(),
    );

    let watch_handle = tokio::spawn(async move {
        if let Err(e) = watcher.watch().await {
            tracing::error!(error = %e, "Risk limit watcher stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_handle = tokio::spawn(async move {
        wait_for_shutdown().await;
        let _ = shutdown_tx.send(true);
    });

    orchestrator.run(shutdown_rx).await?;

    watch_handle.abort();
    signal_handle.abort();
    desk.persist_broker()?;
    tracing::info!("Proposer stopped");
    Ok(())
}

/// Runs one cycle and prints what it found.
pub async fn run_check(args: &DeskArgs, json: bool) -> Result<()> {
    let desk = Desk::open(args).await?;
    let (_tx, limits_rx) = watch::channel(Arc::new(desk.limits.clone()));
    let orchestrator = ProposerOrchestrator::new(
        desk.config.clone(),
        limits_rx,
        desk.collaborators()?,
        desk.store.clone(),
    );

    match orchestrator.run_cycle().await? {
        CycleOutcome::Healthy(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary("HEALTHY", &report);
            }
        }
        CycleOutcome::Proposed(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_summary("BREACHED", &report);
                print_proposals(&report);
            }
        }
        CycleOutcome::Degraded { stage, error } => {
            anyhow::bail!("Cycle degraded at {stage:?}: {error}");
        }
    }
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (Ok(mut sigterm), Ok(mut sigint)) =
            (signal(SignalKind::terminate()), signal(SignalKind::interrupt()))
        else {
            tracing::warn!("Signal handlers unavailable, falling back to Ctrl+C");
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn print_summary(label: &str, report: &CycleReport) {
    let g = &report.greeks;
    let l = &report.limits;
    println!("=== {label}: {} ({}) ===", report.account_id, report.regime);
    println!(
        "  VIX {}  term structure {}  NLV {}",
        report.market.vix, report.market.term_structure, report.account.net_liquidation
    );
    println!("  delta {:>12}  limit +/-{}", g.spx_delta.round_dp(2), l.max_delta.round_dp(2));
    println!("  vega  {:>12}  limit {}", g.vega.round_dp(2), l.max_negative_vega.round_dp(2));
    println!("  theta {:>12}  min   {}", g.theta.round_dp(2), l.min_theta.round_dp(2));
    println!("  gamma {:>12}  limit +/-{}", g.gamma.round_dp(4), l.max_gamma.round_dp(4));
    if let (Some(ratio), Some(band)) = (g.sebastian_ratio(), g.theta_vega_band()) {
        println!("  theta/vega {} ({band:?})", ratio.round_dp(3));
    }
    for breach in &report.breaches {
        println!(
            "  BREACH {:?} {}: {} vs {}",
            breach.severity, breach.metric, breach.current, breach.limit
        );
    }
}

fn print_proposals(report: &CycleReport) {
    if report.proposals.is_empty() {
        println!("\n  No viable hedge for the breaches above.");
        return;
    }
    println!("\n  Proposals (pending review):");
    for p in &report.proposals {
        let legs: Vec<String> = p.candidate.legs.iter().map(|l| l.describe()).collect();
        let score = p
            .candidate
            .score
            .map_or_else(|| "-".to_string(), |s| s.round_dp(4).to_string());
        println!(
            "  #{} [{}] {:?} {}  score {score}",
            p.rank,
            p.id,
            p.candidate.strategy,
            legs.join(" / ")
        );
    }
    if let Some(advisory) = &report.advisory {
        println!("\n  Commentary: {}", advisory.commentary);
    }
}
