//! Proposer service loop: fetch, classify, resolve, detect, generate, rank,
//! persist, notify.
//!
//! Each cycle works on a fresh Greeks snapshot and one `Arc` snapshot of the
//! risk-limit matrix. Collaborator failures end the cycle as
//! [`CycleOutcome::Degraded`], which is never confused with a healthy cycle
//! that found no breaches.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use riskdesk_core::{
    with_timeout, AccountSnapshot, AccountSummary, AdvisoryProvider, AdvisorySnapshot, AppConfig,
    BreachEvent, CandidateTrade, GreeksFeed, MarketContext, MarketContextFeed, Notifier, Order,
    OrderType, PortfolioGreeks, PositionGreeks, ProposedTrade, Regime, Result, RiskError,
    RiskLimitMatrix, TradeImpact, WhatIfSimulator,
};

use crate::advisory::{fetch_advisory, AdvisoryResponse};
use crate::alerts::{build_alert, should_notify};
use crate::breach::{BreachDetector, CheckContext};
use crate::candidates::{CandidateGenerator, GenerationInput};
use crate::limits::{ResolvedLimits, RiskLimitResolver};
use crate::regime::RegimeClassifier;
use crate::scoring::{top_n, EfficiencyScorer};
use crate::store::{ProposalStore, MAX_BATCH};

/// External collaborators, constructed once at startup and owned by the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub greeks: Arc<dyn GreeksFeed>,
    pub market: Arc<dyn MarketContextFeed>,
    pub simulator: Arc<dyn WhatIfSimulator>,
    pub notifier: Arc<dyn Notifier>,
    pub advisory: Option<Arc<dyn AdvisoryProvider>>,
}

/// Step at which a degraded cycle stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    FetchAccount,
    FetchGreeks,
    FetchMarket,
    Persist,
}

/// Everything one completed cycle observed and produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub account_id: String,
    pub regime: Regime,
    pub market: MarketContext,
    pub account: AccountSummary,
    pub greeks: PortfolioGreeks,
    pub limits: ResolvedLimits,
    pub breaches: Vec<BreachEvent>,
    pub proposals: Vec<ProposedTrade>,
    pub advisory: Option<AdvisoryResponse>,
    pub notified: bool,
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No limit is breached.
    Healthy(Box<CycleReport>),
    /// Breaches were found; proposals (possibly none) were persisted.
    Proposed(Box<CycleReport>),
    /// A collaborator failed; nothing was proposed this cycle.
    Degraded { stage: CycleStage, error: RiskError },
}

/// Ties the deterministic core to its collaborators each cycle.
pub struct ProposerOrchestrator {
    config: AppConfig,
    limits: watch::Receiver<Arc<RiskLimitMatrix>>,
    collaborators: Collaborators,
    store: Arc<dyn ProposalStore>,
    classifier: RegimeClassifier,
    resolver: RiskLimitResolver,
    detector: BreachDetector,
    generator: CandidateGenerator,
}

impl ProposerOrchestrator {
    pub fn new(
        config: AppConfig,
        limits: watch::Receiver<Arc<RiskLimitMatrix>>,
        collaborators: Collaborators,
        store: Arc<dyn ProposalStore>,
    ) -> Self {
        Self {
            classifier: RegimeClassifier::new(config.regime.clone()),
            resolver: RiskLimitResolver::new(config.scaling.clone()),
            detector: BreachDetector::new(config.breach.clone()),
            generator: CandidateGenerator::new(config.hedging.clone()),
            config,
            limits,
            collaborators,
            store,
        }
    }

    /// Runs cycles on the configured interval until `shutdown` flips to true.
    ///
    /// A slow cycle delays the next tick rather than queueing missed ones.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(
            account_id = %self.config.proposer.account_id,
            interval_secs = self.config.proposer.interval_secs,
            top_n = self.config.proposer.top_n,
            "Proposer started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.proposer.interval_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Proposer shutting down");
                        return Ok(());
                    }
                    continue;
                }
            }

            match self.run_cycle().await {
                Ok(CycleOutcome::Healthy(_)) => {}
                Ok(CycleOutcome::Proposed(report)) => info!(
                    breaches = report.breaches.len(),
                    proposals = report.proposals.len(),
                    notified = report.notified,
                    "Cycle produced proposals"
                ),
                Ok(CycleOutcome::Degraded { stage, error }) => {
                    warn!(?stage, error = %error, "Cycle degraded, no proposals this cycle");
                }
                Err(e) => error!(error = %e, "Cycle failed on a contract violation"),
            }
        }
    }

    /// Runs one cycle end to end.
    ///
    /// # Errors
    /// Returns contract violations (missing regime in the matrix, invalid
    /// entities) directly. Collaborator failures are reported as
    /// [`CycleOutcome::Degraded`].
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let account_id = self.config.proposer.account_id.clone();
        let timeouts = &self.config.timeouts;

        // 1. Fetch
        let account = match with_timeout(
            "fetch_account",
            timeouts.feed(),
            self.collaborators.greeks.fetch_account(&account_id),
        )
        .await
        {
            Ok(a) => a,
            Err(e) => return Ok(degraded(CycleStage::FetchAccount, e)),
        };
        let positions = match self.fetch_positions(&account_id).await {
            Ok(p) => p,
            Err(e) => return Ok(degraded(CycleStage::FetchGreeks, e)),
        };
        let greeks = match self.collaborators.greeks.portfolio_summary(&positions).await {
            Ok(g) => g,
            Err(e) => return Ok(degraded(CycleStage::FetchGreeks, e)),
        };
        let market = match with_timeout(
            "market_context",
            timeouts.feed(),
            self.collaborators.market.market_context(),
        )
        .await
        {
            Ok(m) => m,
            Err(e) => return Ok(degraded(CycleStage::FetchMarket, e)),
        };

        // 2. Classify and resolve against one matrix snapshot
        let regime = self.classifier.classify_context(&market);
        let matrix = Arc::clone(&self.limits.borrow());
        let limits = self.resolver.resolve(
            &matrix,
            regime,
            account.net_liquidation,
            market.vix,
            market.term_structure,
        )?;

        // 3. Detect
        let ctx = CheckContext {
            account_id: account_id.clone(),
            margin_used: account.margin_used,
            regime,
            vix: market.vix,
        };
        let breaches = self.detector.check(&greeks, &limits, &ctx);

        self.record_snapshot(&account, regime, &market).await;

        if breaches.is_empty() {
            // A cleared breach retires whatever hedges are still pending
            if let Err(e) = with_timeout(
                "persist_top3",
                timeouts.database(),
                self.store.persist_top3(&account_id, &[]),
            )
            .await
            {
                return Ok(degraded(CycleStage::Persist, e));
            }
            info!(
                account_id = %account_id,
                %regime,
                delta = %greeks.spx_delta,
                vega = %greeks.vega,
                theta = %greeks.theta,
                "No breaches"
            );
            let mut report = CycleReport {
                account_id,
                regime,
                market,
                account,
                greeks,
                limits,
                breaches,
                proposals: Vec::new(),
                advisory: None,
                notified: false,
            };
            if regime.is_crisis() {
                report.notified = self.notify(&report).await;
            }
            return Ok(CycleOutcome::Healthy(Box::new(report)));
        }

        // 4. Generate, estimate, rank
        let input = GenerationInput {
            account_id: &account_id,
            nlv: account.net_liquidation,
            atm_price: market.spx_price,
            positions: &positions,
            as_of: market.timestamp.date_naive(),
            limits: &limits,
        };
        let generated = self.generator.generate(&breaches, &input);
        let mut candidates = self.estimate_impacts(&account_id, generated).await;
        EfficiencyScorer::new(&self.config.scoring, &greeks, &limits).score_all(&mut candidates);
        let ranked = top_n(candidates, self.config.proposer.top_n.min(MAX_BATCH));

        // 5. Persist
        let proposals = match with_timeout(
            "persist_top3",
            timeouts.database(),
            self.store.persist_top3(&account_id, &ranked),
        )
        .await
        {
            Ok(p) => p,
            Err(e) => return Ok(degraded(CycleStage::Persist, e)),
        };
        if proposals.is_empty() {
            warn!(account_id = %account_id, breaches = breaches.len(), "Breaches with no viable hedge");
        }

        // 6. Advisory and notify
        let advisory = match (&self.collaborators.advisory, self.config.proposer.advisory_enabled) {
            (Some(provider), true) => {
                let snapshot = AdvisorySnapshot {
                    account_id: account_id.clone(),
                    regime,
                    greeks: greeks.clone(),
                    breaches: breaches.clone(),
                };
                Some(fetch_advisory(provider.as_ref(), &snapshot, timeouts.advisory()).await)
            }
            _ => None,
        };

        let mut report = CycleReport {
            account_id,
            regime,
            market,
            account,
            greeks,
            limits,
            breaches,
            proposals,
            advisory,
            notified: false,
        };
        if should_notify(regime, &report.proposals, self.config.proposer.notify_score_threshold) {
            report.notified = self.notify(&report).await;
        }

        Ok(CycleOutcome::Proposed(Box::new(report)))
    }

    async fn fetch_positions(&self, account_id: &str) -> Result<Vec<PositionGreeks>> {
        let timeout = self.config.timeouts.feed();
        let positions = with_timeout(
            "fetch_positions",
            timeout,
            self.collaborators.greeks.fetch_positions(account_id),
        )
        .await?;
        with_timeout(
            "fetch_greeks",
            timeout,
            self.collaborators.greeks.fetch_greeks(positions),
        )
        .await
    }

    /// Replaces pre-estimates with what-if figures where the simulator answers,
    /// then drops candidates that still have no impact.
    async fn estimate_impacts(
        &self,
        account_id: &str,
        candidates: Vec<CandidateTrade>,
    ) -> Vec<CandidateTrade> {
        let mut estimated = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            let order = match Order::new(
                account_id,
                candidate.legs.clone(),
                OrderType::Market,
                candidate.justification.clone(),
            ) {
                Ok(order) => order,
                Err(e) => {
                    warn!(benchmark = %candidate.benchmark, error = %e, "Candidate legs invalid");
                    continue;
                }
            };
            let result = with_timeout(
                "what_if",
                self.config.timeouts.what_if(),
                self.collaborators.simulator.simulate(&order),
            )
            .await;

            match result {
                Ok(sim) if sim.is_ok() => {
                    let change = sim
                        .greek_change
                        .clone()
                        .or_else(|| candidate.impact.as_ref().map(|i| i.change.clone()));
                    if let Some(change) = change {
                        candidate.impact = Some(TradeImpact {
                            margin_impact: sim.margin_requirement,
                            change,
                            simulated: true,
                        });
                    }
                }
                Ok(sim) => warn!(
                    benchmark = %candidate.benchmark,
                    error = ?sim.error,
                    "What-if rejected candidate, keeping pre-estimate"
                ),
                Err(e) => warn!(
                    benchmark = %candidate.benchmark,
                    error = %e,
                    "What-if unavailable, keeping pre-estimate"
                ),
            }

            if candidate.impact.is_some() {
                estimated.push(candidate);
            } else {
                warn!(benchmark = %candidate.benchmark, strategy = ?candidate.strategy, "Dropping candidate without impact estimate");
            }
        }
        estimated
    }

    async fn record_snapshot(&self, account: &AccountSummary, regime: Regime, market: &MarketContext) {
        let snapshot = AccountSnapshot {
            account_id: account.account_id.clone(),
            net_liquidation: account.net_liquidation,
            margin_used: account.margin_used,
            regime,
            vix: market.vix,
            captured_at: Utc::now(),
        };
        if let Err(e) = with_timeout(
            "record_snapshot",
            self.config.timeouts.database(),
            self.store.record_snapshot(&snapshot),
        )
        .await
        {
            warn!(error = %e, "Failed to record account snapshot");
        }
    }

    async fn notify(&self, report: &CycleReport) -> bool {
        let alert = build_alert(
            &report.account_id,
            report.regime,
            &report.breaches,
            &report.proposals,
            report.advisory.as_ref().map(|a| a.commentary.as_str()),
        );
        match with_timeout(
            "notify",
            self.config.timeouts.notify(),
            self.collaborators.notifier.notify(&alert),
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Alert delivery failed");
                false
            }
        }
    }
}

fn degraded(stage: CycleStage, error: RiskError) -> CycleOutcome {
    warn!(?stage, error = %error, "Collaborator failure, cycle degraded");
    CycleOutcome::Degraded { stage, error }
}
