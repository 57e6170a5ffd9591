//! Capital-efficiency scoring and deterministic ranking of hedge candidates.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use riskdesk_core::trade::excess_for;
use riskdesk_core::{BreachMetric, CandidateTrade, GreekChange, PortfolioGreeks, ScoringWeights};

use crate::limits::ResolvedLimits;

/// Scores candidates against the portfolio they would hedge.
///
/// `score = weighted_risk_reduction / (max(margin_impact, 1) + legs * per_leg_fee)`
///
/// The targeted metric contributes its reduction in breach excess, clipped at
/// zero once back inside the limit. Every other metric subtracts its movement
/// toward its own limit, so a hedge that trades one risk for another scores
/// lower than one that does not.
#[derive(Debug, Clone)]
pub struct EfficiencyScorer<'a> {
    weights: &'a ScoringWeights,
    greeks: &'a PortfolioGreeks,
    limits: &'a ResolvedLimits,
}

impl<'a> EfficiencyScorer<'a> {
    #[must_use]
    pub fn new(
        weights: &'a ScoringWeights,
        greeks: &'a PortfolioGreeks,
        limits: &'a ResolvedLimits,
    ) -> Self {
        Self {
            weights,
            greeks,
            limits,
        }
    }

    /// Efficiency score, or `None` if the candidate has no impact estimate.
    #[must_use]
    pub fn score(&self, candidate: &CandidateTrade) -> Option<Decimal> {
        let impact = candidate.impact.as_ref()?;
        let reduction = self.weighted_risk_reduction(candidate.target, &impact.change);
        let legs = Decimal::from(candidate.legs.len());
        let denominator =
            impact.margin_impact.max(Decimal::ONE) + legs * self.weights.per_leg_fee;
        reduction.checked_div(denominator)
    }

    /// Scores every candidate in place; unscorable candidates keep `None`.
    pub fn score_all(&self, candidates: &mut [CandidateTrade]) {
        for candidate in candidates.iter_mut() {
            candidate.score = self.score(candidate);
            tracing::debug!(
                benchmark = %candidate.benchmark,
                strategy = ?candidate.strategy,
                score = ?candidate.score,
                "Scored candidate"
            );
        }
    }

    fn weighted_risk_reduction(&self, target: BreachMetric, change: &GreekChange) -> Decimal {
        let mut total = Decimal::ZERO;
        for metric in [
            BreachMetric::Delta,
            BreachMetric::Vega,
            BreachMetric::Theta,
            BreachMetric::Gamma,
        ] {
            let (value, limit, delta) = self.axis(metric, change);
            let before = excess_for(metric, value, limit);
            let after = excess_for(metric, value + delta, limit);
            if metric == target {
                let improvement = before.max(Decimal::ZERO) - after.max(Decimal::ZERO);
                total += self.weights.primary * improvement;
            } else {
                let worsening = (after - before).max(Decimal::ZERO);
                total -= self.side_weight(metric) * worsening;
            }
        }
        total
    }

    fn axis(&self, metric: BreachMetric, change: &GreekChange) -> (Decimal, Decimal, Decimal) {
        match metric {
            BreachMetric::Delta => (self.greeks.spx_delta, self.limits.max_delta, change.spx_delta),
            BreachMetric::Vega => (self.greeks.vega, self.limits.max_negative_vega, change.vega),
            BreachMetric::Theta => (self.greeks.theta, self.limits.min_theta, change.theta),
            BreachMetric::Gamma => (self.greeks.gamma, self.limits.max_gamma, change.gamma),
        }
    }

    fn side_weight(&self, metric: BreachMetric) -> Decimal {
        match metric {
            BreachMetric::Delta => self.weights.side_delta,
            BreachMetric::Vega => self.weights.side_vega,
            BreachMetric::Theta => self.weights.side_theta,
            BreachMetric::Gamma => self.weights.side_gamma,
        }
    }
}

/// Sorts by score descending, then lower margin impact, then original order.
///
/// Unscored candidates sort after every scored one.
#[must_use]
pub fn rank(mut candidates: Vec<CandidateTrade>) -> Vec<CandidateTrade> {
    candidates.sort_by(compare);
    candidates
}

/// The best `n` candidates by [`rank`].
#[must_use]
pub fn top_n(candidates: Vec<CandidateTrade>, n: usize) -> Vec<CandidateTrade> {
    let mut ranked = rank(candidates);
    ranked.truncate(n);
    ranked
}

fn compare(a: &CandidateTrade, b: &CandidateTrade) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.margin_impact().cmp(&b.margin_impact()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use riskdesk_core::{
        BreachEvent, BreachSeverity, HedgeStrategy, InstrumentKind, LegAction, OrderLeg, Regime,
        TradeImpact,
    };
    use rust_decimal_macros::dec;

    fn limits() -> ResolvedLimits {
        ResolvedLimits {
            regime: Regime::NeutralVolatility,
            nlv: dec!(100000),
            max_delta: dec!(600),
            max_negative_vega: dec!(-4800),
            min_theta: dec!(100),
            max_gamma: dec!(100),
            max_position_contracts: 15,
            allowed_strategies: Vec::new(),
            max_single_underlying_vega_pct: dec!(0.4),
            vix_scaler: dec!(1),
            term_structure_scaler: dec!(1),
            fail_closed: false,
        }
    }

    fn greeks() -> PortfolioGreeks {
        PortfolioGreeks {
            spx_delta: dec!(700),
            gamma: dec!(-50),
            theta: dec!(150),
            vega: dec!(-3000),
            captured_at: Utc::now(),
        }
    }

    fn candidate(tag: &str, change: GreekChange, margin: Decimal) -> CandidateTrade {
        CandidateTrade {
            benchmark: tag.to_string(),
            legs: vec![OrderLeg::outright(
                "MES",
                InstrumentKind::Future,
                LegAction::Sell,
                1,
            )],
            strategy: HedgeStrategy::FutureHedge,
            target: BreachMetric::Delta,
            breach: BreachEvent {
                account_id: "U1".to_string(),
                metric: BreachMetric::Delta,
                current: dec!(700),
                limit: dec!(600),
                severity: BreachSeverity::Warning,
                regime: Regime::NeutralVolatility,
                vix: dec!(18),
                margin_used: dec!(0),
                detected_at: Utc::now(),
            },
            impact: Some(TradeImpact {
                margin_impact: margin,
                change,
                simulated: false,
            }),
            score: None,
            justification: format!("{tag} delta hedge"),
        }
    }

    fn delta_change(d: Decimal) -> GreekChange {
        GreekChange {
            spx_delta: d,
            ..GreekChange::default()
        }
    }

    #[test]
    fn score_matches_formula() {
        let (weights, g, l) = (ScoringWeights::default(), greeks(), limits());
        let scorer = EfficiencyScorer::new(&weights, &g, &l);
        let c = candidate("A", delta_change(dec!(-100)), dec!(1250));
        // improvement 100 / (1250 + 1 * 1.30)
        assert_eq!(scorer.score(&c), Some(dec!(100) / dec!(1251.30)));
    }

    #[test]
    fn improvement_is_clipped_inside_limit() {
        let (weights, g, l) = (ScoringWeights::default(), greeks(), limits());
        let scorer = EfficiencyScorer::new(&weights, &g, &l);
        let exact = scorer.score(&candidate("A", delta_change(dec!(-100)), dec!(500)));
        let more = scorer.score(&candidate("B", delta_change(dec!(-400)), dec!(500)));
        assert_eq!(exact, more);
    }

    #[test]
    fn side_effects_lower_the_score() {
        let (weights, g, l) = (ScoringWeights::default(), greeks(), limits());
        let scorer = EfficiencyScorer::new(&weights, &g, &l);
        let clean = candidate("A", delta_change(dec!(-100)), dec!(500));
        let dirty = candidate(
            "B",
            GreekChange {
                spx_delta: dec!(-100),
                vega: dec!(-50),
                ..GreekChange::default()
            },
            dec!(500),
        );
        assert!(scorer.score(&clean).unwrap() > scorer.score(&dirty).unwrap());
    }

    #[test]
    fn zero_margin_is_floored() {
        let (weights, g, l) = (ScoringWeights::default(), greeks(), limits());
        let scorer = EfficiencyScorer::new(&weights, &g, &l);
        let released = candidate("A", delta_change(dec!(-100)), dec!(-2000));
        assert_eq!(scorer.score(&released), Some(dec!(100) / dec!(2.30)));
    }

    #[test]
    fn missing_impact_is_unscored() {
        let (weights, g, l) = (ScoringWeights::default(), greeks(), limits());
        let scorer = EfficiencyScorer::new(&weights, &g, &l);
        let mut c = candidate("A", delta_change(dec!(-100)), dec!(1));
        c.impact = None;
        assert_eq!(scorer.score(&c), None);
    }

    #[test]
    fn ties_break_on_margin_then_insertion() {
        let mut a = candidate("A", GreekChange::default(), dec!(900));
        let mut b = candidate("B", GreekChange::default(), dec!(300));
        let mut c = candidate("C", GreekChange::default(), dec!(300));
        let mut d = candidate("D", GreekChange::default(), dec!(1));
        a.score = Some(dec!(0.5));
        b.score = Some(dec!(0.5));
        c.score = Some(dec!(0.5));
        d.score = None;

        let ranked = rank(vec![d, a, b, c]);
        let order: Vec<_> = ranked.iter().map(|c| c.benchmark.as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A", "D"]);

        let again: Vec<_> = rank(ranked.clone()).into_iter().map(|c| c.benchmark).collect();
        assert_eq!(again, order);
    }

    #[test]
    fn top_n_truncates_after_ranking() {
        let mut cs: Vec<_> = (0..5)
            .map(|i| {
                let mut c = candidate(&i.to_string(), GreekChange::default(), dec!(10));
                c.score = Some(Decimal::from(i));
                c
            })
            .collect();
        cs.reverse();
        let top = top_n(cs, 3);
        let order: Vec<_> = top.iter().map(|c| c.benchmark.as_str()).collect();
        assert_eq!(order, vec!["4", "3", "2"]);
    }
}
