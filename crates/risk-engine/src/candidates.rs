//! Hedge candidate generation.
//!
//! Structure selection only. Pricing and margin come from the what-if
//! collaborator; closures and linear hedges carry deterministic
//! pre-estimates so they can be scored if the simulator is unavailable.
//!
//! Every emitted candidate trades only allow-listed benchmarks. A breach
//! that yields no viable structure contributes zero candidates and never
//! aborts the batch.

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::{Signed, ToPrimitive};
use rust_decimal::Decimal;

use riskdesk_core::order::validate_legs;
use riskdesk_core::{
    BreachEvent, BreachMetric, CandidateTrade, GreekChange, HedgeInstrument, HedgeStrategy,
    HedgingConfig, InstrumentKind, LegAction, OptionRight, OrderLeg, PositionGreeks, TradeImpact,
};

use crate::limits::ResolvedLimits;

/// Portfolio state a generation pass works from.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub account_id: &'a str,
    pub nlv: Decimal,
    /// At-the-money price of the structure benchmark.
    pub atm_price: Decimal,
    pub positions: &'a [PositionGreeks],
    pub as_of: NaiveDate,
    pub limits: &'a ResolvedLimits,
}

/// Builds hedge candidates for detected breaches.
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    config: HedgingConfig,
}

impl CandidateGenerator {
    #[must_use]
    pub fn new(config: HedgingConfig) -> Self {
        Self { config }
    }

    /// Candidates for every breach, in breach order.
    #[must_use]
    pub fn generate(&self, breaches: &[BreachEvent], input: &GenerationInput<'_>) -> Vec<CandidateTrade> {
        let mut out = Vec::new();
        for breach in breaches {
            let mut candidates = match breach.metric {
                BreachMetric::Delta => self.delta_hedges(breach, input),
                BreachMetric::Vega => self.vega_hedges(breach, input),
                BreachMetric::Theta => self.theta_hedges(breach, input),
                BreachMetric::Gamma => self.gamma_hedges(breach, input),
            };
            candidates.retain(|c| self.admissible(c));
            candidates.truncate(self.config.max_candidates_per_breach);

            tracing::debug!(
                account_id = input.account_id,
                metric = %breach.metric,
                count = candidates.len(),
                "Generated hedge candidates"
            );
            if candidates.is_empty() {
                tracing::warn!(
                    account_id = input.account_id,
                    metric = %breach.metric,
                    "No viable hedge candidate for breach"
                );
            }
            out.extend(candidates);
        }
        out
    }

    /// Allow-list and leg-shape check applied to every candidate.
    fn admissible(&self, candidate: &CandidateTrade) -> bool {
        if !self.config.is_allowed(&candidate.benchmark) {
            tracing::warn!(benchmark = %candidate.benchmark, "Dropping candidate on non-allow-listed benchmark");
            return false;
        }
        if let Some(leg) = candidate.legs.iter().find(|l| !self.config.is_allowed(&l.symbol)) {
            tracing::warn!(symbol = %leg.symbol, "Dropping candidate with non-allow-listed leg");
            return false;
        }
        validate_legs(&candidate.legs).is_ok()
    }

    // ========================================================================
    // Delta
    // ========================================================================

    /// Linear hedges, cheapest margin per unit of delta first.
    fn delta_hedges(&self, breach: &BreachEvent, input: &GenerationInput<'_>) -> Vec<CandidateTrade> {
        let excess = breach.excess();
        if excess <= Decimal::ZERO || input.atm_price <= Decimal::ZERO {
            return Vec::new();
        }

        let mut instruments: Vec<(&HedgeInstrument, Decimal)> = self
            .config
            .instruments
            .iter()
            .filter(|i| self.config.is_allowed(&i.symbol))
            .filter_map(|i| i.margin_per_delta(input.atm_price).map(|m| (i, m)))
            .collect();
        instruments.sort_by(|a, b| a.1.cmp(&b.1));

        let direction = if breach.current > Decimal::ZERO {
            LegAction::Sell
        } else {
            LegAction::Buy
        };

        instruments
            .into_iter()
            .filter_map(|(instrument, _)| {
                self.size_linear_hedge(breach, instrument, direction, excess, input)
            })
            .collect()
    }

    fn size_linear_hedge(
        &self,
        breach: &BreachEvent,
        instrument: &HedgeInstrument,
        action: LegAction,
        excess: Decimal,
        input: &GenerationInput<'_>,
    ) -> Option<CandidateTrade> {
        let per_unit = instrument.delta_per_unit;
        if per_unit <= Decimal::ZERO {
            return None;
        }
        let units = (excess / per_unit).ceil();
        let quantity = units.to_u32()?;
        if quantity == 0 {
            return None;
        }
        if instrument.kind == InstrumentKind::Future && quantity > input.limits.max_position_contracts {
            tracing::debug!(
                symbol = %instrument.symbol,
                quantity,
                max = input.limits.max_position_contracts,
                "Hedge size exceeds position contract limit"
            );
            return None;
        }

        let delta_change = action.sign() * units * per_unit;
        let after = breach.current + delta_change;
        let opposite_excess = if after.signum() == breach.current.signum() || after.is_zero() {
            Decimal::ZERO
        } else {
            after.abs() - breach.limit
        };
        if opposite_excess > per_unit {
            return None;
        }

        let strategy = match instrument.kind {
            InstrumentKind::Stock => HedgeStrategy::StockHedge,
            _ => HedgeStrategy::FutureHedge,
        };
        let leg = OrderLeg::outright(&instrument.symbol, instrument.kind, action, quantity);
        let margin = units * instrument.margin_per_unit(input.atm_price);

        Some(CandidateTrade {
            benchmark: instrument.symbol.clone(),
            justification: format!(
                "delta {} breaches limit {} by {}; {} moves delta by {} for ~{} margin",
                breach.current.round_dp(2),
                breach.limit.round_dp(2),
                breach.excess().round_dp(2),
                leg.describe(),
                delta_change.round_dp(2),
                margin.round_dp(0),
            ),
            legs: vec![leg],
            strategy,
            target: BreachMetric::Delta,
            breach: breach.clone(),
            impact: Some(TradeImpact {
                margin_impact: margin,
                change: GreekChange {
                    spx_delta: delta_change,
                    ..GreekChange::default()
                },
                simulated: false,
            }),
            score: None,
        })
    }

    // ========================================================================
    // Vega
    // ========================================================================

    fn vega_hedges(&self, breach: &BreachEvent, input: &GenerationInput<'_>) -> Vec<CandidateTrade> {
        let excess = breach.excess();
        if excess <= Decimal::ZERO {
            return Vec::new();
        }
        let mut out = Vec::new();

        let largest = self
            .eligible_options(input)
            .filter(|p| p.vega < Decimal::ZERO)
            .min_by(|a, b| a.vega.cmp(&b.vega));
        if let Some(position) = largest {
            if let Some(candidate) = self.closure(breach, position, excess, |(_, _, _, v)| v) {
                out.push(candidate);
            }
        }

        if let Some(candidate) = self.put_spread(breach, input, HedgeStrategy::LongPutSpread) {
            out.push(candidate);
        }
        out
    }

    // ========================================================================
    // Theta
    // ========================================================================

    fn theta_hedges(&self, breach: &BreachEvent, input: &GenerationInput<'_>) -> Vec<CandidateTrade> {
        let excess = breach.excess();
        if excess <= Decimal::ZERO {
            return Vec::new();
        }
        let mut out = Vec::new();

        let costliest = self
            .eligible_options(input)
            .filter(|p| p.position.quantity > 0 && p.theta < Decimal::ZERO)
            .min_by(|a, b| a.theta.cmp(&b.theta));
        if let Some(position) = costliest {
            if let Some(candidate) = self.closure(breach, position, excess, |(_, _, t, _)| t) {
                out.push(candidate);
            }
        }

        if let Some(candidate) = self.put_spread(breach, input, HedgeStrategy::ShortPutSpread) {
            out.push(candidate);
        }
        out
    }

    // ========================================================================
    // Gamma
    // ========================================================================

    /// Closes contributing legs, nearest expiry first.
    fn gamma_hedges(&self, breach: &BreachEvent, input: &GenerationInput<'_>) -> Vec<CandidateTrade> {
        let excess = breach.excess();
        if excess <= Decimal::ZERO {
            return Vec::new();
        }

        let mut contributors: Vec<&PositionGreeks> = self
            .eligible_options(input)
            .filter(|p| !p.gamma.is_zero() && p.gamma.signum() == breach.current.signum())
            .collect();
        contributors.sort_by(|a, b| {
            a.position
                .expiry
                .cmp(&b.position.expiry)
                .then(b.gamma.abs().cmp(&a.gamma.abs()))
        });

        contributors
            .into_iter()
            .filter_map(|p| self.closure(breach, p, excess, |(_, g, _, _)| g))
            .collect()
    }

    // ========================================================================
    // Shared builders
    // ========================================================================

    fn eligible_options<'a>(
        &'a self,
        input: &GenerationInput<'a>,
    ) -> impl Iterator<Item = &'a PositionGreeks> + 'a {
        input.positions.iter().filter(move |p| {
            p.position.kind == InstrumentKind::Option
                && p.position.quantity != 0
                && self.config.is_allowed(&p.position.symbol)
        })
    }

    /// Closes just enough of `position` to remove `excess` of the metric
    /// picked out of its per-contract Greeks by `per_contract`.
    fn closure(
        &self,
        breach: &BreachEvent,
        position: &PositionGreeks,
        excess: Decimal,
        per_contract: impl Fn((Decimal, Decimal, Decimal, Decimal)) -> Decimal,
    ) -> Option<CandidateTrade> {
        let pos = &position.position;
        let unit = per_contract(position.per_contract()?).abs();
        if unit.is_zero() {
            return None;
        }
        let held = pos.quantity.unsigned_abs();
        let needed = (excess / unit).ceil();
        let contracts = needed.to_u32().map_or(held, |n| n.min(held)).max(1);

        let (strike, expiry, right) = (pos.strike?, pos.expiry?, pos.right?);
        let action = if pos.quantity < 0 {
            LegAction::Buy
        } else {
            LegAction::Sell
        };
        let mut leg = OrderLeg::option(&pos.symbol, action, contracts, strike, expiry, right);
        leg.conid = pos.conid;

        let strategy = if contracts >= held {
            HedgeStrategy::ClosePosition
        } else {
            HedgeStrategy::ReducePosition
        };
        let change = GreekChange::closing(position, contracts)?;

        Some(CandidateTrade {
            benchmark: pos.symbol.clone(),
            justification: format!(
                "{} {} breaches limit {} by {}; {} of {} removes ~{}",
                breach.metric,
                breach.current.round_dp(2),
                breach.limit.round_dp(2),
                excess.round_dp(2),
                leg.describe(),
                pos.display_name(),
                (unit * Decimal::from(contracts)).round_dp(2),
            ),
            legs: vec![leg],
            strategy,
            target: breach.metric,
            breach: breach.clone(),
            impact: Some(TradeImpact {
                margin_impact: Decimal::ZERO,
                change,
                simulated: false,
            }),
            score: None,
        })
    }

    /// One-lot vertical put spread on the structure benchmark. Impact is left
    /// to the what-if collaborator.
    fn put_spread(
        &self,
        breach: &BreachEvent,
        input: &GenerationInput<'_>,
        strategy: HedgeStrategy,
    ) -> Option<CandidateTrade> {
        if input.atm_price <= Decimal::ZERO || input.limits.max_position_contracts == 0 {
            return None;
        }
        let increment = self.config.strike_increment;
        let round = |x: Decimal| -> Option<Decimal> {
            if increment <= Decimal::ZERO {
                return None;
            }
            Some((x / increment).round() * increment)
        };
        let upper = round(input.atm_price * (Decimal::ONE - self.config.otm_pct))?;
        let width = round(input.atm_price * self.config.spread_width_pct)?.max(increment);
        let lower = upper - width;
        if lower <= Decimal::ZERO {
            return None;
        }
        let expiry = input.as_of + Duration::days(self.config.structure_dte_days);
        let symbol = &self.config.structure_symbol;

        let (upper_action, lower_action, label) = match strategy {
            HedgeStrategy::LongPutSpread => (LegAction::Buy, LegAction::Sell, "long put spread adds vega"),
            HedgeStrategy::ShortPutSpread => (LegAction::Sell, LegAction::Buy, "short put spread adds theta"),
            _ => return None,
        };
        let legs = vec![
            OrderLeg::option(symbol, upper_action, 1, upper, expiry, OptionRight::Put),
            OrderLeg::option(symbol, lower_action, 1, lower, expiry, OptionRight::Put),
        ];

        Some(CandidateTrade {
            benchmark: symbol.to_uppercase(),
            justification: format!(
                "{} {} breaches limit {} by {}; {} {}/{} {}",
                breach.metric,
                breach.current.round_dp(2),
                breach.limit.round_dp(2),
                breach.excess().round_dp(2),
                label,
                upper,
                lower,
                expiry,
            ),
            legs,
            strategy,
            target: breach.metric,
            breach: breach.clone(),
            impact: None,
            score: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use riskdesk_core::{BreachSeverity, Position, Regime, BENCHMARK_FAMILIES};
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

    fn breach(metric: BreachMetric, current: Decimal, limit: Decimal) -> BreachEvent {
        BreachEvent {
            account_id: "U1".to_string(),
            metric,
            current,
            limit,
            severity: BreachSeverity::Warning,
            regime: Regime::NeutralVolatility,
            vix: dec!(18),
            margin_used: dec!(20000),
            detected_at: Utc::now(),
        }
    }

    fn option(
        symbol: &str,
        quantity: i32,
        expiry_days: i64,
        greeks: (Decimal, Decimal, Decimal, Decimal),
    ) -> PositionGreeks {
        PositionGreeks {
            position: Position {
                symbol: symbol.to_string(),
                kind: InstrumentKind::Option,
                right: Some(OptionRight::Put),
                strike: Some(dec!(4800)),
                expiry: Some(as_of() + Duration::days(expiry_days)),
                quantity,
                multiplier: dec!(100),
                conid: Some(1000 + i64::from(quantity)),
            },
            spx_delta: greeks.0,
            gamma: greeks.1,
            theta: greeks.2,
            vega: greeks.3,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn run(breaches: &[BreachEvent], positions: &[PositionGreeks]) -> Vec<CandidateTrade> {
        let limits = limits();
        let input = GenerationInput {
            account_id: "U1",
            nlv: dec!(100000),
            atm_price: dec!(5000),
            positions,
            as_of: as_of(),
            limits: &limits,
        };
        CandidateGenerator::default().generate(breaches, &input)
    }

    #[test]
    fn delta_hedge_prefers_cheapest_margin_per_delta() {
        let out = run(&[breach(BreachMetric::Delta, dec!(660), dec!(600))], &[]);
        let symbols: Vec<_> = out.iter().map(|c| c.benchmark.as_str()).collect();
        // MES and ES both cost 250/delta, SPY 1250/delta; stable sort keeps MES first.
        assert_eq!(symbols, vec!["MES", "ES", "SPY"]);

        let mes = &out[0];
        assert_eq!(mes.legs[0].action, LegAction::Sell);
        assert_eq!(mes.legs[0].quantity, 12);
        assert!(out.iter().all(|c| c.justification.contains("delta")));
    }

    #[test]
    fn delta_hedge_sizes_to_whole_contracts_without_overshooting() {
        let out = run(&[breach(BreachMetric::Delta, dec!(-612), dec!(600))], &[]);
        let mes = out.iter().find(|c| c.benchmark == "MES").unwrap();
        assert_eq!(mes.legs[0].action, LegAction::Buy);
        assert_eq!(mes.legs[0].quantity, 3);
        let change = mes.impact.as_ref().unwrap().change.spx_delta;
        assert_eq!(change, dec!(15));
        assert!((dec!(-612) + change).abs() <= dec!(600));
        assert_eq!(mes.impact.as_ref().unwrap().margin_impact, dec!(3750));

        let es = out.iter().find(|c| c.benchmark == "ES").unwrap();
        assert_eq!(es.legs[0].quantity, 1);
    }

    #[test]
    fn crisis_delta_hedge_overshoots_at_most_one_contract() {
        let out = run(&[breach(BreachMetric::Delta, dec!(12), dec!(0))], &[]);
        for c in &out {
            let change = c.impact.as_ref().unwrap().change.spx_delta;
            let after = dec!(12) + change;
            let per_unit = change.abs() / Decimal::from(c.legs[0].quantity);
            assert!(after.abs() <= per_unit, "{} overshoots", c.benchmark);
        }
        assert!(out.iter().any(|c| c.benchmark == "MES"));
    }

    #[test]
    fn vega_breach_closes_largest_contributor_and_offers_spread() {
        let positions = vec![
            option("SPX", -2, 30, (dec!(40), dec!(-4), dec!(120), dec!(-3000))),
            option("SPX", -4, 45, (dec!(90), dec!(-6), dec!(200), dec!(-6000))),
            option("AAPL", -10, 30, (dec!(10), dec!(-1), dec!(50), dec!(-9000))),
        ];
        let out = run(&[breach(BreachMetric::Vega, dec!(-9000), dec!(-4800))], &positions);

        let close = &out[0];
        assert_eq!(close.benchmark, "SPX");
        assert_eq!(close.strategy, HedgeStrategy::ReducePosition);
        // 4200 excess / 1500 per contract -> 3 of 4 contracts.
        assert_eq!(close.legs[0].quantity, 3);
        assert_eq!(close.legs[0].action, LegAction::Buy);
        assert_eq!(close.impact.as_ref().unwrap().change.vega, dec!(4500));

        let spread = &out[1];
        assert_eq!(spread.strategy, HedgeStrategy::LongPutSpread);
        assert_eq!(spread.legs.len(), 2);
        assert_eq!(spread.legs[0].strike, Some(dec!(4750)));
        assert_eq!(spread.legs[1].strike, Some(dec!(4700)));
        assert!(spread.impact.is_none());
    }

    #[test]
    fn theta_breach_closes_long_premium_and_offers_short_spread() {
        let positions = vec![
            option("SPX", 2, 60, (dec!(-60), dec!(2), dec!(-80), dec!(900))),
            option("SPX", -1, 30, (dec!(20), dec!(-1), dec!(40), dec!(-300))),
        ];
        let out = run(&[breach(BreachMetric::Theta, dec!(40), dec!(100))], &positions);
        assert_eq!(out[0].strategy, HedgeStrategy::ClosePosition);
        assert_eq!(out[0].legs[0].action, LegAction::Sell);
        assert_eq!(out[0].legs[0].quantity, 2);
        assert_eq!(out[1].strategy, HedgeStrategy::ShortPutSpread);
        assert_eq!(out[1].legs[0].action, LegAction::Sell);
    }

    #[test]
    fn gamma_breach_closes_nearest_expiry_first() {
        let positions = vec![
            option("SPX", -3, 40, (dec!(30), dec!(-60), dec!(90), dec!(-900))),
            option("XSP", -5, 3, (dec!(10), dec!(-30), dec!(50), dec!(-100))),
            option("SPX", 1, 1, (dec!(5), dec!(20), dec!(-10), dec!(50))),
        ];
        let out = run(&[breach(BreachMetric::Gamma, dec!(-150), dec!(100))], &positions);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].benchmark, "XSP");
        assert_eq!(out[1].benchmark, "SPX");
        assert_eq!(out[0].target, BreachMetric::Gamma);
    }

    #[test]
    fn never_emits_non_allow_listed_benchmarks() {
        let positions = vec![
            option("TSLA", -10, 5, (dec!(500), dec!(-90), dec!(10), dec!(-9000))),
            option("QQQ", 5, 5, (dec!(-50), dec!(80), dec!(-300), dec!(900))),
        ];
        let breaches = [
            breach(BreachMetric::Delta, dec!(900), dec!(600)),
            breach(BreachMetric::Vega, dec!(-9000), dec!(-4800)),
            breach(BreachMetric::Theta, dec!(-200), dec!(100)),
            breach(BreachMetric::Gamma, dec!(-150), dec!(100)),
        ];
        let out = run(&breaches, &positions);
        assert!(!out.is_empty());
        for c in &out {
            assert!(BENCHMARK_FAMILIES.contains(&c.benchmark.as_str()));
            for leg in &c.legs {
                assert!(BENCHMARK_FAMILIES.contains(&leg.symbol.as_str()));
            }
        }
    }

    #[test]
    fn malformed_breach_yields_nothing_but_batch_continues() {
        let out = run(
            &[
                breach(BreachMetric::Delta, dec!(100), dec!(600)),
                breach(BreachMetric::Delta, dec!(700), dec!(600)),
            ],
            &[],
        );
        assert!(!out.is_empty());
        assert!(out.iter().all(|c| c.breach.current == dec!(700)));
    }

    #[test]
    fn oversized_future_hedge_is_skipped() {
        let out = run(&[breach(BreachMetric::Delta, dec!(2000), dec!(600))], &[]);
        // MES would need 280 contracts; ES needs 28; both exceed 15.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].benchmark, "SPY");
        assert_eq!(out[0].legs[0].quantity, 14000);
    }
}
