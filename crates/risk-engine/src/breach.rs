//! Breach detection against resolved limits.

use rust_decimal::Decimal;

use riskdesk_core::trade::excess_for;
use riskdesk_core::{BreachConfig, BreachEvent, BreachMetric, BreachSeverity, PortfolioGreeks, Regime};

use crate::limits::ResolvedLimits;

/// Account context stamped onto every breach.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub account_id: String,
    pub margin_used: Decimal,
    pub regime: Regime,
    pub vix: Decimal,
}

/// Compares a Greeks snapshot with resolved limits.
#[derive(Debug, Clone, Default)]
pub struct BreachDetector {
    config: BreachConfig,
}

impl BreachDetector {
    #[must_use]
    pub fn new(config: BreachConfig) -> Self {
        Self { config }
    }

    /// Returns every breach, most severe first.
    ///
    /// Within a severity tier the order is delta, vega, theta, gamma. No
    /// breaches is an empty list.
    #[must_use]
    pub fn check(
        &self,
        greeks: &PortfolioGreeks,
        limits: &ResolvedLimits,
        ctx: &CheckContext,
    ) -> Vec<BreachEvent> {
        let checks = [
            (
                BreachMetric::Delta,
                greeks.spx_delta,
                limits.max_delta,
                greeks.spx_delta.abs() > limits.max_delta,
            ),
            (
                BreachMetric::Vega,
                greeks.vega,
                limits.max_negative_vega,
                greeks.vega < limits.max_negative_vega,
            ),
            (
                BreachMetric::Theta,
                greeks.theta,
                limits.min_theta,
                greeks.theta < limits.min_theta,
            ),
            (
                BreachMetric::Gamma,
                greeks.gamma,
                limits.max_gamma,
                greeks.gamma.abs() > limits.max_gamma,
            ),
        ];

        let mut breaches: Vec<BreachEvent> = checks
            .into_iter()
            .filter(|(_, _, _, breached)| *breached)
            .map(|(metric, current, limit, _)| BreachEvent {
                account_id: ctx.account_id.clone(),
                metric,
                current,
                limit,
                severity: self.severity(metric, current, limit),
                regime: ctx.regime,
                vix: ctx.vix,
                margin_used: ctx.margin_used,
                detected_at: greeks.captured_at,
            })
            .collect();

        breaches.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(a.metric.precedence().cmp(&b.metric.precedence()))
        });

        for breach in &breaches {
            tracing::warn!(
                account_id = %breach.account_id,
                metric = %breach.metric,
                current = %breach.current,
                limit = %breach.limit,
                severity = ?breach.severity,
                regime = %breach.regime,
                "Risk limit breached"
            );
        }

        breaches
    }

    fn severity(&self, metric: BreachMetric, current: Decimal, limit: Decimal) -> BreachSeverity {
        if limit.is_zero() {
            return BreachSeverity::Critical;
        }
        let excess = excess_for(metric, current, limit);
        if excess >= self.config.critical_excess_ratio * limit.abs() {
            BreachSeverity::Critical
        } else {
            BreachSeverity::Warning
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
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

    fn greeks(delta: Decimal, gamma: Decimal, theta: Decimal, vega: Decimal) -> PortfolioGreeks {
        PortfolioGreeks {
            spx_delta: delta,
            gamma,
            theta,
            vega,
            captured_at: Utc::now(),
        }
    }

    fn ctx() -> CheckContext {
        CheckContext {
            account_id: "U1".to_string(),
            margin_used: dec!(20000),
            regime: Regime::NeutralVolatility,
            vix: dec!(18),
        }
    }

    #[test]
    fn all_four_breaches_in_precedence_order() {
        // Equal relative excess keeps every breach in the same severity tier.
        let g = greeks(dec!(700), dec!(110), dec!(90), dec!(-5000));
        let breaches = BreachDetector::default().check(&g, &limits(), &ctx());
        let metrics: Vec<_> = breaches.iter().map(|b| b.metric).collect();
        assert_eq!(
            metrics,
            vec![
                BreachMetric::Delta,
                BreachMetric::Vega,
                BreachMetric::Theta,
                BreachMetric::Gamma
            ]
        );
        assert!(breaches.iter().all(|b| b.severity == BreachSeverity::Warning));
    }

    #[test]
    fn critical_breaches_sort_ahead_of_warnings() {
        let g = greeks(dec!(650), dec!(200), dec!(150), dec!(-4000));
        let breaches = BreachDetector::default().check(&g, &limits(), &ctx());
        assert_eq!(breaches.len(), 2);
        assert_eq!(breaches[0].metric, BreachMetric::Gamma);
        assert_eq!(breaches[0].severity, BreachSeverity::Critical);
        assert_eq!(breaches[1].metric, BreachMetric::Delta);
    }

    #[test]
    fn wide_limits_mean_no_breaches() {
        let mut wide = limits();
        wide.max_delta = dec!(1e12);
        wide.max_negative_vega = dec!(-1e12);
        wide.min_theta = dec!(-1e12);
        wide.max_gamma = dec!(1e12);
        let g = greeks(dec!(-9000), dec!(400), dec!(-300), dec!(-80000));
        assert!(BreachDetector::default().check(&g, &wide, &ctx()).is_empty());
    }

    #[test]
    fn long_vega_and_short_delta_sides() {
        let g = greeks(dec!(-601), dec!(-10), dec!(150), dec!(9000));
        let breaches = BreachDetector::default().check(&g, &limits(), &ctx());
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, BreachMetric::Delta);
        assert_eq!(breaches[0].excess(), dec!(1));
    }

    #[test]
    fn boundary_values_are_not_breaches() {
        let g = greeks(dec!(600), dec!(-100), dec!(100), dec!(-4800));
        assert!(BreachDetector::default().check(&g, &limits(), &ctx()).is_empty());
    }

    #[test]
    fn zero_limits_make_any_exposure_critical() {
        let mut crisis = limits();
        crisis.max_delta = Decimal::ZERO;
        crisis.max_negative_vega = Decimal::ZERO;
        let g = greeks(dec!(1), dec!(0), dec!(150), dec!(-1));
        let breaches = BreachDetector::default().check(&g, &crisis, &ctx());
        assert_eq!(breaches.len(), 2);
        assert!(breaches.iter().all(|b| b.severity == BreachSeverity::Critical));
    }

    #[test]
    fn events_carry_context() {
        let g = greeks(dec!(0), dec!(0), dec!(150), dec!(-8000));
        let breaches = BreachDetector::default().check(&g, &limits(), &ctx());
        let event = &breaches[0];
        assert_eq!(event.account_id, "U1");
        assert_eq!(event.vix, dec!(18));
        assert_eq!(event.margin_used, dec!(20000));
        assert_eq!(event.detected_at, g.captured_at);
        assert_eq!(event.severity, BreachSeverity::Critical);
    }
}
