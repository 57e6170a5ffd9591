//! Resolution of percentage-of-NLV limits into absolute limits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use riskdesk_core::{Regime, RiskLimitMatrix, Result, ScalingPolicy};

/// Absolute limits for one account at one instant.
///
/// `max_negative_vega` is zero or negative; every other Greek limit is zero or positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLimits {
    pub regime: Regime,
    pub nlv: Decimal,
    pub max_delta: Decimal,
    pub max_negative_vega: Decimal,
    pub min_theta: Decimal,
    pub max_gamma: Decimal,
    pub max_position_contracts: u32,
    pub allowed_strategies: Vec<String>,
    pub max_single_underlying_vega_pct: Decimal,
    pub vix_scaler: Decimal,
    pub term_structure_scaler: Decimal,
    /// True when resolution refused to scale against a non-positive NLV.
    pub fail_closed: bool,
}

impl ResolvedLimits {
    /// Zero headroom on every metric; blocks all new risk.
    #[must_use]
    pub fn fail_closed(regime: Regime, nlv: Decimal) -> Self {
        Self {
            regime,
            nlv,
            max_delta: Decimal::ZERO,
            max_negative_vega: Decimal::ZERO,
            min_theta: Decimal::ZERO,
            max_gamma: Decimal::ZERO,
            max_position_contracts: 0,
            allowed_strategies: Vec::new(),
            max_single_underlying_vega_pct: Decimal::ZERO,
            vix_scaler: Decimal::ONE,
            term_structure_scaler: Decimal::ONE,
            fail_closed: true,
        }
    }
}

/// Scales the static matrix by account size and market conditions.
#[derive(Debug, Clone, Default)]
pub struct RiskLimitResolver {
    policy: ScalingPolicy,
}

impl RiskLimitResolver {
    #[must_use]
    pub fn new(policy: ScalingPolicy) -> Self {
        Self { policy }
    }

    /// Resolves absolute limits: `pct * nlv * vix_scaler * term_structure_scaler`.
    ///
    /// Takes the matrix by reference so a caller holding one snapshot gets one
    /// consistent view for the whole call.
    ///
    /// # Errors
    /// Returns `Config` if the matrix has no entry for `regime`. A non-positive
    /// NLV is not an error; it yields [`ResolvedLimits::fail_closed`].
    pub fn resolve(
        &self,
        matrix: &RiskLimitMatrix,
        regime: Regime,
        nlv: Decimal,
        vix: Decimal,
        term_structure: Decimal,
    ) -> Result<ResolvedLimits> {
        let pct = matrix.limits_for(regime)?;

        if nlv <= Decimal::ZERO {
            tracing::warn!(%regime, %nlv, "Non-positive NLV, resolving fail-closed limits");
            return Ok(ResolvedLimits::fail_closed(regime, nlv));
        }

        let vix_scaler = self.policy.vix_scaler(vix);
        let term_structure_scaler = self.policy.term_structure_scaler(term_structure);
        let base = nlv * vix_scaler * term_structure_scaler;

        let limits = ResolvedLimits {
            regime,
            nlv,
            max_delta: pct.max_spx_delta_pct_nlv * base,
            max_negative_vega: pct.max_negative_vega_pct_nlv * base,
            min_theta: pct.min_daily_theta_pct_nlv * base,
            max_gamma: pct.max_gamma_pct_nlv * base,
            max_position_contracts: pct.max_position_contracts,
            allowed_strategies: pct.allowed_strategies.clone(),
            max_single_underlying_vega_pct: pct.max_single_underlying_vega_pct,
            vix_scaler,
            term_structure_scaler,
            fail_closed: false,
        };

        tracing::debug!(
            %regime,
            %nlv,
            max_delta = %limits.max_delta,
            max_negative_vega = %limits.max_negative_vega,
            min_theta = %limits.min_theta,
            max_gamma = %limits.max_gamma,
            "Resolved limits"
        );

        Ok(limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskdesk_core::{RiskError, VixBand};
    use rust_decimal_macros::dec;

    #[test]
    fn neutral_limits_at_100k() {
        let limits = RiskLimitResolver::default()
            .resolve(
                &RiskLimitMatrix::standard(),
                Regime::NeutralVolatility,
                dec!(100000),
                dec!(18),
                dec!(1.0),
            )
            .unwrap();
        assert_eq!(limits.max_negative_vega, dec!(-4800));
        assert_eq!(limits.max_delta, dec!(600));
        assert_eq!(limits.min_theta, dec!(100));
        assert_eq!(limits.max_gamma, dec!(100));
        assert_eq!(limits.max_position_contracts, 15);
        assert!(!limits.fail_closed);
    }

    #[test]
    fn identical_inputs_give_identical_limits() {
        let resolver = RiskLimitResolver::default();
        let matrix = RiskLimitMatrix::standard();
        let a = resolver
            .resolve(&matrix, Regime::HighVolatility, dec!(250000.37), dec!(27.3), dec!(0.93))
            .unwrap();
        let b = resolver
            .resolve(&matrix, Regime::HighVolatility, dec!(250000.37), dec!(27.3), dec!(0.93))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_positive_nlv_fails_closed() {
        let resolver = RiskLimitResolver::default();
        let matrix = RiskLimitMatrix::standard();
        for nlv in [dec!(0), dec!(-5000)] {
            let limits = resolver
                .resolve(&matrix, Regime::LowVolatility, nlv, dec!(12), dec!(1.2))
                .unwrap();
            assert!(limits.fail_closed);
            assert_eq!(limits.max_delta, Decimal::ZERO);
            assert_eq!(limits.max_negative_vega, Decimal::ZERO);
            assert_eq!(limits.max_position_contracts, 0);
        }
    }

    #[test]
    fn missing_regime_is_config_error() {
        let mut matrix = RiskLimitMatrix::standard();
        matrix.regimes.remove(&Regime::HighVolatility);
        let err = RiskLimitResolver::default()
            .resolve(&matrix, Regime::HighVolatility, dec!(100000), dec!(25), dec!(1))
            .unwrap_err();
        assert!(matches!(err, RiskError::Config(_)));
    }

    #[test]
    fn missing_regime_beats_fail_closed() {
        let matrix = RiskLimitMatrix::default();
        assert!(RiskLimitResolver::default()
            .resolve(&matrix, Regime::CrisisMode, dec!(0), dec!(40), dec!(1))
            .is_err());
    }

    #[test]
    fn crisis_collapses_delta_and_vega() {
        let limits = RiskLimitResolver::default()
            .resolve(
                &RiskLimitMatrix::standard(),
                Regime::CrisisMode,
                dec!(100000),
                dec!(40),
                dec!(0.8),
            )
            .unwrap();
        assert_eq!(limits.max_delta, Decimal::ZERO);
        assert_eq!(limits.max_negative_vega, Decimal::ZERO);
    }

    #[test]
    fn scalers_tighten_limits() {
        let policy = ScalingPolicy {
            vix_bands: vec![
                VixBand {
                    min_vix: dec!(20),
                    scaler: dec!(0.8),
                },
                VixBand {
                    min_vix: dec!(30),
                    scaler: dec!(0.5),
                },
            ],
            inversion_ratio: dec!(1.0),
            inversion_scaler: dec!(0.5),
        };
        let limits = RiskLimitResolver::new(policy)
            .resolve(
                &RiskLimitMatrix::standard(),
                Regime::HighVolatility,
                dec!(100000),
                dec!(31),
                dec!(0.95),
            )
            .unwrap();
        assert_eq!(limits.vix_scaler, dec!(0.5));
        assert_eq!(limits.term_structure_scaler, dec!(0.5));
        assert_eq!(limits.max_delta, dec!(100));
        assert_eq!(limits.max_negative_vega, dec!(-750));
    }
}
