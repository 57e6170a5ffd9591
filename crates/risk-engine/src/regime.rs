//! Volatility regime classification.
//!
//! Pure function of (VIX, term structure, recession probability). There is no
//! memory between calls; any spike-and-revert override belongs to the caller.

use rust_decimal::Decimal;

use riskdesk_core::{MarketContext, Regime, RegimeThresholds};

/// Maps market inputs onto one of the four ordered regimes.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    thresholds: RegimeThresholds,
}

impl RegimeClassifier {
    #[must_use]
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self { thresholds }
    }

    /// Classifies the regime.
    ///
    /// `term_structure` is the front/back VIX futures ratio; above 1.0 is contango.
    /// A recession probability can only push the result toward higher stress.
    #[must_use]
    pub fn classify(
        &self,
        vix: Decimal,
        term_structure: Decimal,
        recession_probability: Option<Decimal>,
    ) -> Regime {
        let t = &self.thresholds;

        let base = if vix > t.high_vix {
            if vix >= t.crisis_vix || term_structure <= t.severe_inversion_ratio {
                Regime::CrisisMode
            } else {
                Regime::HighVolatility
            }
        } else if vix < t.low_vix && term_structure > t.contango_ratio {
            Regime::LowVolatility
        } else {
            Regime::NeutralVolatility
        };

        match recession_probability {
            Some(p) if p >= t.recession_severe => base.at_least(Regime::HighVolatility),
            Some(p) if p >= t.recession_elevated => base.at_least(Regime::NeutralVolatility),
            _ => base,
        }
    }

    /// Classifies straight from a market-context read.
    #[must_use]
    pub fn classify_context(&self, ctx: &MarketContext) -> Regime {
        self.classify(ctx.vix, ctx.term_structure, ctx.recession_probability)
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(RegimeThresholds::default())
    }
}
