use std::collections::BTreeMap;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::greeks::InstrumentKind;
use crate::regime::Regime;

/// Benchmark families hedges may trade. Configuration can narrow this set, never widen it.
pub const BENCHMARK_FAMILIES: &[&str] = &["SPX", "SPXW", "XSP", "SPY", "ES", "MES"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub proposer: ProposerConfig,
    pub regime: RegimeThresholds,
    pub scaling: ScalingPolicy,
    pub breach: BreachConfig,
    pub scoring: ScoringWeights,
    pub hedging: HedgingConfig,
    pub timeouts: TimeoutConfig,
    pub notification: NotificationConfig,
    /// TOML file holding the regime risk-limit matrix.
    pub risk_limits_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            proposer: ProposerConfig::default(),
            regime: RegimeThresholds::default(),
            scaling: ScalingPolicy::default(),
            breach: BreachConfig::default(),
            scoring: ScoringWeights::default(),
            hedging: HedgingConfig::default(),
            timeouts: TimeoutConfig::default(),
            notification: NotificationConfig::default(),
            risk_limits_path: "config/risk_limits.toml".to_string(),
        }
    }
}

impl AppConfig {
    /// Checks cross-field invariants that serde cannot express.
    ///
    /// # Errors
    /// Returns `Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.hedging.validate()?;
        if self.proposer.top_n == 0 {
            return Err(RiskError::Config("proposer.top_n must be at least 1".to_string()));
        }
        if self.regime.low_vix > self.regime.high_vix
            || self.regime.high_vix > self.regime.crisis_vix
        {
            return Err(RiskError::Config(
                "regime thresholds must satisfy low_vix <= high_vix <= crisis_vix".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/riskdesk.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposerConfig {
    pub account_id: String,
    /// Sleep between cycles.
    pub interval_secs: u64,
    /// Candidates persisted per cycle.
    pub top_n: usize,
    /// Notify when the best candidate scores above this.
    pub notify_score_threshold: Decimal,
    /// Ask the advisory collaborator for commentary when breaches exist.
    pub advisory_enabled: bool,
}

impl Default for ProposerConfig {
    fn default() -> Self {
        Self {
            account_id: "DU0000000".to_string(),
            interval_secs: 300,
            top_n: 3,
            notify_score_threshold: dec!(0.5),
            advisory_enabled: false,
        }
    }
}

/// Regime classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeThresholds {
    /// VIX strictly above this is high volatility.
    pub high_vix: Decimal,
    /// VIX at or above this (while above `high_vix`) is crisis.
    pub crisis_vix: Decimal,
    /// VIX strictly below this, with contango, is low volatility.
    pub low_vix: Decimal,
    /// Term structure strictly above this counts as calm contango.
    pub contango_ratio: Decimal,
    /// Term structure at or below this counts as severe inversion.
    pub severe_inversion_ratio: Decimal,
    /// Recession probability that floors the regime at neutral.
    pub recession_elevated: Decimal,
    /// Recession probability that floors the regime at high volatility.
    pub recession_severe: Decimal,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            high_vix: dec!(22),
            crisis_vix: dec!(35),
            low_vix: dec!(15),
            contango_ratio: dec!(1.10),
            severe_inversion_ratio: dec!(0.85),
            recession_elevated: dec!(0.40),
            recession_severe: dec!(0.70),
        }
    }
}

/// One VIX band of the limit scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VixBand {
    /// Band applies when VIX is at or above this level.
    pub min_vix: Decimal,
    pub scaler: Decimal,
}

/// Market-conditional multipliers applied on top of the static matrix.
///
/// The default policy has no bands and scales everything by 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPolicy {
    pub vix_bands: Vec<VixBand>,
    /// Term structure strictly below this applies `inversion_scaler`.
    pub inversion_ratio: Decimal,
    pub inversion_scaler: Decimal,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            vix_bands: Vec::new(),
            inversion_ratio: dec!(1.0),
            inversion_scaler: dec!(1.0),
        }
    }
}

impl ScalingPolicy {
    /// Scaler for the highest band whose `min_vix` is at or below `vix`.
    #[must_use]
    pub fn vix_scaler(&self, vix: Decimal) -> Decimal {
        self.vix_bands
            .iter()
            .filter(|band| vix >= band.min_vix)
            .max_by(|a, b| a.min_vix.cmp(&b.min_vix))
            .map_or(Decimal::ONE, |band| band.scaler)
    }

    #[must_use]
    pub fn term_structure_scaler(&self, term_structure: Decimal) -> Decimal {
        if term_structure < self.inversion_ratio {
            self.inversion_scaler
        } else {
            Decimal::ONE
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreachConfig {
    /// Excess at or above this fraction of the limit magnitude is critical.
    pub critical_excess_ratio: Decimal,
}

impl Default for BreachConfig {
    fn default() -> Self {
        Self {
            critical_excess_ratio: dec!(0.5),
        }
    }
}

/// Fixed weights for the efficiency score.
///
/// `score = (primary * improvement - sum(side_i * worsening_i)) / (max(margin, 1) + legs * per_leg_fee)`
/// where improvement and worsening are in each metric's native units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub primary: Decimal,
    pub side_delta: Decimal,
    pub side_vega: Decimal,
    pub side_theta: Decimal,
    pub side_gamma: Decimal,
    /// Commission and fees per leg in dollars.
    pub per_leg_fee: Decimal,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            primary: dec!(1.0),
            side_delta: dec!(0.5),
            side_vega: dec!(0.5),
            side_theta: dec!(0.25),
            side_gamma: dec!(0.25),
            per_leg_fee: dec!(1.30),
        }
    }
}

/// A linear instrument usable for delta hedging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeInstrument {
    pub symbol: String,
    pub kind: InstrumentKind,
    /// SPX-equivalent delta of one contract or share.
    pub delta_per_unit: Decimal,
    /// Instrument price as a fraction of the SPX level.
    pub price_ratio: Decimal,
    pub multiplier: Decimal,
    /// Initial margin as a fraction of notional.
    pub margin_rate: Decimal,
}

impl HedgeInstrument {
    /// Initial margin for one unit at the given SPX level.
    #[must_use]
    pub fn margin_per_unit(&self, spx_price: Decimal) -> Decimal {
        spx_price * self.price_ratio * self.multiplier * self.margin_rate
    }

    /// Margin per unit of SPX-equivalent delta; `None` for zero-delta instruments.
    #[must_use]
    pub fn margin_per_delta(&self, spx_price: Decimal) -> Option<Decimal> {
        if self.delta_per_unit.is_zero() {
            return None;
        }
        Some(self.margin_per_unit(spx_price) / self.delta_per_unit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgingConfig {
    pub allowed_benchmarks: Vec<String>,
    pub instruments: Vec<HedgeInstrument>,
    pub max_candidates_per_breach: usize,
    /// Option root for constructed structures.
    pub structure_symbol: String,
    pub structure_dte_days: i64,
    pub strike_increment: Decimal,
    /// Short strike distance from ATM, as a fraction of spot.
    pub otm_pct: Decimal,
    /// Spread width as a fraction of spot.
    pub spread_width_pct: Decimal,
}

impl Default for HedgingConfig {
    fn default() -> Self {
        Self {
            allowed_benchmarks: BENCHMARK_FAMILIES.iter().map(ToString::to_string).collect(),
            instruments: vec![
                HedgeInstrument {
                    symbol: "MES".to_string(),
                    kind: InstrumentKind::Future,
                    delta_per_unit: dec!(5),
                    price_ratio: dec!(1),
                    multiplier: dec!(5),
                    margin_rate: dec!(0.05),
                },
                HedgeInstrument {
                    symbol: "ES".to_string(),
                    kind: InstrumentKind::Future,
                    delta_per_unit: dec!(50),
                    price_ratio: dec!(1),
                    multiplier: dec!(50),
                    margin_rate: dec!(0.05),
                },
                HedgeInstrument {
                    symbol: "SPY".to_string(),
                    kind: InstrumentKind::Stock,
                    delta_per_unit: dec!(0.1),
                    price_ratio: dec!(0.1),
                    multiplier: dec!(1),
                    margin_rate: dec!(0.25),
                },
            ],
            max_candidates_per_breach: 3,
            structure_symbol: "SPX".to_string(),
            structure_dte_days: 30,
            strike_increment: dec!(5),
            otm_pct: dec!(0.05),
            spread_width_pct: dec!(0.01),
        }
    }
}

impl HedgingConfig {
    /// Rejects benchmarks outside the permitted families.
    ///
    /// # Errors
    /// Returns `Config` naming the offending symbol.
    pub fn validate(&self) -> Result<()> {
        let symbols = self
            .allowed_benchmarks
            .iter()
            .chain(self.instruments.iter().map(|i| &i.symbol))
            .chain(std::iter::once(&self.structure_symbol));
        for symbol in symbols {
            if !BENCHMARK_FAMILIES.contains(&symbol.to_uppercase().as_str()) {
                return Err(RiskError::Config(format!(
                    "hedge benchmark '{symbol}' is outside the permitted families {BENCHMARK_FAMILIES:?}"
                )));
            }
        }
        Ok(())
    }

    /// Returns true if `symbol` is on both the configured and the permitted lists.
    #[must_use]
    pub fn is_allowed(&self, symbol: &str) -> bool {
        let symbol = symbol.to_uppercase();
        BENCHMARK_FAMILIES.contains(&symbol.as_str())
            && self
                .allowed_benchmarks
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&symbol))
    }
}

/// Time budgets for collaborator calls, in seconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub feed_secs: u64,
    pub what_if_secs: u64,
    pub submit_secs: u64,
    /// Total budget for post-submission status polling.
    pub poll_secs: u64,
    pub poll_interval_ms: u64,
    pub advisory_secs: u64,
    pub notify_secs: u64,
    pub database_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            feed_secs: 10,
            what_if_secs: 10,
            submit_secs: 10,
            poll_secs: 30,
            poll_interval_ms: 1000,
            advisory_secs: 20,
            notify_secs: 10,
            database_secs: 5,
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn feed(&self) -> Duration {
        Duration::from_secs(self.feed_secs)
    }

    #[must_use]
    pub fn what_if(&self) -> Duration {
        Duration::from_secs(self.what_if_secs)
    }

    #[must_use]
    pub fn submit(&self) -> Duration {
        Duration::from_secs(self.submit_secs)
    }

    #[must_use]
    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn advisory(&self) -> Duration {
        Duration::from_secs(self.advisory_secs)
    }

    #[must_use]
    pub fn notify(&self) -> Duration {
        Duration::from_secs(self.notify_secs)
    }

    #[must_use]
    pub fn database(&self) -> Duration {
        Duration::from_secs(self.database_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// JSON webhook receiving alert payloads. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
}

/// Per-regime limits, as fractions of net liquidation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeLimits {
    /// Minimum daily theta income.
    pub min_daily_theta_pct_nlv: Decimal,
    /// Most negative vega allowed; zero or negative.
    pub max_negative_vega_pct_nlv: Decimal,
    /// Maximum absolute SPX-equivalent delta.
    pub max_spx_delta_pct_nlv: Decimal,
    /// Maximum absolute gamma.
    pub max_gamma_pct_nlv: Decimal,
    #[serde(default)]
    pub allowed_strategies: Vec<String>,
    pub max_position_contracts: u32,
    /// Largest share of total vega one underlying may contribute.
    pub max_single_underlying_vega_pct: Decimal,
}

/// Static regime -> limits matrix. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskLimitMatrix {
    pub regimes: BTreeMap<Regime, RegimeLimits>,
}

impl RiskLimitMatrix {
    /// Limits for `regime`.
    ///
    /// # Errors
    /// Returns `Config` if the matrix has no entry for the regime.
    pub fn limits_for(&self, regime: Regime) -> Result<&RegimeLimits> {
        self.regimes.get(&regime).ok_or_else(|| {
            RiskError::Config(format!("risk-limit matrix has no entry for regime {regime}"))
        })
    }

    /// Checks sign conventions of every entry.
    ///
    /// # Errors
    /// Returns `Config` describing the first malformed entry.
    pub fn validate(&self) -> Result<()> {
        for (regime, limits) in &self.regimes {
            if limits.max_negative_vega_pct_nlv > Decimal::ZERO {
                return Err(RiskError::Config(format!(
                    "{regime}: max_negative_vega_pct_nlv must be zero or negative"
                )));
            }
            if limits.max_spx_delta_pct_nlv.is_sign_negative()
                || limits.max_gamma_pct_nlv.is_sign_negative()
            {
                return Err(RiskError::Config(format!(
                    "{regime}: delta and gamma limits must be non-negative"
                )));
            }
            if limits.max_single_underlying_vega_pct < Decimal::ZERO
                || limits.max_single_underlying_vega_pct > Decimal::ONE
            {
                return Err(RiskError::Config(format!(
                    "{regime}: max_single_underlying_vega_pct must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// The matrix shipped in `config/risk_limits.toml`.
    #[must_use]
    pub fn standard() -> Self {
        let entry = |theta, vega, delta, gamma, contracts, strategies: &[&str]| RegimeLimits {
            min_daily_theta_pct_nlv: theta,
            max_negative_vega_pct_nlv: vega,
            max_spx_delta_pct_nlv: delta,
            max_gamma_pct_nlv: gamma,
            allowed_strategies: strategies.iter().map(ToString::to_string).collect(),
            max_position_contracts: contracts,
            max_single_underlying_vega_pct: dec!(0.40),
        };
        let mut regimes = BTreeMap::new();
        regimes.insert(
            Regime::LowVolatility,
            entry(
                dec!(0.0008),
                dec!(-0.060),
                dec!(0.008),
                dec!(0.0015),
                20,
                &["short_put_spread", "iron_condor", "strangle", "calendar"],
            ),
        );
        regimes.insert(
            Regime::NeutralVolatility,
            entry(
                dec!(0.0010),
                dec!(-0.048),
                dec!(0.006),
                dec!(0.0010),
                15,
                &["short_put_spread", "iron_condor", "calendar"],
            ),
        );
        regimes.insert(
            Regime::HighVolatility,
            entry(
                dec!(0.0015),
                dec!(-0.030),
                dec!(0.004),
                dec!(0.0006),
                10,
                &["short_put_spread", "long_put_spread"],
            ),
        );
        regimes.insert(
            Regime::CrisisMode,
            entry(
                dec!(0),
                dec!(0),
                dec!(0),
                dec!(0.0002),
                5,
                &["long_put_spread"],
            ),
        );
        Self { regimes }
    }
}
