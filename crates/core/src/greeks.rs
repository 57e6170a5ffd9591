//! Positions and portfolio-level Greeks.
//!
//! Greeks are supplied by the position feed; nothing here prices options.
//! A [`PortfolioGreeks`] snapshot is built fresh each cycle and never mutated.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Options contract right (call or put).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// Instrument class of a position or order leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Option,
    Future,
    Stock,
}

/// A broker position as reported by the position feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Underlying or contract root (e.g. "SPX", "MES", "AAPL").
    pub symbol: String,
    pub kind: InstrumentKind,
    #[serde(default)]
    pub right: Option<OptionRight>,
    #[serde(default)]
    pub strike: Option<Decimal>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
    /// Signed contract count; negative means short.
    pub quantity: i32,
    /// Contract multiplier (100 for standard index options).
    pub multiplier: Decimal,
    /// Broker instrument identifier, when resolved.
    #[serde(default)]
    pub conid: Option<i64>,
}

impl Position {
    #[must_use]
    pub fn is_short_option(&self) -> bool {
        self.kind == InstrumentKind::Option && self.quantity < 0
    }

    /// Human-readable description (e.g. "-2 SPX 5000P 2026-11-20").
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.kind, self.strike, self.right, self.expiry) {
            (InstrumentKind::Option, Some(strike), Some(right), Some(expiry)) => {
                format!("{} {} {}{} {}", self.quantity, self.symbol, strike, right, expiry)
            }
            _ => format!("{} {}", self.quantity, self.symbol),
        }
    }
}

/// A position together with its total (not per-contract) Greeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionGreeks {
    pub position: Position,
    /// Beta-weighted delta in SPX-equivalent units.
    pub spx_delta: Decimal,
    pub gamma: Decimal,
    /// Dollars per day.
    pub theta: Decimal,
    pub vega: Decimal,
}

impl PositionGreeks {
    /// Greeks attributable to a single contract of this position.
    ///
    /// Returns `None` for a flat position.
    #[must_use]
    pub fn per_contract(&self) -> Option<(Decimal, Decimal, Decimal, Decimal)> {
        if self.position.quantity == 0 {
            return None;
        }
        let n = Decimal::from(self.position.quantity.unsigned_abs());
        Some((
            self.spx_delta / n,
            self.gamma / n,
            self.theta / n,
            self.vega / n,
        ))
    }
}

/// Signed change in portfolio Greeks caused by a trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GreekChange {
    pub spx_delta: Decimal,
    pub gamma: Decimal,
    pub theta: Decimal,
    pub vega: Decimal,
}

impl GreekChange {
    /// The change produced by closing `contracts` of `position` outright.
    #[must_use]
    pub fn closing(position: &PositionGreeks, contracts: u32) -> Option<Self> {
        let (delta, gamma, theta, vega) = position.per_contract()?;
        let n = Decimal::from(contracts);
        Some(Self {
            spx_delta: -delta * n,
            gamma: -gamma * n,
            theta: -theta * n,
            vega: -vega * n,
        })
    }
}

/// Where the theta/vega ratio sits relative to the 0.25-0.40 target band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThetaVegaBand {
    Below,
    Target,
    Above,
}

/// Aggregate portfolio Greeks at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioGreeks {
    /// Beta-weighted SPX-equivalent delta.
    pub spx_delta: Decimal,
    pub gamma: Decimal,
    /// Dollars per day.
    pub theta: Decimal,
    pub vega: Decimal,
    pub captured_at: DateTime<Utc>,
}

impl PortfolioGreeks {
    pub const TARGET_BAND_LOW: Decimal = dec!(0.25);
    pub const TARGET_BAND_HIGH: Decimal = dec!(0.40);

    /// Sums position Greeks into a portfolio snapshot.
    #[must_use]
    pub fn aggregate(positions: &[PositionGreeks], captured_at: DateTime<Utc>) -> Self {
        positions.iter().fold(
            Self {
                spx_delta: Decimal::ZERO,
                gamma: Decimal::ZERO,
                theta: Decimal::ZERO,
                vega: Decimal::ZERO,
                captured_at,
            },
            |mut acc, p| {
                acc.spx_delta += p.spx_delta;
                acc.gamma += p.gamma;
                acc.theta += p.theta;
                acc.vega += p.vega;
                acc
            },
        )
    }

    /// Plain theta / vega ratio. `None` when vega is zero.
    #[must_use]
    pub fn theta_vega_ratio(&self) -> Option<Decimal> {
        if self.vega.is_zero() {
            return None;
        }
        self.theta.checked_div(self.vega)
    }

    /// Delta / theta ratio. `None` when theta is zero.
    #[must_use]
    pub fn delta_theta_ratio(&self) -> Option<Decimal> {
        if self.theta.is_zero() {
            return None;
        }
        self.spx_delta.checked_div(self.theta)
    }

    /// |theta| / |vega|. `None` when either is exactly zero.
    #[must_use]
    pub fn sebastian_ratio(&self) -> Option<Decimal> {
        if self.theta.is_zero() || self.vega.is_zero() {
            return None;
        }
        self.theta.abs().checked_div(self.vega.abs())
    }

    /// Classifies the Sebastian ratio against the target band.
    #[must_use]
    pub fn theta_vega_band(&self) -> Option<ThetaVegaBand> {
        self.sebastian_ratio().map(|ratio| {
            if ratio < Self::TARGET_BAND_LOW {
                ThetaVegaBand::Below
            } else if ratio > Self::TARGET_BAND_HIGH {
                ThetaVegaBand::Above
            } else {
                ThetaVegaBand::Target
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeks(delta: Decimal, theta: Decimal, vega: Decimal) -> PortfolioGreeks {
        PortfolioGreeks {
            spx_delta: delta,
            gamma: Decimal::ZERO,
            theta,
            vega,
            captured_at: Utc::now(),
        }
    }

    fn position_greeks(symbol: &str, qty: i32, vega: Decimal) -> PositionGreeks {
        PositionGreeks {
            position: Position {
                symbol: symbol.to_string(),
                kind: InstrumentKind::Option,
                right: Some(OptionRight::Put),
                strike: Some(dec!(5000)),
                expiry: NaiveDate::from_ymd_opt(2026, 11, 20),
                quantity: qty,
                multiplier: dec!(100),
                conid: None,
            },
            spx_delta: dec!(10),
            gamma: dec!(1),
            theta: dec!(20),
            vega,
        }
    }

    #[test]
    fn aggregate_sums_all_positions() {
        let positions = vec![
            position_greeks("SPX", -2, dec!(-300)),
            position_greeks("SPY", 5, dec!(120)),
        ];
        let total = PortfolioGreeks::aggregate(&positions, Utc::now());
        assert_eq!(total.spx_delta, dec!(20));
        assert_eq!(total.gamma, dec!(2));
        assert_eq!(total.theta, dec!(40));
        assert_eq!(total.vega, dec!(-180));
    }

    #[test]
    fn sebastian_ratio_undefined_on_zero() {
        assert_eq!(greeks(dec!(0), dec!(0), dec!(-100)).sebastian_ratio(), None);
        assert_eq!(greeks(dec!(0), dec!(50), dec!(0)).sebastian_ratio(), None);
        assert_eq!(
            greeks(dec!(0), dec!(30), dec!(-100)).sebastian_ratio(),
            Some(dec!(0.3))
        );
    }

    #[test]
    fn ratios_return_none_instead_of_dividing_by_zero() {
        let g = greeks(dec!(100), dec!(0), dec!(0));
        assert_eq!(g.theta_vega_ratio(), None);
        assert_eq!(g.delta_theta_ratio(), None);
        assert_eq!(greeks(dec!(0), dec!(50), dec!(-200)).delta_theta_ratio(), Some(dec!(0)));
    }

    #[test]
    fn band_classification() {
        assert_eq!(
            greeks(dec!(0), dec!(10), dec!(-100)).theta_vega_band(),
            Some(ThetaVegaBand::Below)
        );
        assert_eq!(
            greeks(dec!(0), dec!(40), dec!(-100)).theta_vega_band(),
            Some(ThetaVegaBand::Target)
        );
        assert_eq!(
            greeks(dec!(0), dec!(41), dec!(-100)).theta_vega_band(),
            Some(ThetaVegaBand::Above)
        );
    }

    #[test]
    fn closing_change_negates_position_greeks() {
        let p = position_greeks("SPX", -4, dec!(-400));
        let change = GreekChange::closing(&p, 2).unwrap();
        assert_eq!(change.vega, dec!(200));
        assert_eq!(change.spx_delta, dec!(-5));
        assert_eq!(change.theta, dec!(-10));
    }

    #[test]
    fn per_contract_divides_by_quantity() {
        let p = position_greeks("SPX", -4, dec!(-400));
        let (_, _, _, vega) = p.per_contract().unwrap();
        assert_eq!(vega, dec!(-100));
    }
}
