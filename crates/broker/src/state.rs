//! Paper broker state file.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use riskdesk_core::{
    AccountSummary, GreekChange, InstrumentKind, LegAction, OptionRight, OrderLeg, PositionGreeks,
};

/// How transmitted paper orders resolve when polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Filled on the first poll.
    #[default]
    Fill,
    /// Stays working indefinitely.
    Work,
    /// Rejected on the first poll.
    Reject,
    /// Broker never answers status requests.
    Silent,
}

/// Market inputs served by the paper feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMarket {
    pub vix: Decimal,
    pub term_structure: Decimal,
    #[serde(default)]
    pub recession_probability: Option<Decimal>,
    pub spx_price: Decimal,
}

/// Futures or shares with a fixed delta and margin per unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearInstrument {
    pub symbol: String,
    pub kind: InstrumentKind,
    pub delta_per_unit: Decimal,
    pub margin_per_unit: Decimal,
}

/// Per-contract Greeks of a long at-the-money option, decaying linearly to
/// zero at `decay_pct` distance from the money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionModel {
    pub symbol: String,
    pub right: OptionRight,
    pub atm: GreekChange,
    pub decay_pct: Decimal,
    pub multiplier: Decimal,
    /// Fraction of strike notional held as margin on a short contract.
    pub short_margin_rate: Decimal,
}

impl OptionModel {
    /// Greeks of one long contract at `strike`.
    #[must_use]
    pub fn greeks_at(&self, strike: Decimal, spot: Decimal) -> GreekChange {
        let factor = if spot.is_zero() || self.decay_pct.is_zero() {
            Decimal::ZERO
        } else {
            let distance = ((strike - spot) / spot).abs();
            (Decimal::ONE - distance / self.decay_pct).max(Decimal::ZERO)
        };
        GreekChange {
            spx_delta: self.atm.spx_delta * factor,
            gamma: self.atm.gamma * factor,
            theta: self.atm.theta * factor,
            vega: self.atm.vega * factor,
        }
    }

    #[must_use]
    pub fn short_margin(&self, strike: Decimal) -> Decimal {
        strike * self.multiplier * self.short_margin_rate
    }
}

/// Everything the paper broker serves, loaded from and saved to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperState {
    pub account: AccountSummary,
    pub positions: Vec<PositionGreeks>,
    pub market: PaperMarket,
    #[serde(default)]
    pub linear: Vec<LinearInstrument>,
    #[serde(default)]
    pub options: Vec<OptionModel>,
    #[serde(default)]
    pub fill_mode: FillMode,
    /// Legs without a resolved instrument id go out per leg instead of as a combo.
    #[serde(default)]
    pub combo_supported: bool,
    /// Commission per contract or share lot.
    #[serde(default = "default_commission")]
    pub commission_per_unit: Decimal,
}

fn default_commission() -> Decimal {
    dec!(0.65)
}

impl PaperState {
    /// Loads state from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read paper state {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse paper state {}", path.display()))
    }

    /// Writes state back as pretty JSON.
    ///
    /// # Errors
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to encode paper state")?;
        std::fs::write(path, raw)
            .with_context(|| format!("Failed to write paper state {}", path.display()))
    }

    #[must_use]
    pub fn linear(&self, symbol: &str) -> Option<&LinearInstrument> {
        self.linear.iter().find(|i| i.symbol == symbol)
    }

    #[must_use]
    pub fn option_model(&self, symbol: &str, right: OptionRight) -> Option<&OptionModel> {
        self.options
            .iter()
            .find(|m| m.symbol == symbol && m.right == right)
    }

    /// Index of the held position a leg trades, if any.
    #[must_use]
    pub fn held_index(&self, leg: &OrderLeg) -> Option<usize> {
        self.positions.iter().position(|p| {
            let pos = &p.position;
            pos.symbol == leg.symbol
                && pos.kind == leg.kind
                && pos.strike == leg.strike
                && pos.expiry == leg.expiry
                && pos.right == leg.right
        })
    }

    /// Per-unit Greeks of a long unit of the leg's instrument.
    ///
    /// Held positions answer from their own Greeks; other instruments come
    /// from the linear table or the option model.
    #[must_use]
    pub fn unit_greeks(&self, leg: &OrderLeg) -> Option<GreekChange> {
        if let Some(held) = self.held_index(leg).map(|i| &self.positions[i]) {
            let (delta, gamma, theta, vega) = held.per_contract()?;
            // per_contract divides by |quantity|; restore the long-unit sign
            let sign = if held.position.quantity < 0 {
                Decimal::NEGATIVE_ONE
            } else {
                Decimal::ONE
            };
            return Some(GreekChange {
                spx_delta: delta * sign,
                gamma: gamma * sign,
                theta: theta * sign,
                vega: vega * sign,
            });
        }
        match leg.kind {
            InstrumentKind::Option => {
                let model = self.option_model(&leg.symbol, leg.right?)?;
                Some(model.greeks_at(leg.strike?, self.market.spx_price))
            }
            InstrumentKind::Future | InstrumentKind::Stock => {
                let instrument = self.linear(&leg.symbol)?;
                Some(GreekChange {
                    spx_delta: instrument.delta_per_unit,
                    ..GreekChange::default()
                })
            }
        }
    }
}

/// Signed unit count of a leg: positive for buys.
#[must_use]
pub fn signed_quantity(leg: &OrderLeg) -> i64 {
    let qty = i64::from(leg.quantity);
    match leg.action {
        LegAction::Buy => qty,
        LegAction::Sell => -qty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spx_put_model() -> OptionModel {
        OptionModel {
            symbol: "SPX".to_string(),
            right: OptionRight::Put,
            atm: GreekChange {
                spx_delta: dec!(-50),
                gamma: dec!(0.5),
                theta: dec!(-80),
                vega: dec!(500),
            },
            decay_pct: dec!(0.20),
            multiplier: dec!(100),
            short_margin_rate: dec!(0.15),
        }
    }

    #[test]
    fn option_greeks_decay_away_from_the_money() {
        let model = spx_put_model();
        let atm = model.greeks_at(dec!(5000), dec!(5000));
        assert_eq!(atm.vega, dec!(500));

        let otm = model.greeks_at(dec!(4750), dec!(5000));
        assert_eq!(otm.vega, dec!(375));

        let far = model.greeks_at(dec!(3000), dec!(5000));
        assert_eq!(far.vega, Decimal::ZERO);
    }

    #[test]
    fn short_margin_scales_with_strike() {
        assert_eq!(spx_put_model().short_margin(dec!(4800)), dec!(72000));
    }

    #[test]
    fn signed_quantity_follows_action() {
        let buy = OrderLeg::outright("MES", InstrumentKind::Future, LegAction::Buy, 3);
        let sell = OrderLeg::outright("MES", InstrumentKind::Future, LegAction::Sell, 3);
        assert_eq!(signed_quantity(&buy), 3);
        assert_eq!(signed_quantity(&sell), -3);
    }
}
