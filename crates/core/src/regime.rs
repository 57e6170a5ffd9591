//! Market volatility regime.

use serde::{Deserialize, Serialize};

/// Discrete volatility stress level, ordered from calmest to most stressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    LowVolatility,
    NeutralVolatility,
    HighVolatility,
    CrisisMode,
}

impl Regime {
    /// All regimes in increasing stress order.
    pub const ALL: [Regime; 4] = [
        Self::LowVolatility,
        Self::NeutralVolatility,
        Self::HighVolatility,
        Self::CrisisMode,
    ];

    /// Configuration key used in the risk-limit matrix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowVolatility => "low_volatility",
            Self::NeutralVolatility => "neutral_volatility",
            Self::HighVolatility => "high_volatility",
            Self::CrisisMode => "crisis_mode",
        }
    }

    /// Returns the more stressed of `self` and `floor`. Never de-escalates.
    #[must_use]
    pub fn at_least(self, floor: Regime) -> Regime {
        self.max(floor)
    }

    #[must_use]
    pub const fn is_crisis(self) -> bool {
        matches!(self, Self::CrisisMode)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Regime {
    type Err = crate::error::RiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| crate::error::RiskError::Config(format!("unknown regime '{s}'")))
    }
}
