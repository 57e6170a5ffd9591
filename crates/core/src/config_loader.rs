use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::config::{AppConfig, RiskLimitMatrix};

/// Environment prefix for overrides, e.g. `RISKDESK_PROPOSER__TOP_N=2`.
pub const ENV_PREFIX: &str = "RISKDESK_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by layering defaults, a TOML file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the merged config is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        Self::extract(Self::base(path.as_ref()))
    }

    /// Loads application configuration with a profile overlay (`Config.<profile>.toml`
    /// next to the base file).
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be parsed or the merged config is invalid.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig> {
        let path = path.as_ref();
        let overlay = path.with_file_name(format!(
            "{}.{profile}.toml",
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Config")
        ));
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(overlay))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    /// Loads and validates the regime risk-limit matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable, or breaks a sign convention.
    pub fn load_risk_limits(path: impl AsRef<Path>) -> Result<RiskLimitMatrix> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("risk-limit matrix not found at {}", path.display());
        }
        let matrix: RiskLimitMatrix = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .with_context(|| format!("failed to parse risk-limit matrix {}", path.display()))?;
        matrix.validate()?;
        Ok(matrix)
    }

    fn base(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn extract(figment: Figment) -> Result<AppConfig> {
        let config: AppConfig = figment.extract().context("failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::Regime;
    use rust_decimal_macros::dec;
    use std::io::Write;

    const MATRIX: &str = r#"
[regimes.neutral_volatility]
min_daily_theta_pct_nlv = 0.001
max_negative_vega_pct_nlv = -0.048
max_spx_delta_pct_nlv = 0.006
max_gamma_pct_nlv = 0.001
allowed_strategies = ["iron_condor"]
max_position_contracts = 15
max_single_underlying_vega_pct = 0.4
"#;

    #[test]
    fn loads_matrix_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MATRIX.as_bytes()).unwrap();

        let matrix = ConfigLoader::load_risk_limits(file.path()).unwrap();
        let neutral = matrix.limits_for(Regime::NeutralVolatility).unwrap();
        assert_eq!(neutral.max_negative_vega_pct_nlv, dec!(-0.048));
        assert!(matrix.limits_for(Regime::CrisisMode).is_err());
    }

    #[test]
    fn missing_matrix_file_is_an_error() {
        assert!(ConfigLoader::load_risk_limits("does/not/exist.toml").is_err());
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[proposer]\naccount_id = \"U777\"\ntop_n = 2\n")
            .unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.proposer.account_id, "U777");
        assert_eq!(config.proposer.top_n, 2);
        assert_eq!(config.regime.high_vix, dec!(22));
    }

    #[test]
    fn invalid_allow_list_fails_to_load() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[hedging]\nallowed_benchmarks = [\"SPX\", \"TSLA\"]\n")
            .unwrap();
        assert!(ConfigLoader::load(file.path()).is_err());
    }
}
