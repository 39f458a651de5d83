//! Numeric routines over contact matrices.
//!
//! - [`balance`]: iterative matrix balancing (bias correction).
//! - [`expected`]: distance-decay profile and observed/expected
//!   normalization.
//! - [`insulation`]: diamond insulation score and boundary calls.

pub mod balance;
pub mod expected;
pub mod insulation;

use std::io::Read;

use serde::{
    Deserialize,
    Serialize,
};

use crate::with_field_fn;
use balance::BalanceConfig;
use expected::ExpectedConfig;
use insulation::InsulationConfig;

/// Parameters of every tool, as read from a single JSON document.
///
/// Missing sections and fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub balance:    BalanceConfig,
    pub expected:   ExpectedConfig,
    pub insulation: InsulationConfig,
}

impl PipelineConfig {
    with_field_fn!(balance, BalanceConfig);
    with_field_fn!(expected, ExpectedConfig);
    with_field_fn!(insulation, InsulationConfig);

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        match serde_json::from_str(json) {
            Ok(config) => Ok(config),
            Err(e) => bail_config!("malformed configuration: {}", e),
        }
    }

    pub fn from_json_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        match serde_json::from_reader(reader) {
            Ok(config) => Ok(config),
            Err(e) => bail_config!("malformed configuration: {}", e),
        }
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        hic_error,
        HicError,
    };

    #[test]
    fn partial_document() {
        let config = PipelineConfig::from_json_str(
            r#"{"balance": {"tolerance": 1e-3}, "insulation": {"window_bp": 50000}}"#,
        )
        .unwrap();
        assert_eq!(config.balance.tolerance, 1e-3);
        assert_eq!(config.balance.max_iterations, 1000);
        assert_eq!(config.expected, ExpectedConfig::default());
        assert_eq!(config.insulation.window_bp, 50_000);
        assert_eq!(config.insulation.max_bad_bins, 2);
    }

    #[test]
    fn json_round_trip() {
        let config = PipelineConfig::default()
            .with_insulation(InsulationConfig::new(200_000, 1))
            .with_balance(BalanceConfig::new(10, 2, 0.0));
        let json = config.to_json_string().unwrap();
        let parsed = PipelineConfig::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn malformed_document() {
        let err = PipelineConfig::from_json_str("{\"balance\": 3}").unwrap_err();
        assert!(matches!(hic_error(&err), Some(HicError::InvalidConfig(_))));
    }
}
