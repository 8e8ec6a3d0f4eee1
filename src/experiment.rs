use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MatchmakingConfig;
use crate::error::ConfigError;

/// Describes a single-parameter sweep: run the engine once per value of one
/// named numeric config field and compare the resulting statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub description: String,
    /// Dot-free top-level field name on `MatchmakingConfig`, e.g. "gamma".
    pub parameter: String,
    pub values: Vec<f64>,
    pub runs_per_value: usize,
    pub ticks_per_run: u64,
}

/// Returns a copy of `config` with `parameter` (a top-level numeric field
/// name) overridden to `value`, re-validating the result. Works via a
/// serialize/patch/deserialize round trip rather than a hand-maintained
/// match over every field name, so newly added config fields are swept for
/// free.
pub fn with_parameter_override(
    config: &MatchmakingConfig,
    parameter: &str,
    value: f64,
) -> Result<MatchmakingConfig, ConfigError> {
    let mut json = serde_json::to_value(config).map_err(|_| ConfigError::UnknownParameter(parameter.to_string()))?;

    match json.get_mut(parameter) {
        Some(slot) => *slot = Value::from(value),
        None => return Err(ConfigError::UnknownParameter(parameter.to_string())),
    }

    let patched: MatchmakingConfig =
        serde_json::from_value(json).map_err(|_| ConfigError::UnknownParameter(parameter.to_string()))?;
    patched.validate()?;
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_a_known_numeric_field() {
        let config = MatchmakingConfig::default();
        let patched = with_parameter_override(&config, "gamma", 5.0).unwrap();
        assert_eq!(patched.gamma, 5.0);
    }

    #[test]
    fn rejects_an_unknown_field() {
        let config = MatchmakingConfig::default();
        assert!(with_parameter_override(&config, "not_a_real_field", 1.0).is_err());
    }
}
