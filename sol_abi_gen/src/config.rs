/* Generator options, loadable from YAML or JSON */

use crate::error::{GenError, GenResult};
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeneratorConfig {
    /// Emit offsets and sizes as named constants instead of inline literals.
    pub named_constants: bool,
    /// Longest run of reference-type heads a copy segment may bridge.
    pub max_consecutive_reference_heads: usize,
    /// Annotate rendered assembly blocks as `"memory-safe"`.
    pub memory_safe: bool,
    pub packing: PackingConfig,
    pub cost: CostModel,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            named_constants: true,
            max_consecutive_reference_heads: 4,
            memory_safe: true,
            packing: PackingConfig::default(),
            cost: CostModel::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_yaml_str(source: &str) -> GenResult<Self> {
        let config: Self = serde_yml::from_str(source).map_err(|e| GenError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn from_json_str(source: &str) -> GenResult<Self> {
        let config: Self = serde_json::from_str(source).map_err(|e| GenError::Config(e.to_string()))?;
        config.validate()
    }

    fn validate(self) -> GenResult<Self> {
        if !self.cost.preference_ratio.is_finite() || self.cost.preference_ratio < 0.0 {
            return Err(GenError::Config(format!(
                "preference-ratio must be a non-negative number, got {}",
                self.cost.preference_ratio
            )));
        }
        Ok(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PackingMode {
    /// Every value occupies whole bytes (storage granularity).
    #[default]
    Bytes,
    /// Every value occupies exactly its natural bit width.
    Bits,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct PackingConfig {
    pub mode: PackingMode,
    pub optimize: bool,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            mode: PackingMode::Bytes,
            optimize: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CostPreference {
    #[default]
    Gas,
    Size,
}

/// Accessor candidates score `gas + bytes * preference_ratio`; ties go to
/// whichever of gas or size `prefer` names.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct CostModel {
    pub preference_ratio: f64,
    pub prefer: CostPreference,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            preference_ratio: 3.0,
            prefer: CostPreference::Gas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = GeneratorConfig::from_yaml_str("named-constants: false\npacking:\n  mode: bits\n").unwrap();
        assert!(!config.named_constants);
        assert_eq!(config.packing.mode, PackingMode::Bits);
        assert!(config.packing.optimize);
        assert_eq!(config.max_consecutive_reference_heads, 4);
    }

    #[test]
    fn json_config_is_validated() {
        let err = GeneratorConfig::from_json_str(r#"{"cost": {"preference-ratio": -1.0}}"#).unwrap_err();
        assert!(matches!(err, GenError::Config(_)));
        let config = GeneratorConfig::from_json_str(r#"{"cost": {"prefer": "size"}}"#).unwrap();
        assert_eq!(config.cost.prefer, CostPreference::Size);
    }
}
