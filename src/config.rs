use crate::coord_conversion::DEFAULT_PRECISION;
use crate::errors::{Result, ensure_positive_distance, validation_err};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum distance at which two points are merged
    pub margin: f64,
    /// Maximum perpendicular distance for a point to count as lying on a line
    pub tolerance: f64,
    /// Upper bound on merge/split rounds during normalization
    pub max_passes: usize,
    /// Decimal places used for vertex names
    pub coord_precision: usize,
    /// Graph size above which path enumeration logs a cost warning
    pub path_warning_vertices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            margin: 0.1,
            tolerance: 0.1,
            max_passes: 8,
            coord_precision: DEFAULT_PRECISION,
            path_warning_vertices: 5000,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive_distance("margin", self.margin)?;
        ensure_positive_distance("tolerance", self.tolerance)?;
        if self.max_passes == 0 {
            return Err(validation_err!("max_passes must be at least 1"));
        }
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)
            .map_err(|e| validation_err!("invalid engine config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{"margin": 0.5}"#).unwrap();
        assert_eq!(config.margin, 0.5);
        assert_eq!(config.tolerance, EngineConfig::default().tolerance);
        assert_eq!(config.coord_precision, 6);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"tolerance": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"max_passes": 0}"#).is_err());
        assert!(EngineConfig::from_json_str("not json").is_err());
        assert!(EngineConfig::default().with_margin(-1.0).validate().is_err());
    }
}
