//! Dashboard configuration: segmentation thresholds and display sizes
//!
//! Read from a TOML file when one is given, otherwise from the embedded
//! default below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};
use crate::rfm::SegmentationConfig;

/// How many rows the rankings show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub top_categories: usize,
    pub top_states: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            top_categories: 10,
            top_states: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub segmentation: SegmentationConfig,
    pub display: DisplayConfig,
}

/// Default configuration embedded in the binary
pub const DEFAULT_CONFIG: &str = r#"
[segmentation]
quantiles = 4
status_policy = "exclude-cancelled"
fallback = "Potential"

[[segmentation.rules]]
segment = "Champions"
min_r = 3
min_f = 3
min_m = 3

[[segmentation.rules]]
segment = "Loyal"
min_r = 3
min_f = 2

[[segmentation.rules]]
segment = "At Risk"
max_r = 2
min_m = 3

[display]
top_categories = 10
top_states = 15
"#;

impl DashboardConfig {
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: DashboardConfig =
            toml::from_str(contents).map_err(|e| DashboardError::Config(e.to_string()))?;
        if config.segmentation.quantiles == 0 {
            return Err(DashboardError::Config(
                "segmentation.quantiles must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Load configuration from `path`, or the embedded default when `None`
pub fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path.display());
            let contents = std::fs::read_to_string(path)
                .map_err(|e| DashboardError::Config(format!("{}: {}", path.display(), e)))?;
            DashboardConfig::from_toml(&contents)
        }
        None => {
            tracing::debug!("Using default embedded configuration");
            DashboardConfig::from_toml(DEFAULT_CONFIG)
        }
    }
}
