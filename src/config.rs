use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{LocatorError, Result};
use crate::estimator::DEFAULT_THRESHOLD_MW;
use crate::kernel::Kernel;
use crate::smoothing::{default_patterns, CorrectionPattern};
use crate::types::{MoteId, TimeRange, DEFAULT_MOBILE_ID_CUTOFF};

/// Tunables for a location run. Every field has a default, so a config file
/// only needs the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    /// Beacon power (mW) a room needs to be assigned
    pub threshold_mw: f64,
    pub kernel: Kernel,
    pub patterns: Vec<CorrectionPattern>,
    pub time_range: TimeRange,
    pub mobile_id_cutoff: MoteId,
    pub max_smoothing_passes: usize,
    /// Worker threads across receivers (0 = one per CPU)
    pub workers: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            threshold_mw: DEFAULT_THRESHOLD_MW,
            kernel: Kernel::default(),
            patterns: default_patterns(),
            time_range: TimeRange::default(),
            mobile_id_cutoff: DEFAULT_MOBILE_ID_CUTOFF,
            max_smoothing_passes: 10_000,
            workers: 0,
        }
    }
}

impl LocatorConfig {
    /// Load a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: LocatorConfig = serde_json::from_str(&text).map_err(|e| {
            LocatorError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold_mw.is_finite() || self.threshold_mw < 0.0 {
            return Err(LocatorError::InvalidConfig(format!(
                "threshold {} mW must be finite and non-negative",
                self.threshold_mw
            )));
        }
        if self.time_range.is_empty() {
            return Err(LocatorError::InvalidConfig(format!(
                "time range {}..{} is empty",
                self.time_range.start, self.time_range.end
            )));
        }
        if self.max_smoothing_passes == 0 {
            return Err(LocatorError::InvalidConfig(
                "max_smoothing_passes must be at least 1".to_string(),
            ));
        }
        // kernel and pattern invariants are enforced when they are built
        Ok(())
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
