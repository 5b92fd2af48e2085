//! Run configuration.
//!
//! The simulation consumes a single `SimConfig` object; it never reads
//! configuration from ambient state.  Applications typically keep it in a TOML
//! file:
//!
//! ```toml
//! time_step_secs          = 1
//! partition_count         = 4
//! max_sim_time_secs       = 108000   # 30 h
//! flow_capacity_factor    = 1.0
//! storage_capacity_factor = 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, SimClock};

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seconds per step (Δt).  Must be > 0.
    pub time_step_secs: u32,

    /// Number of network partitions advanced in parallel.  Must be ≥ 1.
    /// Results do not depend on this value, only wall-clock time does.
    pub partition_count: usize,

    /// Simulated second after which the run stops even if agents are still
    /// travelling.  Reaching it is a normal end condition.
    pub max_sim_time_secs: u64,

    /// Multiplier on every link's flow capacity (e.g. 0.1 for a 10 % sample).
    pub flow_capacity_factor: f64,

    /// Multiplier on every link's storage capacity.
    pub storage_capacity_factor: f64,

    /// Simulated second of the first step.
    pub start_time_secs: u64,

    /// Worker threads for the partition pool.  `None` uses Rayon's global pool.
    pub num_threads: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_step_secs:          1,
            partition_count:         1,
            max_sim_time_secs:       30 * 3_600,
            flow_capacity_factor:    1.0,
            storage_capacity_factor: 1.0,
            start_time_secs:         0,
            num_threads:             None,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from TOML text and validate it.  Missing keys
    /// fall back to [`SimConfig::default`].
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: SimConfig =
            toml::from_str(text).map_err(|e| CoreError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.  Called by the loaders and by the simulation
    /// builder, so hand-built configs are validated too.
    pub fn validate(&self) -> CoreResult<()> {
        if self.time_step_secs == 0 {
            return Err(CoreError::Config("time_step_secs must be > 0".into()));
        }
        if self.partition_count == 0 {
            return Err(CoreError::Config("partition_count must be >= 1".into()));
        }
        if self.partition_count > u16::MAX as usize {
            return Err(CoreError::Config(format!(
                "partition_count {} exceeds {}",
                self.partition_count,
                u16::MAX
            )));
        }
        if !(self.flow_capacity_factor > 0.0 && self.flow_capacity_factor.is_finite()) {
            return Err(CoreError::Config("flow_capacity_factor must be a positive number".into()));
        }
        if !(self.storage_capacity_factor > 0.0 && self.storage_capacity_factor.is_finite()) {
            return Err(CoreError::Config("storage_capacity_factor must be a positive number".into()));
        }
        if self.max_sim_time_secs < self.start_time_secs {
            return Err(CoreError::Config(format!(
                "max_sim_time_secs {} is before start_time_secs {}",
                self.max_sim_time_secs, self.start_time_secs
            )));
        }
        if self.num_threads == Some(0) {
            return Err(CoreError::Config("num_threads must be >= 1 when set".into()));
        }
        Ok(())
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.start_time_secs, self.time_step_secs)
    }
}
