//! Configuration types for the simulation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// World configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Side length of the square grid
    pub grid_size: i32,
    /// Probability that a cell starts with an Alpha organism (0.0 to 1.0)
    pub alpha_spawn_probability: f64,
    /// Probability that a cell starts with a Beta organism (0.0 to 1.0)
    pub beta_spawn_probability: f64,
    /// Pause between ticks in seconds; only read by the render loop
    pub tick_delay_secs: f64,
    /// Chance of a random step when an organism has nowhere to go
    pub move_probability: f64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Age every organism and decay its energy once per tick
    pub aging: bool,
    /// Run shelter cooldowns and in-shelter reproduction once per tick
    pub shelter_upkeep: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            alpha_spawn_probability: 0.15,
            beta_spawn_probability: 0.15,
            tick_delay_secs: 0.5,
            move_probability: 0.2,
            seed: 0,
            aging: true,
            shelter_upkeep: true,
        }
    }
}

impl WorldConfig {
    /// Reject configurations the simulation cannot start from
    pub fn validate(&self) -> Result<()> {
        if self.grid_size <= 0 {
            return Err(Error::InvalidConfig(format!(
                "grid size must be positive, got {}",
                self.grid_size
            )));
        }

        let probabilities = [
            ("alpha spawn probability", self.alpha_spawn_probability),
            ("beta spawn probability", self.beta_spawn_probability),
            ("move probability", self.move_probability),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        let spawn_total = self.alpha_spawn_probability + self.beta_spawn_probability;
        if spawn_total > 1.0 {
            return Err(Error::InvalidConfig(format!(
                "spawn probabilities sum to {} which exceeds 1",
                spawn_total
            )));
        }

        if !self.tick_delay_secs.is_finite() || self.tick_delay_secs < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tick delay must be a non-negative number of seconds, got {}",
                self.tick_delay_secs
            )));
        }

        Ok(())
    }
}

/// Headless runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// World to simulate
    pub world: WorldConfig,
    /// Stop after this many ticks; run until interrupted when absent
    pub max_ticks: Option<u64>,
    /// Log aggregate counters every this many ticks
    pub log_every: u64,
    /// Dump an ASCII rendering of the grid at debug level
    pub render: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig::default(),
            max_ticks: None,
            log_every: 1,
            render: false,
        }
    }
}

impl RunnerConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RunnerConfig = serde_json::from_str(&raw)?;
        config.world.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded runner configuration");
        Ok(config)
    }
}
