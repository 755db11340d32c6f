//! Configuration system for RosterForge.
//!
//! Load rebalancing configuration from TOML or YAML to tune iteration
//! budgets, tolerance bands, checkpointing and dead-end thresholds without
//! code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use rosterforge_config::RebalanceConfig;
//! use std::time::Duration;
//!
//! let config = RebalanceConfig::from_toml_str(r#"
//!     random_seed = 7
//!     max_iterations = 30
//!
//!     [tolerance]
//!     objective_pct = 10.0
//!
//!     [termination]
//!     seconds_spent_limit = 30
//! "#).unwrap();
//!
//! assert_eq!(config.max_iterations, 30);
//! assert_eq!(config.tolerance.objective_pct, 10.0);
//! assert_eq!(config.tolerance.emergency_pct, 12.0);
//! assert_eq!(config.time_limit(), Some(Duration::from_secs(30)));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use rosterforge_config::RebalanceConfig;
//!
//! let config = RebalanceConfig::load("rebalance.toml").unwrap_or_default();
//! assert_eq!(config.max_iterations, 50);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main rebalancing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RebalanceConfig {
    /// Random seed for reproducible results.
    pub random_seed: Option<u64>,

    /// Upper bound on rebalancing-loop iterations.
    pub max_iterations: u32,

    /// Iterations without beating the best before the loop gives up.
    pub convergence_threshold: u32,

    /// Consecutive iterations tied with the best before a hard stop.
    pub max_no_change: u32,

    /// Tolerance bands.
    pub tolerance: ToleranceConfig,

    /// Checkpoint store configuration.
    pub checkpoint: CheckpointConfig,

    /// Dead-end detection thresholds.
    pub dead_end: DeadEndConfig,

    /// Strategy engine tuning.
    pub strategy: StrategyConfig,

    /// Strict ±N balance pass.
    pub strict_balance: StrictBalanceConfig,

    /// Termination configuration.
    pub termination: Option<TerminationConfig>,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            random_seed: None,
            max_iterations: 50,
            convergence_threshold: 3,
            max_no_change: 2,
            tolerance: ToleranceConfig::default(),
            checkpoint: CheckpointConfig::default(),
            dead_end: DeadEndConfig::default(),
            strategy: StrategyConfig::default(),
            strict_balance: StrictBalanceConfig::default(),
            termination: None,
        }
    }
}

impl RebalanceConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML, or fails
    /// [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::from_toml_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Sets the termination time limit.
    pub fn with_termination_seconds(mut self, seconds: u64) -> Self {
        self.termination = Some(TerminationConfig {
            seconds_spent_limit: Some(seconds),
            ..self.termination.unwrap_or_default()
        });
        self
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Sets the iteration budget of the rebalancing loop.
    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Returns the termination time limit, if configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use rosterforge_config::RebalanceConfig;
    /// use std::time::Duration;
    ///
    /// let config = RebalanceConfig::new().with_termination_seconds(5);
    /// assert_eq!(config.time_limit(), Some(Duration::from_secs(5)));
    /// ```
    pub fn time_limit(&self) -> Option<Duration> {
        self.termination.as_ref().and_then(|t| t.time_limit())
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance.emergency_pct < self.tolerance.objective_pct {
            return Err(ConfigError::Invalid(format!(
                "emergency_pct ({}) must not be below objective_pct ({})",
                self.tolerance.emergency_pct, self.tolerance.objective_pct
            )));
        }
        if self.checkpoint.capacity < 2 {
            return Err(ConfigError::Invalid(
                "checkpoint capacity must be at least 2".to_string(),
            ));
        }
        if self.checkpoint.recent_window == 0 {
            return Err(ConfigError::Invalid(
                "checkpoint recent_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tolerance bands around each worker's target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ToleranceConfig {
    /// Phase 1 objective band, in percent of target.
    pub objective_pct: f64,

    /// Phase 2 emergency band; beyond it a worker is critical.
    pub emergency_pct: f64,

    /// Lower bound for the work-percentage scaling factor.
    pub part_time_floor: f64,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            objective_pct: 8.0,
            emergency_pct: 12.0,
            part_time_floor: 0.05,
        }
    }
}

/// Checkpoint store configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CheckpointConfig {
    /// Maximum checkpoints kept; the first is always retained.
    pub capacity: usize,

    /// How many recent rollback targets are penalized.
    pub recent_window: usize,

    /// Periodic checkpoint interval during improvement.
    pub periodic_interval: u32,

    /// Score ratio over the last checkpoint that triggers a new one.
    pub improvement_ratio: f64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            recent_window: 5,
            periodic_interval: 10,
            improvement_ratio: 1.05,
        }
    }
}

/// Dead-end detection thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct DeadEndConfig {
    pub stagnation: u32,
    pub no_improvement: u32,
    pub violations: u32,
    pub impossible: u32,
    /// Workload imbalance above which the state counts as severe.
    pub workload_imbalance: f64,
    /// Weekend imbalance above which the state counts as severe.
    pub weekend_imbalance: f64,
}

impl Default for DeadEndConfig {
    fn default() -> Self {
        Self {
            stagnation: 10,
            no_improvement: 15,
            violations: 5,
            impossible: 3,
            workload_imbalance: 4.0,
            weekend_imbalance: 3.0,
        }
    }
}

/// Strategy engine tuning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct StrategyConfig {
    /// Maximum path length explored by the chain swap.
    pub chain_max_depth: usize,

    /// Run the relaxed swap every this many stalled iterations.
    pub relaxed_every_stalled: u32,

    /// Run the relaxed swap every this many iterations.
    pub relaxed_every: u32,

    /// Upper bound on perturbation intensity.
    pub perturbation_cap: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            chain_max_depth: 4,
            relaxed_every_stalled: 5,
            relaxed_every: 10,
            perturbation_cap: 0.6,
        }
    }
}

/// Strict balance pass configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct StrictBalanceConfig {
    pub max_iterations: u32,

    /// Allowed absolute deviation from target, in shifts.
    pub target_tolerance: u32,

    /// Try a relaxed move every this many iterations.
    pub relaxed_every: u32,
}

impl Default for StrictBalanceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            target_tolerance: 1,
            relaxed_every: 20,
        }
    }
}

/// Termination configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TerminationConfig {
    /// Maximum seconds to spend rebalancing.
    pub seconds_spent_limit: Option<u64>,

    /// Maximum minutes to spend rebalancing.
    pub minutes_spent_limit: Option<u64>,

    /// Maximum number of loop iterations.
    pub iteration_limit: Option<u32>,
}

impl TerminationConfig {
    /// Returns the time limit as a Duration, if any.
    pub fn time_limit(&self) -> Option<Duration> {
        let seconds =
            self.seconds_spent_limit.unwrap_or(0) + self.minutes_spent_limit.unwrap_or(0) * 60;
        if seconds > 0 {
            Some(Duration::from_secs(seconds))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests;
