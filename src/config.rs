use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::global_variables::*;

/// Which duration policy the controller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Baseline program only.
    Fixed,
    /// Rebuild the whole program from queue shares above a demand threshold.
    #[default]
    Threshold,
    /// Extend or shrink the live phase.
    Nudge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub min_green: f64,
    pub max_green: f64,
    pub min_red: f64,
    pub queue_threshold: u32,
    pub max_green_added: f64,
    pub min_green_added: f64,
    pub min_less_red_factor: f64,
    pub min_extension: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_green: MIN_GREEN,
            max_green: MAX_GREEN,
            min_red: MIN_RED,
            queue_threshold: QUEUE_THRESHOLD,
            max_green_added: MAX_GREEN_ADDED,
            min_green_added: MIN_GREEN_ADDED,
            min_less_red_factor: MIN_LESS_RED_FACTOR,
            min_extension: MIN_EXTENSION,
        }
    }
}

/// When the nudge policy is allowed to act at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub min_vehicles: usize,
    pub tls_queue_threshold: u32,
    pub min_avg_speed: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_vehicles: MIN_VEHICLES_THRESHOLD,
            tls_queue_threshold: TLS_QUEUE_THRESHOLD,
            min_avg_speed: MIN_AVG_SPEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentConfig {
    pub enabled: bool,
    /// Steps between two detection passes.
    pub check_interval: u64,
    pub surge_queue_threshold: u32,
    /// Length of the per-edge queue and speed history.
    pub history_window: usize,
    pub low_speed_threshold: f64,
    pub speed_variance_threshold: f64,
    /// An edge queue is disproportionate above this multiple of its
    /// neighbors' mean queue.
    pub disproportion_factor: f64,
    /// Enables the accident rules after the closure and surge checks.
    pub accident_detection: bool,
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: INCIDENT_CHECK_INTERVAL,
            surge_queue_threshold: SURGE_QUEUE_THRESHOLD,
            history_window: HISTORY_WINDOW,
            low_speed_threshold: LOW_SPEED_THRESHOLD,
            speed_variance_threshold: SPEED_VARIANCE_THRESHOLD,
            disproportion_factor: DISPROPORTION_FACTOR,
            accident_detection: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    pub enabled: bool,
    /// Edge to close; a random edge is picked when absent.
    pub edge: Option<String>,
    pub probability: f64,
    /// Steps the edge stays closed once it has drained.
    pub duration: u64,
    pub seed: u64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            edge: None,
            probability: INJECTOR_BLOCK_PROBABILITY,
            duration: INJECTOR_BLOCK_DURATION,
            seed: 0,
        }
    }
}

/// Everything one experiment run needs. Every field has a default, so an
/// empty JSON object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub scenario: PathBuf,
    pub baseline_phases: Option<PathBuf>,
    pub policy: PolicyKind,
    pub timing: TimingConfig,
    pub optimize_gate: GateConfig,
    pub incidents: IncidentConfig,
    pub injector: InjectorConfig,
    pub max_steps: u64,
    pub output_dir: PathBuf,
    pub amqp: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("scenario.json"),
            baseline_phases: None,
            policy: PolicyKind::default(),
            timing: TimingConfig::default(),
            optimize_gate: GateConfig::default(),
            incidents: IncidentConfig::default(),
            injector: InjectorConfig::default(),
            max_steps: MAX_STEPS,
            output_dir: PathBuf::from("output"),
            amqp: None,
        }
    }
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;
        if !(timing.min_green > 0.0) || timing.min_green > timing.max_green {
            return Err(ConfigError::Invalid(format!(
                "green bounds [{}, {}]",
                timing.min_green, timing.max_green
            )));
        }
        if !(timing.min_red > 0.0) {
            return Err(ConfigError::Invalid(format!("min_red {}", timing.min_red)));
        }
        if timing.min_green_added > timing.max_green_added {
            return Err(ConfigError::Invalid(format!(
                "green extension bounds [{}, {}]",
                timing.min_green_added, timing.max_green_added
            )));
        }
        if !(0.0..=1.0).contains(&timing.min_less_red_factor) {
            return Err(ConfigError::Invalid(format!(
                "min_less_red_factor {}",
                timing.min_less_red_factor
            )));
        }
        if self.incidents.check_interval == 0 || self.incidents.history_window == 0 {
            return Err(ConfigError::Invalid(
                "incident check_interval and history_window must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.injector.probability) {
            return Err(ConfigError::Invalid(format!(
                "injector probability {}",
                self.injector.probability
            )));
        }
        Ok(())
    }
}
