use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::control_system::phase_program::PhaseSpec;
use crate::error::ConfigError;

/// A road segment between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default = "default_lanes")]
    pub lanes: usize,
    /// Length in meters.
    pub length: f64,
    /// Speed limit in m/s.
    pub speed: f64,
}

fn default_lanes() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficLightSpec {
    pub id: String,
    pub controlled_lanes: Vec<String>,
    pub program: Vec<PhaseSpec>,
}

/// Vehicles entering at `from` heading for `to`, one with `probability`
/// per step between `begin` and `end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub id: String,
    pub from: String,
    pub to: String,
    pub probability: f64,
    #[serde(default)]
    pub begin: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub end_time: f64,
    #[serde(default)]
    pub seed: u64,
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub traffic_lights: Vec<TrafficLightSpec>,
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
