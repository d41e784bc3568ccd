// src/shared_data.rs

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Halting vehicles on one road of one intersection at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub step: u64,
    pub time: f64,
    pub tls_id: String,
    pub road_id: String,
    pub queue_length: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedRecord {
    pub step: u64,
    pub time: f64,
    pub edge_id: String,
    pub mean_speed: f64,
}

/// A detected or injected incident and how many vehicles were rerouted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub timestamp: u64,
    pub step: u64,
    pub kind: String,
    pub edge_id: String,
    pub rerouted: usize,
    pub unchanged: usize,
}

/// One timing change pushed to a traffic light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightAdjustmentRecord {
    pub timestamp: u64,
    pub step: u64,
    pub tls_id: String,
    pub action: String,
    pub phase_index: usize,
    pub old_duration: f64,
    pub new_duration: f64,
}

/// Per-intersection results of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub tls_id: String,
    pub demand: String,
    pub vehicles_entered: usize,
    pub throughput: usize,
    pub average_travel_time: f64,
    pub total_waiting_time: f64,
    pub max_queue: u32,
    pub green_time: f64,
    pub red_time: f64,
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
