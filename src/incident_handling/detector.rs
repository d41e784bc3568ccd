// detector.rs
//
// Classifies edges as closed, surging or blocked by an accident. Checks run
// in a fixed order and the first match wins.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::config::IncidentConfig;
use crate::flow_analyzer::history::EdgeHistory;
use crate::flow_analyzer::telemetry::road_id_of;
use crate::simulation_engine::simulator::lane_id;
use crate::simulation_engine::Simulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    SuddenSurge,
    RoadClosure,
    Accident,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::SuddenSurge => "sudden_surge",
            IncidentKind::RoadClosure => "road_closure",
            IncidentKind::Accident => "accident",
        }
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub kind: IncidentKind,
    pub edge_id: String,
    pub step: u64,
}

/// What the detector knows about one edge at one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeObservation {
    pub halting: u32,
    pub mean_speed: f64,
    pub all_lanes_blocked: bool,
    /// The controlling signal shows red on every lane of the edge.
    pub signal_red: bool,
    /// Current queues of the other approaches of the same intersection.
    pub neighbor_queues: Vec<u32>,
}

impl EdgeObservation {
    /// True when the queue exceeds `factor` times the neighbors' mean. An
    /// edge without neighbors is disproportionate as soon as it queues.
    pub fn is_disproportionate(&self, factor: f64) -> bool {
        if self.neighbor_queues.is_empty() {
            return self.halting > 0;
        }
        let mean = self.neighbor_queues.iter().sum::<u32>() as f64 / self.neighbor_queues.len() as f64;
        self.halting as f64 > factor * mean
    }
}

pub fn classify(
    edge: &str,
    observation: &EdgeObservation,
    history: &EdgeHistory,
    config: &IncidentConfig,
) -> Option<IncidentKind> {
    if observation.all_lanes_blocked {
        return Some(IncidentKind::RoadClosure);
    }
    if observation.halting > config.surge_queue_threshold {
        return Some(IncidentKind::SuddenSurge);
    }
    if !config.accident_detection || observation.signal_red {
        return None;
    }
    if history.is_persistent(edge) {
        return Some(IncidentKind::Accident);
    }
    if !observation.is_disproportionate(config.disproportion_factor) {
        return None;
    }
    if observation.mean_speed < config.low_speed_threshold
        && history.speed_variance(edge) > config.speed_variance_threshold
    {
        return Some(IncidentKind::Accident);
    }
    None
}

/// Scans every edge of the network. Built once from the simulator's
/// traffic lights so that signal state and neighbors are known per edge.
pub struct IncidentDetector {
    config: IncidentConfig,
    /// edge -> (traffic light, signal indices of the edge's lanes)
    edge_signals: HashMap<String, Vec<(String, Vec<usize>)>>,
    /// edge -> other edges entering the same intersection
    neighbors: HashMap<String, BTreeSet<String>>,
}

impl IncidentDetector {
    pub fn new<S: Simulator + ?Sized>(sim: &S, config: IncidentConfig) -> Self {
        let mut edge_signals: HashMap<String, Vec<(String, Vec<usize>)>> = HashMap::new();
        let mut neighbors: HashMap<String, BTreeSet<String>> = HashMap::new();

        let tls_ids = sim.traffic_light_ids().unwrap_or_else(|e| {
            log::warn!("Traffic lights unavailable to the incident detector: {}", e);
            Vec::new()
        });
        for tls_id in tls_ids {
            let lanes = match sim.controlled_lanes(&tls_id) {
                Ok(lanes) => lanes,
                Err(e) => {
                    log::warn!("[{}] controlled lanes unavailable: {}", tls_id, e);
                    continue;
                }
            };
            let mut by_edge: BTreeMap<String, Vec<usize>> = BTreeMap::new();
            for (index, lane) in lanes.iter().enumerate() {
                by_edge.entry(road_id_of(lane).to_string()).or_default().push(index);
            }
            for edge in by_edge.keys() {
                let others = by_edge.keys().filter(|other| *other != edge).cloned();
                neighbors.entry(edge.clone()).or_default().extend(others);
            }
            for (edge, indices) in by_edge {
                edge_signals.entry(edge).or_default().push((tls_id.clone(), indices));
            }
        }

        Self {
            config,
            edge_signals,
            neighbors,
        }
    }

    pub fn config(&self) -> &IncidentConfig {
        &self.config
    }

    /// Whether every lane of `edge` is red at every light controlling it.
    /// Uncontrolled edges are never red.
    fn signal_red<S: Simulator + ?Sized>(&self, sim: &S, edge: &str) -> bool {
        let Some(signals) = self.edge_signals.get(edge) else {
            return false;
        };
        signals.iter().all(|(tls_id, indices)| match sim.signal_state(tls_id) {
            Ok(state) => {
                let state: Vec<char> = state.chars().collect();
                indices.iter().all(|&i| state.get(i) == Some(&'r'))
            }
            Err(e) => {
                log::warn!("[{}] signal state unavailable: {}", tls_id, e);
                false
            }
        })
    }

    fn all_lanes_blocked<S: Simulator + ?Sized>(sim: &S, edge: &str) -> bool {
        let lanes = match sim.edge_lane_count(edge) {
            Ok(lanes) if lanes > 0 => lanes,
            Ok(_) => return false,
            Err(e) => {
                log::warn!("Lane count for edge {} unavailable: {}", edge, e);
                return false;
            }
        };
        (0..lanes).all(|index| {
            let lane = lane_id(edge, index);
            match sim.lane_disallowed(&lane) {
                Ok(classes) => !classes.is_empty(),
                Err(e) => {
                    log::warn!("Permissions for lane {} unavailable: {}", lane, e);
                    false
                }
            }
        })
    }

    /// Runs one detection pass over every edge.
    pub fn detect<S: Simulator + ?Sized>(&self, sim: &S, history: &EdgeHistory, step: u64) -> Vec<Incident> {
        let edges = match sim.edge_ids() {
            Ok(edges) => edges,
            Err(e) => {
                log::warn!("Edge list unavailable, detection skipped: {}", e);
                return Vec::new();
            }
        };

        let halting: HashMap<&str, u32> = edges
            .iter()
            .map(|edge| {
                let queue = sim.edge_halting_number(edge).unwrap_or_else(|e| {
                    log::warn!("Halting count for edge {} unavailable: {}", edge, e);
                    0
                });
                (edge.as_str(), queue)
            })
            .collect();

        let mut incidents = Vec::new();
        for edge in &edges {
            let mean_speed = sim.edge_mean_speed(edge).unwrap_or_else(|e| {
                log::warn!("Mean speed for edge {} unavailable: {}", edge, e);
                0.0
            });
            let neighbor_queues = self
                .neighbors
                .get(edge)
                .map(|others| {
                    others
                        .iter()
                        .map(|other| halting.get(other.as_str()).copied().unwrap_or(0))
                        .collect()
                })
                .unwrap_or_default();
            let observation = EdgeObservation {
                halting: halting.get(edge.as_str()).copied().unwrap_or(0),
                mean_speed,
                all_lanes_blocked: Self::all_lanes_blocked(sim, edge),
                signal_red: self.signal_red(sim, edge),
                neighbor_queues,
            };
            if let Some(kind) = classify(edge, &observation, history, &self.config) {
                log::info!("Step {}: {} detected on edge {}", step, kind, edge);
                incidents.push(Incident {
                    kind,
                    edge_id: edge.clone(),
                    step,
                });
            }
        }
        incidents
    }
}
