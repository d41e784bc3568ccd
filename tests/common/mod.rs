// Scriptable simulator for integration tests. Every query answers from the
// public maps; commands are recorded so tests can inspect them.
#![allow(dead_code)]

use adaptive_signals::control_system::Program;
use adaptive_signals::error::SimError;
use adaptive_signals::simulation_engine::simulator::ALL_CLASSES;
use adaptive_signals::simulation_engine::Simulator;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct FakeLight {
    pub lanes: Vec<String>,
    /// Signal state used until a program is pushed.
    pub state: String,
    pub phase_index: usize,
    pub phase_duration: f64,
    pub remaining: f64,
    pub program: Option<Program>,
    pub reject_programs: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeEdge {
    pub lanes: usize,
    pub halting: u32,
    pub mean_speed: f64,
    pub vehicles: Vec<String>,
    pub disallowed: HashMap<usize, Vec<String>>,
}

#[derive(Debug, Default)]
pub struct FakeSim {
    pub time: f64,
    pub end_time: f64,
    pub closed: bool,
    pub lights: BTreeMap<String, FakeLight>,
    pub lane_halting: HashMap<String, u32>,
    pub lane_vehicles: HashMap<String, u32>,
    pub lane_speed: HashMap<String, f64>,
    pub failing_lanes: HashSet<String>,
    /// Edges whose queries fail until removed from this set.
    pub failing_edges: HashSet<String>,
    pub edges: BTreeMap<String, FakeEdge>,
    pub routes: HashMap<String, Vec<String>>,
    pub positions: HashMap<String, String>,
    /// (from, to) -> the only alternative route the network offers.
    pub detours: HashMap<(String, String), Vec<String>>,
    pub pushed: Vec<(String, Program)>,
    pub phase_overrides: Vec<(String, f64)>,
}

impl FakeSim {
    pub fn new() -> Self {
        Self {
            end_time: 3600.0,
            ..Self::default()
        }
    }

    pub fn add_light(&mut self, id: &str, lanes: &[&str], state: &str) {
        self.lights.insert(
            id.to_string(),
            FakeLight {
                lanes: lanes.iter().map(|lane| lane.to_string()).collect(),
                state: state.to_string(),
                phase_duration: 30.0,
                remaining: 30.0,
                ..FakeLight::default()
            },
        );
    }

    pub fn set_lane(&mut self, lane: &str, halting: u32, vehicles: u32, speed: f64) {
        self.lane_halting.insert(lane.to_string(), halting);
        self.lane_vehicles.insert(lane.to_string(), vehicles);
        self.lane_speed.insert(lane.to_string(), speed);
    }

    pub fn add_edge(&mut self, id: &str, lanes: usize, halting: u32, mean_speed: f64) {
        self.edges.insert(
            id.to_string(),
            FakeEdge {
                lanes,
                halting,
                mean_speed,
                ..FakeEdge::default()
            },
        );
    }

    pub fn add_vehicle(&mut self, id: &str, route: &[&str]) {
        let route: Vec<String> = route.iter().map(|edge| edge.to_string()).collect();
        if let Some(first) = route.first() {
            self.positions.insert(id.to_string(), first.clone());
            if let Some(edge) = self.edges.get_mut(first) {
                edge.vehicles.push(id.to_string());
            }
        }
        self.routes.insert(id.to_string(), route);
    }

    pub fn add_detour(&mut self, route: &[&str]) {
        let route: Vec<String> = route.iter().map(|edge| edge.to_string()).collect();
        if let (Some(from), Some(to)) = (route.first(), route.last()) {
            self.detours.insert((from.clone(), to.clone()), route);
        }
    }

    pub fn last_program(&self, tls: &str) -> Option<&Program> {
        self.pushed.iter().rev().find(|(id, _)| id == tls).map(|(_, program)| program)
    }

    fn light(&self, tls: &str) -> Result<&FakeLight, SimError> {
        self.lights.get(tls).ok_or_else(|| SimError::unknown("traffic light", tls))
    }

    fn edge(&self, edge: &str) -> Result<&FakeEdge, SimError> {
        if self.failing_edges.contains(edge) {
            return Err(SimError::Query {
                what: "edge",
                id: edge.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        self.edges.get(edge).ok_or_else(|| SimError::unknown("edge", edge))
    }

    fn lane_query<T: Copy>(&self, map: &HashMap<String, T>, lane: &str) -> Result<T, SimError> {
        if self.failing_lanes.contains(lane) {
            return Err(SimError::Query {
                what: "lane",
                id: lane.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        map.get(lane).copied().ok_or_else(|| SimError::unknown("lane", lane))
    }

    fn split_lane(lane: &str) -> Option<(&str, usize)> {
        let (edge, index) = lane.rsplit_once('_')?;
        Some((edge, index.parse().ok()?))
    }
}

impl Simulator for FakeSim {
    fn step(&mut self) -> Result<(), SimError> {
        if self.closed {
            return Err(SimError::Connection("closed".to_string()));
        }
        self.time += 1.0;
        Ok(())
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }

    fn min_expected_vehicles(&self) -> usize {
        self.routes.len().max(1)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn departed_ids(&self) -> Result<Vec<String>, SimError> {
        Ok(Vec::new())
    }

    fn arrived_ids(&self) -> Result<Vec<String>, SimError> {
        Ok(Vec::new())
    }

    fn vehicle_ids(&self) -> Result<Vec<String>, SimError> {
        let mut ids: Vec<String> = self.routes.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn vehicle_waiting_time(&self, vehicle: &str) -> Result<f64, SimError> {
        self.vehicle_edge(vehicle).map(|_| 0.0)
    }

    fn vehicle_route(&self, vehicle: &str) -> Result<Vec<String>, SimError> {
        self.routes
            .get(vehicle)
            .cloned()
            .ok_or_else(|| SimError::unknown("vehicle", vehicle))
    }

    fn vehicle_edge(&self, vehicle: &str) -> Result<String, SimError> {
        self.positions
            .get(vehicle)
            .cloned()
            .ok_or_else(|| SimError::unknown("vehicle", vehicle))
    }

    fn set_vehicle_route(&mut self, vehicle: &str, route: &[String]) -> Result<(), SimError> {
        let current = self.vehicle_edge(vehicle)?;
        if route.first() != Some(&current) {
            return Err(SimError::InvalidCommand(format!("route for {}", vehicle)));
        }
        self.routes.insert(vehicle.to_string(), route.to_vec());
        Ok(())
    }

    fn find_route(&self, from: &str, to: &str, avoid: &[String]) -> Result<Option<Vec<String>>, SimError> {
        self.edge(from)?;
        self.edge(to)?;
        let detour = self.detours.get(&(from.to_string(), to.to_string()));
        Ok(detour
            .filter(|route| route.iter().skip(1).all(|edge| !avoid.contains(edge)))
            .cloned())
    }

    fn traffic_light_ids(&self) -> Result<Vec<String>, SimError> {
        Ok(self.lights.keys().cloned().collect())
    }

    fn controlled_lanes(&self, tls: &str) -> Result<Vec<String>, SimError> {
        Ok(self.light(tls)?.lanes.clone())
    }

    fn phase_index(&self, tls: &str) -> Result<usize, SimError> {
        Ok(self.light(tls)?.phase_index)
    }

    fn phase_duration(&self, tls: &str) -> Result<f64, SimError> {
        Ok(self.light(tls)?.phase_duration)
    }

    fn phase_remaining(&self, tls: &str) -> Result<f64, SimError> {
        Ok(self.light(tls)?.remaining)
    }

    fn signal_state(&self, tls: &str) -> Result<String, SimError> {
        let light = self.light(tls)?;
        match &light.program {
            Some(program) => program
                .phase_at(light.phase_index)
                .map(|phase| phase.state_string())
                .ok_or_else(|| SimError::InvalidCommand(format!("phase index for {}", tls))),
            None => Ok(light.state.clone()),
        }
    }

    fn set_program(&mut self, tls: &str, program: &Program) -> Result<(), SimError> {
        let light = self
            .lights
            .get_mut(tls)
            .ok_or_else(|| SimError::unknown("traffic light", tls))?;
        if light.reject_programs {
            return Err(SimError::InvalidCommand(format!("{} refuses programs", tls)));
        }
        program
            .validate_for(light.lanes.len())
            .map_err(|e| SimError::InvalidCommand(e.to_string()))?;
        light.program = Some(program.clone());
        self.pushed.push((tls.to_string(), program.clone()));
        Ok(())
    }

    fn set_phase_duration(&mut self, tls: &str, remaining: f64) -> Result<(), SimError> {
        let light = self
            .lights
            .get_mut(tls)
            .ok_or_else(|| SimError::unknown("traffic light", tls))?;
        light.remaining = remaining;
        self.phase_overrides.push((tls.to_string(), remaining));
        Ok(())
    }

    fn lane_halting_number(&self, lane: &str) -> Result<u32, SimError> {
        self.lane_query(&self.lane_halting, lane)
    }

    fn lane_vehicle_number(&self, lane: &str) -> Result<u32, SimError> {
        self.lane_query(&self.lane_vehicles, lane)
    }

    fn lane_mean_speed(&self, lane: &str) -> Result<f64, SimError> {
        self.lane_query(&self.lane_speed, lane)
    }

    fn lane_length(&self, lane: &str) -> Result<f64, SimError> {
        self.lane_query(&self.lane_halting, lane).map(|_| 100.0)
    }

    fn lane_disallowed(&self, lane: &str) -> Result<Vec<String>, SimError> {
        let (edge, index) = Self::split_lane(lane).ok_or_else(|| SimError::unknown("lane", lane))?;
        Ok(self.edge(edge)?.disallowed.get(&index).cloned().unwrap_or_default())
    }

    fn set_lane_disallowed(&mut self, lane: &str, classes: &[String]) -> Result<(), SimError> {
        let (edge, index) = Self::split_lane(lane).ok_or_else(|| SimError::unknown("lane", lane))?;
        let edge = self.edges.get_mut(edge).ok_or_else(|| SimError::unknown("lane", lane))?;
        edge.disallowed.insert(index, classes.to_vec());
        Ok(())
    }

    fn set_lane_allowed(&mut self, lane: &str, classes: &[String]) -> Result<(), SimError> {
        let (edge, index) = Self::split_lane(lane).ok_or_else(|| SimError::unknown("lane", lane))?;
        let edge = self.edges.get_mut(edge).ok_or_else(|| SimError::unknown("lane", lane))?;
        if classes.iter().any(|class| class == ALL_CLASSES) {
            edge.disallowed.remove(&index);
        }
        Ok(())
    }

    fn edge_ids(&self) -> Result<Vec<String>, SimError> {
        Ok(self.edges.keys().cloned().collect())
    }

    fn edge_lane_count(&self, edge: &str) -> Result<usize, SimError> {
        Ok(self.edge(edge)?.lanes)
    }

    fn edge_halting_number(&self, edge: &str) -> Result<u32, SimError> {
        Ok(self.edge(edge)?.halting)
    }

    fn edge_vehicle_number(&self, edge: &str) -> Result<u32, SimError> {
        Ok(self.edge(edge)?.vehicles.len() as u32)
    }

    fn edge_mean_speed(&self, edge: &str) -> Result<f64, SimError> {
        Ok(self.edge(edge)?.mean_speed)
    }

    fn edge_vehicle_ids(&self, edge: &str) -> Result<Vec<String>, SimError> {
        Ok(self.edge(edge)?.vehicles.clone())
    }
}
