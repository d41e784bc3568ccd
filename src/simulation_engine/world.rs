use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::control_system::phase_program::Program;
use crate::error::SimError;
use crate::global_variables::STEP_LENGTH;
use crate::simulation_engine::route_generation::{bfs_route, edge_successors};
use crate::simulation_engine::scenario::{FlowSpec, Scenario};
use crate::simulation_engine::simulator::{lane_id, Simulator, ALL_CLASSES};

/// Vehicles slower than this (m/s) count as halting.
pub const HALTING_SPEED: f64 = 0.1;
/// The only vehicle class the world spawns.
pub const PASSENGER_CLASS: &str = "passenger";

#[derive(Debug, Clone)]
struct LaneState {
    id: String,
    disallowed: Vec<String>,
}

impl LaneState {
    fn blocks_passengers(&self) -> bool {
        self.disallowed
            .iter()
            .any(|class| class == ALL_CLASSES || class == PASSENGER_CLASS)
    }
}

#[derive(Debug, Clone)]
struct Edge {
    id: String,
    length: f64,
    speed: f64,
    lanes: Vec<LaneState>,
}

impl Edge {
    fn travel_time(&self) -> f64 {
        (self.length / self.speed).max(STEP_LENGTH)
    }
}

#[derive(Debug, Clone)]
struct Light {
    id: String,
    controlled_lanes: Vec<String>,
    program: Program,
    phase: usize,
    elapsed: f64,
    remaining: f64,
}

#[derive(Debug, Clone)]
struct Flow {
    spec: FlowSpec,
    route: Option<Vec<usize>>,
}

#[derive(Debug, Clone)]
struct Vehicle {
    id: String,
    route: Vec<usize>,
    route_index: usize,
    lane: usize,
    /// Seconds of free travel left before the stop line.
    remaining: f64,
    speed: f64,
    waiting: f64,
}

impl Vehicle {
    fn edge(&self) -> usize {
        self.route[self.route_index]
    }
}

enum Move {
    Travel,
    Halt,
    Advance { edge: usize, lane: usize },
    Arrive,
}

/// An in-memory queueing model of a road network. Vehicles travel each edge
/// at its speed limit, queue at the stop line while their lane is red or the
/// next edge is closed, and leave each lane at most one per step.
pub struct GridWorld {
    time: f64,
    end_time: f64,
    closed: bool,
    rng: StdRng,
    edges: Vec<Edge>,
    edge_index: HashMap<String, usize>,
    successors: Vec<Vec<usize>>,
    lights: Vec<Light>,
    light_index: HashMap<String, usize>,
    /// lane id -> (light, signal index) for every link the lane feeds.
    lane_signals: HashMap<String, Vec<(usize, usize)>>,
    flows: Vec<Flow>,
    vehicles: Vec<Vehicle>,
    next_vehicle: u64,
    departed: Vec<String>,
    arrived: Vec<String>,
}

impl GridWorld {
    /// Loads a scenario file. Any failure here is a connection failure.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let scenario = Scenario::load(path).map_err(|e| SimError::Connection(e.to_string()))?;
        Self::from_scenario(scenario)
    }

    pub fn from_scenario(scenario: Scenario) -> Result<Self, SimError> {
        let mut edges = Vec::new();
        let mut edge_index = HashMap::new();
        for spec in &scenario.edges {
            if spec.lanes == 0 || !(spec.length > 0.0) || !(spec.speed > 0.0) {
                return Err(SimError::Connection(format!(
                    "edge '{}' needs lanes, a length and a speed",
                    spec.id
                )));
            }
            if edge_index.insert(spec.id.clone(), edges.len()).is_some() {
                return Err(SimError::Connection(format!("duplicate edge '{}'", spec.id)));
            }
            edges.push(Edge {
                id: spec.id.clone(),
                length: spec.length,
                speed: spec.speed,
                lanes: (0..spec.lanes)
                    .map(|i| LaneState {
                        id: lane_id(&spec.id, i),
                        disallowed: Vec::new(),
                    })
                    .collect(),
            });
        }
        let endpoints: Vec<(&str, &str)> = scenario
            .edges
            .iter()
            .map(|spec| (spec.from.as_str(), spec.to.as_str()))
            .collect();
        let successors = edge_successors(&endpoints);

        let mut world = Self {
            time: 0.0,
            end_time: scenario.end_time,
            closed: false,
            rng: StdRng::seed_from_u64(scenario.seed),
            edges,
            edge_index,
            successors,
            lights: Vec::new(),
            light_index: HashMap::new(),
            lane_signals: HashMap::new(),
            flows: Vec::new(),
            vehicles: Vec::new(),
            next_vehicle: 0,
            departed: Vec::new(),
            arrived: Vec::new(),
        };

        for spec in &scenario.traffic_lights {
            let program = Program::from_specs(&format!("{}_default", spec.id), &spec.program)
                .and_then(|program| {
                    program.validate_for(spec.controlled_lanes.len())?;
                    Ok(program)
                })
                .map_err(|e| SimError::Connection(format!("traffic light '{}': {}", spec.id, e)))?;
            let light = world.lights.len();
            for (signal, lane) in spec.controlled_lanes.iter().enumerate() {
                world.lane_ref(lane)?;
                world
                    .lane_signals
                    .entry(lane.clone())
                    .or_default()
                    .push((light, signal));
            }
            let remaining = program.phases()[0].duration();
            world.light_index.insert(spec.id.clone(), light);
            world.lights.push(Light {
                id: spec.id.clone(),
                controlled_lanes: spec.controlled_lanes.clone(),
                program,
                phase: 0,
                elapsed: 0.0,
                remaining,
            });
        }

        for spec in &scenario.flows {
            let from = world.edge_ref(&spec.from)?;
            let to = world.edge_ref(&spec.to)?;
            let route = bfs_route(&world.successors, from, to, |_| false);
            if route.is_none() {
                log::warn!("Flow {} has no route from {} to {}", spec.id, spec.from, spec.to);
            }
            world.flows.push(Flow {
                spec: spec.clone(),
                route,
            });
        }
        Ok(world)
    }

    fn edge_ref(&self, edge: &str) -> Result<usize, SimError> {
        self.edge_index
            .get(edge)
            .copied()
            .ok_or_else(|| SimError::unknown("edge", edge))
    }

    fn lane_ref(&self, lane: &str) -> Result<(usize, usize), SimError> {
        let (edge, index) = lane
            .rsplit_once('_')
            .ok_or_else(|| SimError::unknown("lane", lane))?;
        let edge = self.edge_ref(edge).map_err(|_| SimError::unknown("lane", lane))?;
        let index: usize = index.parse().map_err(|_| SimError::unknown("lane", lane))?;
        if index >= self.edges[edge].lanes.len() {
            return Err(SimError::unknown("lane", lane));
        }
        Ok((edge, index))
    }

    fn light_ref(&self, tls: &str) -> Result<usize, SimError> {
        self.light_index
            .get(tls)
            .copied()
            .ok_or_else(|| SimError::unknown("traffic light", tls))
    }

    fn vehicle_ref(&self, vehicle: &str) -> Result<usize, SimError> {
        self.vehicles
            .iter()
            .position(|v| v.id == vehicle)
            .ok_or_else(|| SimError::unknown("vehicle", vehicle))
    }

    fn edge_closed(&self, edge: usize) -> bool {
        self.edges[edge].lanes.iter().all(LaneState::blocks_passengers)
    }

    /// The open lane of `edge` holding the fewest vehicles.
    fn entry_lane(&self, edge: usize) -> Option<usize> {
        self.edges[edge]
            .lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| !lane.blocks_passengers())
            .map(|(index, _)| index)
            .min_by_key(|&index| {
                self.vehicles
                    .iter()
                    .filter(|v| v.edge() == edge && v.lane == index)
                    .count()
            })
    }

    /// Uncontrolled lanes are always green.
    fn lane_has_green(&self, lane: &str) -> bool {
        match self.lane_signals.get(lane) {
            None => true,
            Some(links) => links.iter().any(|&(light, signal)| {
                let light = &self.lights[light];
                light.program.is_green(light.phase, signal)
            }),
        }
    }

    fn vehicles_on_lane(&self, edge: usize, lane: usize) -> impl Iterator<Item = &Vehicle> {
        self.vehicles
            .iter()
            .filter(move |v| v.edge() == edge && v.lane == lane)
    }

    fn vehicles_on_edge(&self, edge: usize) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().filter(move |v| v.edge() == edge)
    }

    fn advance_lights(&mut self) {
        for light in &mut self.lights {
            light.elapsed += STEP_LENGTH;
            light.remaining -= STEP_LENGTH;
            if light.remaining <= 0.0 {
                light.phase = (light.phase + 1) % light.program.len();
                light.elapsed = 0.0;
                light.remaining = light.program.phases()[light.phase].duration();
            }
        }
    }

    fn next_move(&self, vehicle: &Vehicle, discharged: &HashSet<(usize, usize)>) -> Move {
        if vehicle.remaining > 0.0 {
            return Move::Travel;
        }
        let edge = vehicle.edge();
        if discharged.contains(&(edge, vehicle.lane)) {
            return Move::Halt;
        }
        if !self.lane_has_green(&self.edges[edge].lanes[vehicle.lane].id) {
            return Move::Halt;
        }
        match vehicle.route.get(vehicle.route_index + 1) {
            None => Move::Arrive,
            Some(&next) => match self.entry_lane(next) {
                Some(lane) => Move::Advance { edge: next, lane },
                None => Move::Halt,
            },
        }
    }

    fn move_vehicles(&mut self) {
        let mut order: Vec<usize> = (0..self.vehicles.len()).collect();
        order.sort_by(|&a, &b| self.vehicles[a].remaining.total_cmp(&self.vehicles[b].remaining));

        let mut discharged = HashSet::new();
        let mut finished = HashSet::new();
        for index in order {
            let decision = self.next_move(&self.vehicles[index], &discharged);
            let from = (self.vehicles[index].edge(), self.vehicles[index].lane);
            match decision {
                Move::Travel => {
                    let speed = self.edges[from.0].speed;
                    let vehicle = &mut self.vehicles[index];
                    vehicle.remaining = (vehicle.remaining - STEP_LENGTH).max(0.0);
                    vehicle.speed = speed;
                    vehicle.waiting = 0.0;
                }
                Move::Halt => {
                    let vehicle = &mut self.vehicles[index];
                    vehicle.speed = 0.0;
                    vehicle.waiting += STEP_LENGTH;
                }
                Move::Advance { edge, lane } => {
                    discharged.insert(from);
                    let (travel, speed) = (self.edges[edge].travel_time(), self.edges[edge].speed);
                    let vehicle = &mut self.vehicles[index];
                    vehicle.route_index += 1;
                    vehicle.lane = lane;
                    vehicle.remaining = travel;
                    vehicle.speed = speed;
                    vehicle.waiting = 0.0;
                }
                Move::Arrive => {
                    discharged.insert(from);
                    finished.insert(index);
                    self.arrived.push(self.vehicles[index].id.clone());
                }
            }
        }

        let mut index = 0;
        self.vehicles.retain(|_| {
            let keep = !finished.contains(&index);
            index += 1;
            keep
        });
    }

    fn spawn_vehicles(&mut self) {
        for flow in 0..self.flows.len() {
            let (prefix, probability, route) = {
                let flow = &self.flows[flow];
                if self.time < flow.spec.begin || self.time > flow.spec.end {
                    continue;
                }
                match &flow.route {
                    Some(route) => (
                        flow.spec.id.clone(),
                        flow.spec.probability.clamp(0.0, 1.0),
                        route.clone(),
                    ),
                    None => continue,
                }
            };
            if !self.rng.random_bool(probability) {
                continue;
            }
            let first = route[0];
            let Some(lane) = self.entry_lane(first) else {
                continue;
            };
            let id = format!("{}.{}", prefix, self.next_vehicle);
            self.next_vehicle += 1;
            self.vehicles.push(Vehicle {
                id: id.clone(),
                route,
                route_index: 0,
                lane,
                remaining: self.edges[first].travel_time(),
                speed: self.edges[first].speed,
                waiting: 0.0,
            });
            self.departed.push(id);
        }
    }

    fn check_open(&self) -> Result<(), SimError> {
        if self.closed {
            return Err(SimError::Connection("simulation is closed".to_string()));
        }
        Ok(())
    }
}

impl Simulator for GridWorld {
    fn step(&mut self) -> Result<(), SimError> {
        self.check_open()?;
        self.time += STEP_LENGTH;
        self.departed.clear();
        self.arrived.clear();
        self.advance_lights();
        self.move_vehicles();
        self.spawn_vehicles();
        Ok(())
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }

    fn min_expected_vehicles(&self) -> usize {
        let pending = self
            .flows
            .iter()
            .filter(|flow| flow.route.is_some() && self.time < flow.spec.end)
            .count();
        self.vehicles.len() + pending
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn departed_ids(&self) -> Result<Vec<String>, SimError> {
        self.check_open()?;
        Ok(self.departed.clone())
    }

    fn arrived_ids(&self) -> Result<Vec<String>, SimError> {
        self.check_open()?;
        Ok(self.arrived.clone())
    }

    fn vehicle_ids(&self) -> Result<Vec<String>, SimError> {
        self.check_open()?;
        Ok(self.vehicles.iter().map(|v| v.id.clone()).collect())
    }

    fn vehicle_waiting_time(&self, vehicle: &str) -> Result<f64, SimError> {
        Ok(self.vehicles[self.vehicle_ref(vehicle)?].waiting)
    }

    fn vehicle_route(&self, vehicle: &str) -> Result<Vec<String>, SimError> {
        let vehicle = &self.vehicles[self.vehicle_ref(vehicle)?];
        Ok(vehicle
            .route
            .iter()
            .map(|&edge| self.edges[edge].id.clone())
            .collect())
    }

    fn vehicle_edge(&self, vehicle: &str) -> Result<String, SimError> {
        let vehicle = &self.vehicles[self.vehicle_ref(vehicle)?];
        Ok(self.edges[vehicle.edge()].id.clone())
    }

    fn set_vehicle_route(&mut self, vehicle: &str, route: &[String]) -> Result<(), SimError> {
        let index = self.vehicle_ref(vehicle)?;
        let edges = route
            .iter()
            .map(|edge| self.edge_ref(edge))
            .collect::<Result<Vec<_>, _>>()?;
        if edges.first() != Some(&self.vehicles[index].edge()) {
            return Err(SimError::InvalidCommand(format!(
                "route for {} must start on its current edge",
                vehicle
            )));
        }
        if let Some(pair) = edges
            .windows(2)
            .find(|pair| !self.successors[pair[0]].contains(&pair[1]))
        {
            return Err(SimError::InvalidCommand(format!(
                "edges {} and {} are not connected",
                self.edges[pair[0]].id, self.edges[pair[1]].id
            )));
        }
        let vehicle = &mut self.vehicles[index];
        vehicle.route = edges;
        vehicle.route_index = 0;
        Ok(())
    }

    fn find_route(
        &self,
        from: &str,
        to: &str,
        avoid: &[String],
    ) -> Result<Option<Vec<String>>, SimError> {
        let start = self.edge_ref(from)?;
        let target = self.edge_ref(to)?;
        let avoided: HashSet<usize> = avoid
            .iter()
            .filter_map(|edge| self.edge_index.get(edge).copied())
            .collect();
        let route = bfs_route(&self.successors, start, target, |edge| {
            avoided.contains(&edge) || self.edge_closed(edge)
        });
        Ok(route.map(|route| route.iter().map(|&e| self.edges[e].id.clone()).collect()))
    }

    fn traffic_light_ids(&self) -> Result<Vec<String>, SimError> {
        self.check_open()?;
        Ok(self.lights.iter().map(|light| light.id.clone()).collect())
    }

    fn controlled_lanes(&self, tls: &str) -> Result<Vec<String>, SimError> {
        Ok(self.lights[self.light_ref(tls)?].controlled_lanes.clone())
    }

    fn phase_index(&self, tls: &str) -> Result<usize, SimError> {
        Ok(self.lights[self.light_ref(tls)?].phase)
    }

    fn phase_duration(&self, tls: &str) -> Result<f64, SimError> {
        let light = &self.lights[self.light_ref(tls)?];
        Ok(light.program.phases()[light.phase].duration())
    }

    fn phase_remaining(&self, tls: &str) -> Result<f64, SimError> {
        Ok(self.lights[self.light_ref(tls)?].remaining)
    }

    fn signal_state(&self, tls: &str) -> Result<String, SimError> {
        let light = &self.lights[self.light_ref(tls)?];
        Ok(light.program.phases()[light.phase].state_string())
    }

    fn set_program(&mut self, tls: &str, program: &Program) -> Result<(), SimError> {
        let index = self.light_ref(tls)?;
        let light = &mut self.lights[index];
        program
            .validate_for(light.controlled_lanes.len())
            .map_err(|e| SimError::InvalidCommand(format!("program for {}: {}", tls, e)))?;
        if light.phase >= program.len() {
            light.phase = 0;
            light.elapsed = 0.0;
        }
        light.remaining = (program.phases()[light.phase].duration() - light.elapsed).max(0.0);
        light.program = program.clone();
        Ok(())
    }

    fn set_phase_duration(&mut self, tls: &str, remaining: f64) -> Result<(), SimError> {
        if !(remaining >= 0.0) {
            return Err(SimError::InvalidCommand(format!(
                "phase duration {} for {}",
                remaining, tls
            )));
        }
        let index = self.light_ref(tls)?;
        self.lights[index].remaining = remaining;
        Ok(())
    }

    fn lane_halting_number(&self, lane: &str) -> Result<u32, SimError> {
        let (edge, index) = self.lane_ref(lane)?;
        Ok(self
            .vehicles_on_lane(edge, index)
            .filter(|v| v.speed < HALTING_SPEED)
            .count() as u32)
    }

    fn lane_vehicle_number(&self, lane: &str) -> Result<u32, SimError> {
        let (edge, index) = self.lane_ref(lane)?;
        Ok(self.vehicles_on_lane(edge, index).count() as u32)
    }

    fn lane_mean_speed(&self, lane: &str) -> Result<f64, SimError> {
        let (edge, index) = self.lane_ref(lane)?;
        let speeds: Vec<f64> = self.vehicles_on_lane(edge, index).map(|v| v.speed).collect();
        if speeds.is_empty() {
            return Ok(self.edges[edge].speed);
        }
        Ok(speeds.iter().sum::<f64>() / speeds.len() as f64)
    }

    fn lane_length(&self, lane: &str) -> Result<f64, SimError> {
        let (edge, _) = self.lane_ref(lane)?;
        Ok(self.edges[edge].length)
    }

    fn lane_disallowed(&self, lane: &str) -> Result<Vec<String>, SimError> {
        let (edge, index) = self.lane_ref(lane)?;
        Ok(self.edges[edge].lanes[index].disallowed.clone())
    }

    fn set_lane_disallowed(&mut self, lane: &str, classes: &[String]) -> Result<(), SimError> {
        let (edge, index) = self.lane_ref(lane)?;
        self.edges[edge].lanes[index].disallowed = classes.to_vec();
        Ok(())
    }

    fn set_lane_allowed(&mut self, lane: &str, classes: &[String]) -> Result<(), SimError> {
        let (edge, index) = self.lane_ref(lane)?;
        let state = &mut self.edges[edge].lanes[index];
        if classes.iter().any(|class| class == ALL_CLASSES) {
            state.disallowed.clear();
        } else {
            state.disallowed.retain(|class| !classes.contains(class));
        }
        Ok(())
    }

    fn edge_ids(&self) -> Result<Vec<String>, SimError> {
        self.check_open()?;
        Ok(self.edges.iter().map(|edge| edge.id.clone()).collect())
    }

    fn edge_lane_count(&self, edge: &str) -> Result<usize, SimError> {
        Ok(self.edges[self.edge_ref(edge)?].lanes.len())
    }

    fn edge_halting_number(&self, edge: &str) -> Result<u32, SimError> {
        let edge = self.edge_ref(edge)?;
        Ok(self
            .vehicles_on_edge(edge)
            .filter(|v| v.speed < HALTING_SPEED)
            .count() as u32)
    }

    fn edge_vehicle_number(&self, edge: &str) -> Result<u32, SimError> {
        let edge = self.edge_ref(edge)?;
        Ok(self.vehicles_on_edge(edge).count() as u32)
    }

    fn edge_mean_speed(&self, edge: &str) -> Result<f64, SimError> {
        let edge = self.edge_ref(edge)?;
        let speeds: Vec<f64> = self.vehicles_on_edge(edge).map(|v| v.speed).collect();
        if speeds.is_empty() {
            return Ok(self.edges[edge].speed);
        }
        Ok(speeds.iter().sum::<f64>() / speeds.len() as f64)
    }

    fn edge_vehicle_ids(&self, edge: &str) -> Result<Vec<String>, SimError> {
        let edge = self.edge_ref(edge)?;
        Ok(self.vehicles_on_edge(edge).map(|v| v.id.clone()).collect())
    }
}
