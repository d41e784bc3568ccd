use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::InjectorConfig;
use crate::error::SimError;
use crate::incident_handling::responder::{reroute_around, RerouteOutcome};
use crate::simulation_engine::simulator::{lane_id, ALL_CLASSES};
use crate::simulation_engine::Simulator;

#[derive(Debug, Clone, PartialEq)]
enum BlockState {
    Idle,
    /// Closed to new traffic, waiting for the vehicles already on it to leave.
    Draining { edge: String },
    Blocked { edge: String, remaining: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InjectorEvent {
    Closed { edge: String, rerouted: usize },
    Drained { edge: String },
    Reopened { edge: String },
}

/// Randomly closes an edge to create test incidents. The closure drains,
/// stays shut for a fixed number of steps, then reopens.
pub struct IncidentInjector {
    edge: Option<String>,
    probability: f64,
    duration: u64,
    rng: StdRng,
    state: BlockState,
}

impl IncidentInjector {
    pub fn new(config: &InjectorConfig) -> Self {
        Self {
            edge: config.edge.clone(),
            probability: config.probability.clamp(0.0, 1.0),
            duration: config.duration,
            rng: StdRng::seed_from_u64(config.seed),
            state: BlockState::Idle,
        }
    }

    /// The edge currently closed, if any.
    pub fn blocked_edge(&self) -> Option<&str> {
        match &self.state {
            BlockState::Idle => None,
            BlockState::Draining { edge } | BlockState::Blocked { edge, .. } => Some(edge.as_str()),
        }
    }

    /// Advances the closure by one step. A failed simulator call leaves the
    /// closure where it was, so the next step retries it.
    pub fn advance<S: Simulator + ?Sized>(&mut self, sim: &mut S) -> Result<Option<InjectorEvent>, SimError> {
        match self.state.clone() {
            BlockState::Idle => {
                if !self.rng.random_bool(self.probability) {
                    return Ok(None);
                }
                let Some(edge) = self.pick_edge(sim)? else {
                    return Ok(None);
                };
                let rerouted = match close_edge(sim, &edge) {
                    Ok(rerouted) => rerouted,
                    Err(e) => {
                        if let Err(reopen) = reopen_edge(sim, &edge) {
                            log::warn!("Could not undo partial closure of {}: {}", edge, reopen);
                        }
                        return Err(e);
                    }
                };
                log::info!("Closed edge {}, {} vehicles rerouted", edge, rerouted);
                self.state = BlockState::Draining { edge: edge.clone() };
                Ok(Some(InjectorEvent::Closed { edge, rerouted }))
            }
            BlockState::Draining { edge } => {
                if sim.edge_vehicle_number(&edge)? > 0 {
                    return Ok(None);
                }
                log::info!("Edge {} drained, blocked for {} steps", edge, self.duration);
                self.state = BlockState::Blocked {
                    edge: edge.clone(),
                    remaining: self.duration,
                };
                Ok(Some(InjectorEvent::Drained { edge }))
            }
            BlockState::Blocked { edge, remaining } if remaining > 1 => {
                self.state = BlockState::Blocked {
                    edge,
                    remaining: remaining - 1,
                };
                Ok(None)
            }
            BlockState::Blocked { edge, .. } => {
                reopen_edge(sim, &edge)?;
                log::info!("Reopened edge {}", edge);
                self.state = BlockState::Idle;
                Ok(Some(InjectorEvent::Reopened { edge }))
            }
        }
    }

    fn pick_edge<S: Simulator + ?Sized>(&mut self, sim: &S) -> Result<Option<String>, SimError> {
        if let Some(edge) = &self.edge {
            return Ok(Some(edge.clone()));
        }
        let edges = sim.edge_ids()?;
        if edges.is_empty() {
            return Ok(None);
        }
        let index = self.rng.random_range(0..edges.len());
        Ok(Some(edges[index].clone()))
    }
}

/// Disallows every vehicle class on every lane of `edge` and reroutes the
/// vehicles still planning to use it. Returns how many were rerouted.
pub fn close_edge<S: Simulator + ?Sized>(sim: &mut S, edge: &str) -> Result<usize, SimError> {
    let all = [ALL_CLASSES.to_string()];
    for index in 0..sim.edge_lane_count(edge)? {
        sim.set_lane_disallowed(&lane_id(edge, index), &all)?;
    }

    let mut rerouted = 0;
    for vehicle in sim.vehicle_ids()? {
        let upcoming = match (sim.vehicle_route(&vehicle), sim.vehicle_edge(&vehicle)) {
            (Ok(route), Ok(current)) => current != edge && route.iter().any(|e| e == edge),
            _ => false,
        };
        if !upcoming {
            continue;
        }
        match reroute_around(sim, &vehicle, edge) {
            Ok(RerouteOutcome::Rerouted) => rerouted += 1,
            Ok(RerouteOutcome::Unchanged) => {
                log::debug!("Vehicle {} has no way around {}", vehicle, edge)
            }
            Err(e) => log::warn!("Rerouting vehicle {} failed: {}", vehicle, e),
        }
    }
    Ok(rerouted)
}

pub fn reopen_edge<S: Simulator + ?Sized>(sim: &mut S, edge: &str) -> Result<(), SimError> {
    let all = [ALL_CLASSES.to_string()];
    for index in 0..sim.edge_lane_count(edge)? {
        sim.set_lane_allowed(&lane_id(edge, index), &all)?;
    }
    Ok(())
}
