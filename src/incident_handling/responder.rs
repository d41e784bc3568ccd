use crate::error::SimError;
use crate::incident_handling::detector::{Incident, IncidentKind};
use crate::shared_data::{current_timestamp, IncidentRecord};
use crate::simulation_engine::Simulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStrategy {
    Reroute,
}

/// Every incident kind is answered by rerouting.
pub fn strategy_for(kind: IncidentKind) -> ResponseStrategy {
    match kind {
        IncidentKind::SuddenSurge | IncidentKind::RoadClosure | IncidentKind::Accident => {
            ResponseStrategy::Reroute
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerouteOutcome {
    Rerouted,
    /// No alternative exists or it matches the current route.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseReport {
    pub incident: Incident,
    pub strategy: ResponseStrategy,
    pub attempted: usize,
    pub rerouted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ResponseReport {
    pub fn to_record(&self) -> IncidentRecord {
        IncidentRecord {
            timestamp: current_timestamp(),
            step: self.incident.step,
            kind: self.incident.kind.as_str().to_string(),
            edge_id: self.incident.edge_id.clone(),
            rerouted: self.rerouted,
            unchanged: self.unchanged,
        }
    }
}

/// Sends `vehicle` to its destination along a route that does not enter
/// `blocked`. The vehicle's current edge is always a valid start, even when
/// it is the blocked edge itself.
pub fn reroute_around<S: Simulator + ?Sized>(
    sim: &mut S,
    vehicle: &str,
    blocked: &str,
) -> Result<RerouteOutcome, SimError> {
    let route = sim.vehicle_route(vehicle)?;
    let current = sim.vehicle_edge(vehicle)?;
    let Some(destination) = route.last() else {
        return Ok(RerouteOutcome::Unchanged);
    };
    let remaining = match route.iter().position(|edge| *edge == current) {
        Some(index) => &route[index..],
        None => &route[..],
    };

    let avoid = [blocked.to_string()];
    match sim.find_route(&current, destination, &avoid)? {
        Some(alternative) if alternative.as_slice() != remaining => {
            sim.set_vehicle_route(vehicle, &alternative)?;
            log::debug!("Vehicle {} rerouted around {}: {:?}", vehicle, blocked, alternative);
            Ok(RerouteOutcome::Rerouted)
        }
        _ => Ok(RerouteOutcome::Unchanged),
    }
}

/// Applies the response strategy for one incident. Vehicle-level failures
/// are counted and logged.
pub fn respond<S: Simulator + ?Sized>(sim: &mut S, incident: &Incident) -> ResponseReport {
    let strategy = strategy_for(incident.kind);
    let mut report = ResponseReport {
        incident: incident.clone(),
        strategy,
        attempted: 0,
        rerouted: 0,
        unchanged: 0,
        failed: 0,
    };

    let vehicles = match sim.edge_vehicle_ids(&incident.edge_id) {
        Ok(vehicles) => vehicles,
        Err(e) => {
            log::warn!("Vehicles on edge {} unavailable: {}", incident.edge_id, e);
            return report;
        }
    };

    match strategy {
        ResponseStrategy::Reroute => {
            for vehicle in vehicles {
                report.attempted += 1;
                match reroute_around(sim, &vehicle, &incident.edge_id) {
                    Ok(RerouteOutcome::Rerouted) => report.rerouted += 1,
                    Ok(RerouteOutcome::Unchanged) => report.unchanged += 1,
                    Err(e) => {
                        log::warn!("Rerouting vehicle {} failed: {}", vehicle, e);
                        report.failed += 1;
                    }
                }
            }
        }
    }

    log::info!(
        "{} on {}: {} of {} vehicles rerouted, {} without alternative",
        incident.kind,
        incident.edge_id,
        report.rerouted,
        report.attempted,
        report.unchanged
    );
    report
}
