use crate::control_system::phase_program::Program;
use crate::error::SimError;

/// Vehicle class string that matches every class when allowing or
/// disallowing lanes.
pub const ALL_CLASSES: &str = "all";

/// The clock-stepped world model the controller drives. Queries describe the
/// state after the last `step()`; commands take effect from the next one.
pub trait Simulator {
    /// Advances the world by one step.
    fn step(&mut self) -> Result<(), SimError>;
    /// Current simulated time in seconds.
    fn time(&self) -> f64;
    fn end_time(&self) -> f64;
    /// Vehicles in the network plus vehicles still waiting to depart.
    fn min_expected_vehicles(&self) -> usize;
    fn close(&mut self);

    fn departed_ids(&self) -> Result<Vec<String>, SimError>;
    fn arrived_ids(&self) -> Result<Vec<String>, SimError>;
    fn vehicle_ids(&self) -> Result<Vec<String>, SimError>;
    fn vehicle_count(&self) -> Result<usize, SimError> {
        Ok(self.vehicle_ids()?.len())
    }
    /// Seconds the vehicle has been standing since it last moved.
    fn vehicle_waiting_time(&self, vehicle: &str) -> Result<f64, SimError>;
    fn vehicle_route(&self, vehicle: &str) -> Result<Vec<String>, SimError>;
    fn vehicle_edge(&self, vehicle: &str) -> Result<String, SimError>;
    /// Replaces the vehicle's route. The route must start on the vehicle's
    /// current edge.
    fn set_vehicle_route(&mut self, vehicle: &str, route: &[String]) -> Result<(), SimError>;
    /// Shortest route from `from` to `to` that enters none of `avoid`.
    /// `from` itself is always allowed.
    fn find_route(
        &self,
        from: &str,
        to: &str,
        avoid: &[String],
    ) -> Result<Option<Vec<String>>, SimError>;

    fn traffic_light_ids(&self) -> Result<Vec<String>, SimError>;
    /// Lanes in signal-index order; a lane may appear more than once.
    fn controlled_lanes(&self, tls: &str) -> Result<Vec<String>, SimError>;
    fn phase_index(&self, tls: &str) -> Result<usize, SimError>;
    /// Planned duration of the active phase.
    fn phase_duration(&self, tls: &str) -> Result<f64, SimError>;
    /// Seconds left before the active phase switches.
    fn phase_remaining(&self, tls: &str) -> Result<f64, SimError>;
    /// Signal state string of the active phase.
    fn signal_state(&self, tls: &str) -> Result<String, SimError>;
    fn set_program(&mut self, tls: &str, program: &Program) -> Result<(), SimError>;
    /// Sets the remaining time of the active phase.
    fn set_phase_duration(&mut self, tls: &str, remaining: f64) -> Result<(), SimError>;

    fn lane_halting_number(&self, lane: &str) -> Result<u32, SimError>;
    fn lane_vehicle_number(&self, lane: &str) -> Result<u32, SimError>;
    fn lane_mean_speed(&self, lane: &str) -> Result<f64, SimError>;
    fn lane_length(&self, lane: &str) -> Result<f64, SimError>;
    fn lane_disallowed(&self, lane: &str) -> Result<Vec<String>, SimError>;
    fn set_lane_disallowed(&mut self, lane: &str, classes: &[String]) -> Result<(), SimError>;
    fn set_lane_allowed(&mut self, lane: &str, classes: &[String]) -> Result<(), SimError>;

    fn edge_ids(&self) -> Result<Vec<String>, SimError>;
    fn edge_lane_count(&self, edge: &str) -> Result<usize, SimError>;
    fn edge_halting_number(&self, edge: &str) -> Result<u32, SimError>;
    fn edge_vehicle_number(&self, edge: &str) -> Result<u32, SimError>;
    fn edge_mean_speed(&self, edge: &str) -> Result<f64, SimError>;
    fn edge_vehicle_ids(&self, edge: &str) -> Result<Vec<String>, SimError>;
}

/// Lane IDs follow `<edge>_<index>`.
pub fn lane_id(edge: &str, index: usize) -> String {
    format!("{}_{}", edge, index)
}
