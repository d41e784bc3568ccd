use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

use crate::control_system::traffic_light_controller::StepReport;
use crate::global_variables::STEP_LENGTH;
use crate::shared_data::PerformanceRecord;
use crate::simulation_engine::Simulator;

/// Demand class from the number of vehicles that entered the network.
pub fn demand_label(vehicles_entered: usize) -> &'static str {
    match vehicles_entered {
        0..=300 => "low",
        301..=600 => "mid",
        _ => "high",
    }
}

/// Run-wide metrics. Owned by the runner and created fresh for every run.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    departures: HashMap<String, f64>,
    travel_times: Vec<f64>,
    vehicles_entered: usize,
    total_waiting_time: f64,
    max_queue: BTreeMap<String, u32>,
    green_time: BTreeMap<String, f64>,
    red_time: BTreeMap<String, f64>,
    steps: u64,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one simulated step into the totals. Failed queries only cost
    /// that step's contribution.
    pub fn record_step<S: Simulator + ?Sized>(&mut self, sim: &S, report: &StepReport) {
        self.steps += 1;
        let now = sim.time();

        match sim.departed_ids() {
            Ok(departed) => {
                self.vehicles_entered += departed.len();
                for vehicle in departed {
                    self.departures.insert(vehicle, now);
                }
            }
            Err(e) => log::warn!("Departed vehicles unavailable: {}", e),
        }
        match sim.arrived_ids() {
            Ok(arrived) => {
                for vehicle in arrived {
                    if let Some(departed_at) = self.departures.remove(&vehicle) {
                        self.travel_times.push(now - departed_at);
                    }
                }
            }
            Err(e) => log::warn!("Arrived vehicles unavailable: {}", e),
        }
        match sim.vehicle_ids() {
            Ok(vehicles) => {
                self.total_waiting_time += vehicles
                    .iter()
                    .filter_map(|vehicle| sim.vehicle_waiting_time(vehicle).ok())
                    .sum::<f64>();
            }
            Err(e) => log::warn!("Vehicle list unavailable: {}", e),
        }

        for intersection in &report.intersections {
            let queue = intersection.snapshot.total_queue();
            let max = self.max_queue.entry(intersection.tls_id.clone()).or_insert(0);
            *max = (*max).max(queue);

            match sim.signal_state(&intersection.tls_id) {
                Ok(state) if state.chars().any(|c| c == 'G' || c == 'g') => {
                    *self.green_time.entry(intersection.tls_id.clone()).or_insert(0.0) += STEP_LENGTH;
                }
                Ok(_) => {
                    *self.red_time.entry(intersection.tls_id.clone()).or_insert(0.0) += STEP_LENGTH;
                }
                Err(e) => log::warn!("[{}] signal state unavailable: {}", intersection.tls_id, e),
            }
        }
    }

    pub fn throughput(&self) -> usize {
        self.travel_times.len()
    }

    pub fn vehicles_entered(&self) -> usize {
        self.vehicles_entered
    }

    pub fn total_waiting_time(&self) -> f64 {
        self.total_waiting_time
    }

    pub fn average_travel_time(&self) -> f64 {
        if self.travel_times.is_empty() {
            return 0.0;
        }
        self.travel_times.iter().sum::<f64>() / self.travel_times.len() as f64
    }

    pub fn max_queue(&self, tls_id: &str) -> u32 {
        self.max_queue.get(tls_id).copied().unwrap_or(0)
    }

    pub fn performance_records(&self) -> Vec<PerformanceRecord> {
        let demand = demand_label(self.vehicles_entered);
        self.max_queue
            .keys()
            .map(|tls_id| PerformanceRecord {
                tls_id: tls_id.clone(),
                demand: demand.to_string(),
                vehicles_entered: self.vehicles_entered,
                throughput: self.throughput(),
                average_travel_time: self.average_travel_time(),
                total_waiting_time: self.total_waiting_time,
                max_queue: self.max_queue(tls_id),
                green_time: self.green_time.get(tls_id).copied().unwrap_or(0.0),
                red_time: self.red_time.get(tls_id).copied().unwrap_or(0.0),
            })
            .collect()
    }

    pub fn summary(&self, policy: &str) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "policy: {}", policy);
        let _ = writeln!(text, "steps: {}", self.steps);
        let _ = writeln!(
            text,
            "demand: {} ({} vehicles entered)",
            demand_label(self.vehicles_entered),
            self.vehicles_entered
        );
        let _ = writeln!(text, "throughput: {}", self.throughput());
        let _ = writeln!(text, "average travel time: {:.2}s", self.average_travel_time());
        let _ = writeln!(text, "total waiting time: {:.2}s", self.total_waiting_time);
        for (tls_id, max) in &self.max_queue {
            let _ = writeln!(text, "max queue at {}: {}", tls_id, max);
        }
        text
    }
}
