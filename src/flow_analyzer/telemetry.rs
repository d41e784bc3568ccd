// telemetry.rs

use std::collections::{BTreeMap, HashSet};

use crate::simulation_engine::Simulator;

/// The road a lane belongs to: the lane ID without its trailing `_<index>`.
/// IDs without such a suffix are their own road.
pub fn road_id_of(lane: &str) -> &str {
    match lane.rsplit_once('_') {
        Some((road, index))
            if !road.is_empty()
                && !index.is_empty()
                && index.bytes().all(|b| b.is_ascii_digit()) =>
        {
            road
        }
        _ => lane,
    }
}

/// Per-road queue and speed of one intersection at one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSnapshot {
    /// road -> halting vehicles
    pub queues: BTreeMap<String, u32>,
    /// road -> vehicle-weighted mean speed, 0 when the road is empty
    pub speeds: BTreeMap<String, f64>,
    /// road -> vehicles on the road
    pub vehicles: BTreeMap<String, u32>,
}

impl QueueSnapshot {
    pub fn queue(&self, road: &str) -> u32 {
        self.queues.get(road).copied().unwrap_or(0)
    }

    pub fn total_queue(&self) -> u32 {
        self.queues.values().sum()
    }

    /// The road with the longest queue. Ties go to the first road in ID order.
    pub fn max_queue_road(&self) -> Option<(&str, u32)> {
        self.queues
            .iter()
            .fold(None, |best: Option<(&str, u32)>, (road, &queue)| match best {
                Some((_, top)) if top >= queue => best,
                _ => Some((road.as_str(), queue)),
            })
    }

    /// Vehicle-weighted mean speed over all roads of the intersection.
    pub fn mean_speed(&self) -> f64 {
        let vehicles: u32 = self.vehicles.values().sum();
        if vehicles == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .speeds
            .iter()
            .map(|(road, speed)| speed * self.vehicles.get(road).copied().unwrap_or(0) as f64)
            .sum();
        weighted / vehicles as f64
    }
}

/// Reads halting counts and speeds for every controlled lane and sums them
/// per road. A lane whose query fails counts as empty.
pub fn aggregate<S: Simulator + ?Sized>(sim: &S, tls_id: &str, lanes: &[String]) -> QueueSnapshot {
    let mut snapshot = QueueSnapshot::default();
    let mut weighted_speed: BTreeMap<String, f64> = BTreeMap::new();
    let mut seen = HashSet::new();

    for lane in lanes {
        if !seen.insert(lane.as_str()) {
            continue;
        }
        let road = road_id_of(lane).to_string();

        let halting = sim.lane_halting_number(lane).unwrap_or_else(|e| {
            log::warn!("[{}] halting count for lane {} unavailable: {}", tls_id, lane, e);
            0
        });
        let (vehicles, speed) = match (sim.lane_vehicle_number(lane), sim.lane_mean_speed(lane)) {
            (Ok(vehicles), Ok(speed)) => (vehicles, speed),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("[{}] speed for lane {} unavailable: {}", tls_id, lane, e);
                (0, 0.0)
            }
        };
        log::debug!(
            "[{}] lane {} halting={} vehicles={} speed={:.2}",
            tls_id,
            lane,
            halting,
            vehicles,
            speed
        );

        *snapshot.queues.entry(road.clone()).or_insert(0) += halting;
        *snapshot.vehicles.entry(road.clone()).or_insert(0) += vehicles;
        *weighted_speed.entry(road).or_insert(0.0) += speed * vehicles as f64;
    }

    for (road, weighted) in weighted_speed {
        let vehicles = snapshot.vehicles.get(&road).copied().unwrap_or(0);
        let speed = if vehicles == 0 {
            0.0
        } else {
            weighted / vehicles as f64
        };
        snapshot.speeds.insert(road, speed);
    }
    snapshot
}
