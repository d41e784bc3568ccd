use std::collections::{HashMap, VecDeque};

use crate::simulation_engine::Simulator;

/// Trailing per-edge queue and speed samples, one per step, at most
/// `capacity` per edge.
#[derive(Debug)]
pub struct EdgeHistory {
    pub capacity: usize,
    pub queue_history: HashMap<String, VecDeque<u32>>,
    pub speed_history: HashMap<String, VecDeque<f64>>,
}

impl EdgeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue_history: HashMap::new(),
            speed_history: HashMap::new(),
        }
    }

    pub fn record(&mut self, edge: &str, queue: u32, speed: f64) {
        let capacity = self.capacity;
        let queues = self.queue_history.entry(edge.to_string()).or_default();
        if queues.len() == capacity {
            queues.pop_front();
        }
        queues.push_back(queue);

        let speeds = self.speed_history.entry(edge.to_string()).or_default();
        if speeds.len() == capacity {
            speeds.pop_front();
        }
        speeds.push_back(speed);
    }

    /// Samples every edge of the network. Edges whose queries fail are
    /// skipped for this step.
    pub fn update_from<S: Simulator + ?Sized>(&mut self, sim: &S) {
        let edges = match sim.edge_ids() {
            Ok(edges) => edges,
            Err(e) => {
                log::warn!("Edge list unavailable, history not updated: {}", e);
                return;
            }
        };
        for edge in edges {
            match (sim.edge_halting_number(&edge), sim.edge_mean_speed(&edge)) {
                (Ok(queue), Ok(speed)) => self.record(&edge, queue, speed),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("History sample for edge {} unavailable: {}", edge, e)
                }
            }
        }
    }

    pub fn queues(&self, edge: &str) -> Option<&VecDeque<u32>> {
        self.queue_history.get(edge)
    }

    /// True when the window is full and every sample has a queue.
    pub fn is_persistent(&self, edge: &str) -> bool {
        match self.queue_history.get(edge) {
            Some(queues) => queues.len() == self.capacity && queues.iter().all(|&q| q > 0),
            None => false,
        }
    }

    pub fn average_speed_for(&self, edge: &str) -> f64 {
        if let Some(speeds) = self.speed_history.get(edge) {
            if !speeds.is_empty() {
                return speeds.iter().sum::<f64>() / speeds.len() as f64;
            }
        }
        0.0
    }

    /// Population variance of the speed samples; 0 with fewer than two.
    pub fn speed_variance(&self, edge: &str) -> f64 {
        match self.speed_history.get(edge) {
            Some(speeds) if speeds.len() >= 2 => {
                let mean = self.average_speed_for(edge);
                speeds.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / speeds.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn clear(&mut self) {
        self.queue_history.clear();
        self.speed_history.clear();
    }
}
