//! Duration policies: how a traffic light's timing reacts to queues.
//!
//! `Threshold` rebuilds the whole program from each phase's share of the
//! queued demand once the intersection is busy enough. `Nudge` leaves the
//! program alone and stretches or cuts the live phase instead.

use std::collections::BTreeSet;

use crate::config::{ExperimentConfig, GateConfig, PolicyKind, TimingConfig};
use crate::control_system::phase_program::{Phase, Program};
use crate::flow_analyzer::telemetry::{road_id_of, QueueSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum DurationPolicy {
    Fixed,
    Threshold { timing: TimingConfig },
    Nudge { timing: TimingConfig, gate: GateConfig },
}

impl DurationPolicy {
    pub fn from_config(config: &ExperimentConfig) -> Self {
        match config.policy {
            PolicyKind::Fixed => DurationPolicy::Fixed,
            PolicyKind::Threshold => DurationPolicy::Threshold {
                timing: config.timing.clone(),
            },
            PolicyKind::Nudge => DurationPolicy::Nudge {
                timing: config.timing.clone(),
                gate: config.optimize_gate.clone(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DurationPolicy::Fixed => "fixed",
            DurationPolicy::Threshold { .. } => "threshold",
            DurationPolicy::Nudge { .. } => "nudge",
        }
    }
}

/// Roads with at least one lane green in `phase`.
pub fn green_roads<'a>(phase: &Phase, lanes: &'a [String]) -> BTreeSet<&'a str> {
    lanes
        .iter()
        .enumerate()
        .filter(|(index, _)| phase.is_green(*index))
        .map(|(_, lane)| road_id_of(lane))
        .collect()
}

/// Scales a green phase by its share of the queued demand.
pub fn adaptive_duration(base: f64, green_queue: u32, total_queue: u32, timing: &TimingConfig) -> f64 {
    if total_queue == 0 {
        return base;
    }
    if green_queue == 0 {
        return timing.min_green;
    }
    let ratio = green_queue as f64 / total_queue as f64;
    (base * (1.0 + ratio)).clamp(timing.min_green, timing.max_green)
}

/// Builds a retimed copy of `program`. Yellow phases and phases without any
/// green keep their duration.
pub fn adapt(
    program: &Program,
    lanes: &[String],
    snapshot: &QueueSnapshot,
    timing: &TimingConfig,
) -> Program {
    let total_queue = snapshot.total_queue();
    program.retimed(&format!("{}_adaptive", program.name()), |_, phase| {
        if phase.has_yellow() || !phase.has_green() {
            return phase.duration();
        }
        let green_queue = green_roads(phase, lanes)
            .iter()
            .map(|road| snapshot.queue(road))
            .sum();
        adaptive_duration(phase.duration(), green_queue, total_queue, timing)
    })
}

/// Extra green seconds and the red-shrinking factor for a queue share.
pub fn dynamic_durations(max_queue: u32, total_queue: u32, timing: &TimingConfig) -> (f64, f64) {
    let factor = max_queue as f64 / total_queue.max(1) as f64;
    let extra_green = (factor * (timing.max_green_added - timing.min_green_added)).floor();
    let less_red = (1.0 - 0.5 * factor).max(timing.min_less_red_factor);
    (extra_green, less_red)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Nudge {
    Extend { from: f64, to: f64 },
    Shrink { from: f64, to: f64 },
}

impl Nudge {
    pub fn action(&self) -> &'static str {
        match self {
            Nudge::Extend { .. } => "extend",
            Nudge::Shrink { .. } => "shrink",
        }
    }

    pub fn durations(&self) -> (f64, f64) {
        match *self {
            Nudge::Extend { from, to } | Nudge::Shrink { from, to } => (from, to),
        }
    }
}

/// Decides how to retime the live phase. The phase is extended when it
/// serves the longest queue and shrunk otherwise; `None` when nothing
/// worthwhile changes.
pub fn nudge(
    phase: &Phase,
    duration: f64,
    lanes: &[String],
    snapshot: &QueueSnapshot,
    timing: &TimingConfig,
) -> Option<Nudge> {
    if phase.has_yellow() {
        return None;
    }
    let total_queue = snapshot.total_queue();
    if total_queue == 0 {
        return None;
    }
    let (busiest, max_queue) = snapshot.max_queue_road()?;
    let (extra_green, less_red) = dynamic_durations(max_queue, total_queue, timing);

    if green_roads(phase, lanes).contains(busiest) {
        if extra_green <= timing.min_extension {
            return None;
        }
        let extended = (duration + extra_green).min(timing.max_green);
        (extended > duration).then_some(Nudge::Extend {
            from: duration,
            to: extended,
        })
    } else {
        let floor = if phase.has_green() {
            timing.min_green
        } else {
            timing.min_red
        };
        let shrunk = (duration * less_red).max(floor);
        (shrunk < duration).then_some(Nudge::Shrink {
            from: duration,
            to: shrunk,
        })
    }
}

/// Whether the intersection is busy enough for nudging.
pub fn should_optimize(vehicles_in_network: usize, snapshot: &QueueSnapshot, gate: &GateConfig) -> bool {
    vehicles_in_network >= gate.min_vehicles
        && (snapshot.total_queue() > gate.tls_queue_threshold
            || snapshot.mean_speed() < gate.min_avg_speed)
}
