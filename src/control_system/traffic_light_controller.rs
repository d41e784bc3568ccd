use std::collections::BTreeSet;

use crate::config::{GateConfig, TimingConfig};
use crate::control_system::baseline::{clamp_greens, Baselines};
use crate::control_system::duration_policy::{adapt, nudge, should_optimize, DurationPolicy};
use crate::control_system::intersection::{ControlMode, Intersection};
use crate::control_system::phase_program::Program;
use crate::error::SimError;
use crate::flow_analyzer::telemetry::QueueSnapshot;
use crate::shared_data::{current_timestamp, LightAdjustmentRecord};
use crate::simulation_engine::Simulator;

/// What one intersection looked like after a controller step.
#[derive(Debug, Clone)]
pub struct IntersectionStep {
    pub tls_id: String,
    pub snapshot: QueueSnapshot,
    pub mode: ControlMode,
}

#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub intersections: Vec<IntersectionStep>,
    pub adjustments: Vec<LightAdjustmentRecord>,
}

pub struct TrafficLightController {
    policy: DurationPolicy,
    intersections: Vec<Intersection>,
    skipped: BTreeSet<String>,
}

impl TrafficLightController {
    /// Discovers the simulator's traffic lights and pairs each with its
    /// baseline program. Intersections without a usable baseline are left
    /// out for the whole run. Only a failure to list the traffic lights is
    /// returned as an error.
    pub fn initialize<S: Simulator + ?Sized>(
        sim: &S,
        baselines: &Baselines,
        timing: &TimingConfig,
        policy: DurationPolicy,
    ) -> Result<Self, SimError> {
        let mut intersections = Vec::new();
        let mut skipped = BTreeSet::new();

        for tls_id in sim.traffic_light_ids()? {
            let lanes = match sim.controlled_lanes(&tls_id) {
                Ok(lanes) => lanes,
                Err(e) => {
                    log::warn!("[{}] controlled lanes unavailable, skipped: {}", tls_id, e);
                    skipped.insert(tls_id);
                    continue;
                }
            };
            let baseline = match baselines.program_for(&tls_id, lanes.len()) {
                None => {
                    log::warn!("[{}] has no baseline program, skipped for this run", tls_id);
                    skipped.insert(tls_id);
                    continue;
                }
                Some(program) => program.and_then(|program| {
                    program.validate_for(lanes.len())?;
                    Ok(program)
                }),
            };
            match baseline {
                Ok(program) => {
                    let program = clamp_greens(&tls_id, &program, timing);
                    log::info!(
                        "[{}] {} lanes, baseline cycle {}s",
                        tls_id,
                        lanes.len(),
                        program.cycle_length()
                    );
                    intersections.push(Intersection::new(&tls_id, lanes, program));
                }
                Err(e) => {
                    log::warn!("[{}] baseline program unusable, skipped: {}", tls_id, e);
                    skipped.insert(tls_id);
                }
            }
        }

        log::info!(
            "Controlling {} intersections with the {} policy ({} skipped)",
            intersections.len(),
            policy.name(),
            skipped.len()
        );
        Ok(Self {
            policy,
            intersections,
            skipped,
        })
    }

    pub fn policy(&self) -> &DurationPolicy {
        &self.policy
    }

    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    /// Intersections left out because their configuration was missing.
    pub fn skipped(&self) -> &BTreeSet<String> {
        &self.skipped
    }

    /// Runs one control step for every intersection. A failure at one
    /// intersection is logged and leaves it on its previous program.
    pub fn step<S: Simulator + ?Sized>(
        &mut self,
        sim: &mut S,
        step: u64,
        vehicles_in_network: usize,
    ) -> StepReport {
        let mut report = StepReport::default();
        for intersection in &mut self.intersections {
            let snapshot = intersection.snapshot(&*sim);

            let (desired, mode) = match &self.policy {
                DurationPolicy::Threshold { timing } if snapshot.total_queue() > timing.queue_threshold => (
                    adapt(
                        intersection.baseline(),
                        intersection.controlled_lanes(),
                        &snapshot,
                        timing,
                    ),
                    ControlMode::Adaptive,
                ),
                _ => (intersection.baseline().clone(), ControlMode::Fixed),
            };

            match push_program(sim, intersection, desired, mode, step) {
                Ok(records) => {
                    report.adjustments.extend(records);
                    if !matches!(self.policy, DurationPolicy::Nudge { .. }) {
                        intersection.set_mode(mode);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "[{}] program update failed, keeping previous program: {}",
                        intersection.id(),
                        e
                    );
                    report.intersections.push(IntersectionStep {
                        tls_id: intersection.id().to_string(),
                        snapshot,
                        mode: intersection.mode(),
                    });
                    continue;
                }
            }

            if let DurationPolicy::Nudge { timing, gate } = &self.policy {
                match nudge_live_phase(sim, intersection, &snapshot, vehicles_in_network, timing, gate, step) {
                    Ok(Some(record)) => report.adjustments.push(record),
                    Ok(None) => {}
                    Err(e) => log::warn!("[{}] phase nudge failed: {}", intersection.id(), e),
                }
            }

            report.intersections.push(IntersectionStep {
                tls_id: intersection.id().to_string(),
                snapshot,
                mode: intersection.mode(),
            });
        }
        report
    }
}

/// Hands `desired` to the simulator unless it already runs the same timing.
fn push_program<S: Simulator + ?Sized>(
    sim: &mut S,
    intersection: &mut Intersection,
    desired: Program,
    mode: ControlMode,
    step: u64,
) -> Result<Vec<LightAdjustmentRecord>, SimError> {
    let previous = match intersection.active_program() {
        Some(active) if active.same_timing(&desired) => return Ok(Vec::new()),
        Some(active) => Some(active.clone()),
        None => None,
    };

    sim.set_program(intersection.id(), &desired)?;

    let records = match &previous {
        None => {
            log::info!("[{}] installed program {}", intersection.id(), desired.name());
            Vec::new()
        }
        Some(previous) => {
            let action = match mode {
                ControlMode::Adaptive => "retime",
                ControlMode::Fixed => "restore",
            };
            let timestamp = current_timestamp();
            previous
                .phases()
                .iter()
                .zip(desired.phases())
                .enumerate()
                .filter(|(_, (old, new))| old.duration() != new.duration())
                .map(|(phase_index, (old, new))| {
                    log::info!(
                        "[{}] {} phase {}: {:.1}s -> {:.1}s",
                        intersection.id(),
                        action,
                        phase_index,
                        old.duration(),
                        new.duration()
                    );
                    LightAdjustmentRecord {
                        timestamp,
                        step,
                        tls_id: intersection.id().to_string(),
                        action: action.to_string(),
                        phase_index,
                        old_duration: old.duration(),
                        new_duration: new.duration(),
                    }
                })
                .collect()
        }
    };
    intersection.install(desired);
    Ok(records)
}

/// Extends or shrinks the live phase at most once per activation.
fn nudge_live_phase<S: Simulator + ?Sized>(
    sim: &mut S,
    intersection: &mut Intersection,
    snapshot: &QueueSnapshot,
    vehicles_in_network: usize,
    timing: &TimingConfig,
    gate: &GateConfig,
    step: u64,
) -> Result<Option<LightAdjustmentRecord>, SimError> {
    let phase_index = sim.phase_index(intersection.id())?;
    intersection.observe_phase(phase_index);
    if intersection.already_adjusted(phase_index)
        || !should_optimize(vehicles_in_network, snapshot, gate)
    {
        return Ok(None);
    }
    let Some(phase) = intersection
        .active_program()
        .and_then(|program| program.phase_at(phase_index))
        .cloned()
    else {
        return Ok(None);
    };

    let duration = sim.phase_duration(intersection.id())?;
    let Some(decision) = nudge(&phase, duration, intersection.controlled_lanes(), snapshot, timing) else {
        return Ok(None);
    };
    let (from, to) = decision.durations();
    let elapsed = (duration - sim.phase_remaining(intersection.id())?).max(0.0);
    sim.set_phase_duration(intersection.id(), (to - elapsed).max(0.0))?;
    intersection.mark_adjusted(phase_index);

    log::info!(
        "[{}] {} phase {}: {:.1}s -> {:.1}s",
        intersection.id(),
        decision.action(),
        phase_index,
        from,
        to
    );
    Ok(Some(LightAdjustmentRecord {
        timestamp: current_timestamp(),
        step,
        tls_id: intersection.id().to_string(),
        action: decision.action().to_string(),
        phase_index,
        old_duration: from,
        new_duration: to,
    }))
}
