// src/engine/runner.rs
use crate::config::ExperimentConfig;
use crate::control_system::baseline::Baselines;
use crate::control_system::{DurationPolicy, TrafficLightController};
use crate::error::{RunError, SinkError};
use crate::flow_analyzer::EdgeHistory;
use crate::incident_handling::{respond, IncidentDetector, IncidentKind};
use crate::monitoring::{PerformanceTracker, RecordSink};
use crate::shared_data::{current_timestamp, IncidentRecord, QueueRecord, SpeedRecord};
use crate::simulation_engine::incident_injector::{IncidentInjector, InjectorEvent};
use crate::simulation_engine::Simulator;

/// Totals of one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub policy: String,
    pub steps: u64,
    pub intersections: usize,
    pub skipped: Vec<String>,
    pub incidents: usize,
    pub light_adjustments: usize,
    pub vehicles_entered: usize,
    pub throughput: usize,
    pub average_travel_time: f64,
    pub total_waiting_time: f64,
}

fn write_or_warn(what: &str, result: Result<(), SinkError>) {
    if let Err(e) = result {
        log::warn!("Could not record {}: {}", what, e);
    }
}

/// Runs one experiment to completion. The simulator is closed on every
/// exit path, including errors.
pub fn run_experiment<S: Simulator + ?Sized>(
    sim: &mut S,
    config: &ExperimentConfig,
    sink: &mut dyn RecordSink,
) -> Result<RunSummary, RunError> {
    let result = drive(sim, config, sink);
    sim.close();
    if let Err(e) = &result {
        log::error!("Run aborted: {}", e);
    }
    result
}

fn drive<S: Simulator + ?Sized>(
    sim: &mut S,
    config: &ExperimentConfig,
    sink: &mut dyn RecordSink,
) -> Result<RunSummary, RunError> {
    config.validate()?;
    let baselines = Baselines::load(config.baseline_phases.as_deref())?;
    let policy = DurationPolicy::from_config(config);
    let policy_name = policy.name();
    let mut controller = TrafficLightController::initialize(&*sim, &baselines, &config.timing, policy)?;
    let detector = IncidentDetector::new(&*sim, config.incidents.clone());
    let mut history = EdgeHistory::new(config.incidents.history_window);
    let mut injector = config
        .injector
        .enabled
        .then(|| IncidentInjector::new(&config.injector));
    let mut tracker = PerformanceTracker::new();

    let mut step: u64 = 0;
    let mut incidents = 0;
    let mut light_adjustments = 0;

    log::info!(
        "Starting {} run: at most {} steps, end time {}s",
        policy_name,
        config.max_steps,
        sim.end_time()
    );

    while step < config.max_steps && sim.time() < sim.end_time() && sim.min_expected_vehicles() > 0 {
        sim.step()?;
        step += 1;
        let now = sim.time();

        if let Some(injector) = injector.as_mut() {
            match injector.advance(sim) {
                Ok(Some(InjectorEvent::Closed { edge, rerouted })) => {
                    incidents += 1;
                    let record = IncidentRecord {
                        timestamp: current_timestamp(),
                        step,
                        kind: IncidentKind::RoadClosure.as_str().to_string(),
                        edge_id: edge,
                        rerouted,
                        unchanged: 0,
                    };
                    write_or_warn("incident", sink.incident(&record));
                }
                Ok(_) => {}
                Err(e) => log::warn!("Step {}: incident injector failed: {}", step, e),
            }
        }

        let vehicles = sim.vehicle_count().unwrap_or_else(|e| {
            log::warn!("Step {}: vehicle count unavailable: {}", step, e);
            0
        });
        let report = controller.step(sim, step, vehicles);
        for intersection in &report.intersections {
            for (road_id, queue_length) in &intersection.snapshot.queues {
                let record = QueueRecord {
                    step,
                    time: now,
                    tls_id: intersection.tls_id.clone(),
                    road_id: road_id.clone(),
                    queue_length: *queue_length,
                };
                write_or_warn("queue length", sink.queue(&record));
            }
        }
        for record in &report.adjustments {
            light_adjustments += 1;
            write_or_warn("light adjustment", sink.light_adjustment(record));
        }

        history.update_from(&*sim);

        if config.incidents.enabled && step % config.incidents.check_interval == 0 {
            for incident in detector.detect(&*sim, &history, step) {
                let response = respond(sim, &incident);
                incidents += 1;
                write_or_warn("incident", sink.incident(&response.to_record()));
            }
        }

        match sim.edge_ids() {
            Ok(edges) => {
                for edge_id in edges {
                    let mean_speed = sim.edge_mean_speed(&edge_id).unwrap_or(0.0);
                    let record = SpeedRecord {
                        step,
                        time: now,
                        edge_id,
                        mean_speed,
                    };
                    write_or_warn("edge speed", sink.speed(&record));
                }
            }
            Err(e) => log::warn!("Step {}: edge list unavailable: {}", step, e),
        }

        tracker.record_step(&*sim, &report);
    }

    for record in tracker.performance_records() {
        write_or_warn("performance", sink.performance(&record));
    }
    let summary_text = tracker.summary(policy_name);
    write_or_warn("summary", sink.summary(&summary_text));
    log::info!("Run finished after {} steps\n{}", step, summary_text);

    Ok(RunSummary {
        policy: policy_name.to_string(),
        steps: step,
        intersections: controller.intersections().len(),
        skipped: controller.skipped().iter().cloned().collect(),
        incidents,
        light_adjustments,
        vehicles_entered: tracker.vehicles_entered(),
        throughput: tracker.throughput(),
        average_travel_time: tracker.average_travel_time(),
        total_waiting_time: tracker.total_waiting_time(),
    })
}
