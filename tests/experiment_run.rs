use adaptive_signals::config::{ExperimentConfig, PolicyKind};
use adaptive_signals::engine::run_experiment;
use adaptive_signals::monitoring::report::generate_report;
use adaptive_signals::monitoring::{CsvSink, MemorySink};
use adaptive_signals::simulation_engine::GridWorld;
use std::path::{Path, PathBuf};

fn demo(file: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(file)
}

fn demo_config() -> ExperimentConfig {
    let mut config = ExperimentConfig::load(&demo("config.json")).unwrap();
    config.scenario = demo("scenario.json");
    config.baseline_phases = Some(demo("baseline_phases.json"));
    config.max_steps = 300;
    config
}

#[test]
fn demo_config_parses() {
    let config = demo_config();
    assert_eq!(config.policy, PolicyKind::Threshold);
    assert_eq!(config.injector.edge.as_deref(), Some("j_k"));
    assert_eq!(config.timing.min_red, ExperimentConfig::default().timing.min_red);
}

#[test]
fn adaptive_run_writes_every_record_kind() {
    let mut config = demo_config();
    config.injector.probability = 1.0;
    let dir = std::env::temp_dir().join(format!("adaptive_signals_run_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut world = GridWorld::load(&config.scenario).unwrap();
    let mut sink = CsvSink::new(&dir).unwrap();
    let summary = run_experiment(&mut world, &config, &mut sink).unwrap();

    assert_eq!(summary.steps, 300);
    assert_eq!(summary.intersections, 2);
    assert!(summary.skipped.is_empty());
    assert!(summary.vehicles_entered > 0);
    assert!(summary.incidents >= 1);

    let report = generate_report(&dir).unwrap();
    assert!(report.queue_records > 0);
    assert_eq!(report.speed_records, 300 * 9);
    assert!(report.incidents >= 1);
    assert_eq!(report.performance_records, 2);
    assert!(dir.join("metrics_summary.txt").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn fixed_policy_never_retimes() {
    let mut fixed = demo_config();
    fixed.policy = PolicyKind::Fixed;
    fixed.injector.enabled = false;
    let mut adaptive = demo_config();
    adaptive.injector.enabled = false;

    let mut fixed_sink = MemorySink::default();
    let mut world = GridWorld::load(&fixed.scenario).unwrap();
    let fixed_summary = run_experiment(&mut world, &fixed, &mut fixed_sink).unwrap();

    let mut adaptive_sink = MemorySink::default();
    let mut world = GridWorld::load(&adaptive.scenario).unwrap();
    let adaptive_summary = run_experiment(&mut world, &adaptive, &mut adaptive_sink).unwrap();

    assert_eq!(fixed_summary.light_adjustments, 0);
    assert!(fixed_sink.light_adjustments.is_empty());
    assert_eq!(fixed_summary.steps, adaptive_summary.steps);
    assert!(fixed_summary.vehicles_entered > 0);
    assert!(adaptive_summary.vehicles_entered > 0);
}

#[test]
fn missing_scenario_is_a_connection_failure() {
    assert!(GridWorld::load(&demo("no_such_scenario.json")).is_err());
}
