mod common;

use adaptive_signals::config::{IncidentConfig, InjectorConfig};
use adaptive_signals::flow_analyzer::EdgeHistory;
use adaptive_signals::incident_handling::{respond, IncidentDetector, IncidentKind};
use adaptive_signals::simulation_engine::incident_injector::{IncidentInjector, InjectorEvent};
use adaptive_signals::simulation_engine::simulator::ALL_CLASSES;
use adaptive_signals::simulation_engine::Simulator;
use common::FakeSim;

fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Three vehicles on `E` heading to `D` via `X`; `Y` offers a way around.
fn network(halting_on_e: u32, speed_on_e: f64) -> FakeSim {
    let mut sim = FakeSim::new();
    sim.add_edge("E", 1, halting_on_e, speed_on_e);
    sim.add_edge("X", 1, 0, 10.0);
    sim.add_edge("Y", 1, 0, 10.0);
    sim.add_edge("D", 1, 0, 10.0);
    for vehicle in ["v1", "v2", "v3"] {
        sim.add_vehicle(vehicle, &["E", "X", "D"]);
    }
    sim.add_detour(&["E", "Y", "D"]);
    sim
}

#[test]
fn surge_reroutes_every_vehicle_on_the_edge() {
    let mut sim = network(25, 0.5);
    let config = IncidentConfig {
        surge_queue_threshold: 20,
        ..IncidentConfig::default()
    };
    let detector = IncidentDetector::new(&sim, config);
    let incidents = detector.detect(&sim, &EdgeHistory::new(5), 10);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].kind, IncidentKind::SuddenSurge);
    assert_eq!(incidents[0].edge_id, "E");

    let report = respond(&mut sim, &incidents[0]);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.rerouted, 3);
    for vehicle in ["v1", "v2", "v3"] {
        assert_eq!(sim.vehicle_route(vehicle).unwrap(), strings(&["E", "Y", "D"]));
    }
    assert_eq!(report.to_record().kind, "sudden_surge");
}

#[test]
fn missing_alternative_is_reported_not_fatal() {
    let mut sim = network(25, 0.5);
    sim.detours.clear();
    let config = IncidentConfig {
        surge_queue_threshold: 20,
        ..IncidentConfig::default()
    };
    let detector = IncidentDetector::new(&sim, config);
    let incidents = detector.detect(&sim, &EdgeHistory::new(5), 10);
    let report = respond(&mut sim, &incidents[0]);
    assert_eq!(report.attempted, 3);
    assert_eq!(report.rerouted, 0);
    assert_eq!(report.unchanged, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(sim.vehicle_route("v1").unwrap(), strings(&["E", "X", "D"]));
}

#[test]
fn persistent_queue_under_green_is_an_accident() {
    let mut sim = network(1, 10.0);
    sim.add_light("J", &["E_0"], "G");
    let mut history = EdgeHistory::new(5);
    for _ in 0..5 {
        history.record("E", 1, 10.0);
    }
    let detector = IncidentDetector::new(&sim, IncidentConfig::default());

    let incidents = detector.detect(&sim, &history, 5);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].kind, IncidentKind::Accident);

    if let Some(light) = sim.lights.get_mut("J") {
        light.state = "r".to_string();
    }
    assert!(detector.detect(&sim, &history, 6).is_empty());
}

#[test]
fn short_history_is_not_persistent() {
    let sim = network(1, 10.0);
    let mut history = EdgeHistory::new(5);
    for _ in 0..4 {
        history.record("E", 1, 10.0);
    }
    let detector = IncidentDetector::new(&sim, IncidentConfig::default());
    assert!(detector.detect(&sim, &history, 4).is_empty());
}

#[test]
fn fully_disallowed_edge_is_a_closure() {
    let mut sim = network(0, 0.0);
    sim.set_lane_disallowed("E_0", &[ALL_CLASSES.to_string()]).unwrap();
    let detector = IncidentDetector::new(&sim, IncidentConfig::default());
    let incidents = detector.detect(&sim, &EdgeHistory::new(5), 10);
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].kind, IncidentKind::RoadClosure);
}

#[test]
fn injected_closure_survives_failed_queries() {
    let mut sim = FakeSim::new();
    sim.add_edge("e", 1, 0, 10.0);
    sim.add_edge("f", 1, 0, 10.0);
    sim.add_vehicle("v1", &["e", "f"]);
    let mut injector = IncidentInjector::new(&InjectorConfig {
        enabled: true,
        edge: Some("e".to_string()),
        probability: 1.0,
        duration: 1,
        seed: 0,
    });

    let closed = injector.advance(&mut sim).unwrap();
    assert!(matches!(closed, Some(InjectorEvent::Closed { ref edge, .. }) if edge == "e"));

    // Draining: the vehicle count query fails once.
    sim.failing_edges.insert("e".to_string());
    assert!(injector.advance(&mut sim).is_err());
    assert_eq!(injector.blocked_edge(), Some("e"));
    sim.failing_edges.clear();
    assert_eq!(injector.advance(&mut sim).unwrap(), None);

    if let Some(edge) = sim.edges.get_mut("e") {
        edge.vehicles.clear();
    }
    assert_eq!(
        injector.advance(&mut sim).unwrap(),
        Some(InjectorEvent::Drained { edge: "e".to_string() })
    );

    // Reopening fails once and is retried on the next step.
    sim.failing_edges.insert("e".to_string());
    assert!(injector.advance(&mut sim).is_err());
    assert_eq!(injector.blocked_edge(), Some("e"));
    sim.failing_edges.clear();
    assert_eq!(sim.lane_disallowed("e_0").unwrap(), vec![ALL_CLASSES.to_string()]);

    assert_eq!(
        injector.advance(&mut sim).unwrap(),
        Some(InjectorEvent::Reopened { edge: "e".to_string() })
    );
    assert_eq!(injector.blocked_edge(), None);
    assert!(sim.lane_disallowed("e_0").unwrap().is_empty());
}
