// benches/bench_aggregate_telemetry.rs
use adaptive_signals::control_system::PhaseSpec;
use adaptive_signals::flow_analyzer::aggregate;
use adaptive_signals::simulation_engine::scenario::{EdgeSpec, FlowSpec, Scenario, TrafficLightSpec};
use adaptive_signals::simulation_engine::{GridWorld, Simulator};
use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;

// A star of `approaches` roads into one red light, each fed by its own flow.
fn queued_world(approaches: usize) -> (GridWorld, Vec<String>) {
    let mut edges = vec![EdgeSpec {
        id: "out".to_string(),
        from: "c".to_string(),
        to: "d".to_string(),
        lanes: 1,
        length: 50.0,
        speed: 13.9,
    }];
    let mut lanes = Vec::new();
    let mut flows = Vec::new();
    for i in 0..approaches {
        let id = format!("in{}", i);
        edges.push(EdgeSpec {
            id: id.clone(),
            from: format!("n{}", i),
            to: "c".to_string(),
            lanes: 2,
            length: 100.0,
            speed: 13.9,
        });
        lanes.push(format!("{}_0", id));
        lanes.push(format!("{}_1", id));
        flows.push(FlowSpec {
            id: format!("f{}", i),
            from: id,
            to: "out".to_string(),
            probability: 0.5,
            begin: 0.0,
            end: 1000.0,
        });
    }
    let scenario = Scenario {
        end_time: 1000.0,
        seed: 42,
        edges,
        traffic_lights: vec![TrafficLightSpec {
            id: "c".to_string(),
            controlled_lanes: lanes.clone(),
            program: vec![PhaseSpec {
                duration: 1000.0,
                state: "r".repeat(lanes.len()),
            }],
        }],
        flows,
    };
    let mut world = match GridWorld::from_scenario(scenario) {
        Ok(world) => world,
        Err(e) => panic!("bench scenario rejected: {}", e),
    };
    for _ in 0..60 {
        let _ = world.step();
    }
    (world, lanes)
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_telemetry");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &size in [4, 8, 16].iter() {
        let (world, lanes) = queued_world(size);
        group.bench_function(format!("approaches_{}", size), |b| {
            b.iter(|| black_box(aggregate(&world, "c", &lanes)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
