// benches/bench_signal_controller.rs
use adaptive_signals::config::TimingConfig;
use adaptive_signals::control_system::baseline::Baselines;
use adaptive_signals::control_system::{DurationPolicy, PhaseSpec, TrafficLightController};
use adaptive_signals::simulation_engine::scenario::{EdgeSpec, FlowSpec, Scenario, TrafficLightSpec};
use adaptive_signals::simulation_engine::{GridWorld, Simulator};
use criterion::{black_box, criterion_group, criterion_main, AxisScale, Criterion, PlotConfiguration};
use std::time::Duration;

fn edge(id: &str, from: &str, to: &str) -> EdgeSpec {
    EdgeSpec {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        lanes: 2,
        length: 80.0,
        speed: 13.9,
    }
}

// A corridor of `junctions` signalised crossings, each with a side road.
fn corridor(junctions: usize) -> Scenario {
    let mut edges = Vec::new();
    let mut traffic_lights = Vec::new();
    let mut flows = Vec::new();
    for j in 0..junctions {
        let main = format!("m{}", j);
        let side = format!("s{}", j);
        edges.push(edge(&main, &format!("j{}", j), &format!("j{}", j + 1)));
        edges.push(edge(&side, &format!("side{}", j), &format!("j{}", j + 1)));
        traffic_lights.push(TrafficLightSpec {
            id: format!("j{}", j + 1),
            controlled_lanes: vec![
                format!("{}_0", main),
                format!("{}_1", main),
                format!("{}_0", side),
                format!("{}_1", side),
            ],
            program: vec![
                PhaseSpec { duration: 30.0, state: "GGrr".to_string() },
                PhaseSpec { duration: 4.0, state: "yyrr".to_string() },
                PhaseSpec { duration: 30.0, state: "rrGG".to_string() },
                PhaseSpec { duration: 4.0, state: "rryy".to_string() },
            ],
        });
        flows.push(FlowSpec {
            id: format!("side_flow{}", j),
            from: side,
            to: "exit".to_string(),
            probability: 0.2,
            begin: 0.0,
            end: 3600.0,
        });
    }
    edges.push(edge("exit", &format!("j{}", junctions), "sink"));
    flows.push(FlowSpec {
        id: "main_flow".to_string(),
        from: "m0".to_string(),
        to: "exit".to_string(),
        probability: 0.6,
        begin: 0.0,
        end: 3600.0,
    });
    Scenario {
        end_time: 3600.0,
        seed: 9,
        edges,
        traffic_lights,
        flows,
    }
}

fn bench_controller_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_controller_step");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &size in [2, 5, 10].iter() {
        group.bench_function(format!("junctions_{}", size), |b| {
            let mut world = match GridWorld::from_scenario(corridor(size)) {
                Ok(world) => world,
                Err(e) => panic!("bench scenario rejected: {}", e),
            };
            let policy = DurationPolicy::Threshold {
                timing: TimingConfig::default(),
            };
            let mut controller = match TrafficLightController::initialize(
                &world,
                &Baselines::LaneCount,
                &TimingConfig::default(),
                policy,
            ) {
                Ok(controller) => controller,
                Err(e) => panic!("controller setup failed: {}", e),
            };
            let mut step = 0;
            b.iter(|| {
                step += 1;
                let _ = world.step();
                let vehicles = world.vehicle_count().unwrap_or(0);
                black_box(controller.step(&mut world, step, vehicles));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_controller_step);
criterion_main!(benches);
