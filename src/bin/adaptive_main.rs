// adaptive_main.rs
use adaptive_signals::config::ExperimentConfig;
use adaptive_signals::engine::run_experiment;
use adaptive_signals::monitoring::{AmqpPublisher, CsvSink};
use adaptive_signals::simulation_engine::GridWorld;
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::load(&PathBuf::from(path))?,
        None => ExperimentConfig::default(),
    };
    let mut world = GridWorld::load(&config.scenario)?;
    let mut sink = CsvSink::new(&config.output_dir)?;

    let summary = match &config.amqp {
        Some(url) => {
            let mut publisher = AmqpPublisher::new(sink, url);
            let summary = run_experiment(&mut world, &config, &mut publisher);
            publisher.close();
            summary?
        }
        None => run_experiment(&mut world, &config, &mut sink)?,
    };

    println!(
        "{} run finished: {} steps, {} intersections ({} skipped), {} incidents, {} light adjustments",
        summary.policy,
        summary.steps,
        summary.intersections,
        summary.skipped.len(),
        summary.incidents,
        summary.light_adjustments
    );
    println!(
        "Throughput {}, average travel time {:.2}s, total waiting time {:.2}s",
        summary.throughput, summary.average_travel_time, summary.total_waiting_time
    );
    Ok(())
}
