// baseline_main.rs
//
// Runs the fixed-time baseline. With `--write-phases <path>` it instead
// writes fair baseline programs for the scenario's traffic lights.
use adaptive_signals::config::{ExperimentConfig, PolicyKind};
use adaptive_signals::control_system::baseline::{fair_phase_table, save_phase_table};
use adaptive_signals::engine::run_experiment;
use adaptive_signals::monitoring::CsvSink;
use adaptive_signals::simulation_engine::scenario::Scenario;
use adaptive_signals::simulation_engine::GridWorld;
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut config_path: Option<PathBuf> = None;
    let mut write_phases: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--write-phases" => {
                let path = args.next().ok_or("--write-phases needs a file path")?;
                write_phases = Some(PathBuf::from(path));
            }
            _ => config_path = Some(PathBuf::from(arg)),
        }
    }

    let mut config = match &config_path {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };

    if let Some(output) = write_phases {
        let scenario = Scenario::load(&config.scenario)?;
        let table = fair_phase_table(&scenario)?;
        save_phase_table(&output, &table)?;
        println!("Wrote {} baseline programs to {}", table.len(), output.display());
        return Ok(());
    }

    config.policy = PolicyKind::Fixed;
    let mut world = GridWorld::load(&config.scenario)?;
    let mut sink = CsvSink::new(&config.output_dir.join("baseline"))?;
    let summary = run_experiment(&mut world, &config, &mut sink)?;
    println!(
        "Baseline finished: {} steps, throughput {}, average travel time {:.2}s",
        summary.steps, summary.throughput, summary.average_travel_time
    );
    Ok(())
}
