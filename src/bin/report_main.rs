use adaptive_signals::monitoring::report::{generate_report, render_queue_chart};
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "output".to_string()));
    println!("Generating report for {}...", dir.display());
    println!("{}", generate_report(&dir)?);
    match render_queue_chart(&dir)? {
        Some(path) => println!("Queue chart saved to {}", path.display()),
        None => println!("No queue data to plot."),
    }
    Ok(())
}
