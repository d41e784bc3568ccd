use plotters::prelude::*;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::global_variables::{
    EDGE_SPEEDS_CSV, INCIDENTS_CSV, LIGHT_ADJUSTMENTS_CSV, PERFORMANCE_CSV, QUEUE_CHART_PNG,
    QUEUE_LENGTHS_CSV,
};
use crate::shared_data::QueueRecord;

/// Record counts of one output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub queue_records: usize,
    pub speed_records: usize,
    pub incidents: usize,
    pub light_adjustments: usize,
    pub performance_records: usize,
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Report Summary:")?;
        writeln!(f, "Queue lengths: {} records", self.queue_records)?;
        writeln!(f, "Edge speeds: {} records", self.speed_records)?;
        writeln!(f, "Incidents: {} records", self.incidents)?;
        writeln!(f, "Light adjustments: {} records", self.light_adjustments)?;
        write!(f, "Performance: {} records", self.performance_records)
    }
}

/// Number of data rows in a CSV file with a header.
pub fn count_csv_records(path: &Path) -> Result<usize, csv::Error> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    Ok(rdr.records().count())
}

fn count_or_zero(path: &Path) -> Result<usize, csv::Error> {
    if !path.exists() {
        return Ok(0);
    }
    count_csv_records(path)
}

/// Counts the records of every output file in `dir`. Missing files count
/// as empty.
pub fn generate_report(dir: &Path) -> Result<ReportSummary, csv::Error> {
    Ok(ReportSummary {
        queue_records: count_or_zero(&dir.join(QUEUE_LENGTHS_CSV))?,
        speed_records: count_or_zero(&dir.join(EDGE_SPEEDS_CSV))?,
        incidents: count_or_zero(&dir.join(INCIDENTS_CSV))?,
        light_adjustments: count_or_zero(&dir.join(LIGHT_ADJUSTMENTS_CSV))?,
        performance_records: count_or_zero(&dir.join(PERFORMANCE_CSV))?,
    })
}

/// Total queue over all intersections, per step.
pub fn total_queue_per_step(path: &Path) -> Result<BTreeMap<u64, u32>, csv::Error> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut totals = BTreeMap::new();
    for result in rdr.deserialize() {
        let record: QueueRecord = result?;
        *totals.entry(record.step).or_insert(0) += record.queue_length;
    }
    Ok(totals)
}

/// Draws the network-wide queue length over time to a PNG in `dir`.
/// Returns `None` when there is nothing to plot.
pub fn render_queue_chart(dir: &Path) -> Result<Option<PathBuf>, Box<dyn Error>> {
    let source = dir.join(QUEUE_LENGTHS_CSV);
    if !source.exists() {
        return Ok(None);
    }
    let totals = total_queue_per_step(&source)?;
    let (Some(first), Some(last)) = (totals.keys().next(), totals.keys().next_back()) else {
        return Ok(None);
    };
    let max_queue = totals.values().copied().max().unwrap_or(0);

    let output = dir.join(QUEUE_CHART_PNG);
    let chart_path = output.clone();
    let backend = BitMapBackend::new(&chart_path, (800, 600));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Total Queue Length per Step", ("sans-serif", 20))
        .margin(40)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(*first..*last + 1, 0u32..max_queue + 1)?;

    chart
        .configure_mesh()
        .x_desc("step")
        .y_desc("halting vehicles")
        .draw()?;
    chart.draw_series(LineSeries::new(
        totals.iter().map(|(step, queue)| (*step, *queue)),
        &BLUE,
    ))?;

    root.present()?;
    log::info!("Queue chart saved to {}", output.display());
    Ok(Some(output))
}
