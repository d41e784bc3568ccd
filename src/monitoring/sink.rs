use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::global_variables::{
    EDGE_SPEEDS_CSV, INCIDENTS_CSV, LIGHT_ADJUSTMENTS_CSV, METRICS_SUMMARY_TXT, PERFORMANCE_CSV,
    QUEUE_LENGTHS_CSV,
};
use crate::shared_data::{
    IncidentRecord, LightAdjustmentRecord, PerformanceRecord, QueueRecord, SpeedRecord,
};

/// Destination for everything a run records.
pub trait RecordSink {
    fn queue(&mut self, record: &QueueRecord) -> Result<(), SinkError>;
    fn speed(&mut self, record: &SpeedRecord) -> Result<(), SinkError>;
    fn incident(&mut self, record: &IncidentRecord) -> Result<(), SinkError>;
    fn light_adjustment(&mut self, record: &LightAdjustmentRecord) -> Result<(), SinkError>;
    fn performance(&mut self, record: &PerformanceRecord) -> Result<(), SinkError>;
    fn summary(&mut self, text: &str) -> Result<(), SinkError>;
}

/// Appends one record to a CSV file, writing the header only when the file
/// is new.
pub fn log_to_csv<T: Serialize>(path: &Path, record: &T) -> Result<(), SinkError> {
    let file_exists = path.exists();
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

/// Writes each record kind to its own CSV file in one directory.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    /// Creates the directory and removes files left by an earlier run.
    pub fn new(dir: &Path) -> Result<Self, SinkError> {
        fs::create_dir_all(dir)?;
        for name in [
            QUEUE_LENGTHS_CSV,
            EDGE_SPEEDS_CSV,
            INCIDENTS_CSV,
            LIGHT_ADJUSTMENTS_CSV,
            PERFORMANCE_CSV,
            METRICS_SUMMARY_TXT,
        ] {
            let path = dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordSink for CsvSink {
    fn queue(&mut self, record: &QueueRecord) -> Result<(), SinkError> {
        log_to_csv(&self.dir.join(QUEUE_LENGTHS_CSV), record)
    }

    fn speed(&mut self, record: &SpeedRecord) -> Result<(), SinkError> {
        log_to_csv(&self.dir.join(EDGE_SPEEDS_CSV), record)
    }

    fn incident(&mut self, record: &IncidentRecord) -> Result<(), SinkError> {
        log_to_csv(&self.dir.join(INCIDENTS_CSV), record)
    }

    fn light_adjustment(&mut self, record: &LightAdjustmentRecord) -> Result<(), SinkError> {
        log_to_csv(&self.dir.join(LIGHT_ADJUSTMENTS_CSV), record)
    }

    fn performance(&mut self, record: &PerformanceRecord) -> Result<(), SinkError> {
        log_to_csv(&self.dir.join(PERFORMANCE_CSV), record)
    }

    fn summary(&mut self, text: &str) -> Result<(), SinkError> {
        fs::write(self.dir.join(METRICS_SUMMARY_TXT), text)?;
        Ok(())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub queues: Vec<QueueRecord>,
    pub speeds: Vec<SpeedRecord>,
    pub incidents: Vec<IncidentRecord>,
    pub light_adjustments: Vec<LightAdjustmentRecord>,
    pub performance: Vec<PerformanceRecord>,
    pub summary: Option<String>,
}

impl RecordSink for MemorySink {
    fn queue(&mut self, record: &QueueRecord) -> Result<(), SinkError> {
        self.queues.push(record.clone());
        Ok(())
    }

    fn speed(&mut self, record: &SpeedRecord) -> Result<(), SinkError> {
        self.speeds.push(record.clone());
        Ok(())
    }

    fn incident(&mut self, record: &IncidentRecord) -> Result<(), SinkError> {
        self.incidents.push(record.clone());
        Ok(())
    }

    fn light_adjustment(&mut self, record: &LightAdjustmentRecord) -> Result<(), SinkError> {
        self.light_adjustments.push(record.clone());
        Ok(())
    }

    fn performance(&mut self, record: &PerformanceRecord) -> Result<(), SinkError> {
        self.performance.push(record.clone());
        Ok(())
    }

    fn summary(&mut self, text: &str) -> Result<(), SinkError> {
        self.summary = Some(text.to_string());
        Ok(())
    }
}
