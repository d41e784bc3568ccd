pub mod amqp;
pub mod performance;
pub mod report;
pub mod sink;

pub use amqp::AmqpPublisher;
pub use performance::PerformanceTracker;
pub use sink::{log_to_csv, CsvSink, MemorySink, RecordSink};
