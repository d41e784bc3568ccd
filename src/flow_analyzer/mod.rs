pub mod history;
pub mod telemetry;

pub use history::EdgeHistory;
pub use telemetry::{aggregate, road_id_of, QueueSnapshot};
