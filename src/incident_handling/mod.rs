pub mod detector;
pub mod responder;

pub use detector::{classify, EdgeObservation, Incident, IncidentDetector, IncidentKind};
pub use responder::{reroute_around, respond, RerouteOutcome, ResponseReport, ResponseStrategy};
