use thiserror::Error;

/// Failures reported by the simulator collaborator.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("could not connect to simulator: {0}")]
    Connection(String),
    #[error("unknown {kind} '{id}'")]
    UnknownObject { kind: &'static str, id: String },
    #[error("query '{what}' failed for '{id}': {reason}")]
    Query {
        what: &'static str,
        id: String,
        reason: String,
    },
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl SimError {
    pub fn unknown(kind: &'static str, id: &str) -> Self {
        SimError::UnknownObject {
            kind,
            id: id.to_string(),
        }
    }
}

/// A phase program that cannot be built.
#[derive(Debug, Error, PartialEq)]
pub enum ProgramError {
    #[error("program has no phases")]
    Empty,
    #[error("phase {index} has non-positive duration {duration}")]
    BadDuration { index: usize, duration: f64 },
    #[error("phase {index} has unknown signal symbol '{symbol}'")]
    UnknownSymbol { index: usize, symbol: char },
    #[error("phase {index} state has {found} signals but {expected} lanes are controlled")]
    StateLength {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("phase index {0} out of range")]
    PhaseOutOfRange(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("amqp error: {0}")]
    Amqp(#[from] amiquip::Error),
    #[error("listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reasons an experiment run cannot start or has to stop early.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sim(#[from] SimError),
}
