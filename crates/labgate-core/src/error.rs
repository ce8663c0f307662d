//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    /// Malformed stage graph. Fatal: raised before any stage runs.
    #[error("CONFIG/{0}")]
    Config(String),

    /// Evaluating an applicability predicate failed.
    #[error("APPLICABILITY/{0}")]
    Applicability(String),

    #[error("ACTION/{0}")]
    ActionFailure(String),

    #[error("TIMEOUT/{stage} exceeded {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    #[error("ARTIFACT/{0}")]
    Artifact(String),

    #[error("LEDGER/verdict for '{0}' already recorded")]
    VerdictAlreadyRecorded(String),

    #[error("IO/{0}")]
    Io(#[from] std::io::Error),

    #[error("PARSE/{0}")]
    Parse(String),
}

impl From<serde_yaml::Error> for GateError {
    fn from(e: serde_yaml::Error) -> Self {
        GateError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
