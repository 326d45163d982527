use rust_decimal::Decimal;
use thiserror::Error;

/// Error taxonomy for the analysis/simulation pipeline.
///
/// Workers recover locally from every variant except `InvariantViolation`,
/// which pauses only the simulation that raised it, and `ConfigurationError`,
/// which aborts startup.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient I/O failure after {attempts} attempts: {reason}")]
    TransientIo { attempts: u32, reason: String },

    #[error("validation failed for {field}: {reason}")]
    ValidationError { field: String, reason: String },

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("{component} exceeded its {budget_ms}ms budget")]
    Timeout { component: String, budget_ms: u64 },

    #[error("invariant violated in simulation {sim_id}: {reason}")]
    InvariantViolation { sim_id: String, reason: String },

    #[error("configuration error: {reason}")]
    ConfigurationError { reason: String },
}

impl EngineError {
    pub fn insufficient_data(reason: impl Into<String>) -> Self {
        EngineError::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn timeout(component: impl Into<String>, budget_ms: u64) -> Self {
        EngineError::Timeout {
            component: component.into(),
            budget_ms,
        }
    }
}

/// Storage-layer error, kept distinct from `EngineError` so repository
/// traits can be implemented without pulling in the whole taxonomy.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O failure: {0}")]
    Io(String),

    #[error("record not found")]
    NotFound,

    #[error("corrupt record skipped: {0}")]
    Corrupt(String),
}

/// Raised when a simulation's capital-accounting invariant does not hold.
/// Carrying the offending numbers lets the caller log a precise diagnostic
/// before pausing the simulation.
#[derive(Debug, Error)]
#[error("capital mismatch for sim {sim_id}: ledger {ledger} != expected {expected}")]
pub struct CapitalMismatch {
    pub sim_id: String,
    pub ledger: Decimal,
    pub expected: Decimal,
}
