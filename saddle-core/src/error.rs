//! Solver error types.

use thiserror::Error;

/// Errors surfaced across module boundaries.
///
/// Numeric trouble inside a subproblem is converted into
/// `Direction::status` so the driver keeps control; this enum covers
/// construction-time configuration problems and failures the driver cannot
/// recover from.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Unknown strategy name or incompatible option combination
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Linear algebra failure that survived every recovery attempt
    #[error("numeric error: {0}")]
    Numeric(String),

    /// A model evaluation returned NaN at the initial point
    #[error("evaluation error: {0}")]
    Evaluation(String),
}
