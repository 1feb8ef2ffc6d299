//! Error types for rust_replanning

use thiserror::Error;

/// Main error type for the replanning controller
///
/// Only fatal conditions are represented here. Recoverable conditions
/// (failed replanning, a trapped agent) are tracked as planner state and
/// surface through the termination check instead.
#[derive(Debug, Error)]
pub enum RoboticsError {
    /// Start configuration is not valid
    #[error("Invalid start: {0}")]
    InvalidStart(String),
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Requested global planner does not exist
    #[error("Unknown planner: {0}")]
    UnknownPlanner(String),
    /// Global search could not provide a path
    #[error("Replanning unavailable: {0}")]
    ReplanUnavailable(String),
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Result type alias for robotics operations
pub type RoboticsResult<T> = Result<T, RoboticsError>;
