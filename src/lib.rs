//! rust_replanning - reactive motion replanning among moving obstacles
//!
//! This crate provides the DRGBT controller together with the pieces it is
//! composed of: a configuration-space abstraction, a reference environment
//! with moving spherical obstacles, and RRT-family global planners used for
//! replanning.

// Core modules
pub mod common;
pub mod environment;

// Algorithm modules
pub mod path_planning;
pub mod dynamic_planning;

// Re-export common types for convenience
pub use common::{Configuration, Clearance, NearestPoint, MotionStatus, RealizedPath};
pub use common::{ConfigurationSpace, GlobalPlanner, PlannerFactory};
pub use common::{RoboticsError, RoboticsResult};
pub use dynamic_planning::{DrgbtConfig, DrgbtPlanner, RealTimeScheduling, Termination};
