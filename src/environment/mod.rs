//! Reference environments implementing `ConfigurationSpace`

pub mod moving_obstacles;

pub use moving_obstacles::*;
