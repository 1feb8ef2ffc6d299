//! Dynamic (reactive) motion planning among moving obstacles

pub mod config;
pub mod drgbt;
pub mod gbur;
pub mod horizon;
pub mod horizon_state;
pub mod motion;
pub mod next_state;
pub mod replanning;
pub mod telemetry;
pub mod trace;

pub use config::*;
pub use drgbt::*;
pub use horizon::*;
pub use horizon_state::*;
pub use replanning::*;
pub use telemetry::*;
pub use trace::*;
