//! Common types, traits, and error definitions for rust_replanning
//!
//! This module provides the foundational building blocks shared by the
//! reference environment, the global planners and the replanning core.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
