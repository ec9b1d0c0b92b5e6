//! Domain layer - Core data model and port definitions
//!
//! This module defines the table model persisted in a dump and the traits
//! (ports) that table-store adapters implement.

pub mod model;
pub mod ports;

pub use model::*;
pub use ports::*;
