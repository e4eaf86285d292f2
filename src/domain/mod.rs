//! Domain layer - Core types and port definitions
//!
//! This module defines the clone environment model and the gateway trait
//! that adapters implement.

pub mod ports;

pub use ports::*;
