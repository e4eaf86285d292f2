//! Topology Module
//!
//! Array discovery and database-to-storage-group resolution.

pub mod matcher;
pub mod resolver;

pub use matcher::*;
pub use resolver::*;
