//! Remote mirror (SRDF/Metro) handling for link targets.

pub mod coordinator;

pub use coordinator::*;
