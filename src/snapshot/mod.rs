//! Snapshot Module
//!
//! SnapVX snapshot lifecycle: listing, creation, linking to a target
//! storage group, unlinking and restore.

pub mod engine;
pub mod policy;
pub mod session;

pub use engine::*;
pub use policy::*;
pub use session::*;
