//! Environment Module
//!
//! Builds the validated source/target pairing every action works on.

pub mod builder;

pub use builder::*;
