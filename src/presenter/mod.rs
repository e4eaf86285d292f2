//! Presenter Module
//!
//! Text and JSON rendering of command results.

pub mod output;

pub use output::*;
