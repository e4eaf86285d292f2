//! Error types for the SnapVX clone orchestrator
//!
//! Every failure surfaces to the top-level dispatch, which reports it and
//! exits with the status returned by [`Error::exit_code`].

use thiserror::Error;

/// Unified error type for the orchestrator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // =========================================================================
    // Topology Errors
    // =========================================================================
    #[error("Array {array} not found, discovered arrays: {available}")]
    InvalidArray { array: String, available: String },

    #[error("Storage group for database {name} not found")]
    VolumeGroupNotFound { name: String },

    #[error(
        "Source {source_group} ({source_count} devices) and target {target_group} \
         ({target_count} devices) differ in number of devices"
    )]
    DeviceCountMismatch {
        source_group: String,
        source_count: usize,
        target_group: String,
        target_count: usize,
    },

    #[error("Cannot clone to {group}: expected exactly one RDF group, found [{candidates}]")]
    AmbiguousMirrorGroup { group: String, candidates: String },

    #[error("Action {action} requires a target storage group")]
    MissingTarget { action: String },

    // =========================================================================
    // External Command Errors
    // =========================================================================
    #[error("Command failed with exit code {exit_code}: {command}\n{output}")]
    ExternalCommand {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("Failed to execute {command}: {reason}")]
    CommandSpawn { command: String, reason: String },

    #[error("Malformed output from {command}: {reason}")]
    MalformedOutput { command: String, reason: String },

    // =========================================================================
    // Snapshot Errors
    // =========================================================================
    #[error("No snapshots found on storage group {group}")]
    NoSnapshots { group: String },

    #[error(
        "Devices of {target} did not reach the LINKED/COPIED state for snapshot \
         {snapshot} within {attempts} checks"
    )]
    LinkTimeout {
        target: String,
        snapshot: String,
        attempts: u32,
    },

    #[error("Restore of {group} from snapshot {snapshot} not verified within {attempts} checks")]
    RestoreTimeout {
        group: String,
        snapshot: String,
        attempts: u32,
    },

    #[error("RDF group {group} did not reach ActiveBias within {attempts} checks")]
    MirrorSyncTimeout { group: u32, attempts: u32 },

    #[error("Restore into SRDF/Metro storage group {target} is not supported")]
    UnsupportedMetroRestore { target: String },

    #[error("Storage group {target} is linked inconsistently: multiple {field} values [{values}]")]
    InconsistentLinkState {
        target: String,
        field: String,
        values: String,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for reporting and exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Detected before any mutating command was issued
    Preflight,
    /// The array tool failed or produced unusable output
    External,
    /// A bounded wait ran out before the array converged
    Convergence,
    /// Operation refused for this configuration
    Unsupported,
    /// Bug or misconfiguration on our side
    Internal,
}

impl Error {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidArray { .. }
            | Error::VolumeGroupNotFound { .. }
            | Error::DeviceCountMismatch { .. }
            | Error::AmbiguousMirrorGroup { .. }
            | Error::MissingTarget { .. }
            | Error::NoSnapshots { .. }
            | Error::InconsistentLinkState { .. } => ErrorClass::Preflight,

            Error::ExternalCommand { .. }
            | Error::CommandSpawn { .. }
            | Error::MalformedOutput { .. } => ErrorClass::External,

            Error::LinkTimeout { .. }
            | Error::RestoreTimeout { .. }
            | Error::MirrorSyncTimeout { .. } => ErrorClass::Convergence,

            Error::UnsupportedMetroRestore { .. } => ErrorClass::Unsupported,

            _ => ErrorClass::Internal,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self.class() {
            ErrorClass::Preflight => 2,
            ErrorClass::External => 3,
            ErrorClass::Convergence => 4,
            ErrorClass::Unsupported => 5,
            ErrorClass::Internal => 1,
        }
    }

    /// True when the array was not modified before the failure
    pub fn is_preflight(&self) -> bool {
        matches!(self.class(), ErrorClass::Preflight | ErrorClass::Unsupported)
    }

    /// Message for the operator on stderr
    pub fn report(&self) -> String {
        if self.is_preflight() {
            format!("{}\nNo changes were made to the array", self)
        } else {
            self.to_string()
        }
    }
}

/// Result type alias for the orchestrator
pub type Result<T> = std::result::Result<T, Error>;
