//! SnapVX Clone - storage array snapshot orchestration
//!
//! Clones a database by snapshotting its data storage group on a VMAX
//! array and linking the snapshot to the storage group of another
//! database. SRDF/Metro targets are suspended around the link and
//! re-established once the copy is complete.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Workflow (action dispatch)               │
//! ├───────────────────────┬──────────────────────┬───────────────┤
//! │  Environment Builder  │   Snapshot Engine    │   Presenter   │
//! │  ┌─────────────────┐  │  ┌────────────────┐  │  (text/json)  │
//! │  │ Topology        │  │  │ Session states │  │               │
//! │  │ Resolver        │  │  │ Poll policies  │  │               │
//! │  └─────────────────┘  │  └────────────────┘  │               │
//! │        Mirror Coordinator (SRDF/Metro)       │               │
//! ├──────────────────────────────────────────────┴───────────────┤
//! │              ArrayGateway (SYMCLI / scripted)                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`workflow`]: Action dispatch
//! - [`environment`]: Source/target resolution and validation
//! - [`topology`]: Array and storage group discovery
//! - [`snapshot`]: Snapshot lifecycle
//! - [`mirror`]: SRDF/Metro coordination
//! - [`gateway`]: Array tool execution and output parsing
//! - [`presenter`]: Output rendering
//! - [`domain`]: Core domain types and the gateway port
//! - [`config`]: Configuration file
//! - [`error`]: Error types and exit codes

pub mod config;
pub mod domain;
pub mod environment;
pub mod error;
pub mod gateway;
pub mod mirror;
pub mod presenter;
pub mod snapshot;
pub mod topology;
pub mod workflow;

// Re-export commonly used types
pub use config::SnapvxConfig;

pub use domain::ports::{
    ArrayCommand, ArrayGateway, ArrayGatewayRef, ArrayId, CloneEnvironment, MirrorGroupId,
    MirrorRole, Replication, Snapshot, TargetGroup, VolumeGroup,
};

pub use environment::{EnvironmentBuilder, EnvironmentRequest, Overrides};

pub use error::{Error, ErrorClass, Result};

pub use gateway::{ScriptedGateway, ScriptedResponse, SymcliGateway};

pub use presenter::{OutputFormat, Presenter};

pub use snapshot::{PollPolicy, SessionState, SnapshotEngine};

pub use workflow::{Action, Invocation, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
