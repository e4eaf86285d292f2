//! Domain Ports - Core types and the array gateway boundary
//!
//! The snapshot workflow only ever talks to the storage array through
//! [`ArrayGateway`]. Adapters implement it to run the real SYMCLI or to
//! replay scripted responses in tests.

use crate::error::{Error, Result};
use crate::gateway::XmlDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Array Identity
// =============================================================================

/// Short identifier of a storage array (last three digits of its serial)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayId(u16);

impl ArrayId {
    /// Normalize a full serial (`000297800756`) or short id (`756`, `67`)
    pub fn parse(raw: &str) -> Result<Self> {
        let digits = raw.trim();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Configuration(format!(
                "SymmID must be numeric, got '{}'",
                raw
            )));
        }

        let tail = &digits[digits.len().saturating_sub(3)..];
        tail.parse::<u16>()
            .map(ArrayId)
            .map_err(|e| Error::Configuration(format!("invalid SymmID '{}': {}", raw, e)))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Volume Groups
// =============================================================================

/// Replication configuration of a storage group's devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Replication {
    Local,
    /// At least one device is an RDF (remote mirror) device
    Rdf,
}

impl fmt::Display for Replication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Replication::Local => write!(f, "local"),
            Replication::Rdf => write!(f, "rdf"),
        }
    }
}

/// A storage group as seen on the array at lookup time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeGroup {
    /// Array holding the group
    pub array_id: ArrayId,
    /// Storage group name
    pub name: String,
    /// Device names, sorted and unique
    pub devices: Vec<String>,
    /// Number of devices reported by the array
    pub device_count: usize,
    /// Replication configuration
    pub replication: Replication,
}

impl VolumeGroup {
    /// Build a group, normalizing the device list
    pub fn new(
        array_id: ArrayId,
        name: impl Into<String>,
        mut devices: Vec<String>,
        device_count: usize,
        replication: Replication,
    ) -> Self {
        devices.sort();
        devices.dedup();
        Self {
            array_id,
            name: name.into(),
            devices,
            device_count,
            replication,
        }
    }

    /// A group known only by name (explicit override, nothing discovered)
    pub fn unresolved(array_id: ArrayId, name: impl Into<String>) -> Self {
        Self::new(array_id, name, Vec::new(), 0, Replication::Local)
    }

    pub fn is_mirrored(&self) -> bool {
        self.replication == Replication::Rdf
    }
}

// =============================================================================
// Remote Mirror
// =============================================================================

/// RDF group number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorGroupId(pub u32);

impl fmt::Display for MirrorGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a link target in remote replication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorRole {
    Standalone,
    /// One side of an SRDF/Metro pair owned by the given RDF group
    MirroredPeer(MirrorGroupId),
}

impl MirrorRole {
    pub fn group(&self) -> Option<MirrorGroupId> {
        match self {
            MirrorRole::Standalone => None,
            MirrorRole::MirroredPeer(group) => Some(*group),
        }
    }
}

/// Storage group receiving linked snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub group: VolumeGroup,
    pub mirror: MirrorRole,
}

// =============================================================================
// Clone Environment
// =============================================================================

/// Everything one invocation needs to know about source and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneEnvironment {
    /// Working array
    pub array_id: ArrayId,
    /// Source database name
    pub source_db: String,
    /// Source storage group
    pub source: VolumeGroup,
    /// Target database name
    pub target_db: Option<String>,
    /// Target storage group
    pub target: Option<TargetGroup>,
    /// Snapshot chosen by the user or generated on create
    pub snapshot_name: Option<String>,
}

impl CloneEnvironment {
    /// Target group, or an error naming the action that needs it
    pub fn require_target(&self, action: &str) -> Result<&TargetGroup> {
        self.target.as_ref().ok_or_else(|| Error::MissingTarget {
            action: action.to_string(),
        })
    }

    /// Copy of this environment with a snapshot name assigned
    pub fn with_snapshot_name(&self, name: impl Into<String>) -> Self {
        Self {
            snapshot_name: Some(name.into()),
            ..self.clone()
        }
    }

    /// True if the target takes part in remote replication
    pub fn target_is_mirrored(&self) -> bool {
        self.target
            .as_ref()
            .map(|t| t.group.is_mirrored() || t.mirror.group().is_some())
            .unwrap_or(false)
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// One logical SnapVX snapshot of a storage group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "snapshot_name")]
    pub name: String,
    /// ISO-8601 timestamp (`YYYY-MM-DDTHH:MM:SS`)
    #[serde(rename = "snapshot_timestamp")]
    pub timestamp: String,
    /// Link summary as reported by the array
    #[serde(rename = "snapshot_link")]
    pub link: String,
    #[serde(skip_serializing, default)]
    pub linked: bool,
}

// =============================================================================
// Array Commands
// =============================================================================

/// How command output should be rendered and returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    /// Ask the tool for XML and parse it
    Structured,
}

/// A command line for the array control plane (or an auxiliary tool)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayCommand {
    program: String,
    args: Vec<String>,
    mutating: bool,
    waiting: bool,
}

impl ArrayCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mutating: false,
            waiting: false,
        }
    }

    pub fn symcfg() -> Self {
        Self::new("symcfg")
    }

    pub fn symsg() -> Self {
        Self::new("symsg")
    }

    pub fn symsnapvx() -> Self {
        Self::new("symsnapvx")
    }

    pub fn symrdf() -> Self {
        Self::new("symrdf")
    }

    /// Append `-sid <array>`
    pub fn sid(self, array: ArrayId) -> Self {
        self.arg("-sid").arg(array.to_string())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Mark the command as changing array state
    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    /// Mark the command as waiting for a state reached by a mutation
    pub fn waiting(mut self) -> Self {
        self.waiting = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Commands addressed to SYMCLI need the privileged binary path
    pub fn is_array_tool(&self) -> bool {
        self.program.starts_with("sym")
    }

    /// True if every token appears among program and arguments
    pub fn contains_all(&self, tokens: &[&str]) -> bool {
        tokens
            .iter()
            .all(|t| self.program == *t || self.args.iter().any(|a| a == t))
    }
}

impl fmt::Display for ArrayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of one gateway invocation
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Process exit status
    pub exit_code: i32,
    /// Combined stdout and stderr
    pub text: String,
    /// Parsed document for structured calls; empty otherwise
    pub document: XmlDocument,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// =============================================================================
// Array Gateway Port
// =============================================================================

/// Port for running commands against the array control plane
#[async_trait]
pub trait ArrayGateway: Send + Sync {
    /// Run a command.
    ///
    /// With `must_succeed`, a non-zero exit becomes [`Error::ExternalCommand`].
    /// Without it the exit code is returned for the caller to interpret.
    async fn run(
        &self,
        command: &ArrayCommand,
        mode: OutputMode,
        must_succeed: bool,
    ) -> Result<CommandOutput>;
}

pub type ArrayGatewayRef = Arc<dyn ArrayGateway>;
