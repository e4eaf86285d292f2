//! Orchestrator configuration
//!
//! Loaded from an optional YAML file. Every section has defaults matching a
//! standard SYMCLI installation, so a missing file is not an error.

use crate::error::{Error, Result};
use crate::snapshot::PollPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Top-level Configuration
// =============================================================================

/// Complete orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapvxConfig {
    pub array: ArrayConfig,
    pub matching: MatchingConfig,
    pub snapshot: SnapshotConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

impl SnapvxConfig {
    /// Load configuration from a YAML file, falling back to defaults if the
    /// file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check that patterns compile and polling values are usable
    pub fn validate(&self) -> Result<()> {
        Regex::new(&self.matching.data_suffix)?;
        Regex::new(&self.matching.exclude)?;

        if self.array.models.is_empty() {
            return Err(Error::Configuration(
                "array.models must list at least one array model".into(),
            ));
        }
        if self.snapshot.prefix.is_empty() {
            return Err(Error::Configuration("snapshot.prefix must not be empty".into()));
        }
        if self.polling.link_nocopy_count == 0 {
            return Err(Error::Configuration(
                "polling.link_nocopy_count must be at least 1".into(),
            ));
        }

        if self.polling.restore_count == Some(0) {
            return Err(Error::Configuration(
                "polling.restore_count must be at least 1 when set".into(),
            ));
        }

        let intervals = [
            ("link_nocopy_interval_secs", self.polling.link_nocopy_interval_secs),
            ("link_copy_interval_secs", self.polling.link_copy_interval_secs),
            ("restore_interval_secs", self.polling.restore_interval_secs),
            ("mirror_query_interval_secs", self.polling.mirror_query_interval_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::Configuration(format!("polling.{} must be positive", name)));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Array Tool
// =============================================================================

/// How the array control-plane CLI is invoked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    /// Directory holding the SYMCLI binaries
    pub bin_dir: PathBuf,
    /// Privilege elevation prefix (empty to run directly)
    pub elevation: Vec<String>,
    /// Array models managed by this tool
    pub models: Vec<String>,
    /// Environment applied to every spawned command
    pub env: BTreeMap<String, String>,
    /// Log mutating commands instead of running them
    pub dry_run: bool,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from("/usr/symcli/bin"),
            elevation: vec!["sudo".to_string()],
            models: vec!["VMAX200K".to_string()],
            env: BTreeMap::new(),
            dry_run: false,
        }
    }
}

// =============================================================================
// Storage Group Matching
// =============================================================================

/// Rules mapping a database name to its data storage group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Suffix appended to the escaped database name
    pub data_suffix: String,
    /// Storage groups matching this are never selected
    pub exclude: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            data_suffix: r"_(D\d+|DATA)$".to_string(),
            exclude: r"^[pb]porazal_.*|_GK".to_string(),
        }
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// Snapshot naming and lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Prefix marking snapshots managed by this tool
    pub prefix: String,
    /// Default time-to-live in days
    pub default_ttl_days: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            prefix: "SN_".to_string(),
            default_ttl_days: 100,
        }
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Wait intervals handed to the array tool's `-i`/`-c` options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub link_nocopy_interval_secs: u64,
    pub link_nocopy_count: u32,
    pub link_copy_interval_secs: u64,
    pub restore_interval_secs: u64,
    /// Give up restore verification after this many checks, wait forever if unset
    pub restore_count: Option<u32>,
    /// Interval suggested for watching RDF resynchronization
    pub mirror_query_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            link_nocopy_interval_secs: 10,
            link_nocopy_count: 6,
            link_copy_interval_secs: 600,
            restore_interval_secs: 300,
            restore_count: None,
            mirror_query_interval_secs: 5,
        }
    }
}

impl PollingConfig {
    /// Policy for link (and mirror) convergence
    pub fn link_policy(&self, full_copy: bool) -> PollPolicy {
        if full_copy {
            PollPolicy::Unbounded {
                interval: Duration::from_secs(self.link_copy_interval_secs),
            }
        } else {
            PollPolicy::Bounded {
                interval: Duration::from_secs(self.link_nocopy_interval_secs),
                count: self.link_nocopy_count,
            }
        }
    }

    /// Policy for restore convergence
    pub fn restore_policy(&self) -> PollPolicy {
        let interval = Duration::from_secs(self.restore_interval_secs);
        match self.restore_count {
            Some(count) => PollPolicy::Bounded { interval, count },
            None => PollPolicy::Unbounded { interval },
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Trace file and console settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving one trace file per run
    pub dir: PathBuf,
    /// Console level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/var/log/dba"),
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = SnapvxConfig::default();

        assert_eq!(config.array.bin_dir, PathBuf::from("/usr/symcli/bin"));
        assert_eq!(config.array.elevation, vec!["sudo".to_string()]);
        assert_eq!(config.snapshot.prefix, "SN_");
        assert_eq!(config.snapshot.default_ttl_days, 100);
        assert_eq!(config.polling.link_nocopy_count, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SnapvxConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.array.models, vec!["VMAX200K".to_string()]);
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "array:\n  models: [VMAX200K, PowerMax_2000]\n  env:\n    SYMCLI_CONNECT: SYMAPI_SERVER\npolling:\n  link_nocopy_count: 3\n"
        )
        .unwrap();

        let config = SnapvxConfig::load(file.path()).unwrap();
        assert_eq!(config.array.models.len(), 2);
        assert_eq!(
            config.array.env.get("SYMCLI_CONNECT").map(String::as_str),
            Some("SYMAPI_SERVER")
        );
        assert_eq!(config.polling.link_nocopy_count, 3);
        // untouched sections keep defaults
        assert_eq!(config.polling.link_copy_interval_secs, 600);
        assert_eq!(config.snapshot.prefix, "SN_");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SnapvxConfig::default();
        config.matching.exclude = "([unclosed".into();
        assert_matches!(config.validate(), Err(Error::Pattern(_)));

        let mut config = SnapvxConfig::default();
        config.polling.link_nocopy_count = 0;
        assert_matches!(config.validate(), Err(Error::Configuration(_)));

        let mut config = SnapvxConfig::default();
        config.polling.restore_interval_secs = 0;
        assert_matches!(config.validate(), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_poll_policies() {
        let polling = PollingConfig::default();

        assert_eq!(
            polling.link_policy(false),
            PollPolicy::Bounded {
                interval: Duration::from_secs(10),
                count: 6
            }
        );
        assert_eq!(
            polling.link_policy(true),
            PollPolicy::Unbounded {
                interval: Duration::from_secs(600)
            }
        );
        assert_eq!(
            polling.restore_policy(),
            PollPolicy::Unbounded {
                interval: Duration::from_secs(300)
            }
        );
    }
}
