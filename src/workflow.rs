//! Action Dispatch
//!
//! One invocation runs one action: the environment is built (and validated)
//! first, then handed to the snapshot engine or the presenter.

use crate::config::SnapvxConfig;
use crate::domain::ports::ArrayGatewayRef;
use crate::environment::{EnvironmentBuilder, EnvironmentRequest};
use crate::error::Result;
use crate::mirror::MirrorCoordinator;
use crate::presenter::{OutputFormat, Presenter};
use crate::snapshot::SnapshotEngine;
use crate::topology::TopologyResolver;
use clap::ValueEnum;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Operations offered on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    /// Print the resolved environment
    Show,
    /// List managed snapshots of the source
    List,
    /// Snapshot the source storage group
    Create,
    /// Link a snapshot to the target storage group
    Link,
    /// Detach the snapshot linked to the target
    Unlink,
    /// Restore the source from a snapshot
    Restore,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Show => "show",
            Action::List => "list",
            Action::Create => "create",
            Action::Link => "link",
            Action::Unlink => "unlink",
            Action::Restore => "restore",
        };
        write!(f, "{}", name)
    }
}

/// Fully parsed command line
#[derive(Debug, Clone)]
pub struct Invocation {
    pub action: Action,
    pub request: EnvironmentRequest,
    /// Snapshot time-to-live for `create`
    pub ttl_days: u32,
    /// Request a full copy on `link`
    pub full_copy: bool,
    pub format: OutputFormat,
}

pub struct Workflow {
    builder: EnvironmentBuilder,
    engine: SnapshotEngine,
}

impl Workflow {
    pub fn new(gateway: ArrayGatewayRef, config: &SnapvxConfig) -> Self {
        let query_interval = Duration::from_secs(config.polling.mirror_query_interval_secs);

        let resolver = TopologyResolver::new(
            gateway.clone(),
            config.array.models.clone(),
            config.matching.clone(),
        );
        let builder = EnvironmentBuilder::new(
            resolver,
            MirrorCoordinator::new(gateway.clone(), query_interval),
        );
        let engine = SnapshotEngine::new(
            gateway.clone(),
            MirrorCoordinator::new(gateway, query_interval),
            config.snapshot.prefix.clone(),
            config.polling.clone(),
        );

        Self { builder, engine }
    }

    /// Run the invocation and return what should be printed on stdout
    pub async fn run(&self, invocation: &Invocation) -> Result<String> {
        info!(
            "Action {} for {} (target {})",
            invocation.action,
            invocation.request.source_db,
            invocation.request.target_db.as_deref().unwrap_or("-")
        );

        let env = self.builder.build(&invocation.request).await?;
        let presenter = Presenter::new(invocation.format);

        match invocation.action {
            Action::Show => presenter.environment(&env),
            Action::List => {
                let snapshots = self.engine.list(&env).await?;
                presenter.snapshots(&snapshots)
            }
            Action::Create => {
                let outcome = self.engine.create(&env, invocation.ttl_days).await?;
                presenter.snapshots(&[outcome.snapshot])
            }
            Action::Link => {
                self.engine.link(&env, invocation.full_copy).await?;
                Ok(String::new())
            }
            Action::Unlink => {
                let target = env.require_target("unlink")?;
                self.engine.unlink(env.array_id, &target.group.name).await?;
                Ok(String::new())
            }
            Action::Restore => {
                self.engine.restore(&env).await?;
                Ok(String::new())
            }
        }
    }
}
