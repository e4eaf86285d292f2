//! Clone Environment Builder
//!
//! Turns the user's database names into a validated [`CloneEnvironment`].
//! The target is resolved first so that the source is looked up on the
//! same array. Only read-only commands are issued here.

use crate::domain::ports::{
    ArrayId, CloneEnvironment, MirrorRole, Replication, TargetGroup, VolumeGroup,
};
use crate::error::{Error, Result};
use crate::mirror::{MirrorCoordinator, MirrorResolution};
use crate::topology::TopologyResolver;
use tracing::{debug, info};

/// Explicit values that replace discovered ones
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Source storage group name
    pub source_group: Option<String>,
    /// Target storage group name
    pub target_group: Option<String>,
    /// Treat source and target as SRDF/Metro regardless of discovery
    pub force_metro: bool,
}

/// What the user asked for
#[derive(Debug, Clone, Default)]
pub struct EnvironmentRequest {
    pub source_db: String,
    pub target_db: Option<String>,
    pub array: Option<ArrayId>,
    pub snapshot_name: Option<String>,
    pub overrides: Overrides,
}

pub struct EnvironmentBuilder {
    resolver: TopologyResolver,
    mirror: MirrorCoordinator,
}

impl EnvironmentBuilder {
    pub fn new(resolver: TopologyResolver, mirror: MirrorCoordinator) -> Self {
        Self { resolver, mirror }
    }

    pub async fn build(&self, request: &EnvironmentRequest) -> Result<CloneEnvironment> {
        let arrays = self.resolver.list_arrays(request.array).await?;

        let target = match &request.target_db {
            Some(target_db) => Some(self.resolver.resolve_volume_group(&arrays, target_db).await?),
            None => None,
        };

        // the source must live on the target's array
        let source_arrays = match &target {
            Some(group) => vec![group.array_id],
            None => arrays,
        };
        let source = self
            .resolver
            .resolve_volume_group(&source_arrays, &request.source_db)
            .await?;

        if let Some(target) = &target {
            if source.device_count != target.device_count {
                return Err(Error::DeviceCountMismatch {
                    source_group: source.name.clone(),
                    source_count: source.device_count,
                    target_group: target.name.clone(),
                    target_count: target.device_count,
                });
            }
        }

        let array_id = source.array_id;
        let target = match target {
            Some(group) => Some(self.target_group(group).await?),
            None => None,
        };

        let env = CloneEnvironment {
            array_id,
            source_db: request.source_db.clone(),
            source,
            target_db: request.target_db.clone(),
            target,
            snapshot_name: request.snapshot_name.clone(),
        };

        let env = self.apply_overrides(env, &request.overrides).await?;
        debug!("environment: {:?}", env);
        Ok(env)
    }

    async fn target_group(&self, group: VolumeGroup) -> Result<TargetGroup> {
        if !group.is_mirrored() {
            return Ok(TargetGroup {
                group,
                mirror: MirrorRole::Standalone,
            });
        }

        match self
            .mirror
            .resolve_mirror_group(group.array_id, &group.devices)
            .await?
        {
            MirrorResolution::Resolved(id) => Ok(TargetGroup {
                group,
                mirror: MirrorRole::MirroredPeer(id),
            }),
            MirrorResolution::Unresolved { candidates } => Err(Error::AmbiguousMirrorGroup {
                group: group.name,
                candidates: candidates
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            }),
        }
    }

    /// Overridden values are taken as given and not re-validated
    async fn apply_overrides(
        &self,
        mut env: CloneEnvironment,
        overrides: &Overrides,
    ) -> Result<CloneEnvironment> {
        if let Some(name) = &overrides.source_group {
            info!("Using source storage group {}", name);
            env.source.name = name.clone();
        }

        if let Some(name) = &overrides.target_group {
            info!("Using target storage group {}", name);
            match env.target.as_mut() {
                Some(target) => target.group.name = name.clone(),
                None => {
                    env.target = Some(TargetGroup {
                        group: VolumeGroup::unresolved(env.array_id, name.clone()),
                        mirror: MirrorRole::Standalone,
                    })
                }
            }
        }

        if overrides.force_metro {
            info!("Treating source and target as SRDF/Metro");
            env.source.replication = Replication::Rdf;
            if let Some(target) = env.target.take() {
                let mut group = target.group;
                group.replication = Replication::Rdf;
                let target = match target.mirror {
                    MirrorRole::MirroredPeer(_) => TargetGroup { group, ..target },
                    MirrorRole::Standalone => self.target_group(group).await?,
                };
                env.target = Some(target);
            }
        }

        Ok(env)
    }
}
