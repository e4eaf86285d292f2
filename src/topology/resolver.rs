//! Topology Resolver
//!
//! Discovers the managed arrays and maps a logical database name to its
//! data storage group, including device membership and RDF participation.
//! Nothing is cached: every invocation re-reads the array state.

use super::matcher::GroupMatcher;
use crate::config::MatchingConfig;
use crate::domain::ports::{
    ArrayCommand, ArrayGatewayRef, ArrayId, OutputMode, Replication, VolumeGroup,
};
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Resolves arrays and storage groups through the array gateway
pub struct TopologyResolver {
    gateway: ArrayGatewayRef,
    models: Vec<String>,
    matching: MatchingConfig,
}

impl TopologyResolver {
    pub fn new(gateway: ArrayGatewayRef, models: Vec<String>, matching: MatchingConfig) -> Self {
        Self {
            gateway,
            models,
            matching,
        }
    }

    /// Arrays of a managed model, optionally narrowed to `filter`
    pub async fn list_arrays(&self, filter: Option<ArrayId>) -> Result<Vec<ArrayId>> {
        let output = self
            .gateway
            .run(&ArrayCommand::symcfg().arg("list"), OutputMode::Structured, true)
            .await?;

        let mut arrays = Vec::new();
        for info in output.document.find_all("Symmetrix/Symm_Info") {
            let (Some(symid), Some(model)) = (info.child_text("symid"), info.child_text("model"))
            else {
                warn!("Skipping array entry without symid/model");
                continue;
            };

            if !self.models.iter().any(|m| m == model) {
                debug!("Skipping array {} of model {}", symid, model);
                continue;
            }

            let id = ArrayId::parse(symid)?;
            if !arrays.contains(&id) {
                arrays.push(id);
            }
        }

        debug!("SymmId arrays: {:?}", arrays);

        match filter {
            None => Ok(arrays),
            Some(id) if arrays.contains(&id) => Ok(vec![id]),
            Some(id) => Err(Error::InvalidArray {
                array: id.to_string(),
                available: arrays
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            }),
        }
    }

    /// Find the data storage group of `logical_name` on the first array
    /// (in the given order) that has one
    pub async fn resolve_volume_group(
        &self,
        arrays: &[ArrayId],
        logical_name: &str,
    ) -> Result<VolumeGroup> {
        let matcher = GroupMatcher::new(&self.matching, logical_name)?;
        debug!("dbname: {}", logical_name);
        debug!("storage group to match: {}", matcher.pattern());

        let mut found: Option<VolumeGroup> = None;

        for &array in arrays {
            let output = self
                .gateway
                .run(
                    &ArrayCommand::symsg().sid(array).arg("list"),
                    OutputMode::Structured,
                    true,
                )
                .await?;

            for info in output.document.find_all("SG/SG_Info") {
                let Some(name) = info.child_text("name") else {
                    continue;
                };
                if !matcher.matches(name) {
                    continue;
                }

                if let Some(first) = &found {
                    if first.name == name {
                        warn!(
                            "Multiple SymID for storage group {} found, using array {}",
                            name, first.array_id
                        );
                    } else {
                        warn!(
                            "Storage group {} on array {} also matches {}, using {}",
                            name, array, logical_name, first.name
                        );
                    }
                    continue;
                }

                let (devices, replication) = self.show_volume_group(array, name).await?;
                let device_count = info
                    .child_text("num_devs")
                    .and_then(|n| n.trim().parse().ok())
                    .unwrap_or(devices.len());
                found = Some(VolumeGroup::new(
                    array,
                    name,
                    devices,
                    device_count,
                    replication,
                ));
            }
        }

        debug!("symsg list: {:?}", found);

        found.ok_or_else(|| Error::VolumeGroupNotFound {
            name: logical_name.to_string(),
        })
    }

    /// Device names and replication of a named storage group
    pub async fn show_volume_group(
        &self,
        array: ArrayId,
        name: &str,
    ) -> Result<(Vec<String>, Replication)> {
        let output = self
            .gateway
            .run(
                &ArrayCommand::symsg().sid(array).args(["show", name]),
                OutputMode::Structured,
                true,
            )
            .await?;

        let devices_xml = output.document.find_all("SG/DEVS_List/Device");

        let mut devices: Vec<String> = devices_xml
            .iter()
            .filter_map(|d| d.child_text("dev_name"))
            .map(str::to_string)
            .collect();
        devices.sort();

        let rdf = devices_xml
            .iter()
            .filter_map(|d| d.child_text("configuration"))
            .any(|c| c.starts_with("RDF"));
        let replication = if rdf { Replication::Rdf } else { Replication::Local };

        debug!("dev name: {}", devices.join(","));
        debug!("metro: {}", rdf);

        Ok((devices, replication))
    }
}
