//! SRDF/Metro Coordination
//!
//! A Metro target cannot be overwritten while its RDF group replicates.
//! The group is suspended before the link, and re-established with bias
//! on the local side once the new data is fully copied.

use crate::domain::ports::{
    ArrayCommand, ArrayGatewayRef, ArrayId, MirrorGroupId, OutputMode,
};
use crate::error::{Error, Result};
use crate::snapshot::policy::{converge, PollPolicy};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, error, info};

/// Outcome of looking up the RDF group owning a set of devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorResolution {
    Resolved(MirrorGroupId),
    /// Zero or several candidate groups
    Unresolved { candidates: Vec<MirrorGroupId> },
}

impl MirrorResolution {
    pub fn group(&self) -> Option<MirrorGroupId> {
        match self {
            MirrorResolution::Resolved(group) => Some(*group),
            MirrorResolution::Unresolved { .. } => None,
        }
    }
}

/// Pick the single RDF group that owns `devices`.
///
/// `rdf_devices` maps local device names to their RDF group. A device
/// without an RDF group leaves the set unresolved.
pub fn select_mirror_group(
    rdf_devices: &BTreeMap<String, MirrorGroupId>,
    devices: &[String],
) -> MirrorResolution {
    let candidates: BTreeSet<MirrorGroupId> = devices
        .iter()
        .filter_map(|dev| rdf_devices.get(dev).copied())
        .collect();
    let candidates: Vec<MirrorGroupId> = candidates.into_iter().collect();

    let owner = match candidates.as_slice() {
        [group] if devices.iter().all(|dev| rdf_devices.get(dev) == Some(group)) => Some(*group),
        _ => None,
    };

    match owner {
        Some(group) => MirrorResolution::Resolved(group),
        None => MirrorResolution::Unresolved { candidates },
    }
}

/// Drives RDF group operations around a link
pub struct MirrorCoordinator {
    gateway: ArrayGatewayRef,
    query_interval: Duration,
}

impl MirrorCoordinator {
    pub fn new(gateway: ArrayGatewayRef, query_interval: Duration) -> Self {
        Self {
            gateway,
            query_interval,
        }
    }

    /// Local Metro devices of `array` and the RDF group of each
    pub async fn rdf_devices(&self, array: ArrayId) -> Result<BTreeMap<String, MirrorGroupId>> {
        let output = self
            .gateway
            .run(
                &ArrayCommand::symrdf().sid(array).args(["-rdf_metro", "list"]),
                OutputMode::Structured,
                true,
            )
            .await?;

        let mut devices = BTreeMap::new();
        for local in output.document.find_all("Symmetrix/Device/RDF/Local") {
            let (Some(dev), Some(group)) =
                (local.child_text("dev_name"), local.child_text("ra_group_num"))
            else {
                continue;
            };
            let group = group.trim().parse::<u32>().map_err(|e| Error::MalformedOutput {
                command: "symrdf list".into(),
                reason: format!("ra_group_num {}: {}", group, e),
            })?;
            devices.insert(dev.to_string(), MirrorGroupId(group));
        }

        debug!("rdf devices: {:?}", devices);
        Ok(devices)
    }

    /// RDF group owning every device of a target storage group
    pub async fn resolve_mirror_group(
        &self,
        array: ArrayId,
        devices: &[String],
    ) -> Result<MirrorResolution> {
        let rdf_devices = self.rdf_devices(array).await?;
        let resolution = select_mirror_group(&rdf_devices, devices);

        match &resolution {
            MirrorResolution::Resolved(group) => debug!("rdf group: {}", group),
            MirrorResolution::Unresolved { candidates } => {
                error!("Expected exactly one RDF group, found: {:?}", candidates)
            }
        }

        Ok(resolution)
    }

    pub async fn suspend(&self, array: ArrayId, group: MirrorGroupId, target: &str) -> Result<()> {
        info!("Suspending RDF group {} of {}", group, target);
        let command = ArrayCommand::symrdf()
            .sid(array)
            .args(["-noprompt", "-rdfg", group.to_string().as_str(), "-sg", target])
            .args(["suspend", "-force"])
            .mutating();
        let output = self.gateway.run(&command, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());
        Ok(())
    }

    /// Resume replication with bias on the local side
    pub async fn establish(&self, array: ArrayId, group: MirrorGroupId, target: &str) -> Result<()> {
        info!("Establishing RDF group {} of {}", group, target);
        let command = ArrayCommand::symrdf()
            .sid(array)
            .args(["-rdfg", group.to_string().as_str(), "-sg", target])
            .args(["establish", "-use_bias", "-nop"])
            .mutating();
        let output = self.gateway.run(&command, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());
        info!("Monitor with: {}", self.query_hint(array, group, target));
        Ok(())
    }

    /// Wait until the RDF group reports ActiveBias
    pub async fn verify_active_bias(
        &self,
        array: ArrayId,
        group: MirrorGroupId,
        target: &str,
        policy: PollPolicy,
    ) -> Result<()> {
        info!("Waiting for RDF group {} to reach ActiveBias ({})", group, policy);
        let command = ArrayCommand::symrdf()
            .sid(array)
            .args(["-rdfg", group.to_string().as_str(), "-sg", target, "verify"])
            .args(policy.tool_args())
            .args(["-activebias", "-nop"]);

        converge(self.gateway.as_ref(), &command, policy, |attempts| {
            Error::MirrorSyncTimeout {
                group: group.0,
                attempts,
            }
        })
        .await?;

        info!("RDF group {} is in ActiveBias", group);
        Ok(())
    }

    /// Command an operator can run to watch resynchronization
    pub fn query_hint(&self, array: ArrayId, group: MirrorGroupId, target: &str) -> ArrayCommand {
        ArrayCommand::symrdf()
            .sid(array)
            .args(["-rdfg", group.to_string().as_str(), "-sg", target, "query"])
            .args(["-i".to_string(), self.query_interval.as_secs().to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ScriptedGateway, ScriptedResponse};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    const RDF_LIST: &str = "<SymCLI_ML><Symmetrix>\
        <Device><RDF><Local><dev_name>1B0</dev_name><ra_group_num>42</ra_group_num></Local></RDF></Device>\
        <Device><RDF><Local><dev_name>1B1</dev_name><ra_group_num>42</ra_group_num></Local></RDF></Device>\
        <Device><RDF><Local><dev_name>2C0</dev_name><ra_group_num>7</ra_group_num></Local></RDF></Device>\
        </Symmetrix></SymCLI_ML>";

    fn array() -> ArrayId {
        ArrayId::parse("756").unwrap()
    }

    fn devs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn coordinator(gw: Arc<ScriptedGateway>) -> MirrorCoordinator {
        MirrorCoordinator::new(gw, Duration::from_secs(5))
    }

    #[test]
    fn test_select_mirror_group() {
        let map: BTreeMap<String, MirrorGroupId> = [
            ("1B0".to_string(), MirrorGroupId(42)),
            ("1B1".to_string(), MirrorGroupId(42)),
            ("2C0".to_string(), MirrorGroupId(7)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            select_mirror_group(&map, &devs(&["1B0", "1B1"])),
            MirrorResolution::Resolved(MirrorGroupId(42))
        );
        assert_eq!(
            select_mirror_group(&map, &devs(&["1B0", "2C0"])),
            MirrorResolution::Unresolved {
                candidates: vec![MirrorGroupId(7), MirrorGroupId(42)]
            }
        );
        assert_eq!(
            select_mirror_group(&map, &devs(&["0A1"])).group(),
            None
        );
        // one device outside any RDF group
        assert_eq!(
            select_mirror_group(&map, &devs(&["1B0", "0A9"])),
            MirrorResolution::Unresolved {
                candidates: vec![MirrorGroupId(42)]
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_from_array() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["symrdf", "-rdf_metro", "list"], ScriptedResponse::ok(RDF_LIST));

        let resolution = coordinator(gw)
            .resolve_mirror_group(array(), &devs(&["1B0", "1B1"]))
            .await
            .unwrap();
        assert_eq!(resolution.group(), Some(MirrorGroupId(42)));
    }

    #[tokio::test]
    async fn test_suspend_and_establish_commands() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["symrdf", "suspend"], ScriptedResponse::ok("Suspended"));
        gw.on(&["symrdf", "establish"], ScriptedResponse::ok("Established"));
        let c = coordinator(gw.clone());

        c.suspend(array(), MirrorGroupId(42), "te01db_BOSON_DATA").await.unwrap();
        c.establish(array(), MirrorGroupId(42), "te01db_BOSON_DATA").await.unwrap();

        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symrdf -sid 756 -noprompt -rdfg 42 -sg te01db_BOSON_DATA suspend -force",
                "symrdf -sid 756 -rdfg 42 -sg te01db_BOSON_DATA establish -use_bias -nop",
            ]
        );
        assert_eq!(
            c.query_hint(array(), MirrorGroupId(42), "te01db_BOSON_DATA").to_string(),
            "symrdf -sid 756 -rdfg 42 -sg te01db_BOSON_DATA query -i 5"
        );
    }

    #[tokio::test]
    async fn test_bounded_active_bias_timeout() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["symrdf", "verify", "-activebias"], ScriptedResponse::failed(1, "SyncInProg"));

        let policy = PollPolicy::Bounded {
            interval: Duration::from_secs(10),
            count: 3,
        };
        let result = coordinator(gw.clone())
            .verify_active_bias(array(), MirrorGroupId(42), "te01db_BOSON_DATA", policy)
            .await;

        assert_matches!(result, Err(Error::MirrorSyncTimeout { group: 42, attempts: 3 }));
        assert_eq!(gw.issued_matching(&["-i", "10", "-c", "3"]).len(), 1);
    }
}
