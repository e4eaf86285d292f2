//! Snapshot Engine
//!
//! Lists, creates, links, unlinks and restores SnapVX snapshots of a
//! clone environment. Every mutating step is followed by a verify call
//! whose waiting is bounded by a [`PollPolicy`].

use super::policy::{converge, PollPolicy};
use super::session::{Session, SessionState};
use crate::config::PollingConfig;
use crate::domain::ports::{
    ArrayCommand, ArrayGatewayRef, ArrayId, CloneEnvironment, OutputMode, Snapshot, TargetGroup,
};
use crate::error::{Error, Result};
use crate::mirror::MirrorCoordinator;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Timestamp layout of `last_timestamp` in SnapVX listings
const ARRAY_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Layout used in our output
const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Convert an array timestamp to ISO form, keeping unparseable values as-is
pub fn normalize_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    match NaiveDateTime::parse_from_str(raw, ARRAY_TIMESTAMP_FORMAT) {
        Ok(ts) => ts.format(ISO_TIMESTAMP_FORMAT).to_string(),
        Err(e) => {
            warn!("Unparseable snapshot timestamp '{}': {}", raw, e);
            raw.to_string()
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub snapshot: Snapshot,
    pub trail: Vec<SessionState>,
}

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub snapshot_name: String,
    pub target: String,
    pub full_copy: bool,
    pub trail: Vec<SessionState>,
}

/// Link found on a target storage group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingLink {
    pub snapshot_name: String,
    pub generation: String,
    pub source_devices: Vec<String>,
    pub link_devices: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UnlinkOutcome {
    /// `None` when the target was not linked
    pub unlinked: Option<ExistingLink>,
    pub trail: Vec<SessionState>,
}

#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub snapshot_name: String,
    pub trail: Vec<SessionState>,
}

// =============================================================================
// Engine
// =============================================================================

/// Snapshot operations over the array gateway
pub struct SnapshotEngine {
    gateway: ArrayGatewayRef,
    mirror: MirrorCoordinator,
    prefix: String,
    polling: PollingConfig,
}

impl SnapshotEngine {
    pub fn new(
        gateway: ArrayGatewayRef,
        mirror: MirrorCoordinator,
        prefix: impl Into<String>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            gateway,
            mirror,
            prefix: prefix.into(),
            polling,
        }
    }

    /// Name `create` assigns when none was given
    pub fn snapshot_name_for(&self, source_db: &str, date: NaiveDate) -> String {
        format!("{}{}_{}", self.prefix, source_db, date.format("%Y%m%d"))
    }

    /// Managed snapshots of the source group, newest name first
    pub async fn list(&self, env: &CloneEnvironment) -> Result<Vec<Snapshot>> {
        let command = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["-sg", env.source.name.as_str(), "list"]);
        let output = self
            .gateway
            .run(&command, OutputMode::Structured, false)
            .await?;

        let mut seen = BTreeSet::new();
        let mut snapshots = Vec::new();

        for entry in output.document.find_all("SG/Snapvx/Snapshot") {
            let Some(name) = entry.child_text("snapshot_name") else {
                continue;
            };
            if !name.starts_with(&self.prefix) || !seen.insert(name.to_string()) {
                continue;
            }

            let link = entry.child_text("link").unwrap_or_default().to_string();
            let linked = !link.is_empty() && !link.eq_ignore_ascii_case("no");
            snapshots.push(Snapshot {
                name: name.to_string(),
                timestamp: normalize_timestamp(entry.child_text("last_timestamp").unwrap_or_default()),
                link,
                linked,
            });
        }

        snapshots.sort_by(|a, b| b.name.cmp(&a.name));

        if snapshots.is_empty() {
            warn!("No snapshots found on {}", env.source.name);
        }
        debug!("snapshots: {:?}", snapshots);

        Ok(snapshots)
    }

    /// Create a snapshot named after today's date
    pub async fn create(&self, env: &CloneEnvironment, ttl_days: u32) -> Result<CreateOutcome> {
        self.create_on(env, ttl_days, Local::now().date_naive()).await
    }

    pub async fn create_on(
        &self,
        env: &CloneEnvironment,
        ttl_days: u32,
        date: NaiveDate,
    ) -> Result<CreateOutcome> {
        let name = env
            .snapshot_name
            .clone()
            .unwrap_or_else(|| self.snapshot_name_for(&env.source_db, date));

        let mut session = Session::starting_at(SessionState::None);
        session.advance(SessionState::Creating)?;

        info!("Creating snapshot {} of {}", name, env.source.name);
        let mut command = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["-sg", env.source.name.as_str(), "-name", name.as_str(), "-noprompt"])
            .args(["establish", "-ttl", "-delta"])
            .arg(ttl_days.to_string())
            .mutating();
        if env.source.is_mirrored() {
            command = command.arg("-both_sides");
        }
        let output = self.gateway.run(&command, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());

        session.advance(SessionState::Established)?;

        let snapshots = self.list(env).await?;
        let snapshot = match snapshots.iter().find(|s| s.name == name) {
            Some(s) => s.clone(),
            None => snapshots.into_iter().next().ok_or_else(|| Error::NoSnapshots {
                group: env.source.name.clone(),
            })?,
        };

        Ok(CreateOutcome {
            snapshot,
            trail: session.into_trail(),
        })
    }

    /// Explicit snapshot name, else the newest managed snapshot
    async fn select_snapshot(&self, env: &CloneEnvironment) -> Result<String> {
        if let Some(name) = &env.snapshot_name {
            return Ok(name.clone());
        }

        let newest = self.list(env).await?.into_iter().next().ok_or_else(|| Error::NoSnapshots {
            group: env.source.name.clone(),
        })?;
        info!("Using newest snapshot {}", newest.name);
        Ok(newest.name)
    }

    /// Link a snapshot of the source group to the target group.
    ///
    /// A Metro target is suspended first, always gets a full copy, and is
    /// detached from the snapshot and re-established once copied.
    pub async fn link(&self, env: &CloneEnvironment, full_copy: bool) -> Result<LinkOutcome> {
        let target = env.require_target("link")?;
        let mirror_group = target.mirror.group();
        if target.group.is_mirrored() && mirror_group.is_none() {
            return Err(Error::AmbiguousMirrorGroup {
                group: target.group.name.clone(),
                candidates: String::new(),
            });
        }

        let snapshot = self.select_snapshot(env).await?;
        let full_copy = full_copy || mirror_group.is_some();
        let policy = self.polling.link_policy(full_copy);
        let target_name = target.group.name.as_str();

        if let Some(group) = mirror_group {
            self.mirror.suspend(env.array_id, group, target_name).await?;
        }

        self.unlink(env.array_id, target_name).await?;

        let mut session = Session::starting_at(SessionState::Established);
        session.advance(SessionState::Linking)?;

        info!(
            "Linking snapshot {} of {} to {}",
            snapshot, env.source.name, target_name
        );
        let mut command = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["-sg", env.source.name.as_str(), "-lnsg", target_name])
            .args(["-snapshot_name", snapshot.as_str(), "-nop", "link"])
            .mutating();
        if full_copy {
            command = command.arg("-copy");
        }
        if mirror_group.is_some() {
            command = command.arg("-remote");
        }
        let output = self.gateway.run(&command, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());

        session.advance(SessionState::Linked)?;
        if full_copy {
            session.advance(SessionState::Copying)?;
        }

        self.verify_link(env.array_id, target, &snapshot, full_copy, policy)
            .await?;

        if full_copy {
            session.advance(SessionState::Linked)?;
        }

        let detail = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["list", "-lnsg", target_name, "-linked", "-by_tgt", "-detail", "-gb"]);
        let output = self.gateway.run(&detail, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());

        if let Some(group) = mirror_group {
            session.advance(SessionState::Unlinking)?;

            let unlink = ArrayCommand::symsnapvx()
                .sid(env.array_id)
                .args(["-sg", env.source.name.as_str(), "-lnsg", target_name])
                .args(["-snapshot_name", snapshot.as_str(), "-noprompt", "unlink"])
                .mutating();
            self.gateway.run(&unlink, OutputMode::Text, true).await?;

            self.mirror.establish(env.array_id, group, target_name).await?;
            self.mirror
                .verify_active_bias(env.array_id, group, target_name, policy)
                .await?;

            let terminate = ArrayCommand::symsnapvx()
                .sid(env.array_id)
                .args(["-sg", env.source.name.as_str(), "-snapshot_name", snapshot.as_str()])
                .args(["-noprompt", "terminate"])
                .mutating();
            self.gateway.run(&terminate, OutputMode::Text, true).await?;

            session.advance(SessionState::None)?;
        }

        info!("Link of {} to {} finished", snapshot, target_name);
        Ok(LinkOutcome {
            snapshot_name: snapshot,
            target: target_name.to_string(),
            full_copy,
            trail: session.into_trail(),
        })
    }

    async fn verify_link(
        &self,
        array: ArrayId,
        target: &TargetGroup,
        snapshot: &str,
        full_copy: bool,
        policy: PollPolicy,
    ) -> Result<()> {
        let state: &[&str] = if full_copy {
            &["-copied", "-defined"]
        } else {
            &["-linked"]
        };
        info!(
            "Waiting for {} to be {} ({})",
            target.group.name,
            if full_copy { "copied" } else { "linked" },
            policy
        );

        if full_copy {
            info!("Monitor with: {}", self.progress_hint(array, &target.group.name));
        }

        let command = ArrayCommand::symsnapvx()
            .sid(array)
            .args(["-lnsg", target.group.name.as_str()])
            .args(policy.tool_args())
            .args(["-snapshot_name", snapshot, "verify"])
            .args(state.iter().copied())
            .arg("-by_tgt");

        converge(self.gateway.as_ref(), &command, policy, |attempts| {
            Error::LinkTimeout {
                target: target.group.name.clone(),
                snapshot: snapshot.to_string(),
                attempts,
            }
        })
        .await
    }

    /// Command an operator can run to follow the copy to `target`
    pub fn progress_hint(&self, array: ArrayId, target: &str) -> ArrayCommand {
        ArrayCommand::symsnapvx()
            .sid(array)
            .args(["list", "-lnsg", target, "-by_tgt", "-linked", "-detail", "-gb"])
    }

    /// Current link of a target storage group, if any
    pub async fn existing_link(&self, array: ArrayId, target: &str) -> Result<Option<ExistingLink>> {
        let command = ArrayCommand::symsnapvx()
            .sid(array)
            .args(["list", "-lnsg", target, "-linked", "-by_tgt"]);
        let output = self
            .gateway
            .run(&command, OutputMode::Structured, false)
            .await?;

        let entries = output.document.find_all("SG/Snapvx/Snapshot");
        if !output.success() || entries.is_empty() {
            return Ok(None);
        }

        let mut source_devices = Vec::new();
        let mut link_devices = Vec::new();
        let mut generations = BTreeSet::new();
        let mut names = BTreeSet::new();

        for entry in &entries {
            if let Some(dev) = entry.child_text("source") {
                source_devices.push(dev.to_string());
            }
            if let Some(dev) = entry.child_text("link") {
                link_devices.push(dev.to_string());
            }
            if let Some(generation) = entry.child_text("generation") {
                generations.insert(generation.to_string());
            }
            if let Some(name) = entry.child_text("snapshot_name") {
                names.insert(name.to_string());
            }
        }

        let generation = single_value(target, "generation", generations)?;
        let snapshot_name = single_value(target, "snapshot_name", names)?;

        Ok(Some(ExistingLink {
            snapshot_name,
            generation,
            source_devices,
            link_devices,
        }))
    }

    /// Detach whatever snapshot is linked to `target`. A group that is not
    /// linked is left alone.
    pub async fn unlink(&self, array: ArrayId, target: &str) -> Result<UnlinkOutcome> {
        let Some(link) = self.existing_link(array, target).await? else {
            info!("Storage group {} is not linked", target);
            return Ok(UnlinkOutcome {
                unlinked: None,
                trail: vec![SessionState::None],
            });
        };

        let mut session = Session::starting_at(SessionState::Linked);
        session.advance(SessionState::Unlinking)?;

        info!(
            "Unlinking snapshot {} generation {} from {}",
            link.snapshot_name, link.generation, target
        );
        let command = ArrayCommand::symsnapvx()
            .sid(array)
            .args(["-noprompt", "-devs"])
            .arg(link.source_devices.join(","))
            .arg("-lndevs")
            .arg(link.link_devices.join(","))
            .args(["-snapshot_name", link.snapshot_name.as_str()])
            .args(["-generation", link.generation.as_str(), "unlink"])
            .mutating();
        let output = self.gateway.run(&command, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());

        session.advance(SessionState::None)?;
        info!("Unlink of {} finished", target);

        Ok(UnlinkOutcome {
            unlinked: Some(link),
            trail: session.into_trail(),
        })
    }

    /// Restore the source group from a snapshot. Metro targets are refused
    /// before any command is sent.
    pub async fn restore(&self, env: &CloneEnvironment) -> Result<RestoreOutcome> {
        if env.target_is_mirrored() {
            let target = env
                .target
                .as_ref()
                .map(|t| t.group.name.clone())
                .unwrap_or_default();
            return Err(Error::UnsupportedMetroRestore { target });
        }

        let snapshot = self.select_snapshot(env).await?;
        let source = env.source.name.as_str();

        let mut session = Session::starting_at(SessionState::Established);
        session.advance(SessionState::Restoring)?;

        info!("Restoring {} from snapshot {}", source, snapshot);
        let command = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["-noprompt", "-sg", source, "-snapshot_name", snapshot.as_str(), "restore"])
            .mutating();
        let output = self.gateway.run(&command, OutputMode::Text, true).await?;
        info!("{}", output.text.trim());

        let policy = self.polling.restore_policy();
        info!("Waiting for {} to be restored ({})", source, policy);
        let verify = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["-sg", source, "-snapshot_name", snapshot.as_str(), "verify", "-restored"])
            .args(policy.tool_args());
        converge(self.gateway.as_ref(), &verify, policy, |attempts| {
            Error::RestoreTimeout {
                group: source.to_string(),
                snapshot: snapshot.clone(),
                attempts,
            }
        })
        .await?;

        let terminate = ArrayCommand::symsnapvx()
            .sid(env.array_id)
            .args(["-noprompt", "-sg", source, "-snapshot_name", snapshot.as_str()])
            .args(["terminate", "-restored"])
            .mutating();
        self.gateway.run(&terminate, OutputMode::Text, true).await?;

        session.advance(SessionState::None)?;
        info!("Restore of {} finished", source);

        Ok(RestoreOutcome {
            snapshot_name: snapshot,
            trail: session.into_trail(),
        })
    }
}

fn single_value(target: &str, field: &str, values: BTreeSet<String>) -> Result<String> {
    if values.len() == 1 {
        if let Some(value) = values.iter().next() {
            return Ok(value.clone());
        }
    }
    Err(Error::InconsistentLinkState {
        target: target.to_string(),
        field: field.to_string(),
        values: values.into_iter().collect::<Vec<_>>().join(","),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MirrorGroupId, MirrorRole, Replication, VolumeGroup};
    use crate::gateway::{ScriptedGateway, ScriptedResponse};
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;

    const SNAPSHOTS: &str = "<SymCLI_ML><SG><Snapvx>\
        <Snapshot><snapshot_name>SN_JIRKA_20240101</snapshot_name>\
        <last_timestamp>Mon Jan 01 10:15:00 2024</last_timestamp><link>No</link></Snapshot>\
        <Snapshot><snapshot_name>SN_JIRKA_20240101</snapshot_name>\
        <last_timestamp>Mon Jan 01 10:15:00 2024</last_timestamp><link>No</link></Snapshot>\
        <Snapshot><snapshot_name>manual_copy</snapshot_name>\
        <last_timestamp>Mon Jan 01 09:00:00 2024</last_timestamp><link>No</link></Snapshot>\
        <Snapshot><snapshot_name>SN_JIRKA_20240102</snapshot_name>\
        <last_timestamp>Tue Jan 02 10:15:00 2024</last_timestamp><link>Yes</link></Snapshot>\
        </Snapvx></SG></SymCLI_ML>";

    const LINKED: &str = "<SymCLI_ML><SG><Snapvx>\
        <Snapshot><source>0A1</source><link>0B1</link><generation>0</generation>\
        <snapshot_name>SN_JIRKA_20240101</snapshot_name></Snapshot>\
        <Snapshot><source>0A2</source><link>0B2</link><generation>0</generation>\
        <snapshot_name>SN_JIRKA_20240101</snapshot_name></Snapshot>\
        </Snapvx></SG></SymCLI_ML>";

    const LINKED_MIXED: &str = "<SymCLI_ML><SG><Snapvx>\
        <Snapshot><source>0A1</source><link>0B1</link><generation>0</generation>\
        <snapshot_name>SN_JIRKA_20240101</snapshot_name></Snapshot>\
        <Snapshot><source>0A2</source><link>0B2</link><generation>1</generation>\
        <snapshot_name>SN_JIRKA_20240101</snapshot_name></Snapshot>\
        </Snapvx></SG></SymCLI_ML>";

    const TARGET: &str = "te01db_BOSON_DATA";

    fn array() -> ArrayId {
        ArrayId::parse("000297800756").unwrap()
    }

    fn devs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn local_target() -> TargetGroup {
        TargetGroup {
            group: VolumeGroup::new(array(), TARGET, devs(&["0B1", "0B2"]), 2, Replication::Local),
            mirror: MirrorRole::Standalone,
        }
    }

    fn metro_target() -> TargetGroup {
        TargetGroup {
            group: VolumeGroup::new(array(), TARGET, devs(&["1B0", "1B1"]), 2, Replication::Rdf),
            mirror: MirrorRole::MirroredPeer(MirrorGroupId(42)),
        }
    }

    fn env(target: Option<TargetGroup>) -> CloneEnvironment {
        CloneEnvironment {
            array_id: array(),
            source_db: "JIRKA".into(),
            source: VolumeGroup::new(
                array(),
                "pr01db_JIRKA_DATA",
                devs(&["0A1", "0A2"]),
                2,
                Replication::Local,
            ),
            target_db: target.as_ref().map(|_| "BOSON".to_string()),
            target,
            snapshot_name: None,
        }
    }

    fn engine(gw: &Arc<ScriptedGateway>) -> SnapshotEngine {
        let mirror = MirrorCoordinator::new(gw.clone(), Duration::from_secs(5));
        SnapshotEngine::new(gw.clone(), mirror, "SN_", PollingConfig::default())
    }

    /// Gateway answering the read-only calls of a link to an unlinked target
    fn link_gateway() -> Arc<ScriptedGateway> {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["-sg", "list"], ScriptedResponse::ok(SNAPSHOTS));
        gw.on(&["list", "-lnsg", "-linked", "-by_tgt"], ScriptedResponse::failed(1, ""));
        gw.on(
            &["list", "-lnsg", "-linked", "-by_tgt", "-detail"],
            ScriptedResponse::ok("Linked devices detail"),
        );
        gw.on(&["link"], ScriptedResponse::ok("Link operation succeeded"));
        gw.on(&["verify"], ScriptedResponse::ok("All devices are in the desired state"));
        gw
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(normalize_timestamp("Mon Jan 01 10:15:00 2024"), "2024-01-01T10:15:00");
        assert_eq!(normalize_timestamp("yesterday"), "yesterday");
    }

    #[tokio::test]
    async fn test_list_deduplicates_and_sorts() {
        let gw = link_gateway();
        let snapshots = engine(&gw).list(&env(None)).await.unwrap();

        let names: Vec<&str> = snapshots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SN_JIRKA_20240102", "SN_JIRKA_20240101"]);
        assert_eq!(snapshots[0].timestamp, "2024-01-02T10:15:00");
        assert!(snapshots[0].linked);
        assert!(!snapshots[1].linked);
    }

    #[tokio::test]
    async fn test_create_names_snapshot_after_date() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["establish"], ScriptedResponse::ok("Establish operation succeeded"));
        gw.on(
            &["-sg", "list"],
            ScriptedResponse::ok(
                "<SymCLI_ML><SG><Snapvx><Snapshot><snapshot_name>SN_JIRKA_20240315</snapshot_name>\
                 <last_timestamp>Fri Mar 15 08:00:00 2024</last_timestamp><link>No</link>\
                 </Snapshot></Snapvx></SG></SymCLI_ML>",
            ),
        );

        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let outcome = engine(&gw).create_on(&env(None), 100, date).await.unwrap();

        assert_eq!(outcome.snapshot.name, "SN_JIRKA_20240315");
        assert_eq!(
            outcome.trail,
            vec![SessionState::None, SessionState::Creating, SessionState::Established]
        );
        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -name SN_JIRKA_20240315 \
                 -noprompt establish -ttl -delta 100"
            ]
        );
    }

    #[tokio::test]
    async fn test_link_without_copy() {
        let gw = link_gateway();
        let outcome = engine(&gw)
            .link(&env(Some(local_target())), false)
            .await
            .unwrap();

        assert_eq!(outcome.snapshot_name, "SN_JIRKA_20240102");
        assert!(!outcome.full_copy);
        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -lnsg te01db_BOSON_DATA \
                 -snapshot_name SN_JIRKA_20240102 -nop link"
            ]
        );
        assert_eq!(
            gw.issued_matching(&["verify", "-linked", "-by_tgt"]),
            vec![
                "symsnapvx -sid 756 -lnsg te01db_BOSON_DATA -i 10 -c 6 \
                 -snapshot_name SN_JIRKA_20240102 verify -linked -by_tgt"
            ]
        );
    }

    #[tokio::test]
    async fn test_link_verify_timeout() {
        let gw = link_gateway();
        gw.on(&["verify", "-linked"], ScriptedResponse::failed(1, "Not all devices are LINKED"));

        let result = engine(&gw).link(&env(Some(local_target())), false).await;
        assert_matches!(
            result,
            Err(Error::LinkTimeout { attempts: 6, ref target, .. }) if target == TARGET
        );
    }

    #[tokio::test]
    async fn test_link_full_copy_waits_unbounded() {
        let gw = link_gateway();
        let outcome = engine(&gw)
            .link(&env(Some(local_target())), true)
            .await
            .unwrap();

        assert_eq!(gw.issued_matching(&["verify", "-copied", "-defined", "600"]).len(), 1);
        assert!(gw.issued_matching(&["-c"]).is_empty());
        assert_eq!(
            outcome.trail,
            vec![
                SessionState::Established,
                SessionState::Linking,
                SessionState::Linked,
                SessionState::Copying,
                SessionState::Linked,
            ]
        );
    }

    #[tokio::test]
    async fn test_link_to_metro_target() {
        let gw = link_gateway();
        gw.on(&["unlink"], ScriptedResponse::ok("Unlink operation succeeded"));
        gw.on(&["terminate"], ScriptedResponse::ok("Terminate operation succeeded"));
        gw.on(&["symrdf", "suspend"], ScriptedResponse::ok("Suspend operation succeeded"));
        gw.on(&["symrdf", "establish"], ScriptedResponse::ok("Establish operation succeeded"));

        let outcome = engine(&gw)
            .link(&env(Some(metro_target())), false)
            .await
            .unwrap();

        assert!(outcome.full_copy);
        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symrdf -sid 756 -noprompt -rdfg 42 -sg te01db_BOSON_DATA suspend -force",
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -lnsg te01db_BOSON_DATA \
                 -snapshot_name SN_JIRKA_20240102 -nop link -copy -remote",
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -lnsg te01db_BOSON_DATA \
                 -snapshot_name SN_JIRKA_20240102 -noprompt unlink",
                "symrdf -sid 756 -rdfg 42 -sg te01db_BOSON_DATA establish -use_bias -nop",
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -snapshot_name SN_JIRKA_20240102 \
                 -noprompt terminate",
            ]
        );
        assert_eq!(gw.issued_matching(&["symrdf", "verify", "-activebias"]).len(), 1);
        assert_eq!(outcome.trail.last(), Some(&SessionState::None));
    }

    #[tokio::test]
    async fn test_create_on_mirrored_source_covers_both_sides() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["establish"], ScriptedResponse::ok("Establish operation succeeded"));
        gw.on(&["-sg", "list"], ScriptedResponse::ok(SNAPSHOTS));

        let mut env = env(None);
        env.source.replication = Replication::Rdf;
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let outcome = engine(&gw).create_on(&env, 30, date).await.unwrap();

        assert_eq!(outcome.snapshot.name, "SN_JIRKA_20240102");
        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -name SN_JIRKA_20240102 \
                 -noprompt establish -ttl -delta 30 -both_sides"
            ]
        );
    }

    #[tokio::test]
    async fn test_link_mirrored_target_without_group() {
        let gw = link_gateway();
        let target = TargetGroup {
            mirror: MirrorRole::Standalone,
            ..metro_target()
        };

        let result = engine(&gw).link(&env(Some(target)), false).await;
        assert_matches!(
            result,
            Err(Error::AmbiguousMirrorGroup { ref group, .. }) if group == TARGET
        );
        assert!(gw.issued().is_empty());
    }

    #[test]
    fn test_progress_hint() {
        let gw = Arc::new(ScriptedGateway::new());
        assert_eq!(
            engine(&gw).progress_hint(array(), TARGET).to_string(),
            "symsnapvx -sid 756 list -lnsg te01db_BOSON_DATA -by_tgt -linked -detail -gb"
        );
    }

    #[tokio::test]
    async fn test_link_without_snapshots() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["-sg", "list"], ScriptedResponse::failed(1, "No snapshots"));

        let result = engine(&gw).link(&env(Some(local_target())), false).await;
        assert_matches!(result, Err(Error::NoSnapshots { .. }));
        assert!(gw.mutating_issued().is_empty());
    }

    #[tokio::test]
    async fn test_unlink_twice_is_noop_second_time() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on_sequence(
            &["list", "-lnsg", "-linked", "-by_tgt"],
            vec![ScriptedResponse::ok(LINKED), ScriptedResponse::failed(1, "")],
        );
        gw.on(&["unlink"], ScriptedResponse::ok("Unlink operation succeeded"));
        let engine = engine(&gw);

        let first = engine.unlink(array(), TARGET).await.unwrap();
        let link = first.unlinked.unwrap();
        assert_eq!(link.generation, "0");
        assert_eq!(link.snapshot_name, "SN_JIRKA_20240101");

        let second = engine.unlink(array(), TARGET).await.unwrap();
        assert!(second.unlinked.is_none());
        assert_eq!(second.trail, vec![SessionState::None]);

        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symsnapvx -sid 756 -noprompt -devs 0A1,0A2 -lndevs 0B1,0B2 \
                 -snapshot_name SN_JIRKA_20240101 -generation 0 unlink"
            ]
        );
    }

    #[tokio::test]
    async fn test_unlink_inconsistent_generation() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["list", "-lnsg", "-linked", "-by_tgt"], ScriptedResponse::ok(LINKED_MIXED));

        let result = engine(&gw).unlink(array(), TARGET).await;
        assert_matches!(
            result,
            Err(Error::InconsistentLinkState { ref field, ref values, .. })
                if field == "generation" && values == "0,1"
        );
        assert!(gw.mutating_issued().is_empty());
    }

    #[tokio::test]
    async fn test_restore_refuses_metro_target() {
        let gw = Arc::new(ScriptedGateway::new());
        let result = engine(&gw).restore(&env(Some(metro_target()))).await;

        assert_matches!(result, Err(Error::UnsupportedMetroRestore { ref target }) if target == TARGET);
        assert!(gw.issued().is_empty());
    }

    #[tokio::test]
    async fn test_restore_source_group() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.on(&["restore"], ScriptedResponse::ok("Restore operation succeeded"));
        gw.on(&["verify", "-restored"], ScriptedResponse::ok("All devices are RESTORED"));
        gw.on(&["terminate", "-restored"], ScriptedResponse::ok("Terminate operation succeeded"));

        let env = env(Some(local_target())).with_snapshot_name("SN_JIRKA_20240101");
        let outcome = engine(&gw).restore(&env).await.unwrap();

        assert_eq!(
            outcome.trail,
            vec![SessionState::Established, SessionState::Restoring, SessionState::None]
        );
        assert_eq!(
            gw.mutating_issued(),
            vec![
                "symsnapvx -sid 756 -noprompt -sg pr01db_JIRKA_DATA \
                 -snapshot_name SN_JIRKA_20240101 restore",
                "symsnapvx -sid 756 -noprompt -sg pr01db_JIRKA_DATA \
                 -snapshot_name SN_JIRKA_20240101 terminate -restored",
            ]
        );
        assert_eq!(
            gw.issued_matching(&["verify"]),
            vec![
                "symsnapvx -sid 756 -sg pr01db_JIRKA_DATA -snapshot_name SN_JIRKA_20240101 \
                 verify -restored -i 300"
            ]
        );
    }
}
