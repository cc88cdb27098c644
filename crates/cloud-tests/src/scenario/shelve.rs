//! Shelve then unshelve an instance and check its disk survived.
//!
//! Outline:
//! - boot an instance (optionally from a volume) and write a timestamp file
//! - shelve the instance, offloading it explicitly when the deployment never
//!   offloads on its own
//! - unshelve the instance
//! - read the timestamp file back and compare it byte for byte
//! - delete the instance and wait until it is gone
//!
//! Unshelve must boot from the instance snapshot, not from the original
//! image; a fresh disk would lose the timestamp.

use super::{BootOptions, ScenarioContext, ScenarioOutcome};
use crate::adapters::RemoteExec;
use crate::models::{BlockDeviceMapping, FloatingIp, Keypair, Server};
use crate::waiters::{wait_for_server_status, wait_for_server_termination};
use common::error::{CloudError, Result};
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument};

const TIMESTAMP_FILE: &str = "/tmp/timestamp";

/// Lifecycle states the scenario drives a server through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelveState {
    /// Boot request accepted.
    Created,
    Active,
    Shelved,
    ShelvedOffloaded,
    Unshelved,
    Verified,
    /// Deletion confirmed by the compute service.
    Terminated,
}

impl fmt::Display for ShelveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShelveState::Created => "BUILD",
            ShelveState::Active => "ACTIVE",
            ShelveState::Shelved => "SHELVED",
            ShelveState::ShelvedOffloaded => "SHELVED_OFFLOADED",
            ShelveState::Unshelved => "ACTIVE (unshelved)",
            ShelveState::Verified => "VERIFIED",
            ShelveState::Terminated => "DELETED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ShelveReport {
    pub server_id: String,
    pub timestamp: String,
    /// States observed, in order.
    pub states: Vec<ShelveState>,
}

/// Shelve/unshelve scenario, image-backed or volume-backed.
#[derive(Debug, Clone, Copy)]
pub struct ShelveScenario {
    boot_from_volume: bool,
}

impl ShelveScenario {
    #[must_use]
    pub fn image_backed() -> Self {
        Self {
            boot_from_volume: false,
        }
    }

    #[must_use]
    pub fn volume_backed() -> Self {
        Self {
            boot_from_volume: true,
        }
    }

    /// Run the scenario to completion; cleanup always runs.
    pub async fn run(&self, mut ctx: ScenarioContext) -> Result<ScenarioOutcome<ShelveReport>> {
        if !ctx.config().compute.shelve_enabled {
            return Ok(ScenarioOutcome::Skipped("Shelve is not available.".to_string()));
        }

        let outcome = self.create_server_then_shelve_and_unshelve(&mut ctx).await;
        ctx.finish(outcome).await.map(ScenarioOutcome::Completed)
    }

    #[instrument(skip_all, fields(boot_from_volume = self.boot_from_volume))]
    async fn create_server_then_shelve_and_unshelve(
        &self,
        ctx: &mut ScenarioContext,
    ) -> Result<ShelveReport> {
        let keypair = ctx.create_keypair().await?;
        let security_group = ctx.create_security_group().await?;

        let mut options = BootOptions {
            key_name: Some(keypair.name.clone()),
            security_groups: vec![security_group.name.clone()],
            ..BootOptions::default()
        };

        let image_ref = ctx.config().compute.image_ref.clone();
        if self.boot_from_volume {
            let size = ctx.config().volume.volume_size;
            let volume = ctx.create_volume(size, Some(image_ref)).await?;
            options.block_device_mapping = vec![BlockDeviceMapping::root_volume(&volume.id)];
        } else {
            options.image_ref = Some(image_ref);
        }

        let server = ctx.create_server(options).await?;
        let mut states = vec![ShelveState::Created, ShelveState::Active];

        let floating_ip = if ctx.config().compute.use_floatingip_for_ssh {
            let floating_ip = ctx.create_floating_ip().await?;
            ctx.associate_floating_ip(&floating_ip, &server).await?;
            Some(floating_ip)
        } else {
            None
        };

        let remote = connect(ctx, &server, floating_ip.as_ref(), &keypair)?;
        let timestamp = write_timestamp(remote.as_ref()).await?;

        states.extend(shelve_then_unshelve_server(ctx, &server.id).await?);

        // Reconnect: the unshelved instance is a new boot
        let remote = connect(ctx, &server, floating_ip.as_ref(), &keypair)?;
        check_timestamp(remote.as_ref(), &timestamp).await?;
        states.push(ShelveState::Verified);
        info!(
            target: "cloudcheck.scenario",
            server_id = %server.id,
            "Timestamp survived shelve/unshelve"
        );

        let compute = ctx.clients().compute.clone();
        compute.delete_server(&server.id).await?;
        wait_for_server_termination(compute.as_ref(), &server.id, ctx.policy()).await?;
        states.push(ShelveState::Terminated);
        Ok(ShelveReport {
            server_id: server.id,
            timestamp,
            states,
        })
    }
}

fn connect(
    ctx: &ScenarioContext,
    server: &Server,
    floating_ip: Option<&FloatingIp>,
    keypair: &Keypair,
) -> Result<Box<dyn RemoteExec>> {
    let address = ctx.ssh_address(server, floating_ip)?;
    ctx.remote_client(&address, keypair)
}

/// Shelve `server_id`, wait until it is offloaded, unshelve it and wait until
/// it is `ACTIVE` again.
///
/// With a non-negative `shelved_offload_time` the platform offloads on its
/// own and the offload delay is added to the wait budget. Otherwise the
/// server is offloaded explicitly once `SHELVED` is observed. Each transition
/// waits for its target status before the next call is issued.
#[instrument(skip(ctx))]
pub async fn shelve_then_unshelve_server(
    ctx: &ScenarioContext,
    server_id: &str,
) -> Result<Vec<ShelveState>> {
    let compute = ctx.clients().compute.as_ref();
    let policy = ctx.policy();
    let offload_time = ctx.config().compute.shelved_offload_time;
    let mut states = Vec::new();

    compute.shelve_server(server_id).await?;

    if let Ok(extra) = u64::try_from(offload_time) {
        wait_for_server_status(
            compute,
            server_id,
            "SHELVED_OFFLOADED",
            policy.with_extra_timeout(Duration::from_secs(extra)),
        )
        .await?;
    } else {
        wait_for_server_status(compute, server_id, "SHELVED", policy).await?;
        states.push(ShelveState::Shelved);
        compute.shelve_offload_server(server_id).await?;
        wait_for_server_status(compute, server_id, "SHELVED_OFFLOADED", policy).await?;
    }
    states.push(ShelveState::ShelvedOffloaded);

    compute.unshelve_server(server_id).await?;
    wait_for_server_status(compute, server_id, "ACTIVE", policy).await?;
    states.push(ShelveState::Unshelved);

    Ok(states)
}

/// Write the current date to the timestamp file and return what was written.
pub async fn write_timestamp(remote: &dyn RemoteExec) -> Result<String> {
    remote
        .exec_command(&format!("date > {TIMESTAMP_FILE}; sync"))
        .await?;
    remote.exec_command(&format!("cat {TIMESTAMP_FILE}")).await
}

/// Read the timestamp file and require it to equal `expected` exactly.
pub async fn check_timestamp(remote: &dyn RemoteExec, expected: &str) -> Result<()> {
    let got = remote.exec_command(&format!("cat {TIMESTAMP_FILE}")).await?;
    if got != expected {
        return Err(CloudError::VerificationFailed {
            what: TIMESTAMP_FILE.to_string(),
            expected: expected.to_string(),
            actual: got,
        });
    }
    Ok(())
}
