//! Basic server operations smoke scenario.
//!
//! - create a keypair and a permissive security group
//! - boot an instance
//! - attach a floating IP and log in over ssh
//! - check the metadata service reports the floating IP
//! - delete the instance

use super::{BootOptions, ScenarioContext, ScenarioOutcome};
use crate::adapters::RemoteExec;
use crate::eventual::{call_until_true, PollPolicy};
use crate::models::{FloatingIp, Keypair, Server};
use crate::waiters::wait_for_server_termination;
use common::error::{CloudError, Result};
use tracing::{debug, info, instrument};

/// Metadata endpoint that must answer with the instance's floating IP.
pub const METADATA_PUBLIC_IPV4_URL: &str = "http://169.254.169.254/latest/meta-data/public-ipv4";

#[derive(Debug, Clone)]
pub struct BasicOpsReport {
    pub server_id: String,
    pub floating_ip: Option<String>,
    pub ssh_verified: bool,
    pub metadata_verified: bool,
}

/// Boot, log in, check metadata, delete.
///
/// Image and flavor default to the configured ones and may be overridden per
/// run.
#[derive(Debug, Clone, Default)]
pub struct ServerBasicOpsScenario {
    pub image_ref: Option<String>,
    pub flavor_ref: Option<String>,
}

impl ServerBasicOpsScenario {
    pub async fn run(&self, mut ctx: ScenarioContext) -> Result<ScenarioOutcome<BasicOpsReport>> {
        let outcome = self.steps(&mut ctx).await;
        ctx.finish(outcome).await.map(ScenarioOutcome::Completed)
    }

    #[instrument(skip_all)]
    async fn steps(&self, ctx: &mut ScenarioContext) -> Result<BasicOpsReport> {
        let run_ssh = ctx.config().validation.run_validation;
        let image_ref = self
            .image_ref
            .clone()
            .unwrap_or_else(|| ctx.config().compute.image_ref.clone());
        debug!(target: "cloudcheck.scenario", image = %image_ref, run_ssh, "Starting basic ops");

        let keypair = ctx.create_keypair().await?;
        let security_group = ctx.create_security_group().await?;
        let server = ctx
            .create_server(BootOptions {
                image_ref: Some(image_ref),
                flavor_ref: self.flavor_ref.clone(),
                key_name: Some(keypair.name.clone()),
                security_groups: vec![security_group.name.clone()],
                ..BootOptions::default()
            })
            .await?;

        let mut report = BasicOpsReport {
            server_id: server.id.clone(),
            floating_ip: None,
            ssh_verified: false,
            metadata_verified: false,
        };

        if run_ssh {
            let (floating_ip, remote) = verify_ssh(ctx, &server, &keypair).await?;
            report.ssh_verified = true;

            if ctx.config().compute.metadata_service_enabled {
                verify_metadata(remote.as_ref(), &floating_ip.ip, ctx.policy()).await?;
                report.metadata_verified = true;
            }
            report.floating_ip = Some(floating_ip.ip);
        }

        let compute = ctx.clients().compute.clone();
        compute.delete_server(&server.id).await?;
        wait_for_server_termination(compute.as_ref(), &server.id, ctx.policy()).await?;
        info!(target: "cloudcheck.scenario", server_id = %server.id, "Server terminated");

        Ok(report)
    }
}

async fn verify_ssh(
    ctx: &mut ScenarioContext,
    server: &Server,
    keypair: &Keypair,
) -> Result<(FloatingIp, Box<dyn RemoteExec>)> {
    let floating_ip = ctx.create_floating_ip().await?;
    ctx.associate_floating_ip(&floating_ip, server).await?;

    let remote = ctx.remote_client(&floating_ip.ip, keypair)?;
    // Authentication check
    remote.exec_command("true").await?;
    Ok((floating_ip, remote))
}

/// Poll the metadata service from inside the instance until it reports
/// `floating_ip`.
///
/// Empty output means the service is not answering yet and is retried. A
/// non-empty answer that differs from `floating_ip` fails immediately with
/// `CloudError::VerificationFailed`. If the answer stays empty past the
/// deadline the result is `CloudError::Timeout` naming the endpoint.
pub async fn verify_metadata(
    remote: &dyn RemoteExec,
    floating_ip: &str,
    policy: PollPolicy,
) -> Result<()> {
    let command = format!("curl {METADATA_PUBLIC_IPV4_URL}");
    let command = command.as_str();

    let converged = call_until_true(
        move || async move {
            let output = remote.exec_command(command).await?;
            let result = output.trim();
            if result.is_empty() {
                return Ok(false);
            }
            if result != floating_ip {
                return Err(CloudError::VerificationFailed {
                    what: format!("output of \"{command}\""),
                    expected: floating_ip.to_string(),
                    actual: result.to_string(),
                });
            }
            Ok(true)
        },
        policy.timeout,
        policy.interval,
    )
    .await?;

    if converged {
        info!(target: "cloudcheck.scenario", "Metadata verification succeeded");
        Ok(())
    } else {
        Err(CloudError::Timeout {
            condition: format!("metadata on server; {METADATA_PUBLIC_IPV4_URL} is empty"),
            waited: policy.timeout,
        })
    }
}
