//! Scenario orchestration.
//!
//! A scenario is a strictly sequential workflow over real cloud resources.
//! [`ScenarioContext`] owns the clients, the poll policy and the
//! [`CleanupStack`]; its helpers allocate a resource, register its release
//! action, and wait for it to become usable before returning. Scenarios end
//! with [`ScenarioContext::finish`], which runs cleanup on every exit path.

mod basic_ops;
mod cleanup;
mod shelve;

pub use basic_ops::{
    verify_metadata, BasicOpsReport, ServerBasicOpsScenario, METADATA_PUBLIC_IPV4_URL,
};
pub use cleanup::{CleanupFailure, CleanupStack};
pub use shelve::{
    check_timestamp, shelve_then_unshelve_server, write_timestamp, ShelveReport, ShelveScenario,
    ShelveState,
};

use crate::adapters::{
    ComputeApi, NetworkApi, RemoteExec, RemoteExecFactory, RemoteTarget, VolumeApi,
};
use crate::config::ScenarioConfig;
use crate::credentials::{provision_isolated_credentials, Credentials, CredsClient};
use crate::eventual::PollPolicy;
use crate::models::{
    BlockDeviceMapping, FloatingIp, Keypair, NamedRef, SecurityGroup, SecurityGroupRule, Server,
    ServerCreateRequest, Volume, VolumeCreateRequest,
};
use crate::waiters::{wait_for_server_status, wait_for_server_termination, wait_for_volume_status};
use common::error::{CloudError, Result};
use common::types::rand_name;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of a scenario that may be skipped by configuration.
#[derive(Debug)]
pub enum ScenarioOutcome<T> {
    Completed(T),
    Skipped(String),
}

impl<T> ScenarioOutcome<T> {
    /// The report of a completed scenario.
    pub fn completed(self) -> Option<T> {
        match self {
            ScenarioOutcome::Completed(report) => Some(report),
            ScenarioOutcome::Skipped(_) => None,
        }
    }
}

/// Cloud API collaborators a scenario drives.
#[derive(Clone)]
pub struct ScenarioClients {
    pub compute: Arc<dyn ComputeApi>,
    pub network: Arc<dyn NetworkApi>,
    pub volume: Arc<dyn VolumeApi>,
    pub remote: Arc<dyn RemoteExecFactory>,
}

/// What to boot, on top of the configured flavor.
#[derive(Debug, Clone, Default)]
pub struct BootOptions {
    pub image_ref: Option<String>,
    pub flavor_ref: Option<String>,
    pub key_name: Option<String>,
    pub security_groups: Vec<String>,
    pub block_device_mapping: Vec<BlockDeviceMapping>,
}

/// Per-scenario state: clients, settings and the cleanup stack.
pub struct ScenarioContext {
    clients: ScenarioClients,
    config: ScenarioConfig,
    policy: PollPolicy,
    cleanup: CleanupStack,
    credentials: Option<Credentials>,
}

impl ScenarioContext {
    pub fn new(clients: ScenarioClients, config: ScenarioConfig) -> Self {
        let policy = PollPolicy::from_compute(&config.compute);
        Self {
            clients,
            config,
            policy,
            cleanup: CleanupStack::new(),
            credentials: None,
        }
    }

    /// Provision a throwaway project and user, then build the scenario
    /// clients from them with `connect`.
    ///
    /// The project and user sit at the bottom of the cleanup stack, so
    /// [`finish`](Self::finish) deletes them after every resource the
    /// scenario created with their token. If provisioning or `connect`
    /// fails, whatever was provisioned is released before the error is
    /// returned.
    #[instrument(skip_all, fields(roles = ?roles))]
    pub async fn with_isolated_credentials<F, Fut>(
        creds_client: Arc<dyn CredsClient>,
        roles: &[&str],
        config: ScenarioConfig,
        connect: F,
    ) -> Result<Self>
    where
        F: FnOnce(Credentials) -> Fut,
        Fut: Future<Output = Result<ScenarioClients>>,
    {
        let mut cleanup = CleanupStack::new();
        let provisioned =
            provision_isolated_credentials(creds_client, "scenario", roles, &mut cleanup).await;
        let credentials = match provisioned {
            Ok(credentials) => credentials,
            Err(e) => {
                release_all(cleanup).await;
                return Err(e);
            }
        };

        let clients = match connect(credentials.clone()).await {
            Ok(clients) => clients,
            Err(e) => {
                release_all(cleanup).await;
                return Err(e);
            }
        };

        info!(
            target: "cloudcheck.scenario",
            identity = %credentials.identity_version(),
            "Scenario running with isolated credentials"
        );

        let policy = PollPolicy::from_compute(&config.compute);
        Ok(Self {
            clients,
            config,
            policy,
            cleanup,
            credentials: Some(credentials),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    #[must_use]
    pub fn clients(&self) -> &ScenarioClients {
        &self.clients
    }

    /// Credentials the scenario runs as, when provisioned per scenario.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    #[instrument(skip(self))]
    pub async fn create_keypair(&mut self) -> Result<Keypair> {
        let name = rand_name("scenario-keypair");
        let keypair = self.clients.compute.create_keypair(&name).await?;

        let compute = self.clients.compute.clone();
        let key_name = keypair.name.clone();
        self.cleanup
            .push(format!("delete keypair {key_name}"), move || async move {
                compute.delete_keypair(&key_name).await
            });

        Ok(keypair)
    }

    /// Create a security group allowing inbound SSH and ping.
    #[instrument(skip(self))]
    pub async fn create_security_group(&mut self) -> Result<SecurityGroup> {
        let name = rand_name("scenario-secgroup");
        let group = self
            .clients
            .compute
            .create_security_group(&name, &format!("{name} description"))
            .await?;

        let compute = self.clients.compute.clone();
        let group_id = group.id.clone();
        self.cleanup
            .push(format!("delete security group {group_id}"), move || async move {
                compute.delete_security_group(&group_id).await
            });

        for rule in [
            SecurityGroupRule::ssh(&group.id),
            SecurityGroupRule::ping(&group.id),
        ] {
            self.clients.compute.create_security_group_rule(&rule).await?;
        }

        Ok(group)
    }

    /// Boot a server and wait for it to become `ACTIVE`.
    ///
    /// Cleanup deletes the server and waits for it to disappear, so volumes
    /// registered earlier are detached by the time they are deleted.
    #[instrument(skip(self, options))]
    pub async fn create_server(&mut self, options: BootOptions) -> Result<Server> {
        let request = ServerCreateRequest {
            name: rand_name("scenario-server"),
            image_ref: options.image_ref,
            flavor_ref: options
                .flavor_ref
                .unwrap_or_else(|| self.config.compute.flavor_ref.clone()),
            key_name: options.key_name,
            security_groups: options
                .security_groups
                .into_iter()
                .map(|name| NamedRef { name })
                .collect(),
            block_device_mapping: options.block_device_mapping,
        };

        let server = self.clients.compute.create_server(&request).await?;
        info!(target: "cloudcheck.scenario", server_id = %server.id, "Server requested");

        let compute = self.clients.compute.clone();
        let server_id = server.id.clone();
        let policy = self.policy;
        self.cleanup
            .push(format!("delete server {server_id}"), move || async move {
                compute.delete_server(&server_id).await?;
                wait_for_server_termination(compute.as_ref(), &server_id, policy).await
            });

        wait_for_server_status(self.clients.compute.as_ref(), &server.id, "ACTIVE", self.policy)
            .await
    }

    /// Create a volume and wait for it to become `available`.
    #[instrument(skip(self))]
    pub async fn create_volume(&mut self, size: u32, image_ref: Option<String>) -> Result<Volume> {
        let request = VolumeCreateRequest {
            name: rand_name("scenario-volume"),
            size,
            image_ref,
        };
        let volume = self.clients.volume.create_volume(&request).await?;

        let volumes = self.clients.volume.clone();
        let volume_id = volume.id.clone();
        self.cleanup
            .push(format!("delete volume {volume_id}"), move || async move {
                volumes.delete_volume(&volume_id).await
            });

        wait_for_volume_status(self.clients.volume.as_ref(), &volume.id, "available", self.policy)
            .await
    }

    #[instrument(skip(self))]
    pub async fn create_floating_ip(&mut self) -> Result<FloatingIp> {
        let pool = self.config.compute.floating_ip_pool.clone();
        let floating_ip = self
            .clients
            .network
            .create_floating_ip(pool.as_deref())
            .await?;

        let network = self.clients.network.clone();
        let floating_ip_id = floating_ip.id.clone();
        self.cleanup
            .push(format!("delete floating ip {floating_ip_id}"), move || async move {
                network.delete_floating_ip(&floating_ip_id).await
            });

        Ok(floating_ip)
    }

    pub async fn associate_floating_ip(
        &self,
        floating_ip: &FloatingIp,
        server: &Server,
    ) -> Result<()> {
        self.clients
            .network
            .associate_floating_ip(&floating_ip.ip, &server.id)
            .await
    }

    /// Address to reach `server` on: the floating IP if one is given,
    /// otherwise its first fixed address.
    pub fn ssh_address(&self, server: &Server, floating_ip: Option<&FloatingIp>) -> Result<String> {
        match floating_ip {
            Some(fip) => Ok(fip.ip.clone()),
            None => server.first_address().map(str::to_string).ok_or_else(|| {
                CloudError::MalformedResponse(format!("server {} has no address", server.id))
            }),
        }
    }

    /// Open a remote session as the configured ssh user.
    pub fn remote_client(&self, address: &str, keypair: &Keypair) -> Result<Box<dyn RemoteExec>> {
        self.clients.remote.connect(&RemoteTarget {
            address: address.to_string(),
            username: self.config.validation.ssh_user.clone(),
            private_key: keypair.private_key.clone(),
        })
    }

    /// Run cleanup and hand back the scenario's outcome.
    ///
    /// A step failure wins over cleanup failures; a successful scenario with a
    /// failed cleanup reports the first cleanup error.
    pub async fn finish<T>(mut self, outcome: Result<T>) -> Result<T> {
        let failures = self.cleanup.run_all().await;

        match outcome {
            Err(e) => {
                if !failures.is_empty() {
                    warn!(
                        target: "cloudcheck.scenario",
                        failed = failures.len(),
                        "Cleanup also failed after scenario error"
                    );
                }
                Err(e)
            }
            Ok(value) => match failures.into_iter().next() {
                Some(first) => Err(first.error),
                None => Ok(value),
            },
        }
    }
}

async fn release_all(mut cleanup: CleanupStack) {
    let failures = cleanup.run_all().await;
    if !failures.is_empty() {
        warn!(
            target: "cloudcheck.scenario",
            failed = failures.len(),
            "Could not release isolated credentials after setup failure"
        );
    }
}
