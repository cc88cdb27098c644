//! Live cloud clients.
//!
//! These back the adapter traits with real HTTP and `ssh` calls. The
//! mock-backed suites never touch this module.

mod compute_client;
mod http;
mod identity_client;
mod ssh;
mod volume_client;

pub use compute_client::ComputeClient;
pub use http::{ApiClient, AUTH_TOKEN_HEADER};
pub use identity_client::{
    admin_token, identity_adapter, issue_token_for, issue_token_v2, issue_token_v3,
    IdentityV2Client, IdentityV3Client,
};
pub use ssh::{SshExecutor, SshExecutorFactory};
pub use volume_client::VolumeClient;

use crate::adapters::IdentityAdapter;
use crate::config::Config;
use crate::credentials::get_creds_client;
use crate::eventual::PollPolicy;
use crate::scenario::{ScenarioClients, ScenarioContext};
use common::error::Result;
use common::secret::SecretString;
use std::sync::Arc;
use tracing::info;

/// Admin-authenticated clients for one cloud.
#[derive(Clone)]
pub struct CloudSession {
    pub identity: IdentityAdapter,
    pub scenario: ScenarioClients,
}

/// Log in as the configured admin and build every client.
pub async fn connect(config: &Config) -> Result<CloudSession> {
    let token = admin_token(&config.identity).await?;
    let identity = identity_adapter(&config.identity, token.clone())?;

    let scenario = scenario_clients(config, token)?;

    info!(
        target: "cloudcheck.fixtures",
        identity = %identity.version(),
        compute_url = %config.endpoints.compute_url,
        volume_url = %config.endpoints.volume_url,
        "Connected to cloud"
    );

    Ok(CloudSession { identity, scenario })
}

/// Log in as admin, provision a throwaway project and user, and return a
/// scenario context whose clients act as that user.
///
/// The admin session is only used for provisioning and cleanup of the
/// credentials themselves.
pub async fn connect_isolated(config: &Config) -> Result<ScenarioContext> {
    let session = connect(config).await?;
    let creds_client =
        get_creds_client(&session.identity, Some(config.identity.admin_domain.as_str())).await?;
    let roles: Vec<&str> = config.identity.member_roles.iter().map(String::as_str).collect();

    ScenarioContext::with_isolated_credentials(
        creds_client,
        &roles,
        config.scenario.clone(),
        |credentials| async move {
            let token = issue_token_for(&config.identity.auth_url, &credentials).await?;
            scenario_clients(config, token)
        },
    )
    .await
}

fn scenario_clients(config: &Config, token: SecretString) -> Result<ScenarioClients> {
    let compute = Arc::new(ComputeClient::new(&config.endpoints.compute_url, token.clone())?);
    let volume = Arc::new(VolumeClient::new(&config.endpoints.volume_url, token)?);
    let ssh = SshExecutorFactory::new(PollPolicy::from_compute(&config.scenario.compute));

    Ok(ScenarioClients {
        compute: compute.clone(),
        network: compute,
        volume,
        remote: Arc::new(ssh),
    })
}
