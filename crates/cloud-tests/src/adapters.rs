//! Collaborator interfaces consumed by the scenario core.
//!
//! The concrete HTTP implementations live in [`crate::fixtures`]; the
//! in-memory ones used by the mock-backed suites live in `cloud-test-utils`.

use crate::models::{
    FloatingIp, Keypair, SecurityGroup, SecurityGroupRule, Server, ServerCreateRequest, Volume,
    VolumeCreateRequest,
};
use async_trait::async_trait;
use common::error::Result;
use common::secret::SecretString;
use common::types::IdentityVersion;
use serde_json::Value;
use std::sync::Arc;

/// Identity operations shared by both API versions.
///
/// Payloads are returned as raw JSON because deployments disagree on whether
/// records are wrapped (`{"user": {...}}`) or flat. The credentials client
/// normalizes both shapes.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn create_user(
        &self,
        name: &str,
        password: &SecretString,
        project_id: &str,
        email: &str,
    ) -> Result<Value>;

    async fn delete_user(&self, user_id: &str) -> Result<()>;

    async fn create_role(&self, name: &str) -> Result<Value>;

    async fn list_roles(&self) -> Result<Value>;

    /// Grant `role_id` to `user_id` on `project_id`.
    ///
    /// Answers `CloudError::Conflict` when the assignment already exists.
    async fn assign_user_role(&self, project_id: &str, user_id: &str, role_id: &str) -> Result<()>;
}

/// Tenant operations of the v2 identity API.
#[async_trait]
pub trait IdentityV2Api: Send + Sync {
    async fn create_tenant(&self, name: &str, description: &str) -> Result<Value>;

    async fn delete_tenant(&self, tenant_id: &str) -> Result<()>;
}

/// Project and domain operations of the v3 identity API.
#[async_trait]
pub trait IdentityV3Api: Send + Sync {
    async fn create_project(&self, name: &str, description: &str, domain_id: &str) -> Result<Value>;

    async fn delete_project(&self, project_id: &str) -> Result<()>;

    /// List domains, optionally filtered by exact name.
    async fn list_domains(&self, name: Option<&str>) -> Result<Value>;
}

/// A version-specific identity client.
///
/// Holds the same client twice: once as the shared [`IdentityApi`] and once
/// as its version-specific extension.
#[derive(Clone)]
pub enum IdentityAdapter {
    V2 {
        identity: Arc<dyn IdentityApi>,
        tenants: Arc<dyn IdentityV2Api>,
    },
    V3 {
        identity: Arc<dyn IdentityApi>,
        projects: Arc<dyn IdentityV3Api>,
    },
}

impl IdentityAdapter {
    /// Wrap a v2 identity client.
    pub fn v2<T>(client: Arc<T>) -> Self
    where
        T: IdentityApi + IdentityV2Api + 'static,
    {
        IdentityAdapter::V2 {
            identity: client.clone(),
            tenants: client,
        }
    }

    /// Wrap a v3 identity client.
    pub fn v3<T>(client: Arc<T>) -> Self
    where
        T: IdentityApi + IdentityV3Api + 'static,
    {
        IdentityAdapter::V3 {
            identity: client.clone(),
            projects: client,
        }
    }

    #[must_use]
    pub fn version(&self) -> IdentityVersion {
        match self {
            IdentityAdapter::V2 { .. } => IdentityVersion::V2,
            IdentityAdapter::V3 { .. } => IdentityVersion::V3,
        }
    }
}

impl std::fmt::Debug for IdentityAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityAdapter")
            .field("version", &self.version())
            .finish()
    }
}

/// Compute API operations used by the scenarios.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn create_keypair(&self, name: &str) -> Result<Keypair>;

    async fn delete_keypair(&self, name: &str) -> Result<()>;

    async fn create_security_group(&self, name: &str, description: &str) -> Result<SecurityGroup>;

    async fn create_security_group_rule(&self, rule: &SecurityGroupRule) -> Result<()>;

    async fn delete_security_group(&self, group_id: &str) -> Result<()>;

    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Server>;

    /// Status query consumed by the polling waiters.
    async fn get_server(&self, server_id: &str) -> Result<Server>;

    async fn delete_server(&self, server_id: &str) -> Result<()>;

    async fn shelve_server(&self, server_id: &str) -> Result<()>;

    async fn shelve_offload_server(&self, server_id: &str) -> Result<()>;

    async fn unshelve_server(&self, server_id: &str) -> Result<()>;
}

/// Floating IP operations.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn create_floating_ip(&self, pool: Option<&str>) -> Result<FloatingIp>;

    async fn associate_floating_ip(&self, address: &str, server_id: &str) -> Result<()>;

    async fn delete_floating_ip(&self, floating_ip_id: &str) -> Result<()>;
}

/// Block storage operations.
#[async_trait]
pub trait VolumeApi: Send + Sync {
    async fn create_volume(&self, request: &VolumeCreateRequest) -> Result<Volume>;

    async fn get_volume(&self, volume_id: &str) -> Result<Volume>;

    async fn delete_volume(&self, volume_id: &str) -> Result<()>;
}

/// Where and as whom to run remote commands.
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    pub address: String,
    pub username: String,
    pub private_key: Option<SecretString>,
}

/// Synchronous-looking remote command execution on an instance.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run `command` and return its standard output.
    async fn exec_command(&self, command: &str) -> Result<String>;
}

/// Opens remote execution sessions.
pub trait RemoteExecFactory: Send + Sync {
    fn connect(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteExec>>;
}
