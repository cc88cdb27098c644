//! Credentials client for the tenant-based v2 identity API.

use super::{CredsClient, Credentials, V2Credentials};
use crate::adapters::{IdentityApi, IdentityV2Api};
use crate::models::{from_envelope, Project, User};
use async_trait::async_trait;
use common::error::Result;
use common::secret::SecretString;
use common::types::IdentityVersion;
use std::sync::Arc;
use tracing::info;

/// In v2 a project is a tenant and there is no domain.
pub struct V2CredsClient {
    identity: Arc<dyn IdentityApi>,
    tenants: Arc<dyn IdentityV2Api>,
}

impl V2CredsClient {
    pub fn new(identity: Arc<dyn IdentityApi>, tenants: Arc<dyn IdentityV2Api>) -> Self {
        Self { identity, tenants }
    }
}

#[async_trait]
impl CredsClient for V2CredsClient {
    fn identity(&self) -> &dyn IdentityApi {
        self.identity.as_ref()
    }

    fn identity_version(&self) -> IdentityVersion {
        IdentityVersion::V2
    }

    async fn create_project(&self, name: &str, description: &str) -> Result<Project> {
        let payload = self.tenants.create_tenant(name, description).await?;
        let tenant: Project = from_envelope(payload, "tenant")?;
        info!(target: "cloudcheck.credentials", tenant_id = %tenant.id, "Created tenant");
        Ok(tenant)
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.tenants.delete_tenant(project_id).await
    }

    fn get_credentials(
        &self,
        user: &User,
        project: &Project,
        password: &SecretString,
    ) -> Credentials {
        Credentials::V2(V2Credentials {
            username: user.name.clone(),
            user_id: user.id.clone(),
            tenant_name: project.name.clone(),
            tenant_id: project.id.clone(),
            password: password.clone(),
        })
    }
}
