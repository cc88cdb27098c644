//! Credentials client for the project/domain-based v3 identity API.

use super::{CredsClient, Credentials, V3Credentials};
use crate::adapters::{IdentityApi, IdentityV3Api};
use crate::models::{from_envelope, unwrap_list, Domain, Project, User};
use async_trait::async_trait;
use common::error::{CloudError, Result};
use common::secret::SecretString;
use common::types::IdentityVersion;
use std::sync::Arc;
use tracing::info;

/// Projects are created in one domain, resolved once at construction.
pub struct V3CredsClient {
    identity: Arc<dyn IdentityApi>,
    projects: Arc<dyn IdentityV3Api>,
    creds_domain: Domain,
}

impl V3CredsClient {
    /// Resolve `domain_name` and build the client.
    ///
    /// Fails with `CloudError::InvalidConfiguration` if no domain has that
    /// name; no other identity call is made in that case.
    pub async fn new(
        identity: Arc<dyn IdentityApi>,
        projects: Arc<dyn IdentityV3Api>,
        domain_name: &str,
    ) -> Result<Self> {
        let creds_domain = resolve_domain(projects.as_ref(), domain_name).await?;
        info!(
            target: "cloudcheck.credentials",
            domain_id = %creds_domain.id,
            domain = %creds_domain.name,
            "Resolved credentials domain"
        );

        Ok(Self {
            identity,
            projects,
            creds_domain,
        })
    }

    /// The domain provisioned projects live in.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.creds_domain
    }
}

async fn resolve_domain(projects: &dyn IdentityV3Api, domain_name: &str) -> Result<Domain> {
    let missing = || {
        CloudError::InvalidConfiguration(format!(
            "Configured domain {domain_name} could not be found"
        ))
    };

    let payload = match projects.list_domains(Some(domain_name)).await {
        Ok(payload) => payload,
        Err(CloudError::NotFound(_)) => return Err(missing()),
        Err(e) => return Err(e),
    };

    // Domain names are unique; the filtered listing holds at most one match
    for item in unwrap_list(payload, "domains")? {
        let domain: Domain = serde_json::from_value(item)?;
        if domain.name == domain_name {
            return Ok(domain);
        }
    }
    Err(missing())
}

#[async_trait]
impl CredsClient for V3CredsClient {
    fn identity(&self) -> &dyn IdentityApi {
        self.identity.as_ref()
    }

    fn identity_version(&self) -> IdentityVersion {
        IdentityVersion::V3
    }

    async fn create_project(&self, name: &str, description: &str) -> Result<Project> {
        let payload = self
            .projects
            .create_project(name, description, &self.creds_domain.id)
            .await?;
        let project: Project = from_envelope(payload, "project")?;
        info!(
            target: "cloudcheck.credentials",
            project_id = %project.id,
            domain_id = %self.creds_domain.id,
            "Created project"
        );
        Ok(project)
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.projects.delete_project(project_id).await
    }

    fn get_credentials(
        &self,
        user: &User,
        project: &Project,
        password: &SecretString,
    ) -> Credentials {
        Credentials::V3(V3Credentials {
            username: user.name.clone(),
            user_id: user.id.clone(),
            project_name: project.name.clone(),
            project_id: project.id.clone(),
            password: password.clone(),
            project_domain_name: self.creds_domain.name.clone(),
        })
    }
}
