//! Credential provisioning over both identity API versions.
//!
//! [`CredsClient`] is the single interface scenario setup uses to create
//! projects, users and role assignments, whatever the identity version of the
//! deployment. It is bound to the admin identity client it was built from, not
//! to the credentials it produces.
//!
//! The only version dispatch happens in [`get_creds_client`]; everything else
//! goes through the trait.

mod model;
mod provision;
mod v2;
mod v3;

pub use model::{Credentials, V2Credentials, V3Credentials};
pub use provision::provision_isolated_credentials;
pub use v2::V2CredsClient;
pub use v3::V3CredsClient;

use crate::adapters::{IdentityAdapter, IdentityApi};
use crate::models::{from_envelope, unwrap_list, Project, Role, User};
use async_trait::async_trait;
use common::error::{CloudError, Result};
use common::secret::SecretString;
use common::types::IdentityVersion;
use std::sync::Arc;
use tracing::{debug, info};

/// Version-independent credential management.
#[async_trait]
pub trait CredsClient: Send + Sync {
    /// The shared identity operations of the wrapped client.
    fn identity(&self) -> &dyn IdentityApi;

    fn identity_version(&self) -> IdentityVersion;

    async fn create_project(&self, name: &str, description: &str) -> Result<Project>;

    async fn delete_project(&self, project_id: &str) -> Result<()>;

    /// Shape the version-specific credentials for `user` scoped to `project`.
    ///
    /// Pure data shaping, no network call.
    fn get_credentials(
        &self,
        user: &User,
        project: &Project,
        password: &SecretString,
    ) -> Credentials;

    /// Create a user in an existing project.
    async fn create_user(
        &self,
        username: &str,
        password: &SecretString,
        project: &Project,
        email: &str,
    ) -> Result<User> {
        let payload = self
            .identity()
            .create_user(username, password, &project.id, email)
            .await?;
        let user: User = from_envelope(payload, "user")?;
        info!(
            target: "cloudcheck.credentials",
            user_id = %user.id,
            project_id = %project.id,
            "Created user"
        );
        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.identity().delete_user(user_id).await
    }

    /// Look up a role by name. A miss is `Ok(None)`, not an error.
    async fn check_role_exists(&self, role_name: &str) -> Result<Option<Role>> {
        let payload = self.identity().list_roles().await?;
        for item in unwrap_list(payload, "roles")? {
            let role: Role = serde_json::from_value(item)?;
            if role.name == role_name {
                return Ok(Some(role));
            }
        }
        Ok(None)
    }

    /// Create the role unless one with this name already exists.
    async fn create_user_role(&self, role_name: &str) -> Result<()> {
        if self.check_role_exists(role_name).await?.is_none() {
            self.identity().create_role(role_name).await?;
            info!(target: "cloudcheck.credentials", role = role_name, "Created role");
        }
        Ok(())
    }

    /// Grant the named role to `user` on `project`.
    ///
    /// Fails with `CloudError::NotFound` if no role has that name. An
    /// assignment that already exists is not an error.
    async fn assign_user_role(
        &self,
        user: &User,
        project: &Project,
        role_name: &str,
    ) -> Result<()> {
        let role = self
            .check_role_exists(role_name)
            .await?
            .ok_or_else(|| CloudError::NotFound(format!("No \"{role_name}\" role found")))?;

        match self
            .identity()
            .assign_user_role(&project.id, &user.id, &role.id)
            .await
        {
            Ok(()) => Ok(()),
            Err(CloudError::Conflict(_)) => {
                debug!(
                    target: "cloudcheck.credentials",
                    role_id = %role.id,
                    project_id = %project.id,
                    user_id = %user.id,
                    "Role already assigned"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Build the credentials client matching the adapter's identity version.
///
/// `project_domain_name` is required for v3 and ignored for v2.
pub async fn get_creds_client(
    adapter: &IdentityAdapter,
    project_domain_name: Option<&str>,
) -> Result<Arc<dyn CredsClient>> {
    match adapter {
        IdentityAdapter::V2 { identity, tenants } => Ok(Arc::new(V2CredsClient::new(
            identity.clone(),
            tenants.clone(),
        ))),
        IdentityAdapter::V3 { identity, projects } => {
            let domain_name = project_domain_name.ok_or_else(|| {
                CloudError::InvalidConfiguration(
                    "A project domain name is required for the v3 identity API".to_string(),
                )
            })?;
            let client =
                V3CredsClient::new(identity.clone(), projects.clone(), domain_name).await?;
            Ok(Arc::new(client))
        }
    }
}
