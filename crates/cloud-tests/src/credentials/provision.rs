//! Isolated per-scenario credentials.

use super::{Credentials, CredsClient};
use crate::scenario::CleanupStack;
use common::error::Result;
use common::secret::SecretString;
use common::types::rand_name;
use std::sync::Arc;
use tracing::{info, instrument};

/// Create a fresh project and user, grant `roles`, and return credentials.
///
/// Roles are created if absent. Deletion of the user and then the project is
/// registered on `cleanup` as soon as each is created.
#[instrument(skip(client, cleanup))]
pub async fn provision_isolated_credentials(
    client: Arc<dyn CredsClient>,
    name_prefix: &str,
    roles: &[&str],
    cleanup: &mut CleanupStack,
) -> Result<Credentials> {
    let project_name = rand_name(&format!("{name_prefix}-project"));
    let project = client
        .create_project(&project_name, &format!("{name_prefix} test project"))
        .await?;
    {
        let client = client.clone();
        let project_id = project.id.clone();
        cleanup.push(format!("delete project {project_id}"), move || async move {
            client.delete_project(&project_id).await
        });
    }

    let username = rand_name(&format!("{name_prefix}-user"));
    let password = SecretString::from(rand_name("pass"));
    let email = format!("{username}@example.com");
    let user = client
        .create_user(&username, &password, &project, &email)
        .await?;
    {
        let client = client.clone();
        let user_id = user.id.clone();
        cleanup.push(format!("delete user {user_id}"), move || async move {
            client.delete_user(&user_id).await
        });
    }

    for role in roles {
        client.create_user_role(role).await?;
        client.assign_user_role(&user, &project, role).await?;
    }

    info!(
        target: "cloudcheck.credentials",
        version = %client.identity_version(),
        user_id = %user.id,
        project_id = %project.id,
        "Provisioned isolated credentials"
    );
    Ok(client.get_credentials(&user, &project, &password))
}
