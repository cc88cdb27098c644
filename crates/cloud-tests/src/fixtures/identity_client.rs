//! Identity API clients (v2 tenants and v3 projects/domains).

use super::http::{build_http_client, check_response, ApiClient, DEFAULT_HTTP_TIMEOUT};
use crate::adapters::{IdentityAdapter, IdentityApi, IdentityV2Api, IdentityV3Api};
use crate::config::IdentityConfig;
use crate::credentials::Credentials;
use async_trait::async_trait;
use common::error::{CloudError, Result};
use common::secret::{ExposeSecret, SecretString};
use common::types::IdentityVersion;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};

/// Header the v3 API returns the issued token in.
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Issue a v2 token scoped to `tenant_name`.
#[instrument(skip(password))]
pub async fn issue_token_v2(
    auth_url: &str,
    username: &str,
    password: &SecretString,
    tenant_name: &str,
) -> Result<SecretString> {
    let url = format!("{}/tokens", auth_url.trim_end_matches('/'));
    let body = json!({
        "auth": {
            "passwordCredentials": {
                "username": username,
                "password": password.expose_secret(),
            },
            "tenantName": tenant_name,
        }
    });

    let http_client = build_http_client(DEFAULT_HTTP_TIMEOUT)?;
    let response = check_response(http_client.post(&url).json(&body).send().await?).await?;
    let payload: Value = response.json().await?;

    payload
        .pointer("/access/token/id")
        .and_then(Value::as_str)
        .map(SecretString::from)
        .ok_or_else(|| CloudError::MalformedResponse("missing access.token.id".to_string()))
}

/// Issue a v3 token scoped to `project_name` in `domain_name`.
#[instrument(skip(password))]
pub async fn issue_token_v3(
    auth_url: &str,
    username: &str,
    password: &SecretString,
    project_name: &str,
    domain_name: &str,
) -> Result<SecretString> {
    let url = format!("{}/auth/tokens", auth_url.trim_end_matches('/'));
    let body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": username,
                        "password": password.expose_secret(),
                        "domain": {"name": domain_name},
                    }
                }
            },
            "scope": {
                "project": {
                    "name": project_name,
                    "domain": {"name": domain_name},
                }
            }
        }
    });

    let http_client = build_http_client(DEFAULT_HTTP_TIMEOUT)?;
    let response = check_response(http_client.post(&url).json(&body).send().await?).await?;

    response
        .headers()
        .get(SUBJECT_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(SecretString::from)
        .ok_or_else(|| {
            CloudError::MalformedResponse(format!("missing {SUBJECT_TOKEN_HEADER} header"))
        })
}

/// Issue a token for provisioned credentials.
pub async fn issue_token_for(auth_url: &str, credentials: &Credentials) -> Result<SecretString> {
    match credentials {
        Credentials::V2(c) => {
            issue_token_v2(auth_url, &c.username, &c.password, &c.tenant_name).await
        }
        Credentials::V3(c) => {
            issue_token_v3(
                auth_url,
                &c.username,
                &c.password,
                &c.project_name,
                &c.project_domain_name,
            )
            .await
        }
    }
}

/// Log in as the configured admin.
pub async fn admin_token(config: &IdentityConfig) -> Result<SecretString> {
    let token = match config.version {
        IdentityVersion::V2 => {
            issue_token_v2(
                &config.auth_url,
                &config.admin_username,
                &config.admin_password,
                &config.admin_project,
            )
            .await?
        }
        IdentityVersion::V3 => {
            issue_token_v3(
                &config.auth_url,
                &config.admin_username,
                &config.admin_password,
                &config.admin_project,
                &config.admin_domain,
            )
            .await?
        }
    };
    info!(target: "cloudcheck.identity", version = %config.version, "Admin token issued");
    Ok(token)
}

/// Build the identity adapter matching the configured version.
pub fn identity_adapter(config: &IdentityConfig, token: SecretString) -> Result<IdentityAdapter> {
    Ok(match config.version {
        IdentityVersion::V2 => {
            IdentityAdapter::v2(Arc::new(IdentityV2Client::new(&config.auth_url, token)?))
        }
        IdentityVersion::V3 => {
            IdentityAdapter::v3(Arc::new(IdentityV3Client::new(&config.auth_url, token)?))
        }
    })
}

/// Client for the v2 identity admin API.
#[derive(Debug, Clone)]
pub struct IdentityV2Client {
    api: ApiClient,
}

impl IdentityV2Client {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl IdentityApi for IdentityV2Client {
    async fn create_user(
        &self,
        name: &str,
        password: &SecretString,
        project_id: &str,
        email: &str,
    ) -> Result<Value> {
        let body = json!({
            "user": {
                "name": name,
                "password": password.expose_secret(),
                "tenantId": project_id,
                "email": email,
                "enabled": true,
            }
        });
        self.api.post("/users", &body).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.api.delete(&format!("/users/{user_id}")).await
    }

    async fn create_role(&self, name: &str) -> Result<Value> {
        self.api
            .post("/OS-KSADM/roles", &json!({"role": {"name": name}}))
            .await
    }

    async fn list_roles(&self) -> Result<Value> {
        self.api.get("/OS-KSADM/roles").await
    }

    async fn assign_user_role(
        &self,
        project_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<()> {
        self.api
            .put(
                &format!("/tenants/{project_id}/users/{user_id}/roles/OS-KSADM/{role_id}"),
                None,
            )
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl IdentityV2Api for IdentityV2Client {
    async fn create_tenant(&self, name: &str, description: &str) -> Result<Value> {
        let body = json!({
            "tenant": {"name": name, "description": description, "enabled": true}
        });
        self.api.post("/tenants", &body).await
    }

    async fn delete_tenant(&self, tenant_id: &str) -> Result<()> {
        self.api.delete(&format!("/tenants/{tenant_id}")).await
    }
}

/// Client for the v3 identity API.
#[derive(Debug, Clone)]
pub struct IdentityV3Client {
    api: ApiClient,
}

impl IdentityV3Client {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl IdentityApi for IdentityV3Client {
    async fn create_user(
        &self,
        name: &str,
        password: &SecretString,
        project_id: &str,
        email: &str,
    ) -> Result<Value> {
        let body = json!({
            "user": {
                "name": name,
                "password": password.expose_secret(),
                "default_project_id": project_id,
                "email": email,
                "enabled": true,
            }
        });
        self.api.post("/users", &body).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.api.delete(&format!("/users/{user_id}")).await
    }

    async fn create_role(&self, name: &str) -> Result<Value> {
        self.api.post("/roles", &json!({"role": {"name": name}})).await
    }

    async fn list_roles(&self) -> Result<Value> {
        self.api.get("/roles").await
    }

    async fn assign_user_role(
        &self,
        project_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<()> {
        self.api
            .put(
                &format!("/projects/{project_id}/users/{user_id}/roles/{role_id}"),
                None,
            )
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl IdentityV3Api for IdentityV3Client {
    async fn create_project(
        &self,
        name: &str,
        description: &str,
        domain_id: &str,
    ) -> Result<Value> {
        let body = json!({
            "project": {
                "name": name,
                "description": description,
                "domain_id": domain_id,
                "enabled": true,
            }
        });
        self.api.post("/projects", &body).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.api.delete(&format!("/projects/{project_id}")).await
    }

    async fn list_domains(&self, name: Option<&str>) -> Result<Value> {
        match name {
            Some(name) => self.api.get_with_query("/domains", &[("name", name)]).await,
            None => self.api.get("/domains").await,
        }
    }
}
