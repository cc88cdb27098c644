//! Compute API client.
//!
//! Also serves the floating IP calls through the compute proxy endpoints, so
//! one client backs both [`ComputeApi`] and [`NetworkApi`].

use super::http::ApiClient;
use crate::adapters::{ComputeApi, NetworkApi};
use crate::models::{
    from_envelope, FloatingIp, Keypair, SecurityGroup, SecurityGroupRule, Server,
    ServerCreateRequest,
};
use async_trait::async_trait;
use common::error::Result;
use common::secret::SecretString;
use serde_json::{json, Value};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct ComputeClient {
    api: ApiClient,
}

impl ComputeClient {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }

    async fn server_action(&self, server_id: &str, action: Value) -> Result<()> {
        self.api
            .post(&format!("/servers/{server_id}/action"), &action)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    async fn create_keypair(&self, name: &str) -> Result<Keypair> {
        let payload = self
            .api
            .post("/os-keypairs", &json!({"keypair": {"name": name}}))
            .await?;
        from_envelope(payload, "keypair")
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        self.api.delete(&format!("/os-keypairs/{name}")).await
    }

    async fn create_security_group(&self, name: &str, description: &str) -> Result<SecurityGroup> {
        let body = json!({
            "security_group": {"name": name, "description": description}
        });
        let payload = self.api.post("/os-security-groups", &body).await?;
        from_envelope(payload, "security_group")
    }

    async fn create_security_group_rule(&self, rule: &SecurityGroupRule) -> Result<()> {
        let body = json!({ "security_group_rule": rule });
        self.api
            .post("/os-security-group-rules", &body)
            .await
            .map(|_| ())
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.api
            .delete(&format!("/os-security-groups/{group_id}"))
            .await
    }

    #[instrument(skip_all, fields(name = %request.name))]
    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Server> {
        let payload = self
            .api
            .post("/servers", &json!({ "server": request }))
            .await?;
        let server: Server = from_envelope(payload, "server")?;
        debug!(target: "cloudcheck.compute", server_id = %server.id, "Boot accepted");
        Ok(server)
    }

    async fn get_server(&self, server_id: &str) -> Result<Server> {
        let payload = self.api.get(&format!("/servers/{server_id}")).await?;
        from_envelope(payload, "server")
    }

    async fn delete_server(&self, server_id: &str) -> Result<()> {
        self.api.delete(&format!("/servers/{server_id}")).await
    }

    async fn shelve_server(&self, server_id: &str) -> Result<()> {
        self.server_action(server_id, json!({"shelve": null})).await
    }

    async fn shelve_offload_server(&self, server_id: &str) -> Result<()> {
        self.server_action(server_id, json!({"shelveOffload": null}))
            .await
    }

    async fn unshelve_server(&self, server_id: &str) -> Result<()> {
        self.server_action(server_id, json!({"unshelve": null})).await
    }
}

#[async_trait]
impl NetworkApi for ComputeClient {
    async fn create_floating_ip(&self, pool: Option<&str>) -> Result<FloatingIp> {
        let body = match pool {
            Some(pool) => json!({ "pool": pool }),
            None => json!({}),
        };
        let payload = self.api.post("/os-floating-ips", &body).await?;
        from_envelope(payload, "floating_ip")
    }

    async fn associate_floating_ip(&self, address: &str, server_id: &str) -> Result<()> {
        self.server_action(server_id, json!({"addFloatingIp": {"address": address}}))
            .await
    }

    async fn delete_floating_ip(&self, floating_ip_id: &str) -> Result<()> {
        self.api
            .delete(&format!("/os-floating-ips/{floating_ip_id}"))
            .await
    }
}
