//! Block storage API client.

use super::http::ApiClient;
use crate::adapters::VolumeApi;
use crate::models::{from_envelope, Volume, VolumeCreateRequest};
use async_trait::async_trait;
use common::error::Result;
use common::secret::SecretString;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct VolumeClient {
    api: ApiClient,
}

impl VolumeClient {
    pub fn new(base_url: &str, token: SecretString) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl VolumeApi for VolumeClient {
    async fn create_volume(&self, request: &VolumeCreateRequest) -> Result<Volume> {
        let payload = self
            .api
            .post("/volumes", &json!({ "volume": request }))
            .await?;
        from_envelope(payload, "volume")
    }

    async fn get_volume(&self, volume_id: &str) -> Result<Volume> {
        let payload = self.api.get(&format!("/volumes/{volume_id}")).await?;
        from_envelope(payload, "volume")
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<()> {
        self.api.delete(&format!("/volumes/{volume_id}")).await
    }
}
