//! Resource records exchanged with the cloud APIs.
//!
//! Identity records are normalized by the credentials client from nested or
//! flat payloads; compute, network and volume records are produced by the
//! adapters directly.

use common::error::CloudError;
use common::secret::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Accept ids serialized as either strings or integers.
///
/// Some compute deployments still expose integer ids for security groups and
/// floating IPs.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Return the object stored under `key` if the payload is wrapped, otherwise
/// the payload itself.
///
/// Identity deployments disagree on whether create calls answer
/// `{"user": {...}}` or the bare record; both shapes normalize to the same
/// value here.
#[must_use]
pub fn unwrap_envelope(payload: Value, key: &str) -> Value {
    match payload {
        Value::Object(mut map) if map.get(key).is_some_and(Value::is_object) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Take the list stored under `key`, or the payload itself if it is already
/// a list.
pub fn unwrap_list(payload: Value, key: &str) -> Result<Vec<Value>, CloudError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(CloudError::MalformedResponse(format!(
                "expected '{key}' list in response"
            ))),
        },
        _ => Err(CloudError::MalformedResponse(format!(
            "expected '{key}' list in response"
        ))),
    }
}

/// Deserialize a record after unwrapping an optional envelope.
pub fn from_envelope<T>(payload: Value, key: &str) -> Result<T, CloudError>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(serde_json::from_value(unwrap_envelope(payload, key))?)
}

/// Project (tenant in the v2 API).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
}

/// Identity user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "tenantId", alias = "default_project_id")]
    pub project_id: Option<String>,
}

/// Identity role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
}

/// Identity domain (v3 only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub name: String,
}

/// Compute keypair. The private key is only present on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct Keypair {
    pub name: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub private_key: Option<SecretString>,
}

/// Compute security group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecurityGroup {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

/// Ingress rule on a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroupRule {
    pub parent_group_id: String,
    pub ip_protocol: String,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: String,
}

impl SecurityGroupRule {
    /// Inbound SSH from anywhere.
    #[must_use]
    pub fn ssh(parent_group_id: &str) -> Self {
        Self {
            parent_group_id: parent_group_id.to_string(),
            ip_protocol: "tcp".to_string(),
            from_port: 22,
            to_port: 22,
            cidr: "0.0.0.0/0".to_string(),
        }
    }

    /// Inbound ICMP (ping) from anywhere.
    #[must_use]
    pub fn ping(parent_group_id: &str) -> Self {
        Self {
            parent_group_id: parent_group_id.to_string(),
            ip_protocol: "icmp".to_string(),
            from_port: -1,
            to_port: -1,
            cidr: "0.0.0.0/0".to_string(),
        }
    }
}

/// One address attached to a server network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerAddress {
    pub addr: String,
}

/// Compute instance as reported by the status query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub addresses: HashMap<String, Vec<ServerAddress>>,
}

impl Server {
    /// First fixed address on any network, used when no floating IP is
    /// attached.
    #[must_use]
    pub fn first_address(&self) -> Option<&str> {
        let mut networks: Vec<_> = self.addresses.keys().collect();
        networks.sort();
        networks
            .into_iter()
            .filter_map(|net| self.addresses.get(net))
            .flat_map(|addrs| addrs.iter())
            .map(|a| a.addr.as_str())
            .next()
    }
}

/// Named reference, e.g. a security group passed at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRef {
    pub name: String,
}

/// Block device mapping used to boot from a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub volume_id: String,
    pub delete_on_termination: bool,
}

impl BlockDeviceMapping {
    /// Root disk mapping that leaves the volume behind on termination.
    #[must_use]
    pub fn root_volume(volume_id: &str) -> Self {
        Self {
            device_name: "vda".to_string(),
            volume_id: volume_id.to_string(),
            delete_on_termination: false,
        }
    }
}

/// Boot request for a compute instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCreateRequest {
    pub name: String,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<NamedRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub block_device_mapping: Vec<BlockDeviceMapping>,
}

/// Floating IP allocated from an external pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FloatingIp {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub ip: String,
}

/// Block storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub size: Option<u32>,
}

/// Volume creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeCreateRequest {
    #[serde(rename = "display_name")]
    pub name: String,
    pub size: u32,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}
