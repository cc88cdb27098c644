//! Suite configuration loaded from `CLOUDCHECK_*` environment variables.

use common::config::LoggingConfig;
use common::secret::SecretString;
use common::types::IdentityVersion;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// Admin identity used to provision test credentials.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub version: IdentityVersion,
    pub auth_url: String,
    pub admin_username: String,
    pub admin_password: SecretString,
    pub admin_project: String,
    /// Domain for admin login and for provisioned projects (v3 only).
    pub admin_domain: String,
    /// Roles granted to the per-scenario user.
    pub member_roles: Vec<String>,
}

/// Service endpoints, already including the API version path.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub compute_url: String,
    pub volume_url: String,
}

/// Compute behaviour knobs.
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    pub image_ref: String,
    pub flavor_ref: String,
    pub build_timeout: Duration,
    pub build_interval: Duration,
    /// Seconds before a shelved server is offloaded automatically.
    /// Negative means never; the scenario offloads explicitly.
    pub shelved_offload_time: i64,
    pub use_floatingip_for_ssh: bool,
    pub floating_ip_pool: Option<String>,
    pub shelve_enabled: bool,
    pub metadata_service_enabled: bool,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            image_ref: String::new(),
            flavor_ref: String::new(),
            build_timeout: Duration::from_secs(300),
            build_interval: Duration::from_secs(1),
            shelved_offload_time: 0,
            use_floatingip_for_ssh: true,
            floating_ip_pool: None,
            shelve_enabled: true,
            metadata_service_enabled: true,
        }
    }
}

/// Volume knobs.
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    /// Size in GiB for volumes created by scenarios.
    pub volume_size: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { volume_size: 1 }
    }
}

/// Remote validation over ssh.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub run_validation: bool,
    pub ssh_user: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            run_validation: true,
            ssh_user: "cirros".to_string(),
        }
    }
}

/// The subset of configuration the scenario orchestrator consumes.
#[derive(Debug, Clone, Default)]
pub struct ScenarioConfig {
    pub compute: ComputeConfig,
    pub volume: VolumeConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identity: IdentityConfig,
    pub endpoints: EndpointConfig,
    pub scenario: ScenarioConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let identity = IdentityConfig {
            version: parse_or(vars, "CLOUDCHECK_IDENTITY_VERSION", IdentityVersion::V3)?,
            auth_url: required(vars, "CLOUDCHECK_AUTH_URL")?,
            admin_username: required(vars, "CLOUDCHECK_ADMIN_USERNAME")?,
            admin_password: SecretString::from(required(vars, "CLOUDCHECK_ADMIN_PASSWORD")?),
            admin_project: required(vars, "CLOUDCHECK_ADMIN_PROJECT")?,
            admin_domain: vars
                .get("CLOUDCHECK_ADMIN_DOMAIN")
                .cloned()
                .unwrap_or_else(|| "Default".to_string()),
            member_roles: role_list(vars, "CLOUDCHECK_MEMBER_ROLES")?,
        };

        let endpoints = EndpointConfig {
            compute_url: required(vars, "CLOUDCHECK_COMPUTE_URL")?,
            volume_url: required(vars, "CLOUDCHECK_VOLUME_URL")?,
        };

        let defaults = ComputeConfig::default();
        let compute = ComputeConfig {
            image_ref: required(vars, "CLOUDCHECK_IMAGE_REF")?,
            flavor_ref: required(vars, "CLOUDCHECK_FLAVOR_REF")?,
            build_timeout: parse_or(vars, "CLOUDCHECK_BUILD_TIMEOUT", 300u64)
                .map(Duration::from_secs)?,
            build_interval: parse_or(vars, "CLOUDCHECK_BUILD_INTERVAL", 1u64)
                .map(Duration::from_secs)?,
            shelved_offload_time: parse_or(vars, "CLOUDCHECK_SHELVED_OFFLOAD_TIME", 0i64)?,
            use_floatingip_for_ssh: parse_or(
                vars,
                "CLOUDCHECK_USE_FLOATINGIP_FOR_SSH",
                defaults.use_floatingip_for_ssh,
            )?,
            floating_ip_pool: vars.get("CLOUDCHECK_FLOATING_IP_POOL").cloned(),
            shelve_enabled: parse_or(vars, "CLOUDCHECK_SHELVE_ENABLED", defaults.shelve_enabled)?,
            metadata_service_enabled: parse_or(
                vars,
                "CLOUDCHECK_METADATA_SERVICE_ENABLED",
                defaults.metadata_service_enabled,
            )?,
        };

        if compute.build_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "CLOUDCHECK_BUILD_INTERVAL".to_string(),
                message: "must be at least 1 second".to_string(),
            });
        }

        let volume = VolumeConfig {
            volume_size: parse_or(vars, "CLOUDCHECK_VOLUME_SIZE", 1u32)?,
        };

        let validation = ValidationConfig {
            run_validation: parse_or(vars, "CLOUDCHECK_RUN_VALIDATION", true)?,
            ssh_user: vars
                .get("CLOUDCHECK_SSH_USER")
                .cloned()
                .unwrap_or_else(|| ValidationConfig::default().ssh_user),
        };

        let logging = LoggingConfig {
            json_logs: parse_or(vars, "CLOUDCHECK_LOG_JSON", false)?,
            ..LoggingConfig::default()
        };

        Ok(Config {
            identity,
            endpoints,
            scenario: ScenarioConfig {
                compute,
                volume,
                validation,
            },
            logging,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Comma-separated role names, `Member` when unset.
fn role_list(vars: &HashMap<String, String>, name: &str) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(vec!["Member".to_string()]);
    };
    let roles: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if roles.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: "at least one role is required".to_string(),
        });
    }
    Ok(roles)
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}
