//! Materialized credentials for a provisioned user.

use common::secret::SecretString;
use common::types::IdentityVersion;

/// Credentials against the tenant-based v2 identity API.
#[derive(Debug, Clone)]
pub struct V2Credentials {
    pub username: String,
    pub user_id: String,
    pub tenant_name: String,
    pub tenant_id: String,
    pub password: SecretString,
}

/// Credentials against the project/domain-based v3 identity API.
#[derive(Debug, Clone)]
pub struct V3Credentials {
    pub username: String,
    pub user_id: String,
    pub project_name: String,
    pub project_id: String,
    pub password: SecretString,
    pub project_domain_name: String,
}

/// Credentials for a user scoped to one project.
///
/// Immutable once built. Only the v3 variant carries a domain.
#[derive(Debug, Clone)]
pub enum Credentials {
    V2(V2Credentials),
    V3(V3Credentials),
}

impl Credentials {
    #[must_use]
    pub fn identity_version(&self) -> IdentityVersion {
        match self {
            Credentials::V2(_) => IdentityVersion::V2,
            Credentials::V3(_) => IdentityVersion::V3,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Credentials::V2(c) => &c.username,
            Credentials::V3(c) => &c.username,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Credentials::V2(c) => &c.user_id,
            Credentials::V3(c) => &c.user_id,
        }
    }

    /// Project name (the tenant name for v2).
    #[must_use]
    pub fn project_name(&self) -> &str {
        match self {
            Credentials::V2(c) => &c.tenant_name,
            Credentials::V3(c) => &c.project_name,
        }
    }

    /// Project id (the tenant id for v2).
    #[must_use]
    pub fn project_id(&self) -> &str {
        match self {
            Credentials::V2(c) => &c.tenant_id,
            Credentials::V3(c) => &c.project_id,
        }
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        match self {
            Credentials::V2(c) => &c.password,
            Credentials::V3(c) => &c.password,
        }
    }

    /// Domain of the scoped project; always `None` for v2.
    #[must_use]
    pub fn project_domain_name(&self) -> Option<&str> {
        match self {
            Credentials::V2(_) => None,
            Credentials::V3(c) => Some(&c.project_domain_name),
        }
    }
}
