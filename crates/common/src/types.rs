//! Common data types for cloudcheck components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity API version exposed by the deployment under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityVersion {
    /// Tenant-based API without domains
    V2,
    /// Project/domain-based API
    V3,
}

impl fmt::Display for IdentityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityVersion::V2 => f.write_str("v2"),
            IdentityVersion::V3 => f.write_str("v3"),
        }
    }
}

impl FromStr for IdentityVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" | "v2.0" | "2" => Ok(IdentityVersion::V2),
            "v3" | "3" => Ok(IdentityVersion::V3),
            other => Err(format!("unknown identity version '{other}'")),
        }
    }
}

/// Build a unique resource name with the given prefix.
///
/// Names are unique across test runs so leaked resources from an aborted
/// run never collide with a fresh one.
#[must_use]
pub fn rand_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let short = suffix.get(..12).unwrap_or(&suffix);
    if prefix.is_empty() {
        format!("cloudcheck-{short}")
    } else {
        format!("{prefix}-{short}")
    }
}
