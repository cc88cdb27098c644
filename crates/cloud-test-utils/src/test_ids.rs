//! Fixed test IDs for deterministic tests
//!
//! Mock-generated ids are sequential per mock (`server-1`, `server-2`, ...),
//! so the first resource of each kind has a predictable id.

// Compute
pub const TEST_SERVER_ID_1: &str = "server-1";
pub const TEST_SERVER_ID_2: &str = "server-2";
pub const TEST_SECURITY_GROUP_ID_1: &str = "secgroup-1";
pub const TEST_IMAGE_REF: &str = "cirros-0.6-x86_64";
pub const TEST_FLAVOR_REF: &str = "m1.tiny";

// Network
pub const TEST_FLOATING_IP_ID_1: &str = "fip-1";
pub const TEST_FLOATING_IP_1: &str = "172.24.4.1";
pub const TEST_FIXED_IP_PREFIX: &str = "10.0.0.";
/// Fixed address of the first server a mock compute boots.
pub const TEST_FIXED_IP_1: &str = "10.0.0.11";
pub const TEST_FLOATING_IP_POOL: &str = "public";

// Volume
pub const TEST_VOLUME_ID_1: &str = "volume-1";

// Identity
pub const TEST_DOMAIN_ID: &str = "default";
pub const TEST_DOMAIN_NAME: &str = "Default";
pub const TEST_ROLE_MEMBER: &str = "Member";
pub const TEST_ROLE_ADMIN: &str = "admin";

/// Deterministic `date` output the mock guest writes on the first call.
pub const TEST_TIMESTAMP_1: &str = "Thu Oct 15 12:00:01 UTC 2026\n";
