//! Scenario test harness.
//!
//! Builds a `ScenarioContext` backed by the mocks, all recording into one
//! [`CallLog`], and keeps handles to the mocks for assertions after the
//! context has been consumed by a scenario run.

use crate::call_log::CallLog;
use crate::mock_compute::MockCompute;
use crate::mock_identity::MockIdentity;
use crate::mock_network::MockNetwork;
use crate::mock_remote::MockRemoteExecFactory;
use crate::mock_volume::MockVolume;
use crate::test_ids::{TEST_DOMAIN_NAME, TEST_FLAVOR_REF, TEST_IMAGE_REF, TEST_ROLE_MEMBER};
use cloud_tests::config::ScenarioConfig;
use cloud_tests::credentials::get_creds_client;
use cloud_tests::scenario::{ScenarioClients, ScenarioContext};
use common::config::LoggingConfig;
use std::sync::Arc;
use std::time::Duration;

/// Build timeout used by harness contexts.
pub const TEST_BUILD_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval used by harness contexts.
pub const TEST_BUILD_INTERVAL: Duration = Duration::from_secs(1);

/// Install a test-friendly tracing subscriber once per process.
pub fn init_test_tracing() {
    common::logging::init_tracing(&LoggingConfig::default());
}

/// Scenario configuration pointing at the fixed test image and flavor.
#[must_use]
pub fn test_scenario_config() -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.compute.image_ref = TEST_IMAGE_REF.to_string();
    config.compute.flavor_ref = TEST_FLAVOR_REF.to_string();
    config.compute.build_timeout = TEST_BUILD_TIMEOUT;
    config.compute.build_interval = TEST_BUILD_INTERVAL;
    config
}

/// Builder for a mock-backed [`ScenarioContext`].
///
/// # Example
///
/// ```rust,ignore
/// let harness = TestContextBuilder::new()
///     .configure(|c| c.validation.run_validation = false)
///     .build();
/// let outcome = ServerBasicOpsScenario::default().run(harness.ctx).await;
/// assert_eq!(harness.mocks.compute.server_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct TestContextBuilder {
    config: Option<ScenarioConfig>,
    compute: Option<MockCompute>,
    network: Option<MockNetwork>,
    volume: Option<MockVolume>,
    remote: Option<MockRemoteExecFactory>,
    identity: Option<MockIdentity>,
}

impl TestContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the scenario configuration.
    #[must_use]
    pub fn configure(mut self, f: impl FnOnce(&mut ScenarioConfig)) -> Self {
        let mut config = self.config.take().unwrap_or_else(test_scenario_config);
        f(&mut config);
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_compute(mut self, compute: MockCompute) -> Self {
        self.compute = Some(compute);
        self
    }

    #[must_use]
    pub fn with_network(mut self, network: MockNetwork) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: MockVolume) -> Self {
        self.volume = Some(volume);
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: MockRemoteExecFactory) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Identity service used by [`build_isolated`](Self::build_isolated).
    #[must_use]
    pub fn with_identity(mut self, identity: MockIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Wire the mocks to one shared call log and build the context.
    pub fn build(self) -> TestHarness {
        let (clients, config, mocks) = self.wire();
        TestHarness {
            ctx: ScenarioContext::new(clients, config),
            mocks,
        }
    }

    /// Like [`build`](Self::build), but the context first provisions a
    /// project and user on the v3 mock identity service, granted
    /// [`TEST_ROLE_MEMBER`].
    ///
    /// # Panics
    ///
    /// When the mock identity service refuses to provision.
    pub async fn build_isolated(self) -> TestHarness {
        let (clients, config, mocks) = self.wire();

        let creds_client = get_creds_client(&mocks.identity.v3_adapter(), Some(TEST_DOMAIN_NAME))
            .await
            .expect("mock identity should hand out a creds client");
        let ctx = ScenarioContext::with_isolated_credentials(
            creds_client,
            &[TEST_ROLE_MEMBER],
            config,
            |_credentials| async move { Ok(clients) },
        )
        .await
        .expect("mock identity should provision credentials");

        TestHarness { ctx, mocks }
    }

    fn wire(self) -> (ScenarioClients, ScenarioConfig, Mocks) {
        init_test_tracing();

        let log = CallLog::new();
        let compute = self.compute.unwrap_or_default().with_call_log(log.clone());
        let network = self.network.unwrap_or_default().with_call_log(log.clone());
        let volume = self.volume.unwrap_or_default().with_call_log(log.clone());
        let remote = self.remote.unwrap_or_default().with_call_log(log.clone());
        let identity = self.identity.unwrap_or_default().with_call_log(log.clone());
        let config = self.config.unwrap_or_else(test_scenario_config);

        let clients = ScenarioClients {
            compute: Arc::new(compute.clone()),
            network: Arc::new(network.clone()),
            volume: Arc::new(volume.clone()),
            remote: Arc::new(remote.clone()),
        };

        let mocks = Mocks {
            compute,
            network,
            volume,
            remote,
            identity,
            log,
        };
        (clients, config, mocks)
    }
}

/// A built context plus the mocks behind it.
///
/// Scenarios consume `ctx`; `mocks` stays usable for assertions afterwards.
pub struct TestHarness {
    pub ctx: ScenarioContext,
    pub mocks: Mocks,
}

/// Handles to the mocks behind a harness context.
#[derive(Debug, Clone)]
pub struct Mocks {
    pub compute: MockCompute,
    pub network: MockNetwork,
    pub volume: MockVolume,
    pub remote: MockRemoteExecFactory,
    pub identity: MockIdentity,
    pub log: CallLog,
}

impl Mocks {
    /// Resources still held by the mocks; zero after a clean teardown.
    pub fn leaked_resources(&self) -> usize {
        self.compute.server_count()
            + self.compute.keypair_count()
            + self.compute.security_group_count()
            + self.network.floating_ip_count()
            + self.volume.volume_count()
            + self.identity.project_count()
            + self.identity.user_count()
    }
}
