//! Server basic-ops scenario and metadata verification against in-memory
//! services.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use cloud_test_utils::{
    InjectedFailure, MockCompute, MockNetwork, MockRemoteExecFactory, TestContextBuilder,
    TEST_FLOATING_IP_1, TEST_SECURITY_GROUP_ID_1, TEST_SERVER_ID_1,
};
use cloud_tests::adapters::{RemoteExecFactory, RemoteTarget};
use cloud_tests::eventual::PollPolicy;
use cloud_tests::scenario::{verify_metadata, ServerBasicOpsScenario, METADATA_PUBLIC_IPV4_URL};
use common::error::CloudError;
use std::time::Duration;
use tokio::time::Instant;

fn policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(30), Duration::from_secs(1))
}

fn session(remote: &MockRemoteExecFactory) -> Box<dyn cloud_tests::adapters::RemoteExec> {
    remote
        .connect(&RemoteTarget {
            address: TEST_FLOATING_IP_1.to_string(),
            username: "cirros".to_string(),
            private_key: None,
        })
        .unwrap()
}

// ============================================================================
// Full scenario
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_basic_ops_happy_path() {
    let harness = TestContextBuilder::new().build();
    let mocks = harness.mocks.clone();

    let report = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .expect("scenario should pass")
        .completed()
        .expect("basic ops is never skipped");

    assert_eq!(report.server_id, TEST_SERVER_ID_1);
    assert_eq!(report.floating_ip.as_deref(), Some(TEST_FLOATING_IP_1));
    assert!(report.ssh_verified);
    assert!(report.metadata_verified);

    assert_eq!(
        mocks.remote.commands_for(TEST_FLOATING_IP_1),
        vec!["true".to_string(), format!("curl {METADATA_PUBLIC_IPV4_URL}")]
    );
    assert!(mocks
        .log
        .entries()
        .contains(&format!("associate_floating_ip:{TEST_FLOATING_IP_1}")));
    assert_eq!(
        mocks.log.entries_for("create_security_group_rule"),
        vec![
            format!("create_security_group_rule:{TEST_SECURITY_GROUP_ID_1}"),
            format!("create_security_group_rule:{TEST_SECURITY_GROUP_ID_1}"),
        ]
    );
    assert_eq!(mocks.leaked_resources(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_private_key_reaches_remote_session() {
    let harness = TestContextBuilder::new()
        .configure(|c| c.validation.ssh_user = "ubuntu".to_string())
        .build();
    let mocks = harness.mocks.clone();

    ServerBasicOpsScenario::default().run(harness.ctx).await.unwrap();

    let connections = mocks.remote.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].username, "ubuntu");
    assert!(connections[0].private_key.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_validation_disabled_skips_ssh() {
    let harness = TestContextBuilder::new()
        .configure(|c| c.validation.run_validation = false)
        .build();
    let mocks = harness.mocks.clone();

    let report = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert!(!report.ssh_verified);
    assert!(!report.metadata_verified);
    assert_eq!(report.floating_ip, None);
    assert_eq!(mocks.network.call_count("create_floating_ip"), 0);
    assert!(mocks.remote.connections().is_empty());
    assert_eq!(mocks.leaked_resources(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_service_disabled_skips_curl() {
    let harness = TestContextBuilder::new()
        .configure(|c| c.compute.metadata_service_enabled = false)
        .build();
    let mocks = harness.mocks.clone();

    let report = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap()
        .completed()
        .unwrap();

    assert!(report.ssh_verified);
    assert!(!report.metadata_verified);
    assert_eq!(mocks.remote.metadata_queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_mismatch_fails_scenario() {
    let harness = TestContextBuilder::new()
        .with_remote(MockRemoteExecFactory::new().with_metadata_responses(&["203.0.113.9"]))
        .build();
    let mocks = harness.mocks.clone();

    let err = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::VerificationFailed { .. }), "got {err:?}");
    assert_eq!(mocks.remote.metadata_queries(), 1);
    assert_eq!(mocks.leaked_resources(), 0);
}

// ============================================================================
// Metadata polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_metadata_empty_output_is_retried() {
    let remote = MockRemoteExecFactory::new().with_metadata_responses(&["", "  \n", ""]);
    let session = session(&remote);
    let start = Instant::now();

    verify_metadata(session.as_ref(), TEST_FLOATING_IP_1, policy())
        .await
        .expect("metadata should converge");

    assert_eq!(remote.metadata_queries(), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_metadata_output_is_trimmed() {
    let answer = format!("{TEST_FLOATING_IP_1}\n");
    let remote = MockRemoteExecFactory::new().with_metadata_responses(&[answer.as_str()]);
    let session = session(&remote);

    verify_metadata(session.as_ref(), TEST_FLOATING_IP_1, policy())
        .await
        .expect("trailing newline is not a mismatch");
    assert_eq!(remote.metadata_queries(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_mismatch_fails_without_retry() {
    let remote = MockRemoteExecFactory::new().with_metadata_responses(&["", "198.51.100.1"]);
    let session = session(&remote);

    let err = verify_metadata(session.as_ref(), TEST_FLOATING_IP_1, policy())
        .await
        .unwrap_err();

    match err {
        CloudError::VerificationFailed { expected, actual, .. } => {
            assert_eq!(expected, TEST_FLOATING_IP_1);
            assert_eq!(actual, "198.51.100.1");
        }
        other => panic!("expected VerificationFailed, got {other:?}"),
    }
    assert_eq!(remote.metadata_queries(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_metadata_never_answers_times_out() {
    let remote = MockRemoteExecFactory::new().with_metadata_unavailable();
    let session = session(&remote);
    let start = Instant::now();

    let err = verify_metadata(session.as_ref(), TEST_FLOATING_IP_1, policy())
        .await
        .unwrap_err();

    match err {
        CloudError::Timeout { condition, waited } => {
            assert!(condition.contains(METADATA_PUBLIC_IPV4_URL), "condition: {condition}");
            assert!(condition.contains("is empty"), "condition: {condition}");
            assert_eq!(waited, Duration::from_secs(30));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(32));
}

// ============================================================================
// Cleanup guarantees
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cleanup_runs_in_reverse_order_after_failure() {
    let harness = TestContextBuilder::new()
        .with_network(
            MockNetwork::new().fail_on("associate_floating_ip", InjectedFailure::ServerError),
        )
        .build();
    let mocks = harness.mocks.clone();

    let err = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::RequestFailed { status: 500, .. }));

    let deletions: Vec<String> = mocks
        .log
        .deletions()
        .into_iter()
        .map(|d| d.split(':').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        deletions,
        vec![
            "delete_floating_ip",
            "delete_server",
            "delete_security_group",
            "delete_keypair",
        ]
    );
    assert_eq!(mocks.leaked_resources(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_boot_error_fails_fast_and_cleans_up() {
    let harness = TestContextBuilder::new()
        .with_compute(MockCompute::new().with_boot_statuses(&["BUILD", "ERROR"]))
        .build();
    let mocks = harness.mocks.clone();
    let start = Instant::now();

    let err = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap_err();

    match err {
        CloudError::BuildFailed { resource, status } => {
            assert_eq!(resource, format!("server {TEST_SERVER_ID_1}"));
            assert_eq!(status, "ERROR");
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(mocks.compute.call_count("delete_server"), 1);
    assert_eq!(mocks.leaked_resources(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_step_error_wins_over_cleanup_error() {
    let harness = TestContextBuilder::new()
        .with_compute(
            MockCompute::new()
                .with_boot_statuses(&["BUILD", "ERROR"])
                .fail_on("delete_keypair", InjectedFailure::Forbidden),
        )
        .build();
    let mocks = harness.mocks.clone();

    let err = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::BuildFailed { .. }), "got {err:?}");
    // The failing action does not stop the others
    assert_eq!(mocks.compute.server_count(), 0);
    assert_eq!(mocks.compute.security_group_count(), 0);
    assert_eq!(mocks.compute.keypair_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_error_reported_after_success() {
    let harness = TestContextBuilder::new()
        .with_compute(
            MockCompute::new().fail_on("delete_security_group", InjectedFailure::Conflict),
        )
        .build();
    let mocks = harness.mocks.clone();

    let err = ServerBasicOpsScenario::default()
        .run(harness.ctx)
        .await
        .unwrap_err();

    assert!(err.is_conflict(), "got {err:?}");
    assert_eq!(mocks.compute.keypair_count(), 0);
    assert_eq!(mocks.network.floating_ip_count(), 0);
    assert_eq!(mocks.log.count("delete_security_group"), 1);
}
