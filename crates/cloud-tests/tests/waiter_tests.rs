//! Status waiters against mock compute and volume services.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use cloud_test_utils::{MockCompute, MockVolume, TEST_FLAVOR_REF, TEST_IMAGE_REF};
use cloud_tests::adapters::{ComputeApi, VolumeApi};
use cloud_tests::eventual::PollPolicy;
use cloud_tests::models::{ServerCreateRequest, VolumeCreateRequest};
use cloud_tests::waiters::{
    wait_for_server_status, wait_for_server_termination, wait_for_volume_status,
};
use common::error::CloudError;
use std::time::Duration;
use tokio::time::Instant;

fn policy() -> PollPolicy {
    PollPolicy::new(Duration::from_secs(20), Duration::from_secs(2))
}

fn boot_request() -> ServerCreateRequest {
    ServerCreateRequest {
        name: "waiter-server".to_string(),
        image_ref: Some(TEST_IMAGE_REF.to_string()),
        flavor_ref: TEST_FLAVOR_REF.to_string(),
        key_name: None,
        security_groups: Vec::new(),
        block_device_mapping: Vec::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_server_reaches_active_after_build() {
    let compute = MockCompute::new().with_boot_statuses(&["BUILD", "BUILD", "BUILD", "ACTIVE"]);
    let server = compute.create_server(&boot_request()).await.unwrap();
    let start = Instant::now();

    let active = wait_for_server_status(&compute, &server.id, "ACTIVE", policy())
        .await
        .unwrap();

    assert_eq!(active.status, "ACTIVE");
    // BUILD, BUILD, ACTIVE: two sleeps
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_server_error_fails_without_waiting_out_timeout() {
    let compute = MockCompute::new().with_boot_statuses(&["BUILD", "BUILD", "ERROR"]);
    let server = compute.create_server(&boot_request()).await.unwrap();
    let start = Instant::now();

    let err = wait_for_server_status(&compute, &server.id, "ACTIVE", policy())
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::BuildFailed { ref status, .. } if status == "ERROR"));
    assert!(start.elapsed() < policy().timeout);
}

#[tokio::test(start_paused = true)]
async fn test_server_status_timeout_names_condition() {
    let compute = MockCompute::new().with_boot_statuses(&["BUILD"]);
    let server = compute.create_server(&boot_request()).await.unwrap();

    let err = wait_for_server_status(&compute, &server.id, "ACTIVE", policy())
        .await
        .unwrap_err();

    match err {
        CloudError::Timeout { condition, waited } => {
            assert_eq!(condition, format!("server {} to reach status ACTIVE", server.id));
            assert_eq!(waited, Duration::from_secs(20));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_termination_observes_not_found() {
    let compute = MockCompute::new();
    let server = compute.create_server(&boot_request()).await.unwrap();
    compute.delete_server(&server.id).await.unwrap();

    wait_for_server_termination(&compute, &server.id, policy())
        .await
        .expect("deleted server is terminated");
    assert_eq!(compute.call_count("get_server"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_volume_error_status_fails_fast() {
    let volumes = MockVolume::new().with_statuses(&["creating", "error"]);
    let volume = volumes
        .create_volume(&VolumeCreateRequest {
            name: "waiter-volume".to_string(),
            size: 1,
            image_ref: None,
        })
        .await
        .unwrap();

    let err = wait_for_volume_status(&volumes, &volume.id, "available", policy())
        .await
        .unwrap_err();

    match err {
        CloudError::BuildFailed { resource, status } => {
            assert_eq!(resource, format!("volume {}", volume.id));
            assert_eq!(status, "error");
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
}
