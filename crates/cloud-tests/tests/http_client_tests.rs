//! HTTP client tests against a local wiremock server.
//!
//! Verifies request shapes, token headers and status mapping of the live
//! cloud clients without a cloud.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use cloud_tests::adapters::{ComputeApi, IdentityApi, IdentityV3Api, NetworkApi, VolumeApi};
use cloud_tests::config::IdentityConfig;
use cloud_tests::credentials::{get_creds_client, Credentials, V2Credentials};
use cloud_tests::fixtures::{
    admin_token, identity_adapter, issue_token_for, issue_token_v2, issue_token_v3,
    ComputeClient, IdentityV2Client, IdentityV3Client, VolumeClient, AUTH_TOKEN_HEADER,
};
use cloud_tests::models::{SecurityGroupRule, ServerCreateRequest, VolumeCreateRequest};
use common::error::CloudError;
use common::secret::{ExposeSecret, SecretString};
use common::types::IdentityVersion;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token() -> SecretString {
    SecretString::from("admin-token-0123456789")
}

fn identity_config(version: IdentityVersion, auth_url: &str) -> IdentityConfig {
    IdentityConfig {
        version,
        auth_url: auth_url.to_string(),
        admin_username: "admin".to_string(),
        admin_password: SecretString::from("secret"),
        admin_project: "admin".to_string(),
        admin_domain: "Default".to_string(),
        member_roles: vec!["Member".to_string()],
    }
}

// ============================================================================
// Token issuance
// ============================================================================

#[tokio::test]
async fn test_issue_token_v2_reads_access_token_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "passwordCredentials": {"username": "admin", "password": "secret"},
                "tenantName": "admin"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": {"token": {"id": "v2-token", "expires": "2030-01-01T00:00:00Z"}}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = issue_token_v2(
        &mock_server.uri(),
        "admin",
        &SecretString::from("secret"),
        "admin",
    )
    .await
    .expect("v2 token issuance should succeed");

    assert_eq!(token.expose_secret(), "v2-token");
}

#[tokio::test]
async fn test_issue_token_v3_reads_subject_token_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "identity": {"methods": ["password"]},
                "scope": {"project": {"name": "demo", "domain": {"name": "Default"}}}
            }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("X-Subject-Token", "v3-token")
                .set_body_json(json!({"token": {"methods": ["password"]}})),
        )
        .mount(&mock_server)
        .await;

    let token = issue_token_v3(
        &mock_server.uri(),
        "demo-user",
        &SecretString::from("pw"),
        "demo",
        "Default",
    )
    .await
    .expect("v3 token issuance should succeed");

    assert_eq!(token.expose_secret(), "v3-token");
}

#[tokio::test]
async fn test_issue_token_v3_missing_header_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/tokens"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"token": {}})))
        .mount(&mock_server)
        .await;

    let result = issue_token_v3(
        &mock_server.uri(),
        "u",
        &SecretString::from("pw"),
        "p",
        "Default",
    )
    .await;

    assert!(matches!(result, Err(CloudError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_issue_token_rejected_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tokens"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("The request you have made requires authentication."),
        )
        .mount(&mock_server)
        .await;

    let result =
        issue_token_v2(&mock_server.uri(), "admin", &SecretString::from("bad"), "admin").await;

    match result {
        Err(CloudError::RequestFailed { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected RequestFailed(401), got {other:?}"),
    }
}

#[tokio::test]
async fn test_issue_token_for_provisioned_v2_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "passwordCredentials": {"username": "isolated-user"},
                "tenantName": "isolated-tenant"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": {"token": {"id": "user-token"}}
        })))
        .mount(&mock_server)
        .await;

    let credentials = Credentials::V2(V2Credentials {
        username: "isolated-user".to_string(),
        user_id: "u1".to_string(),
        tenant_name: "isolated-tenant".to_string(),
        tenant_id: "t1".to_string(),
        password: SecretString::from("pw"),
    });

    let token = issue_token_for(&mock_server.uri(), &credentials)
        .await
        .expect("token for provisioned credentials");
    assert_eq!(token.expose_secret(), "user-token");
}

#[tokio::test]
async fn test_admin_token_uses_configured_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/tokens"))
        .respond_with(ResponseTemplate::new(201).insert_header("X-Subject-Token", "admin-v3"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = identity_config(IdentityVersion::V3, &mock_server.uri());
    let token = admin_token(&config).await.expect("admin token");
    assert_eq!(token.expose_secret(), "admin-v3");
}

// ============================================================================
// Identity admin calls
// ============================================================================

#[tokio::test]
async fn test_identity_requests_carry_auth_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/roles"))
        .and(header(AUTH_TOKEN_HEADER, "admin-token-0123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "roles": [{"id": "r1", "name": "Member"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = IdentityV3Client::new(&mock_server.uri(), token()).unwrap();
    let roles = client.list_roles().await.expect("list roles");
    assert_eq!(roles["roles"][0]["name"], "Member");
}

#[tokio::test]
async fn test_v2_role_assignment_path_and_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/tenants/t1/users/u1/roles/OS-KSADM/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"role": {"id": "r1"}})))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/tenants/t1/users/u1/roles/OS-KSADM/r1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already has role"))
        .mount(&mock_server)
        .await;

    let client = IdentityV2Client::new(&mock_server.uri(), token()).unwrap();

    client
        .assign_user_role("t1", "u1", "r1")
        .await
        .expect("first assignment succeeds");

    let err = client
        .assign_user_role("t1", "u1", "r1")
        .await
        .expect_err("second assignment conflicts");
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_v3_create_project_sends_domain_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects"))
        .and(body_partial_json(json!({
            "project": {"name": "p1", "domain_id": "d-42"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "project": {"id": "proj-1", "name": "p1", "domain_id": "d-42"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = IdentityV3Client::new(&mock_server.uri(), token()).unwrap();
    let project = client
        .create_project("p1", "p1 description", "d-42")
        .await
        .expect("create project");
    assert_eq!(project["project"]["id"], "proj-1");
}

#[tokio::test]
async fn test_v3_list_domains_filters_by_name() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/domains"))
        .and(query_param("name", "Default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domains": [{"id": "default", "name": "Default"}]
        })))
        .mount(&mock_server)
        .await;

    let client = IdentityV3Client::new(&mock_server.uri(), token()).unwrap();
    let domains = client.list_domains(Some("Default")).await.expect("list domains");
    assert_eq!(domains["domains"][0]["id"], "default");
}

#[tokio::test]
async fn test_v3_domain_name_with_reserved_characters_is_encoded() {
    let mock_server = MockServer::start().await;

    for (id, name) in [("d-rd", "R&D"), ("d-ops", "Ops + Infra")] {
        Mock::given(method("GET"))
            .and(path("/domains"))
            .and(query_param("name", name))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "domains": [{"id": id, "name": name}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = identity_config(IdentityVersion::V3, &mock_server.uri());
    let adapter = identity_adapter(&config, token()).unwrap();

    for name in ["R&D", "Ops + Infra"] {
        let creds_client = get_creds_client(&adapter, Some(name))
            .await
            .unwrap_or_else(|e| panic!("domain {name} should resolve: {e}"));
        assert_eq!(creds_client.identity_version(), IdentityVersion::V3);
    }
}

#[tokio::test]
async fn test_creds_client_over_http_v3() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/domains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "domains": [{"id": "default", "name": "Default"}]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/projects"))
        .and(body_partial_json(json!({"project": {"domain_id": "default"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "project": {"id": "proj-9", "name": "isolated"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = identity_config(IdentityVersion::V3, &mock_server.uri());
    let adapter = identity_adapter(&config, token()).unwrap();
    let creds_client = get_creds_client(&adapter, Some("Default"))
        .await
        .expect("v3 creds client");

    let project = creds_client
        .create_project("isolated", "isolated project")
        .await
        .expect("create project");
    assert_eq!(project.id, "proj-9");
}

// ============================================================================
// Compute, network and volume calls
// ============================================================================

#[tokio::test]
async fn test_create_server_sends_boot_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/servers"))
        .and(body_json(json!({
            "server": {
                "name": "srv",
                "imageRef": "img-1",
                "flavorRef": "42",
                "key_name": "kp",
                "security_groups": [{"name": "sg"}]
            }
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "server": {"id": "srv-1", "adminPass": "x"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    let request = ServerCreateRequest {
        name: "srv".to_string(),
        image_ref: Some("img-1".to_string()),
        flavor_ref: "42".to_string(),
        key_name: Some("kp".to_string()),
        security_groups: vec![cloud_tests::models::NamedRef {
            name: "sg".to_string(),
        }],
        block_device_mapping: Vec::new(),
    };

    let server = client.create_server(&request).await.expect("boot");
    assert_eq!(server.id, "srv-1");
    assert!(server.status.is_empty());
}

#[tokio::test]
async fn test_get_server_not_found_maps_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/servers/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "itemNotFound": {"message": "Instance gone could not be found.", "code": 404}
        })))
        .mount(&mock_server)
        .await;

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    let err = client.get_server("gone").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_shelve_actions_post_to_action_endpoint() {
    let mock_server = MockServer::start().await;

    for action in [
        json!({"shelve": null}),
        json!({"shelveOffload": null}),
        json!({"unshelve": null}),
    ] {
        Mock::given(method("POST"))
            .and(path("/servers/srv-1/action"))
            .and(body_json(action))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    client.shelve_server("srv-1").await.expect("shelve");
    client.shelve_offload_server("srv-1").await.expect("offload");
    client.unshelve_server("srv-1").await.expect("unshelve");
}

#[tokio::test]
async fn test_security_group_and_rule_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/os-security-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_group": {"id": 17, "name": "sg", "rules": []}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/os-security-group-rules"))
        .and(body_partial_json(json!({
            "security_group_rule": {
                "parent_group_id": "17",
                "ip_protocol": "tcp",
                "from_port": 22,
                "to_port": 22
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "security_group_rule": {"id": 1}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    let group = client
        .create_security_group("sg", "sg description")
        .await
        .expect("create group");
    assert_eq!(group.id, "17");

    client
        .create_security_group_rule(&SecurityGroupRule::ssh(&group.id))
        .await
        .expect("create rule");
}

#[tokio::test]
async fn test_floating_ip_allocate_and_associate() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/os-floating-ips"))
        .and(body_json(json!({"pool": "public"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "floating_ip": {"id": 5, "ip": "172.24.4.10", "pool": "public"}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/servers/srv-1/action"))
        .and(body_json(json!({"addFloatingIp": {"address": "172.24.4.10"}})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    let floating_ip = client
        .create_floating_ip(Some("public"))
        .await
        .expect("allocate");
    assert_eq!(floating_ip.id, "5");
    assert_eq!(floating_ip.ip, "172.24.4.10");

    client
        .associate_floating_ip(&floating_ip.ip, "srv-1")
        .await
        .expect("associate");
}

#[tokio::test]
async fn test_volume_create_and_forbidden_delete() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/volumes"))
        .and(body_partial_json(json!({
            "volume": {"display_name": "vol", "size": 1, "imageRef": "img-1"}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "volume": {"id": "vol-1", "status": "creating", "size": 1}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/volumes/vol-1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("policy does not allow"))
        .mount(&mock_server)
        .await;

    let client = VolumeClient::new(&mock_server.uri(), token()).unwrap();
    let volume = client
        .create_volume(&VolumeCreateRequest {
            name: "vol".to_string(),
            size: 1,
            image_ref: Some("img-1".to_string()),
        })
        .await
        .expect("create volume");
    assert_eq!(volume.status, "creating");

    let err = client.delete_volume("vol-1").await.unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_error_body_token_is_redacted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/servers/srv-1"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("internal error for X-Auth-Token: admin-token-0123456789"),
        )
        .mount(&mock_server)
        .await;

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    let err = client.get_server("srv-1").await.unwrap_err();
    let message = err.to_string();
    assert!(!message.contains("admin-token-0123456789"));
}

#[tokio::test]
async fn test_delete_with_empty_body_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/os-keypairs/kp"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ComputeClient::new(&mock_server.uri(), token()).unwrap();
    client.delete_keypair("kp").await.expect("delete keypair");
}
