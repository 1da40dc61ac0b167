//! Integration tests for the account endpoints
//!
//! These tests use wiremock to stand in for the Prbal API and exercise the
//! full request/response cycle: auth headers, response-shape probing, and
//! error conversion.

use prbal_api::account::{AccountClient, AccountType, TypeChangeOutcome, TypeChangeRequest};
use prbal_api::http::{ApiClient, ApiClientConfig};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHANGES_PATH: &str = "/api/v1/auth/account-type/changes/";
const SUBMIT_PATH: &str = "/api/v1/auth/account-type/change/";

fn client_for(server: &MockServer) -> AccountClient {
    AccountClient::new(ApiClient::new(ApiClientConfig::new(server.uri())))
}

#[tokio::test]
async fn test_available_changes_canonical_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .and(header("Authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "available_changes": [
                { "type": "provider", "display": "Service Provider" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = client
        .available_type_changes("token-1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(options.len(), 1);
    assert_eq!(options[0].target_type, AccountType::Provider);
    assert_eq!(options[0].display_label, "Service Provider");
}

#[tokio::test]
async fn test_available_changes_nested_shape() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "available_changes": [
                    { "type": "customer", "display": "Customer" },
                    { "type": "admin", "display": "Administrator" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = client
        .available_type_changes("token-1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(options.len(), 2);
}

#[tokio::test]
async fn test_available_changes_unparseable_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 7, "username": "alice" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = client.available_type_changes("token-1").await.unwrap();

    assert!(options.is_none());
}

#[tokio::test]
async fn test_available_changes_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CHANGES_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "ServiceUnavailable",
            "message": "Down for maintenance"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.available_type_changes("token-1").await.unwrap_err();

    assert_eq!(error.status(), 503);
    assert!(error.is_network_error());
    assert_eq!(error.message(), "Down for maintenance");
}

#[tokio::test]
async fn test_submit_success() {
    let server = MockServer::start().await;

    let expected_body = json!({ "to": "provider", "reason": "I want to offer services" });

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(header("Authorization", "Bearer token-1"))
        .and(body_json(&expected_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Account type updated"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = TypeChangeRequest {
        to: AccountType::Provider,
        reason: Some("I want to offer services".to_string()),
    };

    let outcome = client.submit_type_change("token-1", &request).await.unwrap();
    assert_eq!(outcome, TypeChangeOutcome::Success);
}

#[tokio::test]
async fn test_submit_without_reason_omits_field() {
    let server = MockServer::start().await;

    // body_json matches exactly: a stray "reason" key would fail the match
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .and(body_json(json!({ "to": "customer" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": ""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = TypeChangeRequest {
        to: AccountType::Customer,
        reason: None,
    };

    let outcome = client.submit_type_change("token-1", &request).await.unwrap();
    assert_eq!(outcome, TypeChangeOutcome::Success);
}

#[tokio::test]
async fn test_submit_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Pending bookings must be completed first"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = TypeChangeRequest {
        to: AccountType::Provider,
        reason: None,
    };

    let outcome = client.submit_type_change("token-1", &request).await.unwrap();
    assert_eq!(
        outcome,
        TypeChangeOutcome::Failure {
            message: "Pending bookings must be completed first".to_string()
        }
    );
}

#[tokio::test]
async fn test_submit_error_with_detail_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "Authentication credentials were not provided."
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = TypeChangeRequest {
        to: AccountType::Provider,
        reason: None,
    };

    let error = client
        .submit_type_change("token-1", &request)
        .await
        .unwrap_err();

    assert_eq!(error.status(), 403);
    assert_eq!(
        error.message(),
        "Authentication credentials were not provided."
    );
}
