mod common;

use common::TestApp;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

fn pending_customer_request() -> serde_json::Value {
    json!({
        "_id": "pr-1",
        "action": "create",
        "resource": "customers",
        "requestedBy": "u-3",
        "department": "sales",
        "payload": { "name": "Malabar Mart" },
        "status": "pending",
    })
}

#[tokio::test]
async fn staff_cannot_open_the_review_queue() {
    let app = TestApp::spawn().await;
    app.login_as("staff", "accounts").await;

    let response = app.get("/permission-requests").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admins_see_pending_requests() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    Mock::given(method("GET"))
        .and(path("/api/permissionrequests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending_customer_request()])))
        .mount(&app.backend)
        .await;

    let response = app.get("/permission-requests").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("/permission-requests/pr-1/approve"));
    assert!(page.contains("customers"));
}

#[tokio::test]
async fn approving_applies_the_write_and_marks_the_request() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    Mock::given(method("GET"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pending_customer_request()))
        .mount(&app.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/customers"))
        .and(body_json(json!({ "name": "Malabar Mart" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "_id": "c-2" })))
        .expect(1)
        .mount(&app.backend)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/permissionrequests/pr-1"))
        .and(body_json(json!({ "status": "approved" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "pr-1" })))
        .expect(1)
        .mount(&app.backend)
        .await;

    let response = app.post_form("/permission-requests/pr-1/approve", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Approved: create customers."));
}

#[tokio::test]
async fn settled_requests_are_not_applied_twice() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    let mut request = pending_customer_request();
    request["status"] = json!("approved");
    Mock::given(method("GET"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(request))
        .mount(&app.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&app.backend)
        .await;

    let response = app.post_form("/permission-requests/pr-1/approve", &[]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn rejecting_only_updates_the_status() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    Mock::given(method("GET"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pending_customer_request()))
        .mount(&app.backend)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/permissionrequests/pr-1"))
        .and(body_json(json!({ "status": "rejected" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&app.backend)
        .await;

    let response = app.post_form("/permission-requests/pr-1/reject", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Request rejected."));
}

#[tokio::test]
async fn approved_requests_cannot_be_rejected() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    let mut request = pending_customer_request();
    request["status"] = json!("approved");
    Mock::given(method("GET"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(request))
        .mount(&app.backend)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&app.backend)
        .await;

    let response = app.post_form("/permission-requests/pr-1/reject", &[]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Request pr-1 is already approved"));
}

#[tokio::test]
async fn approval_writes_nothing_when_the_status_update_fails() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    Mock::given(method("GET"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pending_customer_request()))
        .mount(&app.backend)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&app.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "_id": "c-2" })))
        .expect(0)
        .mount(&app.backend)
        .await;

    let response = app.post_form("/permission-requests/pr-1/approve", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn failed_approvals_return_the_request_to_pending() {
    let app = TestApp::spawn().await;
    app.login_as("admin", "accounts").await;

    Mock::given(method("GET"))
        .and(path("/api/permissionrequests/pr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pending_customer_request()))
        .mount(&app.backend)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/permissionrequests/pr-1"))
        .and(body_json(json!({ "status": "approved" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&app.backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/customers"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.backend)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/permissionrequests/pr-1"))
        .and(body_json(json!({ "status": "pending" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&app.backend)
        .await;

    let response = app.post_form("/permission-requests/pr-1/approve", &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
