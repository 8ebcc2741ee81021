//! Scan intake endpoint.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{anonymous, forwarder, worker, TestFixture};

#[tokio::test]
async fn test_scan_label_applies_transition() {
    let fixture = TestFixture::new().await;
    let order = fixture.create_order("wh-1", "fwd-1").await;
    let id = order["id"].as_str().unwrap();
    let tracking = order["tracking_number"].as_str().unwrap();

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({
                "code": format!("{}|{}|DHL", id, tracking),
                "status": "arrived_at_warehouse",
                "location": "dock-3",
                "device_info": "zebra-tc52"
            }),
            &worker("wh-1"),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["outcome"], "applied");
    assert_eq!(response.body["result"]["status"], "arrived_at_warehouse");

    let response = fixture
        .get(&format!("/api/v1/orders/{}/history", id), &worker("wh-1"))
        .await;
    let entry = &response.body["entries"][1];
    assert_eq!(entry["scan_data"]["location"], "dock-3");
}

#[tokio::test]
async fn test_scan_bare_tracking_number() {
    let fixture = TestFixture::new().await;
    let order = fixture.create_order("wh-1", "fwd-1").await;

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({
                "code": order["tracking_number"],
                "status": "arrived_at_warehouse"
            }),
            &worker("wh-1"),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["result"]["id"], order["id"]);
}

#[tokio::test]
async fn test_unresolved_scan_is_logged() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({ "code": "UNKNOWN-LABEL-42", "status": "arrived_at_warehouse" }),
            &worker("wh-1"),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["outcome"], "not_found");
    assert_eq!(response.body["result"]["order_id"], "UNKNOWN-LABEL-42");

    // The raw value's history is readable even though no order exists
    let response = fixture
        .get("/api/v1/orders/UNKNOWN-LABEL-42/history", &worker("wh-1"))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(
        fixture.get("/api/v1/orders/UNKNOWN-LABEL-42", &worker("wh-1")).await.status,
        StatusCode::NOT_FOUND
    );

    fixture.wait_for_audit("scan_unresolved", 1).await;
}

#[tokio::test]
async fn test_unresolved_scan_history_stays_with_the_scanning_tenant() {
    let fixture = TestFixture::new().await;
    let mut tenant_worker = worker("wh-1");
    tenant_worker.push(("x-actor-forwarder", "fwd-1".to_string()));

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({
                "code": "LOST-42",
                "status": "arrived_at_warehouse",
                "location": "fwd-1 secret dock"
            }),
            &tenant_worker,
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let path = "/api/v1/orders/LOST-42/history";
    let response = fixture.get(path, &forwarder("fwd-2")).await;
    assert_status!(response, StatusCode::FORBIDDEN);
    assert!(!response.body.to_string().contains("secret dock"));

    let mut other_tenant_worker = worker("wh-1");
    other_tenant_worker.push(("x-actor-forwarder", "fwd-2".to_string()));
    let response = fixture.get(path, &other_tenant_worker).await;
    assert_status!(response, StatusCode::FORBIDDEN);

    let mut other_warehouse = worker("wh-2");
    other_warehouse.push(("x-actor-forwarder", "fwd-1".to_string()));
    let response = fixture.get(path, &other_warehouse).await;
    assert_status!(response, StatusCode::FORBIDDEN);

    let response = fixture.get(path, &forwarder("fwd-1")).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["entries"][0]["scan_data"]["location"], "fwd-1 secret dock");

    let response = fixture.get(path, &tenant_worker).await;
    assert_status!(response, StatusCode::OK);

    let response = fixture.get("/api/v1/orders/NEVER-SCANNED/history", &forwarder("fwd-2")).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scan_rejections() {
    let fixture = TestFixture::new().await;
    let order = fixture.create_order("wh-1", "fwd-1").await;
    let tracking = order["tracking_number"].as_str().unwrap();

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({ "code": "a|b|c|d", "status": "packed" }),
            &worker("wh-1"),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["kind"], "invalid_scan_code");

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({ "code": tracking, "status": "arrived_at_warehouse" }),
            &worker("wh-2"),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
    fixture.wait_for_audit("scan_forbidden", 1).await;

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({ "code": tracking, "status": "packed" }),
            &worker("wh-1"),
        )
        .await;
    assert_status!(response, StatusCode::CONFLICT);
    assert_eq!(response.body["kind"], "illegal_transition");

    let response = fixture
        .post(
            "/api/v1/scans",
            json!({ "code": tracking, "status": "arrived_at_warehouse" }),
            &anonymous(),
        )
        .await;
    assert_status!(response, StatusCode::FORBIDDEN);
}
