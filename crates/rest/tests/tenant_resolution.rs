//! Integration tests for tenant resolution.
//!
//! Covers the tenant claim, the `/tenant/{id}` URL prefix, the `DEFAULT`
//! tenant, the all-tenants scope and per-tenant Subscription allow lists.

mod common;

use std::sync::Arc;

use common::assertions::{assert_outcome_contains, assert_status};
use common::doubles::ScriptedAuthorization;
use common::fixtures;
use common::harness::RestTestHarness;
use helios_rest::ServerConfig;
use helios_rest::validation::{SubscriptionEndpoint, SubscriptionValidator};
use serde_json::{Value, json};

const ALL_TENANTS: &str = "tenants/all";

fn multi_tenant_config(use_tenant_specific_url: bool) -> ServerConfig {
    ServerConfig {
        enable_multi_tenancy: true,
        use_tenant_specific_url,
        tenant_id_claim_path: "tenantId".to_string(),
        grant_access_all_tenants_scope: Some(ALL_TENANTS.to_string()),
        ..ServerConfig::for_testing()
    }
}

fn authorization() -> ScriptedAuthorization {
    ScriptedAuthorization::new()
        .with_token("t1-user", json!({ "sub": "u1", "tenantId": "t1" }))
        .with_token("t2-user", json!({ "sub": "u2", "tenantId": "t2" }))
        .with_token("no-tenant", json!({ "sub": "u3" }))
        .with_token("admin", json!({ "sub": "admin", "scope": "system/*.read tenants/all" }))
}

fn harness(use_tenant_specific_url: bool, token: &str) -> RestTestHarness {
    RestTestHarness::builder()
        .config(multi_tenant_config(use_tenant_specific_url))
        .authorization(authorization())
        .build()
        .with_token(token)
}

#[tokio::test]
async fn test_tenant_from_claim() {
    let harness = harness(false, "t1-user");

    let response = harness.post("/Patient", fixtures::patient("ignored", "male")).await;

    assert_status(&response, 201);
    let body: Value = response.json();
    let id = body["id"].as_str().expect("created id");
    assert!(harness.stored(Some("t1"), "Patient", id).await.is_some());
    assert!(harness.stored(None, "Patient", id).await.is_none());
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let harness = harness(false, "t1-user");
    harness.seed(Some("t2"), fixtures::patient("p1", "male")).await;

    assert_status(&harness.get("/Patient/p1").await, 404);

    let response = harness.get("/Patient").await;
    assert_status(&response, 200);
    let body: Value = response.json();
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_url_tenant_matching_claim() {
    let harness = harness(true, "t1-user");
    harness.seed(Some("t1"), fixtures::patient("p1", "male")).await;

    let response = harness.get("/tenant/t1/Patient/p1").await;

    assert_status(&response, 200);
    let body: Value = response.json();
    assert_eq!(body["id"], "p1");
}

#[tokio::test]
async fn test_url_tenant_conflicting_with_claim() {
    let harness = harness(true, "t1-user");
    harness.seed(Some("t2"), fixtures::patient("p1", "male")).await;

    let response = harness.get("/tenant/t2/Patient/p1").await;

    assert_status(&response, 401);
    assert_outcome_contains(&response, "Unauthorized");
}

#[tokio::test]
async fn test_missing_tenant_claim() {
    let harness = harness(true, "no-tenant");

    let response = harness.get("/Patient/p1").await;

    assert_status(&response, 401);
}

#[tokio::test]
async fn test_default_tenant_path() {
    let harness = harness(true, "no-tenant");
    harness.seed(Some("DEFAULT"), fixtures::patient("p1", "male")).await;

    let response = harness.get("/tenant/DEFAULT/Patient/p1").await;

    assert_status(&response, 200);
}

#[tokio::test]
async fn test_all_tenants_scope() {
    let harness = harness(true, "admin");
    harness.seed(Some("t9"), fixtures::patient("p1", "male")).await;

    let response = harness.get("/tenant/t9/Patient/p1").await;
    assert_status(&response, 200);

    // the scope only widens access through the URL
    let response = harness.get("/Patient/p1").await;
    assert_status(&response, 401);
}

#[tokio::test]
async fn test_search_links_carry_tenant_prefix() {
    let harness = harness(true, "t1-user");
    harness.seed(Some("t1"), fixtures::patient("p1", "male")).await;

    let response = harness.get("/tenant/t1/Patient?gender=male").await;

    assert_status(&response, 200);
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    let self_link = body["link"]
        .as_array()
        .and_then(|links| links.iter().find(|l| l["relation"] == "self"))
        .and_then(|l| l["url"].as_str())
        .expect("self link");
    assert!(
        self_link.starts_with("https://fhir.example.com/tenant/t1/Patient"),
        "unexpected self link {}",
        self_link
    );
    let full_url = body["entry"][0]["fullUrl"].as_str().unwrap_or_default();
    assert!(full_url.starts_with("https://fhir.example.com/tenant/t1/"));
}

#[tokio::test]
async fn test_transaction_runs_in_tenant() {
    let harness = harness(true, "t1-user");

    let bundle = fixtures::transaction(vec![fixtures::post_entry(
        "urn:uuid:p",
        fixtures::patient("p1", "female"),
    )]);
    let response = harness.post("/tenant/t1", bundle).await;

    assert_status(&response, 200);
    assert!(harness.stored(Some("t1"), "Patient", "p1").await.is_some());
    assert!(harness.stored(Some("t2"), "Patient", "p1").await.is_none());
}

#[tokio::test]
async fn test_subscription_allow_list_per_tenant() {
    let build = |token: &str| {
        RestTestHarness::builder()
            .config(multi_tenant_config(false))
            .authorization(authorization())
            .profile(|fhir, backend| {
                fhir.with_validator(Arc::new(SubscriptionValidator::new(
                    backend.clone(),
                    backend,
                    vec![
                        SubscriptionEndpoint::exact("https://hooks.example.com/t1")
                            .for_tenant("t1"),
                    ],
                    true,
                )))
            })
            .build()
            .with_token(token)
    };
    let subscription = fixtures::subscription("https://hooks.example.com/t1");

    let response = build("t1-user").post("/Subscription", subscription.clone()).await;
    assert_status(&response, 201);

    let response = build("t2-user").post("/Subscription", subscription).await;
    assert_status(&response, 400);
    assert_outcome_contains(&response, "is not allow listed");
}
