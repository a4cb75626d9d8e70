mod common;

use atelier_web::backend::{ClientFactory, CredentialKind, ResponseCookies, SessionCookies};
use atelier_web::config::env::{
    ConfigurationError, EnvResolver, MapEnv, BACKEND_ANON_KEY, BACKEND_SERVICE_ROLE_KEY,
    BACKEND_URL,
};
use axum::http::{HeaderMap, StatusCode};
use common::{body_json, spawn_app, spawn_app_with, ANON_KEY, SERVICE_ROLE_KEY};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json as body_json_matches, header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn factory(env: MapEnv) -> ClientFactory {
    ClientFactory::new(EnvResolver::new(Arc::new(env)), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn privileged_handle_is_built_once() {
    let app = spawn_app().await;

    let first = app.state.privileged().unwrap();
    let second = app.state.privileged().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.snapshot(), second.snapshot());
    assert_eq!(first.snapshot().credential_kind, CredentialKind::ServiceRole);
    assert!(!first.snapshot().session_bound);
}

#[tokio::test]
async fn privileged_handle_is_unchanged_by_calls() {
    let app = spawn_app().await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/customers"))
        .and(header("apikey", SERVICE_ROLE_KEY))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/3"))
        .expect(2)
        .mount(&app.backend)
        .await;

    let client = app.state.privileged().unwrap();
    let before = client.snapshot();

    assert_eq!(client.from("customers").count().await.unwrap(), 3);
    assert_eq!(client.from("customers").count().await.unwrap(), 3);

    assert_eq!(client.snapshot(), before);
    assert!(Arc::ptr_eq(&client, &app.state.privileged().unwrap()));
}

#[tokio::test]
async fn rpc_calls_carry_the_session_token() {
    let app = spawn_app().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/enquiry_stats"))
        .and(header("apikey", ANON_KEY))
        .and(header("authorization", "Bearer owner-token"))
        .and(body_json_matches(json!({ "since": "2026-01-01" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "new": 4, "won": 1 })))
        .expect(1)
        .mount(&app.backend)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert("cookie", app.session_cookie("owner-token").parse().unwrap());
    let client = app
        .state
        .factory
        .server_client(SessionCookies::from_headers(&headers, ResponseCookies::new()))
        .unwrap();

    let stats: Value = client
        .rpc("enquiry_stats", &json!({ "since": "2026-01-01" }))
        .await
        .unwrap();

    assert_eq!(stats["new"], 4);
}

#[tokio::test]
async fn anonymous_rpc_falls_back_to_the_public_key() {
    let app = spawn_app().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/featured_count"))
        .and(header("authorization", format!("Bearer {}", ANON_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(6)))
        .expect(1)
        .mount(&app.backend)
        .await;

    let client = app.state.factory.browser_client().unwrap();
    let count: u64 = client.rpc("featured_count", &json!({})).await.unwrap();

    assert_eq!(count, 6);
}

#[tokio::test]
async fn privileged_calls_carry_the_secret_key() {
    let app = spawn_app().await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/services"))
        .and(header("apikey", SERVICE_ROLE_KEY))
        .and(header("authorization", format!("Bearer {}", SERVICE_ROLE_KEY).as_str()))
        .and(header("prefer", "count=exact"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-6/7"))
        .expect(1)
        .mount(&app.backend)
        .await;

    let count = app
        .state
        .privileged()
        .unwrap()
        .from("services")
        .count()
        .await
        .unwrap();

    assert_eq!(count, 7);
}

#[tokio::test]
async fn public_routes_ignore_session_cookies() {
    let app = spawn_app().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(header("authorization", format!("Bearer {}", ANON_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&app.backend)
        .await;

    let response = app
        .get_with_cookie("/api/services", &app.session_cookie("someone"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_endpoint_names_the_key() {
    let factory = factory(MapEnv::new().with(BACKEND_ANON_KEY, "anon"));

    let err = factory.browser_client().unwrap_err();
    assert_eq!(err, ConfigurationError::Missing(BACKEND_URL));
    assert!(err.to_string().contains(BACKEND_URL));
}

#[tokio::test]
async fn empty_endpoint_counts_as_missing() {
    let factory = factory(
        MapEnv::new()
            .with(BACKEND_URL, "")
            .with(BACKEND_ANON_KEY, "anon"),
    );

    let cookies = SessionCookies::from_headers(&HeaderMap::new(), ResponseCookies::new());
    let err = factory.server_client(cookies).unwrap_err();
    assert!(err.to_string().contains(BACKEND_URL));
}

#[tokio::test]
async fn missing_service_key_only_breaks_privileged_routes() {
    let app = spawn_app_with(|env| env.with(BACKEND_SERVICE_ROLE_KEY, ""), true).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&app.backend)
        .await;

    assert_eq!(app.get("/api/services").await.status(), StatusCode::OK);

    let response = app.get("/api/debug/connection").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(!body.to_string().contains(BACKEND_SERVICE_ROLE_KEY));
}

#[tokio::test]
async fn unreachable_backend_is_reported_not_raised() {
    let app = spawn_app().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&app.backend)
        .await;

    let response = app.get("/api/debug/connection").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["error_kind"], "unavailable");
    assert_eq!(body["credential_kind"], "service_role");
    assert!(!body.to_string().contains(SERVICE_ROLE_KEY));
}
