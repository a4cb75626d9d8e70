#![allow(dead_code)]

use atelier_web::backend::session::cookie_name;
use atelier_web::backend::{ClientFactory, Session};
use atelier_web::config::env::{
    EnvResolver, MapEnv, BACKEND_ANON_KEY, BACKEND_SERVICE_ROLE_KEY, BACKEND_URL, CRON_SECRET,
    SITE_URL,
};
use atelier_web::config::Settings;
use atelier_web::services::email::MockEmailProvider;
use atelier_web::startup::build_router;
use atelier_web::AppState;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ANON_KEY: &str = "anon-test-key";
pub const SERVICE_ROLE_KEY: &str = "service-role-test-key";
pub const CRON: &str = "cron-test-secret";
pub const NOTIFY_ADDRESS: &str = "owner@atelier.test";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub backend: MockServer,
    pub email: Arc<MockEmailProvider>,
}

/// Environment pointing at `backend` with every key set.
pub fn full_env(backend: &MockServer) -> MapEnv {
    MapEnv::new()
        .with(BACKEND_URL, &backend.uri())
        .with(BACKEND_ANON_KEY, ANON_KEY)
        .with(BACKEND_SERVICE_ROLE_KEY, SERVICE_ROLE_KEY)
        .with(CRON_SECRET, CRON)
        .with(SITE_URL, "https://atelier.test")
}

pub fn settings(debug_routes: bool) -> Settings {
    serde_json::from_value(json!({
        "debug_routes": debug_routes,
        "email": { "notify_address": NOTIFY_ADDRESS },
    }))
    .expect("test settings")
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|env| env, true).await
}

pub async fn spawn_app_with(
    configure: impl FnOnce(MapEnv) -> MapEnv,
    debug_routes: bool,
) -> TestApp {
    let backend = MockServer::start().await;
    let env = configure(full_env(&backend));
    let resolver = EnvResolver::new(Arc::new(env));
    let factory = ClientFactory::new(resolver, Duration::from_secs(5)).expect("http client");

    let email = Arc::new(MockEmailProvider::new());
    let state = AppState::new(settings(debug_routes), factory, email.clone());

    TestApp {
        router: build_router(state.clone()),
        state,
        backend,
        email,
    }
}

impl TestApp {
    pub fn cookie_name(&self) -> String {
        cookie_name(&Url::parse(&self.backend.uri()).expect("mock server uri"))
    }

    /// `name=value` for a session that will not need a refresh.
    pub fn session_cookie(&self, access_token: &str) -> String {
        self.cookie_with(access_token, chrono::Utc::now().timestamp() + 3600)
    }

    pub fn cookie_with(&self, access_token: &str, expires_at: i64) -> String {
        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: format!("{}-refresh", access_token),
            expires_at,
        };
        format!("{}={}", self.cookie_name(), session.encode())
    }

    /// Mounts the user lookup for `access_token` and returns a matching cookie.
    pub async fn signed_in(&self, access_token: &str) -> String {
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", format!("Bearer {}", access_token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json(
                "00000000-0000-0000-0000-000000000001",
                "owner@atelier.test",
            )))
            .mount(&self.backend)
            .await;

        self.session_cookie(access_token)
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        cookie: &str,
        body: Value,
    ) -> Response<Body> {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("cookie", cookie)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_with_cookie(&self, uri: &str, cookie: &str) -> Response<Body> {
        self.request(
            Request::builder()
                .uri(uri)
                .header("cookie", cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub fn user_json(id: &str, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "role": "authenticated",
        "aud": "authenticated"
    })
}
