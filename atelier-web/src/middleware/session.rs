use crate::backend::ResponseCookies;
use axum::{
    extract::Request,
    http::{header::SET_COOKIE, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Gives each request a fresh cookie buffer and turns whatever the handler queued
/// into `Set-Cookie` headers. The buffer is committed before the headers are
/// written, so late writes from a handle that outlived the handler are dropped.
pub async fn session_cookies_middleware(mut req: Request, next: Next) -> Response {
    let cookies = ResponseCookies::new();
    req.extensions_mut().insert(cookies.clone());

    let mut response = next.run(req).await;

    for cookie in cookies.commit() {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = %cookie.name(), error = %e, "Skipping unencodable cookie");
            }
        }
    }

    response
}
