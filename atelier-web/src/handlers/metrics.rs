use axum::{http::header::CONTENT_TYPE, http::StatusCode, response::IntoResponse};

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        crate::services::metrics::get_metrics(),
    )
}
