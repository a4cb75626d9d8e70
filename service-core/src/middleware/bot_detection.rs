use crate::error::AppError;
use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use isbot::Bots;
use tracing::warn;

/// Heuristic score for a request's headers; 100 or more is treated as automated.
pub fn bot_score(bots: &Bots, headers: &HeaderMap) -> u32 {
    let user_agent = headers
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if user_agent.is_empty() {
        return 50;
    }

    let mut score = 0;
    if bots.is_bot(user_agent) {
        score += 100;
    }

    if user_agent.starts_with("Mozilla/") {
        let missing_headers = ["Accept", "Accept-Language", "Accept-Encoding"]
            .iter()
            .filter(|name| !headers.contains_key(**name))
            .count();

        score += match missing_headers {
            0 => 0,
            1 => 30,
            _ => 70,
        };
    }

    score
}

/// Rejects suspected crawlers on state-changing public endpoints such as contact forms.
/// Safe methods pass through untouched.
pub async fn bot_detection_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(request).await);
    }

    let score = bot_score(&Bots::default(), &headers);
    if score >= 100 {
        warn!(
            user_agent = ?headers.get("User-Agent"),
            score = %score,
            path = %request.uri(),
            "Blocking suspected bot request"
        );
        return Err(AppError::Forbidden(anyhow::anyhow!("Bot detected")));
    }

    Ok(next.run(request).await)
}
