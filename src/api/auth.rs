//! Shared-secret check for dispatch routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// `true` when no token is configured or the provided one matches.
pub fn check_token(expected: &str, provided: Option<&str>) -> bool {
    expected.is_empty() || provided == Some(expected)
}

pub async fn service_token_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let upstream = &state.config.upstream;
    let provided = request
        .headers()
        .get(upstream.token_header.as_str())
        .and_then(|value| value.to_str().ok());

    if check_token(&upstream.token, provided) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid service token");
        Err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_token() {
        assert!(check_token("", None));
        assert!(check_token("", Some("anything")));
        assert!(check_token("s3cret", Some("s3cret")));
        assert!(!check_token("s3cret", Some("S3CRET")));
        assert!(!check_token("s3cret", None));
    }
}
