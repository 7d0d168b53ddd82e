use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Expected API key plus the paths that skip the check (health probes).
#[derive(Clone)]
pub struct ApiKey {
    key: Arc<str>,
    excluded_paths: Arc<[String]>,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Arc::from(key.into()),
            excluded_paths: Arc::from(Vec::new()),
        }
    }

    pub fn excluding<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        self.excluded_paths = Arc::from(paths);
        self
    }

    fn matches(&self, candidate: &str) -> bool {
        self.key.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| p == path)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"<redacted>")
            .field("excluded_paths", &self.excluded_paths)
            .finish()
    }
}

/// Rejects requests without the configured `x-api-key`: 401 when missing, 403 when wrong.
pub async fn api_key_middleware(
    State(api_key): State<ApiKey>,
    request: Request,
    next: Next,
) -> Response {
    if api_key.is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(key) if api_key.matches(key) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
            AppError::Forbidden(anyhow::anyhow!("Invalid API key")).into_response()
        }
        None => AppError::Unauthorized(anyhow::anyhow!("Missing API key")).into_response(),
    }
}
