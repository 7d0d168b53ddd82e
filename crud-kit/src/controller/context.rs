use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use std::convert::Infallible;
use tokio_util::sync::{CancellationToken, DropGuard};
use validator::Validate;

/// Cancellation scope of one request.
///
/// The token is cancelled when the scope is dropped, which happens when the
/// handler finishes or when the client goes away and axum drops the handler
/// future. A transaction still running at that point is aborted.
pub struct RequestScope {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestScope {
    pub fn new() -> Self {
        let token = CancellationToken::new();
        let guard = token.clone().drop_guard();
        Self {
            token,
            _guard: guard,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestScope::new())
    }
}

/// JSON body that has passed its `validator` rules. Both malformed JSON and
/// failed validation are rejected with 400.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropping_scope_cancels_token() {
        let scope = RequestScope::new();
        let token = scope.token();
        assert!(!token.is_cancelled());

        drop(scope);
        assert!(token.is_cancelled());
    }
}
