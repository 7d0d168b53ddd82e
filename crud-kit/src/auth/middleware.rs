use super::jwt::JwtTokenService;
use crate::claims::{Claims, Role};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;
use std::convert::Infallible;
use std::sync::Arc;

/// Validates a bearer token, when one is sent, and attaches its [`Claims`]
/// to the request. A request whose token is missing, malformed or no longer
/// valid continues anonymously, so open routes such as sign-in still work
/// and guarded routes answer 401 through [`require_roles`].
pub async fn authenticate(State(jwt): State<JwtTokenService>, mut request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    let Some(token) = token else {
        if request.headers().contains_key(header::AUTHORIZATION) {
            tracing::debug!("Ignoring malformed Authorization header");
        }
        return next.run(request).await;
    };

    match jwt.validate(&token) {
        Ok(claims) => {
            if let Some(user_id) = claims.user_id() {
                tracing::Span::current().record("user_id", user_id);
            }
            request.extensions_mut().insert(claims);
        }
        Err(err) => {
            tracing::debug!(error = %err, "Ignoring invalid bearer token");
        }
    }
    next.run(request).await
}

/// Roles a route demands; every listed role must be held.
#[derive(Debug, Clone, Default)]
pub struct RoleRequirement {
    roles: Arc<[Role]>,
}

impl RoleRequirement {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// 401 for an anonymous caller, 403 for a caller lacking a role.
pub async fn require_roles(State(requirement): State<RoleRequirement>, request: Request, next: Next) -> Response {
    if requirement.roles.is_empty() {
        return next.run(request).await;
    }

    let Some(claims) = request.extensions().get::<Claims>() else {
        return AppError::Unauthorized(anyhow::anyhow!("Authentication required")).into_response();
    };

    if let Some(missing) = requirement.roles.iter().find(|role| !claims.has_role(role)) {
        tracing::warn!(
            user_id = claims.user_id().unwrap_or_default(),
            role = %missing,
            "Caller lacks required role"
        );
        return AppError::Forbidden(anyhow::anyhow!("Role '{}' is required", missing)).into_response();
    }

    next.run(request).await
}

/// Claims of the current caller; empty when the request is anonymous.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(parts.extensions.get::<Claims>().cloned().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::claims::Claim;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn jwt() -> JwtTokenService {
        let config = JwtConfig {
            audience: "tests".to_string(),
            issuer: "tests".to_string(),
            key_name: "JWT_KEY".to_string(),
            access_token_expires: 15,
            refresh_token_expires: 60,
            clock_skew_seconds: 0,
        };
        JwtTokenService::new(&config, b"middleware-test-key").unwrap()
    }

    async fn whoami(Caller(claims): Caller) -> String {
        claims.user_id().unwrap_or("anonymous").to_string()
    }

    fn app(jwt: JwtTokenService, roles: Vec<Role>) -> Router {
        Router::new()
            .route("/", get(whoami))
            .route_layer(from_fn_with_state(RoleRequirement::new(roles), require_roles))
            .layer(from_fn_with_state(jwt, authenticate))
    }

    fn request(token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_passes_open_route() {
        let response = app(jwt(), vec![]).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"anonymous");
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized_on_guarded_route() {
        let response = app(jwt(), vec![Role::ACCESSOR])
            .oneshot(request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_access_token_satisfies_accessor() {
        let jwt = jwt();
        let token = jwt.create_token("u1", "Ada", &[]).unwrap();

        let response = app(jwt, vec![Role::ACCESSOR])
            .oneshot(request(Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"u1");
    }

    #[tokio::test]
    async fn test_missing_role_is_forbidden() {
        let jwt = jwt();
        let token = jwt.create_token("u1", "Ada", &[Claim::role(&Role::USER)]).unwrap();

        let response = app(jwt, vec![Role::ADMIN])
            .oneshot(request(Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_token_is_anonymous_on_open_route() {
        let response = app(jwt(), vec![])
            .oneshot(request(Some("garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"anonymous");
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized_on_guarded_route() {
        let response = app(jwt(), vec![Role::ACCESSOR])
            .oneshot(request(Some("garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_header_is_anonymous() {
        let request = HttpRequest::builder()
            .uri("/")
            .header("Authorization", "Basic dTE6cHc=")
            .body(Body::empty())
            .unwrap();

        let response = app(jwt(), vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
