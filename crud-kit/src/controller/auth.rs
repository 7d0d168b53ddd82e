use super::context::{RequestScope, ValidatedJson};
use super::guarded;
use crate::auth::{
    Caller, ChangePassword, DomainAuthService, JwtTokenService, SignIn, SignUp, Token,
};
use crate::claims::{Claims, Role};
use crate::links::{
    accessible_links, urn_namespace, ClaimLink, Link, LinkResult, NoContent, Operation,
};
use crate::provider::Store;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, options, post},
    Json, Router,
};
use service_core::error::AppError;
use std::sync::Arc;

/// Account endpoints under `/api/Auth`.
pub struct AuthController<S: Store> {
    service: DomainAuthService<S>,
    base: Arc<str>,
    namespace: Arc<str>,
}

impl<S: Store> Clone for AuthController<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            base: Arc::clone(&self.base),
            namespace: Arc::clone(&self.namespace),
        }
    }
}

impl<S: Store> AuthController<S> {
    pub fn new(service: DomainAuthService<S>) -> Self {
        let namespace = urn_namespace::<Self>();
        Self {
            service,
            base: format!("/api/{}", namespace).into(),
            namespace: namespace.into(),
        }
    }

    pub fn router(self) -> Router {
        let base = self.base.to_string();

        Router::new()
            .route(&format!("{}/sign-up", base), post(sign_up::<S>))
            .route(&format!("{}/sign-in", base), post(sign_in::<S>))
            .route(
                &format!("{}/change-password", base),
                guarded(post(change_password::<S>), &[Role::ACCESSOR]),
            )
            .route(
                &format!("{}/refresh", base),
                guarded(get(refresh::<S>), &[Role::REFRESHER]),
            )
            .route(
                &base,
                guarded(delete(remove::<S>), &[Role::ACCESSOR]).merge(options(describe::<S>)),
            )
            .with_state(self)
    }

    fn link(&self, operation: Operation, path: &str) -> Link {
        Link::for_operation(Some(self.namespace.as_ref()), operation, format!("{}{}", self.base, path))
    }

    fn claim_links(&self) -> Vec<ClaimLink> {
        vec![
            ClaimLink::requiring_roles(self.link(Operation::Delete, ""), [&Role::ACCESSOR]),
            ClaimLink::open(self.link(Operation::SignUp, "/sign-up")),
            ClaimLink::open(self.link(Operation::SignIn, "/sign-in")),
            ClaimLink::requiring_roles(self.link(Operation::ChangePassword, "/change-password"), [&Role::ACCESSOR]),
            ClaimLink::requiring_roles(self.link(Operation::Refresh, "/refresh"), [&Role::REFRESHER]),
            ClaimLink::open(self.link(Operation::Options, "")),
        ]
    }

    fn links_for(&self, claims: &Claims) -> Vec<Link> {
        accessible_links(&self.claim_links(), claims)
    }

    /// Links a client holding the new access token may follow.
    fn token_result(&self, token: Token) -> LinkResult<Token> {
        let claims = JwtTokenService::decode(&token.access_token)
            .map(|decoded| decoded.claims)
            .unwrap_or_default();
        let links = self.links_for(&claims);
        LinkResult::new(token, links)
    }
}

async fn sign_up<S: Store>(
    State(controller): State<AuthController<S>>,
    scope: RequestScope,
    ValidatedJson(body): ValidatedJson<SignUp>,
) -> Result<Json<LinkResult<Token>>, AppError> {
    let token = controller.service.sign_up(body, scope.token()).await?;
    Ok(Json(controller.token_result(token)))
}

async fn sign_in<S: Store>(
    State(controller): State<AuthController<S>>,
    scope: RequestScope,
    ValidatedJson(body): ValidatedJson<SignIn>,
) -> Result<Json<LinkResult<Token>>, AppError> {
    let token = controller.service.sign_in(body, scope.token()).await?;
    Ok(Json(controller.token_result(token)))
}

async fn change_password<S: Store>(
    State(controller): State<AuthController<S>>,
    Caller(claims): Caller,
    scope: RequestScope,
    ValidatedJson(body): ValidatedJson<ChangePassword>,
) -> Result<StatusCode, AppError> {
    let user_id = claims.require_user_id()?.to_string();
    controller
        .service
        .change_password(user_id, body, scope.token())
        .await?;
    Ok(StatusCode::OK)
}

async fn refresh<S: Store>(
    State(controller): State<AuthController<S>>,
    Caller(claims): Caller,
    scope: RequestScope,
) -> Result<Json<LinkResult<Token>>, AppError> {
    claims.require_refresh_token_id()?;
    let user_id = claims.require_user_id()?.to_string();
    let token = controller.service.refresh(user_id, scope.token()).await?;
    Ok(Json(controller.token_result(token)))
}

async fn remove<S: Store>(
    State(controller): State<AuthController<S>>,
    Caller(claims): Caller,
    scope: RequestScope,
    ValidatedJson(body): ValidatedJson<SignIn>,
) -> Result<StatusCode, AppError> {
    let user_id = claims.require_user_id()?.to_string();
    controller.service.delete(user_id, body, scope.token()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn describe<S: Store>(
    State(controller): State<AuthController<S>>,
    Caller(claims): Caller,
) -> Json<LinkResult<NoContent>> {
    Json(LinkResult::new(NoContent {}, controller.links_for(&claims)))
}
