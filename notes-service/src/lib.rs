//! notes-service: personal notes behind invitation-gated accounts.
//!
//! `build_router` is the composition root. Every collaborator is constructed
//! here by hand and handed to the controllers that need it.
pub mod bootstrap;
pub mod config;
pub mod models;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use config::NotesConfig;
use crud_kit::auth::{
    authenticate, Argon2Hasher, DomainAuthService, Invitation, InvitationTransformer,
    JwtTokenService,
};
use crud_kit::controller::{AuthController, CrudController, CrudPolicy, UserBoundCrudController};
use crud_kit::health::{health_handler, HealthChecks, StoreHealthCheck};
use crud_kit::service::{DomainService, UserBoundDomainService};
use crud_kit::{Role, Store};
use models::{Note, NoteTransformer};
use service_core::config::Environment;
use service_core::error::AppError;
use service_core::middleware::{
    api_key::{api_key_middleware, ApiKey},
    error_handling::catch_panic_layer,
    metrics::metrics_middleware,
    security_headers::security_headers_middleware,
    tracing::{make_request_span, request_id_middleware},
};
use service_core::observability::metrics::metrics_handler;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const METRICS_ROUTE: &str = "/metrics";

/// Wires the notes, invitation and auth controllers over `store`.
///
/// Secrets (the JWT signing key and the API key) are read from `env` under
/// the names given in `config`; a missing one fails here, before serving.
pub async fn build_router<S: Store>(
    store: S,
    config: &NotesConfig,
    env: &dyn Environment,
) -> Result<Router, AppError> {
    let collections = &config.database.collections;

    let jwt = JwtTokenService::from_environment(&config.jwt, env)?;
    let api_key = ApiKey::new(env.get(&config.api_key.key_name)?)
        .excluding([config.health.route.clone(), METRICS_ROUTE.to_string()]);
    tracing::info!("JWT and API key loaded");

    let transactions = Arc::new(store.transactions());

    let notes = UserBoundDomainService::new(
        Arc::new(store.user_bound_provider::<Note>(&collections.notes)),
        Arc::new(NoteTransformer),
        Arc::clone(&transactions),
    );
    let invitations = DomainService::new(
        Arc::new(store.provider::<Invitation>(&collections.auth.invitations)),
        Arc::new(InvitationTransformer),
        Arc::clone(&transactions),
    );
    let auth = DomainAuthService::new(&store, &collections.auth, jwt.clone(), Arc::new(Argon2Hasher));

    let health = Arc::new(HealthChecks::new().with(StoreHealthCheck::new("database", store)));

    let app = Router::new()
        .merge(UserBoundCrudController::new("Note", notes, CrudPolicy::uniform([Role::ACCESSOR])).router())
        .merge(
            CrudController::new(
                "Invitation",
                invitations,
                CrudPolicy::uniform([Role::ACCESSOR, Role::ADMIN]),
            )
            .router(),
        )
        .merge(AuthController::new(auth).router())
        .merge(
            Router::new()
                .route(&config.health.route, get(health_handler))
                .with_state(health),
        )
        .route(METRICS_ROUTE, get(metrics_handler))
        .layer(from_fn_with_state(jwt, authenticate))
        .layer(from_fn_with_state(api_key, api_key_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(catch_panic_layer());

    Ok(app)
}
