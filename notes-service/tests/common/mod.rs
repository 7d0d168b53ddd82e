//! Shared fixtures for notes-service integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use crud_kit::auth::{Invitation, JwtTokenService};
use crud_kit::store::MemoryStore;
use crud_kit::{Provider, Role, Store, TransactionHandle, TransactionHandler};
use notes_service::build_router;
use notes_service::config::NotesConfig;
use serde_json::Value;
use service_core::config::{MapEnvironment, Settings};
use tower::ServiceExt;

pub const JWT_KEY: &str = "notes-test-signing-key";
pub const API_KEY: &str = "notes-test-api-key";
pub const BOOTSTRAP_CODE: &str = "FIRST-ADMIN";

pub const CONFIGURATION: &str = r#"
    [service]
    service_name = "notes-service-test"

    [jwt]
    audience = "notes-tests"
    issuer = "notes-service"
    key_name = "NOTES_JWT_KEY"
    access_token_expires = 15
    refresh_token_expires = 120

    [api_key]
    key_name = "NOTES_API_KEY"

    [database]
    backend = "memory"
"#;

pub fn config() -> NotesConfig {
    let settings = Settings::from_toml(CONFIGURATION).expect("Failed to parse test configuration");
    NotesConfig::from_settings(&settings).expect("Failed to load test configuration")
}

/// The test configuration with a `bootstrap` section naming `NOTES_BOOTSTRAP_CODE`.
pub fn bootstrap_config() -> NotesConfig {
    let source = format!(
        "{}\n[bootstrap]\ninvitation_key_name = \"NOTES_BOOTSTRAP_CODE\"\n",
        CONFIGURATION
    );
    let settings = Settings::from_toml(&source).expect("Failed to parse test configuration");
    NotesConfig::from_settings(&settings).expect("Failed to load test configuration")
}

pub fn environment() -> MapEnvironment {
    MapEnvironment::new()
        .with("NOTES_JWT_KEY", JWT_KEY)
        .with("NOTES_API_KEY", API_KEY)
        .with("NOTES_BOOTSTRAP_CODE", BOOTSTRAP_CODE)
}

/// The service router over one in-memory store.
pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&config()).await
    }

    pub async fn spawn_with(config: &NotesConfig) -> Self {
        let store = MemoryStore::new();
        let router = build_router(store.clone(), config, &environment())
            .await
            .expect("Failed to build router");
        Self { store, router }
    }

    /// Sends a request carrying the API key and, when given, a bearer token.
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", API_KEY);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn invite(&self, code: &str, roles: Vec<Role>) {
        let invitations = self
            .store
            .provider::<Invitation>(&config().database.collections.auth.invitations);
        let mut tx = self
            .store
            .transactions()
            .start()
            .await
            .expect("Failed to start transaction");
        invitations
            .create(
                &mut tx,
                Invitation {
                    id: code.to_string(),
                    roles,
                },
            )
            .await
            .expect("Failed to seed invitation");
        tx.commit().await.expect("Failed to commit invitation");
    }
}

/// A token service sharing the router's key and configuration.
pub fn jwt() -> JwtTokenService {
    JwtTokenService::from_environment(&config().jwt, &environment()).expect("Failed to create JWT service")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn status_and_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    (status, json_body(response).await)
}
