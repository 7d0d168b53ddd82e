//! Aggregated health report served on the configured health route.

use crate::provider::Store;
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub check: String,
    pub status: HealthStatus,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// `"<healthy checks>/<total checks>"`.
    pub healthy: String,
    pub results: Vec<CheckResult>,
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> CheckResult;
}

/// Pings the backing store.
pub struct StoreHealthCheck<S> {
    name: String,
    store: S,
}

impl<S: Store> StoreHealthCheck<S> {
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }
}

#[async_trait]
impl<S: Store> HealthCheck for StoreHealthCheck<S> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckResult {
        let started = Instant::now();
        let outcome = self.store.ping().await;

        let mut data = Map::new();
        data.insert(
            "latencyMs".to_string(),
            Value::from(started.elapsed().as_millis() as u64),
        );

        match outcome {
            Ok(()) => CheckResult {
                check: self.name.clone(),
                status: HealthStatus::Healthy,
                description: "Store is reachable".to_string(),
                exception: None,
                data,
            },
            Err(err) => CheckResult {
                check: self.name.clone(),
                status: HealthStatus::Unhealthy,
                description: "Store is unreachable".to_string(),
                exception: Some(err.to_string()),
                data,
            },
        }
    }
}

#[derive(Clone, Default)]
pub struct HealthChecks {
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl HealthChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, check: impl HealthCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Runs every check concurrently. Each result is reported under the
    /// name its check was registered with.
    pub async fn run(&self) -> HealthReport {
        let results = futures::future::join_all(self.checks.iter().map(|check| async move {
            let mut result = check.check().await;
            result.check = check.name().to_string();
            if result.status != HealthStatus::Healthy {
                tracing::warn!(check = %result.check, status = ?result.status, "Health check degraded");
            }
            result
        }))
        .await;

        let healthy = results
            .iter()
            .filter(|r| r.status == HealthStatus::Healthy)
            .count();
        let status = results
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        HealthReport {
            status,
            healthy: format!("{}/{}", healthy, results.len()),
            results,
        }
    }
}

/// 200 unless some check is unhealthy, then 503.
pub async fn health_handler(State(checks): State<Arc<HealthChecks>>) -> impl IntoResponse {
    let report = checks.run().await;
    let status = if report.status == HealthStatus::Unhealthy {
        tracing::warn!(healthy = %report.healthy, "Health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}
