use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use serde::Serialize;
use ts_rs::TS;

use crate::DeploymentImpl;

#[derive(Debug, Serialize, TS)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub version: String,
}

pub async fn health(State(deployment): State<DeploymentImpl>) -> ResponseJson<HealthResponse> {
    ResponseJson(HealthResponse {
        status: "ok".to_string(),
        storage: deployment.storage().kind().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health))
}
