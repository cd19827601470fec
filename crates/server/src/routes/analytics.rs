use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{Duration, Utc};
use db::models::analytics_event::{AnalyticsSummary, CreateAnalyticsEvent, SummaryQuery};
use deployment::Deployment;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AdminUser, AppJson, AppQuery, OptionalUser},
};

const DEFAULT_SUMMARY_DAYS: i64 = 30;
const MAX_SUMMARY_DAYS: i64 = 365;

/// Client-reported event. The signed-in user, if any, is attached.
pub async fn record_event(
    State(deployment): State<DeploymentImpl>,
    viewer: OptionalUser,
    AppJson(payload): AppJson<CreateAnalyticsEvent>,
) -> Result<StatusCode, ApiError> {
    let event = payload.into_new(viewer.id())?;
    deployment.storage().record_event(&event).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn summary(
    State(deployment): State<DeploymentImpl>,
    AdminUser(_admin): AdminUser,
    AppQuery(query): AppQuery<SummaryQuery>,
) -> Result<ResponseJson<AnalyticsSummary>, ApiError> {
    let days = query
        .days
        .unwrap_or(DEFAULT_SUMMARY_DAYS)
        .clamp(1, MAX_SUMMARY_DAYS);
    let since = Utc::now() - Duration::days(days);
    Ok(ResponseJson(
        deployment.storage().analytics_summary(since).await?,
    ))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/analytics",
        Router::new()
            .route("/events", post(record_event))
            .route("/summary", get(summary)),
    )
}
