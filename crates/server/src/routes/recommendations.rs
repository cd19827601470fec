use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use deployment::Deployment;
use serde_json::json;
use services::services::gift_recommendation::{RecommendationRequest, RecommendationResponse};
use uuid::Uuid;

use super::friends::owned_friend;
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppJson, AppPath, CurrentUser},
};

/// POST /api/friends/{id}/recommendations
pub async fn recommend_gifts(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<RecommendationRequest>,
) -> Result<ResponseJson<RecommendationResponse>, ApiError> {
    let friend = owned_friend(&deployment, user.id, id).await?;
    let saved: Vec<String> = deployment
        .storage()
        .list_saved_gifts(user.id, Some(friend.id))
        .await?
        .into_iter()
        .map(|gift| gift.name)
        .collect();

    let response = deployment
        .recommender()
        .recommend(&friend, &payload, &saved)
        .await;

    deployment
        .track_if_analytics_allowed(
            Some(user.id),
            "recommendations_generated",
            json!({
                "friend_id": friend.id.to_string(),
                "source": response.source,
                "count": response.recommendations.len(),
            }),
        )
        .await;

    Ok(ResponseJson(response))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/friends/{id}/recommendations", post(recommend_gifts))
}
