use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson},
    routing::get,
};
use db::models::{
    friend::{CreateFriend, Friend, UpdateFriend},
    saved_gift::SavedGift,
};
use deployment::Deployment;
use serde_json::json;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{AppJson, AppPath, CurrentUser},
};

/// Loads a friend owned by `user_id`; someone else's friend is a 404 too.
pub(crate) async fn owned_friend(
    deployment: &DeploymentImpl,
    user_id: Uuid,
    friend_id: Uuid,
) -> Result<Friend, ApiError> {
    deployment
        .storage()
        .friend(user_id, friend_id)
        .await?
        .ok_or(ApiError::NotFound("Friend"))
}

pub async fn list_friends(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<Vec<Friend>>, ApiError> {
    Ok(ResponseJson(deployment.storage().list_friends(user.id).await?))
}

pub async fn create_friend(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<CreateFriend>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.validate()?;
    let friend = deployment.storage().create_friend(user.id, &payload).await?;

    deployment
        .track_if_analytics_allowed(
            Some(user.id),
            "friend_created",
            json!({
                "friend_id": friend.id.to_string(),
                "traits": friend.personality_traits.len(),
                "interests": friend.interests.len(),
            }),
        )
        .await;

    Ok((StatusCode::CREATED, ResponseJson(friend)))
}

pub async fn get_friend(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<ResponseJson<Friend>, ApiError> {
    Ok(ResponseJson(owned_friend(&deployment, user.id, id).await?))
}

pub async fn update_friend(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateFriend>,
) -> Result<ResponseJson<Friend>, ApiError> {
    let merged = owned_friend(&deployment, user.id, id).await?.merge(payload)?;
    let friend = deployment
        .storage()
        .update_friend(&merged)
        .await?
        .ok_or(ApiError::NotFound("Friend"))?;
    Ok(ResponseJson(friend))
}

pub async fn delete_friend(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ApiError> {
    if deployment.storage().delete_friend(user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Friend"))
    }
}

/// GET /api/friends/{id}/gifts
pub async fn list_friend_gifts(
    State(deployment): State<DeploymentImpl>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<ResponseJson<Vec<SavedGift>>, ApiError> {
    let friend = owned_friend(&deployment, user.id, id).await?;
    Ok(ResponseJson(
        deployment
            .storage()
            .list_saved_gifts(user.id, Some(friend.id))
            .await?,
    ))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/friends",
        Router::new()
            .route("/", get(list_friends).post(create_friend))
            .route(
                "/{id}",
                get(get_friend).put(update_friend).delete(delete_friend),
            )
            .route("/{id}/gifts", get(list_friend_gifts)),
    )
}
